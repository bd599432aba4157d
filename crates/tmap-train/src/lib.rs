//! # tmap-train
//!
//! Coefficient training for monotone transport maps:
//! - KL objectives with analytic gradients, for a known target log-density
//!   (over reference samples) and for target samples (maximum likelihood
//!   under a standard-normal reference);
//! - an L-BFGS driver built on argmin;
//! - separable component-wise training of triangular maps;
//! - pullback log-densities and the variance diagnostic for assessing a
//!   trained map.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// KL objectives over maps.
pub mod objective;
/// L-BFGS wrapper.
pub mod optimizer;
/// Standard-normal reference density.
pub mod reference;
/// Training drivers and diagnostics.
pub mod train;

pub use objective::{DensityKlObjective, SamplesKlObjective, TargetDensity};
pub use optimizer::{LbfgsOptimizer, ObjectiveFunction, OptimizationResult, OptimizerConfig};
pub use reference::{std_normal_logpdf, StandardNormal, LN_SQRT_2PI};
pub use train::{
    pullback_log_density, train_component_from_samples, train_from_density, train_from_samples,
    variance_diagnostic, TrainConfig,
};

pub use tmap_core::{ConditionalMap, TrainResult};

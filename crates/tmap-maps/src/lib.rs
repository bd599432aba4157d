//! # tmap-maps
//!
//! Monotone triangular transport maps:
//! - multi-index sets selecting tensor-product basis terms;
//! - 1-D basis families (monomial, probabilists' Hermite, Hermite
//!   functions) with derivatives;
//! - monotone map components built by integrating a rectified expansion
//!   derivative, with analytic coefficient gradients and inversion;
//! - triangular compositions with joint log-determinants and block-sparse
//!   coefficient gradients.
//!
//! Batch operations are column-parallel over points; see
//! [`exec::ExecPolicy`] for scoping the thread pool.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// 1-D basis families.
pub mod basis;
/// Monotone map components.
pub mod component;
/// Execution context for batch operations.
pub mod exec;
/// Stable scalar math helpers.
pub mod math;
/// Multi-index sets.
pub mod multiindex;
/// Map configuration.
pub mod options;
/// Adaptive quadrature.
pub mod quadrature;
/// Positivity rectifiers.
pub mod rectifier;
/// Monotone 1-D root finding.
pub mod rootfind;
/// Triangular map composition.
pub mod triangular;

pub use basis::BasisType;
pub use component::MonotoneComponent;
pub use exec::ExecPolicy;
pub use multiindex::{FixedMultiIndexSet, MultiIndex, MultiIndexSet};
pub use options::MapOptions;
pub use rectifier::Rectifier;
pub use triangular::TriangularMap;

// The trait lives in tmap-core; re-export it so map users need one import.
pub use tmap_core::ConditionalMap;

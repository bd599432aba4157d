//! # tmap-core
//!
//! Core types for the monotone transport-map engine:
//! - [`Error`] / [`Result`]: workspace-wide error taxonomy (configuration,
//!   numerical non-convergence, rectifier domain violations);
//! - [`TrainResult`]: outcome of coefficient training;
//! - [`ConditionalMap`]: the narrow map API implemented by monotone
//!   components and triangular maps.
//!
//! Higher layers (`tmap-maps`, `tmap-train`) depend on this crate only.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
/// Trait-based map API.
pub mod traits;
/// Shared result types.
pub mod types;

pub use error::{Error, PointFailure, Result};
pub use traits::ConditionalMap;
pub use types::TrainResult;

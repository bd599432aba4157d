//! Map configuration.

use serde::{Deserialize, Serialize};

use tmap_core::{Error, Result};

use crate::basis::BasisType;
use crate::rectifier::Rectifier;

/// Immutable configuration for a monotone map component.
///
/// Passed by value at component construction and never mutated afterward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapOptions {
    /// 1-D basis family for the multivariate expansion.
    pub basis: BasisType,
    /// Positivity rectifier applied to the diagonal derivative.
    pub rectifier: Rectifier,
    /// Absolute tolerance of the adaptive quadrature over the rectifier
    /// integral.
    pub quad_tol: f64,
    /// Maximum quadrature subdivision depth; exhaustion is reported as
    /// non-convergence.
    pub quad_max_depth: u32,
    /// Convergence tolerance of the inverse root finder, on the residual
    /// `|S(t) − target|`.
    pub inverse_tol: f64,
    /// Iteration cap of the inverse root finder.
    pub inverse_max_iters: u32,
}

impl Default for MapOptions {
    fn default() -> Self {
        MapOptions {
            basis: BasisType::default(),
            rectifier: Rectifier::default(),
            quad_tol: 1e-8,
            quad_max_depth: 30,
            inverse_tol: 1e-9,
            inverse_max_iters: 100,
        }
    }
}

impl MapOptions {
    /// Validate numeric controls. Called eagerly at component construction.
    pub fn validate(&self) -> Result<()> {
        if !(self.quad_tol > 0.0) || !self.quad_tol.is_finite() {
            return Err(Error::Config(format!(
                "quadrature tolerance must be finite and > 0, got {}",
                self.quad_tol
            )));
        }
        if self.quad_max_depth == 0 {
            return Err(Error::Config("quadrature max depth must be >= 1".into()));
        }
        if !(self.inverse_tol > 0.0) || !self.inverse_tol.is_finite() {
            return Err(Error::Config(format!(
                "inverse tolerance must be finite and > 0, got {}",
                self.inverse_tol
            )));
        }
        if self.inverse_max_iters == 0 {
            return Err(Error::Config("inverse iteration cap must be >= 1".into()));
        }
        Ok(())
    }
}

//! Core traits for the transport-map workspace.
//!
//! The training crate depends only on the `ConditionalMap` trait, not on
//! concrete map implementations. This keeps objective/driver code reusable
//! for single monotone components and full triangular maps alike.

use crate::Result;
use nalgebra::{DMatrix, DVector};

/// A parameterized map with a triangular Jacobian structure.
///
/// Points are stored column-wise: a batch of `N` points in `d` dimensions is
/// a `d × N` matrix. Coefficients are the only mutable state; `set_coeffs`
/// takes `&mut self`, so the borrow checker enforces the mutation barrier
/// between coefficient updates and in-flight batch evaluations.
pub trait ConditionalMap: Send + Sync {
    /// Number of input dimensions the map consumes.
    fn input_dim(&self) -> usize;

    /// Number of output dimensions the map produces.
    fn output_dim(&self) -> usize;

    /// Total number of coefficients.
    fn num_coeffs(&self) -> usize;

    /// Copy of the current coefficient vector.
    fn coeffs(&self) -> Vec<f64>;

    /// Replace the coefficient vector. The length must equal `num_coeffs`
    /// exactly; a mismatch is a configuration error.
    fn set_coeffs(&mut self, coeffs: &[f64]) -> Result<()>;

    /// Evaluate the map at each column of `points` (`input_dim × N`),
    /// returning an `output_dim × N` matrix.
    fn evaluate(&self, points: &DMatrix<f64>) -> Result<DMatrix<f64>>;

    /// Log-determinant of the map Jacobian at each point: the sum of the
    /// logs of the diagonal partials (off-diagonal terms vanish by
    /// triangularity).
    fn log_determinant(&self, points: &DMatrix<f64>) -> Result<DVector<f64>>;

    /// Coefficient gradient contracted with per-point sensitivities
    /// (`output_dim × N`), returning `num_coeffs × N`. Rows belonging to a
    /// component are exactly zero for inputs beyond that component's rows.
    fn coeff_grad(
        &self,
        points: &DMatrix<f64>,
        sensitivities: &DMatrix<f64>,
    ) -> Result<DMatrix<f64>>;

    /// Gradient of the log-determinant with respect to the coefficients,
    /// returning `num_coeffs × N`. Closed-form; no quadrature involved.
    fn log_det_coeff_grad(&self, points: &DMatrix<f64>) -> Result<DMatrix<f64>>;

    /// Invert the map at each column of `targets` (`output_dim × N`).
    ///
    /// `prefix` supplies known leading input coordinates for maps that
    /// consume more inputs than they produce (a component with `d` inputs
    /// needs its first `d − 1` coordinates given). Square triangular maps
    /// ignore `prefix` rows entirely; only its column count must match.
    /// Returns the full `input_dim × N` input points.
    fn inverse(&self, prefix: &DMatrix<f64>, targets: &DMatrix<f64>) -> Result<DMatrix<f64>>;
}

//! Positivity rectifiers: smooth, strictly positive maps `ℝ → ℝ₊`.
//!
//! Applied to the last-coordinate derivative of the underlying expansion
//! before integration, a rectifier makes every map component structurally
//! monotone in its last input for any coefficient vector.

use serde::{Deserialize, Serialize};

use crate::math::{clamp_exp_arg, exp_clamped, log1pexp, sigmoid};

/// Rectifier choice. A tagged strategy value, selected by
/// [`MapOptions`](crate::options::MapOptions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Rectifier {
    /// Clamped exponential `g(x) = exp(x)`. The default: an affine map to
    /// `N(μ, σ)` then has the closed-form diagonal coefficient `ln σ`.
    #[default]
    Exp,
    /// Softplus `g(x) = log(1 + exp(x))`, evaluated stably.
    SoftPlus,
}

impl Rectifier {
    /// `g(x)`.
    #[inline]
    pub fn eval(self, x: f64) -> f64 {
        match self {
            Rectifier::Exp => exp_clamped(x),
            Rectifier::SoftPlus => log1pexp(x),
        }
    }

    /// `g'(x)`.
    #[inline]
    pub fn deriv(self, x: f64) -> f64 {
        match self {
            Rectifier::Exp => exp_clamped(x),
            Rectifier::SoftPlus => sigmoid(x),
        }
    }

    /// `log g(x)`, computed without forming `g` where that would lose range.
    #[inline]
    pub fn log_eval(self, x: f64) -> f64 {
        match self {
            Rectifier::Exp => clamp_exp_arg(x),
            Rectifier::SoftPlus => log1pexp(x).ln(),
        }
    }

    /// `g'(x) / g(x)`, the factor appearing in the log-determinant
    /// coefficient gradient.
    #[inline]
    pub fn log_deriv(self, x: f64) -> f64 {
        match self {
            Rectifier::Exp => 1.0,
            Rectifier::SoftPlus => sigmoid(x) / log1pexp(x),
        }
    }
}

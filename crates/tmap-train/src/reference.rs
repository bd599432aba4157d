//! Standard-normal reference density.

use nalgebra::{DMatrix, DVector};
use tmap_core::Result;

use crate::objective::TargetDensity;

/// Natural log of `sqrt(2π)`.
pub const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_7;

/// Standard-normal log-density of each column of `points` (dimensions are
/// independent, so the joint log-pdf is a sum over rows).
pub fn std_normal_logpdf(points: &DMatrix<f64>) -> DVector<f64> {
    DVector::from_fn(points.ncols(), |j, _| {
        points.column(j).iter().map(|&v| -0.5 * v * v - LN_SQRT_2PI).sum()
    })
}

/// The standard normal as a target density: `∇ log η(x) = −x`.
///
/// Useful as a smoke-test target and as the reference in sample-based
/// training, where the sensitivity `−S(x; w)` falls out in closed form.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardNormal;

impl TargetDensity for StandardNormal {
    fn log_density(&self, points: &DMatrix<f64>) -> Result<DVector<f64>> {
        Ok(std_normal_logpdf(points))
    }

    fn grad_log_density(&self, points: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        Ok(-points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_logpdf_at_origin() {
        let pts = DMatrix::zeros(2, 1);
        let lp = std_normal_logpdf(&pts);
        assert_relative_eq!(lp[0], -2.0 * LN_SQRT_2PI, epsilon = 1e-14);
    }

    #[test]
    fn test_logpdf_symmetry() {
        let a = DMatrix::from_column_slice(2, 1, &[1.3, -0.4]);
        let b = DMatrix::from_column_slice(2, 1, &[-1.3, 0.4]);
        assert_relative_eq!(
            std_normal_logpdf(&a)[0],
            std_normal_logpdf(&b)[0],
            epsilon = 1e-14
        );
    }

    #[test]
    fn test_grad_is_negated_point() {
        let pts = DMatrix::from_column_slice(2, 2, &[0.5, -1.0, 2.0, 0.0]);
        let g = StandardNormal.grad_log_density(&pts).unwrap();
        assert_eq!(g, -pts);
    }
}

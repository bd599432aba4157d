//! 1-D basis families: values and derivatives up to second order.
//!
//! A basis family is a stateless pure function of `(x, n)`. Families are
//! interchangeable strategy values selected by [`MapOptions`]; expansions
//! evaluate whole tables `0..=max_order` at once since the recurrences give
//! every lower order for free.
//!
//! [`MapOptions`]: crate::options::MapOptions

use serde::{Deserialize, Serialize};

/// `π^(-1/4)`, the normalization of the order-0 Hermite function.
const PI_NEG_QUARTER: f64 = 0.751_125_544_464_942_5;

/// Which family of 1-D basis functions parameterizes an expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BasisType {
    /// Plain monomials `x^n`.
    Monomial,
    /// Probabilists' Hermite polynomials `He_n` (orthogonal under the
    /// standard normal weight).
    #[default]
    ProbabilistHermite,
    /// Orthonormal Hermite functions `ψ_n(x) ∝ H_n(x)·exp(-x²/2)`.
    ///
    /// The Gaussian weight keeps high orders bounded; total-order-9+
    /// expansions overflow with bare Hermite polynomials but not here.
    HermiteFunction,
}

/// Values, first and second derivatives of basis functions `0..=max_order`
/// at a single evaluation point.
#[derive(Debug, Clone)]
pub struct BasisTable {
    value: Vec<f64>,
    deriv: Vec<f64>,
    deriv2: Vec<f64>,
}

impl BasisTable {
    /// Value of the order-`n` basis function.
    #[inline]
    pub fn value(&self, n: usize) -> f64 {
        self.value[n]
    }

    /// First derivative of the order-`n` basis function.
    #[inline]
    pub fn deriv(&self, n: usize) -> f64 {
        self.deriv[n]
    }

    /// Second derivative of the order-`n` basis function.
    #[inline]
    pub fn deriv2(&self, n: usize) -> f64 {
        self.deriv2[n]
    }

    /// Highest order held by the table.
    pub fn max_order(&self) -> usize {
        self.value.len() - 1
    }
}

impl BasisType {
    /// Evaluate the family at `x` for all orders `0..=max_order`.
    pub fn eval_table(self, x: f64, max_order: usize) -> BasisTable {
        let n = max_order + 1;
        let mut value = vec![0.0; n];
        let mut deriv = vec![0.0; n];
        let mut deriv2 = vec![0.0; n];

        match self {
            BasisType::Monomial => {
                value[0] = 1.0;
                for k in 1..n {
                    value[k] = value[k - 1] * x;
                }
                for k in 1..n {
                    deriv[k] = k as f64 * value[k - 1];
                }
                for k in 2..n {
                    deriv2[k] = (k * (k - 1)) as f64 * value[k - 2];
                }
            }
            BasisType::ProbabilistHermite => {
                // He_{k+1} = x·He_k − k·He_{k−1}; He_k' = k·He_{k−1}.
                value[0] = 1.0;
                if n > 1 {
                    value[1] = x;
                }
                for k in 1..n - 1 {
                    value[k + 1] = x * value[k] - k as f64 * value[k - 1];
                }
                for k in 1..n {
                    deriv[k] = k as f64 * value[k - 1];
                }
                for k in 2..n {
                    deriv2[k] = (k * (k - 1)) as f64 * value[k - 2];
                }
            }
            BasisType::HermiteFunction => {
                // Orthonormal recurrence:
                //   ψ_{k+1} = x·√(2/(k+1))·ψ_k − √(k/(k+1))·ψ_{k−1}
                // with ψ_0 = π^(-1/4)·exp(-x²/2). All ψ_k stay O(1).
                value[0] = PI_NEG_QUARTER * (-0.5 * x * x).exp();
                if n > 1 {
                    value[1] = std::f64::consts::SQRT_2 * x * value[0];
                }
                for k in 1..n - 1 {
                    let kf = k as f64;
                    value[k + 1] = x * (2.0 / (kf + 1.0)).sqrt() * value[k]
                        - (kf / (kf + 1.0)).sqrt() * value[k - 1];
                }
                // ψ_k' = √(2k)·ψ_{k−1} − x·ψ_k; ψ_k'' = (x² − 2k − 1)·ψ_k
                // (the latter is the Hermite ODE).
                for k in 0..n {
                    let lower = if k > 0 { (2.0 * k as f64).sqrt() * value[k - 1] } else { 0.0 };
                    deriv[k] = lower - x * value[k];
                    deriv2[k] = (x * x - 2.0 * k as f64 - 1.0) * value[k];
                }
            }
        }

        BasisTable { value, deriv, deriv2 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn fd_check(basis: BasisType, x: f64, max_order: usize) {
        let h = 1e-5;
        let t = basis.eval_table(x, max_order);
        let tp = basis.eval_table(x + h, max_order);
        let tm = basis.eval_table(x - h, max_order);
        for k in 0..=max_order {
            let fd1 = (tp.value(k) - tm.value(k)) / (2.0 * h);
            let fd2 = (tp.value(k) - 2.0 * t.value(k) + tm.value(k)) / (h * h);
            assert_relative_eq!(t.deriv(k), fd1, epsilon = 1e-5, max_relative = 1e-4);
            if t.deriv2(k).abs() > 1e-8 || fd2.abs() > 1e-3 {
                assert_relative_eq!(t.deriv2(k), fd2, epsilon = 1e-3, max_relative = 1e-3);
            }
        }
    }

    #[test]
    fn test_monomial_values() {
        let t = BasisType::Monomial.eval_table(2.0, 4);
        assert_eq!(t.value(0), 1.0);
        assert_eq!(t.value(3), 8.0);
        assert_eq!(t.deriv(3), 12.0);
        assert_eq!(t.deriv2(3), 12.0);
    }

    #[test]
    fn test_probabilist_hermite_known_values() {
        // He_2 = x² − 1, He_3 = x³ − 3x, He_4 = x⁴ − 6x² + 3.
        let x = 1.3;
        let t = BasisType::ProbabilistHermite.eval_table(x, 4);
        assert_relative_eq!(t.value(2), x * x - 1.0, epsilon = 1e-14);
        assert_relative_eq!(t.value(3), x.powi(3) - 3.0 * x, epsilon = 1e-13);
        assert_relative_eq!(t.value(4), x.powi(4) - 6.0 * x * x + 3.0, epsilon = 1e-13);
    }

    #[test]
    fn test_derivatives_match_finite_differences() {
        for basis in [
            BasisType::Monomial,
            BasisType::ProbabilistHermite,
            BasisType::HermiteFunction,
        ] {
            for x in [-1.7, -0.2, 0.0, 0.8, 2.4] {
                fd_check(basis, x, 6);
            }
        }
    }

    #[test]
    fn test_hermite_function_bounded_at_high_order() {
        // Bare He_30(8) overflows past 1e20; the weighted functions stay O(1).
        let t = BasisType::HermiteFunction.eval_table(8.0, 30);
        for k in 0..=30 {
            assert!(t.value(k).is_finite());
            assert!(t.value(k).abs() < 1.0, "ψ_{k}(8) = {}", t.value(k));
        }
    }

    #[test]
    fn test_hermite_function_order_zero() {
        let t = BasisType::HermiteFunction.eval_table(0.0, 0);
        assert_relative_eq!(t.value(0), PI_NEG_QUARTER, epsilon = 1e-15);
        assert_relative_eq!(t.deriv(0), 0.0, epsilon = 1e-15);
    }
}

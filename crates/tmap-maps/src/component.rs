//! Monotone map components.
//!
//! A component is a scalar function of `d` inputs, strictly increasing in
//! the last one:
//!
//! ```text
//! S(x; w) = f(x₁..x_{d−1}, 0; w) + ∫₀^{x_d} g(∂f/∂t(x₁..x_{d−1}, t; w)) dt
//! ```
//!
//! where `f` is a multivariate expansion over a fixed multi-index set and
//! `g` a positivity rectifier. `∂S/∂x_d = g(∂f/∂x_d) > 0` holds for every
//! coefficient vector, so monotonicity is structural rather than enforced
//! by constrained optimization. Since `f` is linear in `w`, the term-product
//! vector doubles as `∇_w f` and its last-factor-derivative variant as
//! `∇_w ∂f/∂x_d`.

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

use tmap_core::{ConditionalMap, Error, Result};

use crate::basis::BasisTable;
use crate::multiindex::FixedMultiIndexSet;
use crate::options::MapOptions;
use crate::quadrature::adaptive_simpson;
use crate::rootfind::invert_monotone;

/// Contiguous column `j` of a column-major matrix, without copying.
pub(crate) fn col(m: &DMatrix<f64>, j: usize) -> &[f64] {
    let r = m.nrows();
    &m.as_slice()[j * r..(j + 1) * r]
}

/// A monotone-in-the-last-input map component over a fixed multi-index set.
///
/// Coefficients are the only mutable state (zero at construction, replaced
/// wholesale through [`ConditionalMap::set_coeffs`]); the multi-index set
/// and options are fixed for the component's lifetime.
#[derive(Debug, Clone)]
pub struct MonotoneComponent {
    mset: FixedMultiIndexSet,
    options: MapOptions,
    coeffs: Vec<f64>,
}

impl MonotoneComponent {
    /// Create a component with zero coefficients.
    ///
    /// The options are validated eagerly; the fixed set carries its own
    /// non-emptiness guarantee.
    pub fn new(mset: FixedMultiIndexSet, options: MapOptions) -> Result<Self> {
        options.validate()?;
        let n = mset.size();
        Ok(MonotoneComponent { mset, options, coeffs: vec![0.0; n] })
    }

    /// The multi-index set defining the coefficient layout.
    pub fn multi_index_set(&self) -> &FixedMultiIndexSet {
        &self.mset
    }

    /// The component's configuration.
    pub fn options(&self) -> &MapOptions {
        &self.options
    }

    /// Per-term products over the leading dimensions `0..d−1` (all factors
    /// except the last). Independent of the quadrature variable, so computed
    /// once per point.
    fn leading_products(&self, x: &[f64]) -> Vec<f64> {
        let d = self.mset.dim();
        let tables: Vec<BasisTable> = (0..d - 1)
            .map(|i| self.options.basis.eval_table(x[i], self.mset.max_degree(i)))
            .collect();
        (0..self.mset.size())
            .map(|j| {
                let alpha = &self.mset[j];
                let mut p = 1.0;
                for (i, table) in tables.iter().enumerate() {
                    p *= table.value(alpha[i]);
                }
                p
            })
            .collect()
    }

    /// Basis table for the last dimension at `t`.
    fn last_table(&self, t: f64) -> BasisTable {
        let d = self.mset.dim();
        self.options.basis.eval_table(t, self.mset.max_degree(d - 1))
    }

    /// `∂f/∂x_d` at last coordinate `t`, given leading products.
    fn diag_deriv(&self, lead: &[f64], table: &BasisTable) -> f64 {
        let d = self.mset.dim();
        self.coeffs
            .iter()
            .enumerate()
            .map(|(j, &w)| w * lead[j] * table.deriv(self.mset[j][d - 1]))
            .sum()
    }

    /// `f(x_{<d}, 0)`, the non-integrated part of the component.
    fn base_value(&self, lead: &[f64]) -> f64 {
        let d = self.mset.dim();
        let t0 = self.last_table(0.0);
        self.coeffs
            .iter()
            .enumerate()
            .map(|(j, &w)| w * lead[j] * t0.value(self.mset[j][d - 1]))
            .sum()
    }

    pub(crate) fn evaluate_one(&self, x: &[f64]) -> Result<f64> {
        let d = self.mset.dim();
        let lead = self.leading_products(x);
        let base = self.base_value(&lead);
        let g = self.options.rectifier;
        let integrand = |t: f64| g.eval(self.diag_deriv(&lead, &self.last_table(t)));
        let integral =
            adaptive_simpson(&integrand, 0.0, x[d - 1], self.options.quad_tol, self.options.quad_max_depth)?;
        Ok(base + integral)
    }

    pub(crate) fn log_det_one(&self, x: &[f64]) -> Result<f64> {
        let d = self.mset.dim();
        let lead = self.leading_products(x);
        let df = self.diag_deriv(&lead, &self.last_table(x[d - 1]));
        self.check_positive(df)?;
        Ok(self.options.rectifier.log_eval(df))
    }

    /// Unweighted `∇_w S(x)`; callers contract with their sensitivity.
    pub(crate) fn coeff_grad_one(&self, x: &[f64]) -> Result<DVector<f64>> {
        let d = self.mset.dim();
        let m = self.mset.size();
        let lead = self.leading_products(x);
        let g = self.options.rectifier;

        let t0 = self.last_table(0.0);
        let phi0 = DVector::from_fn(m, |j, _| lead[j] * t0.value(self.mset[j][d - 1]));

        // Differentiate under the integral sign: same quadrature machinery,
        // vector-valued integrand g'(∂f)·∇_w ∂f.
        let integrand = |t: f64| {
            let table = self.last_table(t);
            let df = self.diag_deriv(&lead, &table);
            let gp = g.deriv(df);
            DVector::from_fn(m, |j, _| gp * lead[j] * table.deriv(self.mset[j][d - 1]))
        };
        let integral: DVector<f64> =
            adaptive_simpson(&integrand, 0.0, x[d - 1], self.options.quad_tol, self.options.quad_max_depth)?;
        Ok(phi0 + integral)
    }

    /// `∇_w log g(∂f/∂x_d)` — closed form, no quadrature.
    pub(crate) fn log_det_coeff_grad_one(&self, x: &[f64]) -> Result<DVector<f64>> {
        let d = self.mset.dim();
        let m = self.mset.size();
        let lead = self.leading_products(x);
        let table = self.last_table(x[d - 1]);
        let df = self.diag_deriv(&lead, &table);
        self.check_positive(df)?;
        let ratio = self.options.rectifier.log_deriv(df);
        Ok(DVector::from_fn(m, |j, _| ratio * lead[j] * table.deriv(self.mset[j][d - 1])))
    }

    /// Solve `S(leading, t) = target` for `t`.
    pub(crate) fn invert_one(&self, leading: &[f64], target: f64) -> Result<f64> {
        let d = self.mset.dim();
        debug_assert_eq!(leading.len(), d - 1);
        let mut padded = leading.to_vec();
        padded.push(0.0);
        let lead = self.leading_products(&padded);
        let base = self.base_value(&lead);
        let g = self.options.rectifier;
        let integrand = |t: f64| g.eval(self.diag_deriv(&lead, &self.last_table(t)));
        let f = |t: f64| -> Result<(f64, f64)> {
            let integral =
                adaptive_simpson(&integrand, 0.0, t, self.options.quad_tol, self.options.quad_max_depth)?;
            let slope = g.eval(self.diag_deriv(&lead, &self.last_table(t)));
            Ok((base + integral, slope))
        };
        invert_monotone(&f, target, self.options.inverse_tol, self.options.inverse_max_iters)
    }

    fn check_positive(&self, df: f64) -> Result<()> {
        let g = self.options.rectifier.eval(df);
        if !(g > 0.0) || !g.is_finite() {
            return Err(Error::Domain(format!(
                "rectifier {:?} produced non-positive Jacobian {} at expansion derivative {}",
                self.options.rectifier, g, df
            )));
        }
        Ok(())
    }

    fn check_points(&self, points: &DMatrix<f64>) -> Result<()> {
        if points.nrows() != self.mset.dim() {
            return Err(Error::Config(format!(
                "points have {} rows, component expects {}",
                points.nrows(),
                self.mset.dim()
            )));
        }
        Ok(())
    }
}

impl ConditionalMap for MonotoneComponent {
    fn input_dim(&self) -> usize {
        self.mset.dim()
    }

    fn output_dim(&self) -> usize {
        1
    }

    fn num_coeffs(&self) -> usize {
        self.coeffs.len()
    }

    fn coeffs(&self) -> Vec<f64> {
        self.coeffs.clone()
    }

    fn set_coeffs(&mut self, coeffs: &[f64]) -> Result<()> {
        if coeffs.len() != self.coeffs.len() {
            return Err(Error::Config(format!(
                "coefficient vector has length {}, component expects {}",
                coeffs.len(),
                self.coeffs.len()
            )));
        }
        self.coeffs.copy_from_slice(coeffs);
        Ok(())
    }

    fn evaluate(&self, points: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        self.check_points(points)?;
        let n = points.ncols();
        let results = (0..n)
            .into_par_iter()
            .map(|j| self.evaluate_one(col(points, j)).map_err(|e| e.at_point(j)))
            .collect::<Vec<Result<f64>>>();
        let vals = collect_point_results(results, "evaluate")?;
        Ok(DMatrix::from_row_slice(1, n, &vals))
    }

    fn log_determinant(&self, points: &DMatrix<f64>) -> Result<DVector<f64>> {
        self.check_points(points)?;
        let n = points.ncols();
        let results = (0..n)
            .into_par_iter()
            .map(|j| self.log_det_one(col(points, j)).map_err(|e| e.at_point(j)))
            .collect::<Vec<Result<f64>>>();
        let vals = collect_point_results(results, "log determinant")?;
        Ok(DVector::from_vec(vals))
    }

    fn coeff_grad(
        &self,
        points: &DMatrix<f64>,
        sensitivities: &DMatrix<f64>,
    ) -> Result<DMatrix<f64>> {
        self.check_points(points)?;
        if sensitivities.nrows() != 1 || sensitivities.ncols() != points.ncols() {
            return Err(Error::Config(format!(
                "sensitivities are {}x{}, expected 1x{}",
                sensitivities.nrows(),
                sensitivities.ncols(),
                points.ncols()
            )));
        }
        let n = points.ncols();
        if n == 0 {
            return Ok(DMatrix::zeros(self.coeffs.len(), 0));
        }
        let cols = (0..n)
            .into_par_iter()
            .map(|j| {
                let grad = self.coeff_grad_one(col(points, j)).map_err(|e| e.at_point(j))?;
                Ok(grad * sensitivities[(0, j)])
            })
            .collect::<Result<Vec<DVector<f64>>>>()?;
        Ok(DMatrix::from_columns(&cols))
    }

    fn log_det_coeff_grad(&self, points: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        self.check_points(points)?;
        let n = points.ncols();
        if n == 0 {
            return Ok(DMatrix::zeros(self.coeffs.len(), 0));
        }
        let cols = (0..n)
            .into_par_iter()
            .map(|j| self.log_det_coeff_grad_one(col(points, j)).map_err(|e| e.at_point(j)))
            .collect::<Result<Vec<DVector<f64>>>>()?;
        Ok(DMatrix::from_columns(&cols))
    }

    fn inverse(&self, prefix: &DMatrix<f64>, targets: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        let d = self.mset.dim();
        if prefix.nrows() < d - 1 {
            return Err(Error::Config(format!(
                "prefix has {} rows, component needs its first {} coordinates",
                prefix.nrows(),
                d - 1
            )));
        }
        if targets.nrows() != 1 || targets.ncols() != prefix.ncols() {
            return Err(Error::Config(format!(
                "targets are {}x{}, expected 1x{}",
                targets.nrows(),
                targets.ncols(),
                prefix.ncols()
            )));
        }
        let n = targets.ncols();
        let solved = (0..n)
            .into_par_iter()
            .map(|j| {
                self.invert_one(&col(prefix, j)[..d - 1], targets[(0, j)])
                    .map_err(|e| e.at_point(j))
            })
            .collect::<Vec<Result<f64>>>();
        collect_point_results(solved, "inverse").map(|last_row| {
            let mut out = DMatrix::zeros(d, n);
            for j in 0..n {
                for i in 0..d - 1 {
                    out[(i, j)] = prefix[(i, j)];
                }
                out[(d - 1, j)] = last_row[j];
            }
            out
        })
    }
}

/// Gather per-point results, aggregating every non-convergent point into a
/// single error instead of aborting at the first. Configuration and domain
/// errors still short-circuit.
pub(crate) fn collect_point_results(
    results: Vec<Result<f64>>,
    context: &str,
) -> Result<Vec<f64>> {
    let mut values = Vec::with_capacity(results.len());
    let mut failures = Vec::new();
    for r in results {
        match r {
            Ok(v) => values.push(v),
            Err(Error::NonConvergence { failures: mut f, .. }) => {
                failures.append(&mut f);
                values.push(f64::NAN);
            }
            Err(other) => return Err(other),
        }
    }
    if failures.is_empty() {
        Ok(values)
    } else {
        Err(Error::NonConvergence { context: context.to_string(), failures })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basis::BasisType;
    use crate::rectifier::Rectifier;
    use approx::assert_relative_eq;

    fn affine_component() -> MonotoneComponent {
        let mset = crate::multiindex::MultiIndexSet::from_rows(&[vec![0], vec![1]])
            .unwrap()
            .fix()
            .unwrap();
        MonotoneComponent::new(mset, MapOptions::default()).unwrap()
    }

    #[test]
    fn test_zero_coeffs_is_identity() {
        // With w = 0 the expansion derivative is 0 and g(0) = exp(0) = 1,
        // so S(x) = x_d.
        let c = affine_component();
        let pts = DMatrix::from_row_slice(1, 3, &[-1.5, 0.0, 2.0]);
        let out = c.evaluate(&pts).unwrap();
        for j in 0..3 {
            assert_relative_eq!(out[(0, j)], pts[(0, j)], epsilon = 1e-10);
        }
    }

    #[test]
    fn test_affine_closed_form() {
        // w = [2, ln 0.5]: S(x) = 2 + 0.5·x.
        let mut c = affine_component();
        c.set_coeffs(&[2.0, 0.5_f64.ln()]).unwrap();
        let pts = DMatrix::from_row_slice(1, 2, &[1.0, -3.0]);
        let out = c.evaluate(&pts).unwrap();
        assert_relative_eq!(out[(0, 0)], 2.5, epsilon = 1e-9);
        assert_relative_eq!(out[(0, 1)], 0.5, epsilon = 1e-9);
        let ld = c.log_determinant(&pts).unwrap();
        assert_relative_eq!(ld[0], 0.5_f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_softplus_rectifier_zero_coeffs() {
        let mset = crate::multiindex::MultiIndexSet::from_rows(&[vec![0], vec![1]])
            .unwrap()
            .fix()
            .unwrap();
        let options = MapOptions { rectifier: Rectifier::SoftPlus, ..MapOptions::default() };
        let c = MonotoneComponent::new(mset, options).unwrap();
        let pts = DMatrix::from_row_slice(1, 1, &[2.0]);
        let out = c.evaluate(&pts).unwrap();
        assert_relative_eq!(out[(0, 0)], 2.0 * 2.0_f64.ln(), epsilon = 1e-9);
    }

    #[test]
    fn test_hermite_function_basis_runs() {
        let mset = FixedMultiIndexSet::total_order(2, 3).unwrap();
        let options = MapOptions { basis: BasisType::HermiteFunction, ..MapOptions::default() };
        let mut c = MonotoneComponent::new(mset, options).unwrap();
        let w: Vec<f64> = (0..c.num_coeffs()).map(|j| 0.1 * (j as f64 + 1.0)).collect();
        c.set_coeffs(&w).unwrap();
        let pts = DMatrix::from_row_slice(2, 2, &[0.3, -0.7, 1.1, 0.4]);
        assert!(c.evaluate(&pts).unwrap().iter().all(|v| v.is_finite()));
        assert!(c.log_determinant(&pts).unwrap().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_wrong_coeff_length_rejected() {
        let mut c = affine_component();
        let err = c.set_coeffs(&[1.0]).unwrap_err();
        assert!(err.to_string().contains("configuration"), "{err}");
    }

    #[test]
    fn test_wrong_point_dim_rejected() {
        let c = affine_component();
        let pts = DMatrix::from_row_slice(2, 1, &[0.0, 0.0]);
        assert!(c.evaluate(&pts).is_err());
    }

    #[test]
    fn test_evaluate_failure_aggregates_points() {
        // With one subdivision level, exp(2t) over [0, ±2] cannot meet the
        // tolerance; both nonzero points must be reported together, with
        // their column indices, while the zero-length point succeeds.
        let mset = crate::multiindex::MultiIndexSet::from_rows(&[vec![0], vec![2]])
            .unwrap()
            .fix()
            .unwrap();
        let options = MapOptions { quad_max_depth: 1, ..MapOptions::default() };
        let mut c = MonotoneComponent::new(mset, options).unwrap();
        c.set_coeffs(&[0.0, 1.0]).unwrap();
        let pts = DMatrix::from_row_slice(1, 3, &[2.0, 0.0, -2.0]);
        match c.evaluate(&pts) {
            Err(Error::NonConvergence { context, failures }) => {
                assert_eq!(context, "evaluate");
                let mut points: Vec<usize> = failures.iter().map(|f| f.point).collect();
                points.sort_unstable();
                assert_eq!(points, vec![0, 2]);
            }
            other => panic!("expected aggregated non-convergence, got {other:?}"),
        }
    }

    #[test]
    fn test_inverse_round_trip() {
        let mut c = affine_component();
        c.set_coeffs(&[1.0, 0.3]).unwrap();
        let pts = DMatrix::from_row_slice(1, 3, &[-2.0, 0.5, 3.0]);
        let out = c.evaluate(&pts).unwrap();
        let back = c.inverse(&DMatrix::zeros(0, 3), &out).unwrap();
        for j in 0..3 {
            assert_relative_eq!(back[(0, j)], pts[(0, j)], epsilon = 1e-7);
        }
    }
}

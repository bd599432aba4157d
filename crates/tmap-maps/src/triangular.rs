//! Triangular maps: ordered compositions of monotone components.
//!
//! Component `k` (0-based) consumes input rows `0..=k` and produces output
//! row `k`, so the Jacobian is lower triangular and its log-determinant is
//! the sum of the component log-determinants. The block structure also makes
//! coefficient gradients exactly zero outside each component's block.

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

use tmap_core::{ConditionalMap, Error, Result};

use crate::component::{col, collect_point_results, MonotoneComponent};
use crate::multiindex::FixedMultiIndexSet;
use crate::options::MapOptions;

/// A square triangular map: `d` components of input dimensions `1..=d`.
#[derive(Debug, Clone)]
pub struct TriangularMap {
    components: Vec<MonotoneComponent>,
    /// Coefficient-block offsets; `offsets[k]` is where component `k`'s
    /// block starts in the concatenated vector, `offsets[d]` the total.
    offsets: Vec<usize>,
}

impl TriangularMap {
    /// Compose components into a triangular map.
    ///
    /// Component `k` must have input dimension `k + 1`; anything else is a
    /// configuration error, reported eagerly.
    pub fn new(components: Vec<MonotoneComponent>) -> Result<Self> {
        if components.is_empty() {
            return Err(Error::Config("triangular map needs at least one component".into()));
        }
        for (k, c) in components.iter().enumerate() {
            if c.input_dim() != k + 1 {
                return Err(Error::Config(format!(
                    "component {} has input dimension {}, expected {}",
                    k,
                    c.input_dim(),
                    k + 1
                )));
            }
        }
        let mut offsets = Vec::with_capacity(components.len() + 1);
        let mut total = 0;
        for c in &components {
            offsets.push(total);
            total += c.num_coeffs();
        }
        offsets.push(total);
        Ok(TriangularMap { components, offsets })
    }

    /// Build a `dim`-dimensional map whose component `k` uses a total-order
    /// multi-index set of the given order over its `k + 1` inputs.
    pub fn total_order(dim: usize, order: usize, options: &MapOptions) -> Result<Self> {
        let components = (1..=dim)
            .map(|d| {
                let mset = FixedMultiIndexSet::total_order(d, order)?;
                MonotoneComponent::new(mset, options.clone())
            })
            .collect::<Result<Vec<_>>>()?;
        TriangularMap::new(components)
    }

    /// Number of components (= input dimension = output dimension).
    pub fn num_components(&self) -> usize {
        self.components.len()
    }

    /// Component `k`, read-only.
    pub fn component(&self, k: usize) -> &MonotoneComponent {
        &self.components[k]
    }

    /// Component `k`, mutable (for component-wise training).
    pub fn component_mut(&mut self, k: usize) -> &mut MonotoneComponent {
        &mut self.components[k]
    }

    /// Coefficient-block offsets into the concatenated vector; the last
    /// entry is the total coefficient count.
    pub fn coeff_offsets(&self) -> &[usize] {
        &self.offsets
    }

    fn check_points(&self, points: &DMatrix<f64>) -> Result<()> {
        if points.nrows() != self.components.len() {
            return Err(Error::Config(format!(
                "points have {} rows, map expects {}",
                points.nrows(),
                self.components.len()
            )));
        }
        Ok(())
    }
}

impl ConditionalMap for TriangularMap {
    fn input_dim(&self) -> usize {
        self.components.len()
    }

    fn output_dim(&self) -> usize {
        self.components.len()
    }

    fn num_coeffs(&self) -> usize {
        *self.offsets.last().unwrap_or(&0)
    }

    fn coeffs(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.num_coeffs());
        for c in &self.components {
            out.extend(c.coeffs());
        }
        out
    }

    fn set_coeffs(&mut self, coeffs: &[f64]) -> Result<()> {
        let total = self.num_coeffs();
        if coeffs.len() != total {
            return Err(Error::Config(format!(
                "coefficient vector has length {}, map expects {}",
                coeffs.len(),
                total
            )));
        }
        for (k, c) in self.components.iter_mut().enumerate() {
            c.set_coeffs(&coeffs[self.offsets[k]..self.offsets[k + 1]])?;
        }
        Ok(())
    }

    fn evaluate(&self, points: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        self.check_points(points)?;
        let d = self.components.len();
        let n = points.ncols();
        let cols = (0..n)
            .into_par_iter()
            .map(|j| {
                let x = col(points, j);
                let mut out = DVector::zeros(d);
                for (k, c) in self.components.iter().enumerate() {
                    out[k] = c.evaluate_one(&x[..=k]).map_err(|e| e.at_point(j))?;
                }
                Ok(out)
            })
            .collect::<Result<Vec<DVector<f64>>>>()?;
        if cols.is_empty() {
            return Ok(DMatrix::zeros(d, 0));
        }
        Ok(DMatrix::from_columns(&cols))
    }

    fn log_determinant(&self, points: &DMatrix<f64>) -> Result<DVector<f64>> {
        self.check_points(points)?;
        let n = points.ncols();
        let vals = (0..n)
            .into_par_iter()
            .map(|j| {
                let x = col(points, j);
                let mut sum = 0.0;
                for (k, c) in self.components.iter().enumerate() {
                    sum += c.log_det_one(&x[..=k]).map_err(|e| e.at_point(j))?;
                }
                Ok(sum)
            })
            .collect::<Result<Vec<f64>>>()?;
        Ok(DVector::from_vec(vals))
    }

    fn coeff_grad(
        &self,
        points: &DMatrix<f64>,
        sensitivities: &DMatrix<f64>,
    ) -> Result<DMatrix<f64>> {
        self.check_points(points)?;
        let d = self.components.len();
        let n = points.ncols();
        if sensitivities.nrows() != d || sensitivities.ncols() != n {
            return Err(Error::Config(format!(
                "sensitivities are {}x{}, expected {}x{}",
                sensitivities.nrows(),
                sensitivities.ncols(),
                d,
                n
            )));
        }
        let total = self.num_coeffs();
        if n == 0 {
            return Ok(DMatrix::zeros(total, 0));
        }
        let cols = (0..n)
            .into_par_iter()
            .map(|j| {
                let x = col(points, j);
                // Entries outside each component's block stay exactly zero.
                let mut out = DVector::zeros(total);
                for (k, c) in self.components.iter().enumerate() {
                    let grad = c.coeff_grad_one(&x[..=k]).map_err(|e| e.at_point(j))?;
                    let block = grad * sensitivities[(k, j)];
                    out.rows_mut(self.offsets[k], c.num_coeffs()).copy_from(&block);
                }
                Ok(out)
            })
            .collect::<Result<Vec<DVector<f64>>>>()?;
        Ok(DMatrix::from_columns(&cols))
    }

    fn log_det_coeff_grad(&self, points: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        self.check_points(points)?;
        let n = points.ncols();
        let total = self.num_coeffs();
        if n == 0 {
            return Ok(DMatrix::zeros(total, 0));
        }
        let cols = (0..n)
            .into_par_iter()
            .map(|j| {
                let x = col(points, j);
                let mut out = DVector::zeros(total);
                for (k, c) in self.components.iter().enumerate() {
                    let block = c.log_det_coeff_grad_one(&x[..=k]).map_err(|e| e.at_point(j))?;
                    out.rows_mut(self.offsets[k], c.num_coeffs()).copy_from(&block);
                }
                Ok(out)
            })
            .collect::<Result<Vec<DVector<f64>>>>()?;
        Ok(DMatrix::from_columns(&cols))
    }

    /// Sequential per-component inversion: row `k` is solved with rows
    /// `0..k` already known. The sequence over components is intrinsic to
    /// triangularity; points remain independent and run in parallel.
    fn inverse(&self, prefix: &DMatrix<f64>, targets: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        let d = self.components.len();
        if targets.nrows() != d {
            return Err(Error::Config(format!(
                "targets have {} rows, map expects {}",
                targets.nrows(),
                d
            )));
        }
        // A square map needs no leading coordinates, but a prefix sized for
        // a different batch is a caller mistake worth reporting.
        if prefix.ncols() != targets.ncols() {
            return Err(Error::Config(format!(
                "prefix has {} columns, targets have {}",
                prefix.ncols(),
                targets.ncols()
            )));
        }
        let n = targets.ncols();
        let solved = (0..n)
            .into_par_iter()
            .map(|j| {
                let mut x = vec![0.0; d];
                for (k, c) in self.components.iter().enumerate() {
                    x[k] = c
                        .invert_one(&x[..k], targets[(k, j)])
                        .map_err(|e| e.at_point(j))?;
                }
                Ok(x)
            })
            .collect::<Vec<Result<Vec<f64>>>>();
        // Flatten into per-point scalar results for shared failure gathering:
        // a point either fully solves or contributes its failure record.
        let mut values = Vec::with_capacity(n * d);
        let mut flat: Vec<Result<f64>> = Vec::with_capacity(n);
        for r in solved {
            match r {
                Ok(xs) => {
                    values.extend(xs);
                    flat.push(Ok(0.0));
                }
                Err(e) => flat.push(Err(e)),
            }
        }
        collect_point_results(flat, "inverse")?;
        let mut out = DMatrix::zeros(d, n);
        let mut it = values.into_iter();
        for j in 0..n {
            for i in 0..d {
                out[(i, j)] = it.next().unwrap_or(f64::NAN);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multiindex::MultiIndexSet;
    use approx::assert_relative_eq;

    /// The exact banana inverse map: S(x₁, x₂) = (x₁, x₂ − x₁²).
    fn banana_map() -> TriangularMap {
        let mset1 = MultiIndexSet::from_rows(&[vec![0], vec![1]]).unwrap().fix().unwrap();
        let c1 = MonotoneComponent::new(mset1, MapOptions::default()).unwrap();
        // He_2(x₁) = x₁² − 1, so w = [-1 (constant), -1 (He_2), 0 (x₂ slope)]
        // gives S₂ = x₂ − x₁² with the Exp rectifier.
        let mset2 = MultiIndexSet::from_rows(&[vec![0, 0], vec![2, 0], vec![0, 1]])
            .unwrap()
            .fix()
            .unwrap();
        let c2 = MonotoneComponent::new(mset2, MapOptions::default()).unwrap();
        let mut map = TriangularMap::new(vec![c1, c2]).unwrap();
        map.set_coeffs(&[0.0, 0.0, -1.0, -1.0, 0.0]).unwrap();
        map
    }

    #[test]
    fn test_component_ordering_enforced() {
        let mset2 = FixedMultiIndexSet::total_order(2, 1).unwrap();
        let c2 = MonotoneComponent::new(mset2, MapOptions::default()).unwrap();
        let err = TriangularMap::new(vec![c2]).unwrap_err();
        assert!(err.to_string().contains("input dimension"), "{err}");
    }

    #[test]
    fn test_banana_evaluate() {
        let map = banana_map();
        let pts = DMatrix::from_column_slice(2, 2, &[1.0, 3.0, -2.0, 1.0]);
        let out = map.evaluate(&pts).unwrap();
        assert_relative_eq!(out[(0, 0)], 1.0, epsilon = 1e-9);
        assert_relative_eq!(out[(1, 0)], 3.0 - 1.0, epsilon = 1e-9);
        assert_relative_eq!(out[(0, 1)], -2.0, epsilon = 1e-9);
        assert_relative_eq!(out[(1, 1)], 1.0 - 4.0, epsilon = 1e-9);
    }

    #[test]
    fn test_log_determinant_sums_components() {
        let map = banana_map();
        let pts = DMatrix::from_column_slice(2, 1, &[0.7, 1.2]);
        // Both diagonal partials are 1, so the joint log-determinant is 0.
        let ld = map.log_determinant(&pts).unwrap();
        assert_relative_eq!(ld[0], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_inverse_round_trip() {
        let map = banana_map();
        let pts = DMatrix::from_column_slice(2, 3, &[0.4, 1.0, -1.3, 2.5, 0.0, -0.2]);
        let out = map.evaluate(&pts).unwrap();
        let back = map.inverse(&DMatrix::zeros(0, 3), &out).unwrap();
        for j in 0..3 {
            for i in 0..2 {
                assert_relative_eq!(back[(i, j)], pts[(i, j)], epsilon = 1e-7);
            }
        }
    }

    #[test]
    fn test_inverse_prefix_batch_mismatch_rejected() {
        let map = banana_map();
        let targets = DMatrix::zeros(2, 3);
        let err = map.inverse(&DMatrix::zeros(0, 2), &targets).unwrap_err();
        assert!(err.to_string().contains("prefix"), "{err}");
    }

    #[test]
    fn test_concatenated_coeffs() {
        let mut map = banana_map();
        assert_eq!(map.num_coeffs(), 5);
        assert_eq!(map.coeff_offsets(), &[0, 2, 5]);
        let w = vec![0.1, 0.2, 0.3, 0.4, 0.5];
        map.set_coeffs(&w).unwrap();
        assert_eq!(map.coeffs(), w);
        assert!(map.set_coeffs(&[0.0; 4]).is_err());
    }

    #[test]
    fn test_coeff_grad_block_zero() {
        let map = banana_map();
        let pts = DMatrix::from_column_slice(2, 2, &[0.3, -0.8, 1.1, 0.6]);
        // Sensitivity selecting only output row 0: component 1's block must
        // be exactly zero, not merely small.
        let sens = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 0.0, 0.0]);
        let grad = map.coeff_grad(&pts, &sens).unwrap();
        for j in 0..2 {
            for i in 2..5 {
                assert_eq!(grad[(i, j)], 0.0);
            }
        }
    }
}

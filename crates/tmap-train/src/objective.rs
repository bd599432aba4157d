//! KL-divergence objectives with analytic coefficient gradients.
//!
//! Both objectives are Monte-Carlo estimates of a KL divergence between the
//! reference and the map-induced density, differing in what is known:
//! the target's (unnormalized) log-density, or only samples from it.

use std::sync::{Mutex, PoisonError};

use nalgebra::{DMatrix, DVector};

use tmap_core::{ConditionalMap, Error, Result};

use crate::optimizer::ObjectiveFunction;
use crate::reference::std_normal_logpdf;

/// An (unnormalized) target log-density and its gradient — the external
/// collaborator interface of density-known training.
pub trait TargetDensity: Sync {
    /// `log π̄` at each column of `points`.
    fn log_density(&self, points: &DMatrix<f64>) -> Result<DVector<f64>>;

    /// `∇ log π̄` at each column of `points`, same shape as `points`.
    fn grad_log_density(&self, points: &DMatrix<f64>) -> Result<DMatrix<f64>>;
}

// The guard borrow and the inner `&mut M` have independent lifetimes;
// Mutex is invariant, so tying them together does not compile.
fn lock<'a, 'b, M: ?Sized>(m: &'a Mutex<&'b mut M>) -> std::sync::MutexGuard<'a, &'b mut M> {
    // A poisoned lock only means a previous evaluation panicked; the map
    // coefficients are overwritten on every call, so the state is reusable.
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Trial coefficients during a line search can exhaust the quadrature
/// budget. An infinite cost (paired with a zero gradient) makes the search
/// backtrack to a feasible step; any other error still aborts the fit.
fn or_infinite<T>(r: Result<T>) -> Result<Option<T>> {
    match r {
        Ok(v) => Ok(Some(v)),
        Err(Error::NonConvergence { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Density-known KL objective over reference samples `z ~ η`:
///
/// ```text
/// J(w) = −mean_i [ log π̄(S(zⁱ; w)) + log det ∇S(zⁱ; w) ]
/// ```
///
/// The gradient contracts the coefficient Jacobian with `∇ log π̄` at the
/// mapped points and adds the log-determinant coefficient gradient.
pub struct DensityKlObjective<'a, M: ConditionalMap> {
    map: Mutex<&'a mut M>,
    target: &'a dyn TargetDensity,
    reference_samples: &'a DMatrix<f64>,
}

impl<'a, M: ConditionalMap> DensityKlObjective<'a, M> {
    /// Bind a map, a target log-density, and reference samples
    /// (`input_dim × N`).
    pub fn new(
        map: &'a mut M,
        target: &'a dyn TargetDensity,
        reference_samples: &'a DMatrix<f64>,
    ) -> Result<Self> {
        if reference_samples.nrows() != map.input_dim() {
            return Err(Error::Config(format!(
                "reference samples have {} rows, map expects {}",
                reference_samples.nrows(),
                map.input_dim()
            )));
        }
        if reference_samples.ncols() == 0 {
            return Err(Error::Config("objective needs at least one sample".into()));
        }
        Ok(Self { map: Mutex::new(map), target, reference_samples })
    }
}

impl<M: ConditionalMap> ObjectiveFunction for DensityKlObjective<'_, M> {
    fn eval(&self, params: &[f64]) -> Result<f64> {
        let mut map = lock(&self.map);
        map.set_coeffs(params)?;
        let Some(mapped) = or_infinite(map.evaluate(self.reference_samples))? else {
            return Ok(f64::INFINITY);
        };
        let log_pi = self.target.log_density(&mapped)?;
        let Some(log_det) = or_infinite(map.log_determinant(self.reference_samples))? else {
            return Ok(f64::INFINITY);
        };
        let n = self.reference_samples.ncols() as f64;
        Ok(-(log_pi.sum() + log_det.sum()) / n)
    }

    fn gradient(&self, params: &[f64]) -> Result<Vec<f64>> {
        let mut map = lock(&self.map);
        map.set_coeffs(params)?;
        let Some(mapped) = or_infinite(map.evaluate(self.reference_samples))? else {
            return Ok(vec![0.0; params.len()]);
        };
        let sens = self.target.grad_log_density(&mapped)?;
        let Some(g) = or_infinite(map.coeff_grad(self.reference_samples, &sens))? else {
            return Ok(vec![0.0; params.len()]);
        };
        let Some(g_det) = or_infinite(map.log_det_coeff_grad(self.reference_samples))? else {
            return Ok(vec![0.0; params.len()]);
        };
        let n = self.reference_samples.ncols() as f64;
        let summed = (g + g_det).column_sum() * (-1.0 / n);
        Ok(summed.as_slice().to_vec())
    }
}

/// Sample-based KL objective over target samples `x ~ π`, with a
/// standard-normal reference:
///
/// ```text
/// J(w) = −mean_i [ log η(S(xⁱ; w)) + log det ∇S(xⁱ; w) ]
/// ```
///
/// `∇ log η(y) = −y` gives the closed-form sensitivity `−S(x; w)`. Works
/// for a full triangular map and for one component alike; triangularity and
/// the product-form reference make the per-component subproblems
/// independent (exploited by the separable training driver).
pub struct SamplesKlObjective<'a, M: ConditionalMap> {
    map: Mutex<&'a mut M>,
    samples: &'a DMatrix<f64>,
}

impl<'a, M: ConditionalMap> SamplesKlObjective<'a, M> {
    /// Bind a map and target samples (`input_dim × N`).
    pub fn new(map: &'a mut M, samples: &'a DMatrix<f64>) -> Result<Self> {
        if samples.nrows() != map.input_dim() {
            return Err(Error::Config(format!(
                "samples have {} rows, map expects {}",
                samples.nrows(),
                map.input_dim()
            )));
        }
        if samples.ncols() == 0 {
            return Err(Error::Config("objective needs at least one sample".into()));
        }
        Ok(Self { map: Mutex::new(map), samples })
    }
}

impl<M: ConditionalMap> ObjectiveFunction for SamplesKlObjective<'_, M> {
    fn eval(&self, params: &[f64]) -> Result<f64> {
        let mut map = lock(&self.map);
        map.set_coeffs(params)?;
        let Some(mapped) = or_infinite(map.evaluate(self.samples))? else {
            return Ok(f64::INFINITY);
        };
        let log_eta = std_normal_logpdf(&mapped);
        let Some(log_det) = or_infinite(map.log_determinant(self.samples))? else {
            return Ok(f64::INFINITY);
        };
        let n = self.samples.ncols() as f64;
        Ok(-(log_eta.sum() + log_det.sum()) / n)
    }

    fn gradient(&self, params: &[f64]) -> Result<Vec<f64>> {
        let mut map = lock(&self.map);
        map.set_coeffs(params)?;
        let Some(mapped) = or_infinite(map.evaluate(self.samples))? else {
            return Ok(vec![0.0; params.len()]);
        };
        let sens = -mapped;
        let Some(g) = or_infinite(map.coeff_grad(self.samples, &sens))? else {
            return Ok(vec![0.0; params.len()]);
        };
        let Some(g_det) = or_infinite(map.log_det_coeff_grad(self.samples))? else {
            return Ok(vec![0.0; params.len()]);
        };
        let n = self.samples.ncols() as f64;
        let summed = (g + g_det).column_sum() * (-1.0 / n);
        Ok(summed.as_slice().to_vec())
    }
}

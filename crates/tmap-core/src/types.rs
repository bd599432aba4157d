//! Common result types for map training.

use serde::{Deserialize, Serialize};

/// Result of fitting map coefficients by KL/maximum-likelihood minimization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainResult {
    /// Best-fit coefficient vector (concatenated over components).
    pub coeffs: Vec<f64>,

    /// Objective value at the minimum (negative mean log-likelihood).
    pub objective: f64,

    /// Per-component objective values. Length 1 for joint training; one
    /// entry per map component when training exploits separability.
    pub component_objectives: Vec<f64>,

    /// Total optimizer iterations (summed over components).
    pub n_iter: u64,

    /// Number of objective evaluations.
    pub n_fev: usize,

    /// Number of gradient evaluations.
    pub n_gev: usize,

    /// Whether every optimizer run terminated by convergence.
    pub converged: bool,

    /// Termination message from the optimizer (last component's when
    /// training component-wise).
    pub message: String,
}

impl TrainResult {
    /// Number of trained coefficients.
    pub fn num_coeffs(&self) -> usize {
        self.coeffs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_serde() {
        let r = TrainResult {
            coeffs: vec![2.0, -0.69],
            objective: 1.41,
            component_objectives: vec![1.41],
            n_iter: 12,
            n_fev: 20,
            n_gev: 14,
            converged: true,
            message: "gradient tolerance reached".into(),
        };
        let json = serde_json::to_string(&r).unwrap();
        let back: TrainResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.num_coeffs(), 2);
        assert!(back.converged);
        assert!((back.objective - 1.41).abs() < 1e-12);
    }
}

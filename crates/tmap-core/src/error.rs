//! Error types for the transport-map workspace.

use thiserror::Error;

/// A single point that failed to converge inside a batch operation.
///
/// Batch inversion and quadrature report *which* points failed, with the
/// last iterate and its residual, so callers can retry those points with a
/// different guess or tolerance instead of losing the whole batch.
#[derive(Debug, Clone, PartialEq)]
pub struct PointFailure {
    /// Column index of the failing point in the batch.
    pub point: usize,
    /// Last iterate produced before the iteration budget ran out.
    pub last_iterate: f64,
    /// Absolute residual at the last iterate.
    pub residual: f64,
}

/// Transport-map error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration, detected eagerly at construction or mutation
    /// time (dimension mismatch, coefficient-length mismatch, empty
    /// multi-index set, out-of-order triangular components, ...).
    #[error("configuration error: {0}")]
    Config(String),

    /// A numerical routine exhausted its iteration or subdivision budget.
    #[error("non-convergence in {context}: {}", summarize(failures))]
    NonConvergence {
        /// Which routine failed (e.g. "inverse", "quadrature").
        context: String,
        /// Per-point failure records; empty when no point is attributable.
        failures: Vec<PointFailure>,
    },

    /// The positivity rectifier produced a non-positive Jacobian entry.
    /// Indicates a broken rectifier configuration, not an expected runtime
    /// condition.
    #[error("domain error: {0}")]
    Domain(String),
}

impl Error {
    /// Non-convergence error for a single point.
    pub fn non_convergence(
        context: impl Into<String>,
        point: usize,
        last_iterate: f64,
        residual: f64,
    ) -> Self {
        Error::NonConvergence {
            context: context.into(),
            failures: vec![PointFailure { point, last_iterate, residual }],
        }
    }

    /// Re-tag the point index of every failure record. Used when a per-point
    /// kernel reports index 0 and the batch layer knows the real column.
    pub fn at_point(mut self, point: usize) -> Self {
        if let Error::NonConvergence { failures, .. } = &mut self {
            for f in failures.iter_mut() {
                f.point = point;
            }
        }
        self
    }
}

fn summarize(failures: &[PointFailure]) -> String {
    if failures.is_empty() {
        return "budget exhausted".to_string();
    }
    let shown: Vec<String> = failures
        .iter()
        .take(4)
        .map(|f| {
            format!(
                "point {} (last iterate {:.6e}, residual {:.3e})",
                f.point, f.last_iterate, f.residual
            )
        })
        .collect();
    let suffix = if failures.len() > 4 {
        format!(" and {} more", failures.len() - 4)
    } else {
        String::new()
    };
    format!("{} point(s) failed: {}{}", failures.len(), shown.join(", "), suffix)
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

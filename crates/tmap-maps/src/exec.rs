//! Explicit execution context for batch operations.

use serde::{Deserialize, Serialize};
use tmap_core::{Error, Result};

/// Thread-count policy for batch evaluation and training.
///
/// Batch kernels parallelize over points with rayon; this value scopes them
/// to a dedicated pool instead of a process-global setting, keeping the
/// engine testable and reentrant. `n_threads == 0` uses the ambient rayon
/// pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecPolicy {
    /// Worker threads for the scoped pool; 0 = ambient pool.
    pub n_threads: usize,
}

impl ExecPolicy {
    /// Policy using exactly `n` worker threads.
    pub fn with_threads(n: usize) -> Self {
        ExecPolicy { n_threads: n }
    }

    /// Run `op` under this policy. Rayon work spawned inside `op` lands on
    /// the scoped pool.
    pub fn run<R, F>(&self, op: F) -> Result<R>
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        if self.n_threads == 0 {
            return Ok(op());
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.n_threads)
            .build()
            .map_err(|e| Error::Config(format!("failed to build thread pool: {e}")))?;
        Ok(pool.install(op))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn test_ambient_pool() {
        let sum: i64 = ExecPolicy::default().run(|| (0..100i64).into_par_iter().sum()).unwrap();
        assert_eq!(sum, 4950);
    }

    #[test]
    fn test_scoped_pool_thread_count() {
        let n = ExecPolicy::with_threads(2).run(rayon::current_num_threads).unwrap();
        assert_eq!(n, 2);
    }
}

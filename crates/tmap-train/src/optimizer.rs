//! L-BFGS wrapper around argmin with a narrow objective interface.
//!
//! Map coefficients are unconstrained, so no bound handling is involved:
//! the drivers hand argmin an objective value and analytic gradient and take
//! back the best iterate and termination status.

use argmin::core::{CostFunction, Executor, Gradient, State, TerminationReason, TerminationStatus};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tmap_core::{Error, Result};

/// Configuration for the L-BFGS optimizer.
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// Maximum number of iterations.
    pub max_iter: u64,
    /// Convergence tolerance on the gradient norm.
    pub grad_tol: f64,
    /// Number of corrections kept for the inverse-Hessian approximation.
    pub memory: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self { max_iter: 500, grad_tol: 1e-5, memory: 10 }
    }
}

/// Result of one optimizer run.
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    /// Best iterate found.
    pub parameters: Vec<f64>,
    /// Objective value at the best iterate.
    pub fval: f64,
    /// Iterations performed.
    pub n_iter: u64,
    /// Objective evaluations.
    pub n_fev: usize,
    /// Gradient evaluations.
    pub n_gev: usize,
    /// Whether the solver terminated by convergence.
    pub converged: bool,
    /// Termination message.
    pub message: String,
}

impl fmt::Display for OptimizationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OptimizationResult(fval={:.6}, n_iter={}, n_fev={}, n_gev={}, converged={})",
            self.fval, self.n_iter, self.n_fev, self.n_gev, self.converged
        )
    }
}

/// Objective function handed to the optimizer.
pub trait ObjectiveFunction: Send + Sync {
    /// Evaluate the objective at `params`.
    fn eval(&self, params: &[f64]) -> Result<f64>;

    /// Gradient at `params`. The default is central finite differences with
    /// an adaptive step; training objectives override it with the analytic
    /// gradient.
    fn gradient(&self, params: &[f64]) -> Result<Vec<f64>> {
        let mut grad = vec![0.0; params.len()];
        for i in 0..params.len() {
            let eps = 1e-8 * params[i].abs().max(1.0);
            let mut plus = params.to_vec();
            plus[i] += eps;
            let mut minus = params.to_vec();
            minus[i] -= eps;
            grad[i] = (self.eval(&plus)? - self.eval(&minus)?) / (2.0 * eps);
        }
        Ok(grad)
    }
}

#[derive(Default)]
struct FuncCounts {
    cost: AtomicUsize,
    grad: AtomicUsize,
}

/// Adapter making an [`ObjectiveFunction`] consumable by argmin.
struct ArgminProblem<'a> {
    objective: &'a dyn ObjectiveFunction,
    counts: Arc<FuncCounts>,
}

impl CostFunction for ArgminProblem<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, params: &Self::Param) -> std::result::Result<f64, argmin::core::Error> {
        self.counts.cost.fetch_add(1, Ordering::Relaxed);
        self.objective.eval(params).map_err(|e| argmin::core::Error::msg(e.to_string()))
    }
}

impl Gradient for ArgminProblem<'_> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, params: &Self::Param) -> std::result::Result<Vec<f64>, argmin::core::Error> {
        self.counts.grad.fetch_add(1, Ordering::Relaxed);
        self.objective.gradient(params).map_err(|e| argmin::core::Error::msg(e.to_string()))
    }
}

/// L-BFGS optimizer for unconstrained coefficient fitting.
pub struct LbfgsOptimizer {
    config: OptimizerConfig,
}

impl LbfgsOptimizer {
    /// Optimizer with the given configuration.
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    /// Minimize `objective` starting from `init_params`.
    pub fn minimize(
        &self,
        objective: &dyn ObjectiveFunction,
        init_params: &[f64],
    ) -> Result<OptimizationResult> {
        if init_params.is_empty() {
            return Err(Error::Config("cannot optimize over zero parameters".into()));
        }
        let counts = Arc::new(FuncCounts::default());
        let problem = ArgminProblem { objective, counts: counts.clone() };

        let linesearch = MoreThuenteLineSearch::new();
        // Argmin's default cost tolerance sits at machine epsilon, which on
        // NLL scales produces spurious max-iter terminations; tie it to the
        // gradient tolerance instead.
        let tol_cost = (0.1 * self.config.grad_tol).max(1e-12);
        let solver = LBFGS::new(linesearch, self.config.memory)
            .with_tolerance_grad(self.config.grad_tol)
            .map_err(|e| Error::Config(format!("invalid optimizer tolerance: {e}")))?
            .with_tolerance_cost(tol_cost)
            .map_err(|e| Error::Config(format!("invalid optimizer cost tolerance: {e}")))?;

        let res = Executor::new(problem, solver)
            .configure(|state| state.param(init_params.to_vec()).max_iters(self.config.max_iter))
            .run()
            .map_err(|e| {
                Error::NonConvergence {
                    context: format!("L-BFGS ({e})"),
                    failures: Vec::new(),
                }
            })?;

        let state = res.state();
        let parameters = state
            .get_best_param()
            .ok_or_else(|| Error::NonConvergence {
                context: "L-BFGS produced no iterate".into(),
                failures: Vec::new(),
            })?
            .clone();
        let termination = state.get_termination_status();
        let converged = matches!(
            termination,
            TerminationStatus::Terminated(TerminationReason::SolverConverged)
                | TerminationStatus::Terminated(TerminationReason::TargetCostReached)
        );

        Ok(OptimizationResult {
            parameters,
            fval: state.get_best_cost(),
            n_iter: state.get_iter(),
            n_fev: counts.cost.load(Ordering::Relaxed),
            n_gev: counts.grad.load(Ordering::Relaxed),
            converged,
            message: termination.to_string(),
        })
    }
}

impl Default for LbfgsOptimizer {
    fn default() -> Self {
        Self::new(OptimizerConfig::default())
    }
}

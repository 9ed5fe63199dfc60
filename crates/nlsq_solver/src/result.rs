// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
// nlsq: scalar autodiff and nonlinear least squares.
// Dual licensed under Apache 2.0 and MIT.
// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

//! Outcome of a [`crate::nonlinear_least_squares`] call.

/// The convergence-reason strings are part of the interface: callers may
/// match on them directly. Every outcome, including failure to converge,
/// is reported here rather than as an `Err` — see the workspace's error
/// handling design.
pub mod convergence_reason {
    /// `||J^T r|| < gradient_tolerance`.
    pub const GRADIENT_TOLERANCE: &str = "Gradient tolerance reached";
    /// `|prev_cost - cost| < cost_tolerance`.
    pub const COST_TOLERANCE: &str = "Cost tolerance reached";
    /// `cost < cost_tolerance`.
    pub const COST_BELOW_THRESHOLD: &str = "Cost below threshold";
    /// `||delta|| < param_tolerance`.
    pub const PARAM_TOLERANCE: &str = "Parameter tolerance reached";
    /// The outer loop exhausted `max_iterations` without converging.
    pub const MAX_ITERATIONS: &str = "Max iterations reached";
    /// Cholesky (or QR) failed even after the zero-damping retry.
    pub const LINEAR_SOLVER_FAILED_PREFIX: &str = "Linear solver failed: ";
    /// The non-adaptive backtracking line search found no accepting step.
    pub const LINE_SEARCH_FAILED: &str = "Line search failed";
    /// The adaptive inner loop exhausted `max_inner_iterations` without
    /// accepting a step.
    pub const DAMPING_ADJUSTMENT_FAILED: &str = "Damping adjustment failed";
}

/// Final parameters, cost, and termination diagnostics of a solve.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverResult {
    /// Whether the solve terminated by a convergence test rather than by
    /// exhausting its iteration budget or failing to find a step.
    pub success: bool,
    /// Number of outer iterations performed.
    pub iterations: usize,
    /// `sum(r_i^2)` at the returned parameters.
    pub final_cost: f64,
    /// One of the strings in [`convergence_reason`].
    pub convergence_reason: String,
    /// Wall-clock time spent inside the solve, in milliseconds.
    pub computation_time: f64,
    /// Parameter vector at termination (last accepted state).
    pub params: Vec<f64>,
    /// Residual vector at the returned parameters.
    pub residuals: Vec<f64>,
}

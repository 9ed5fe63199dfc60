// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
// nlsq: scalar autodiff and nonlinear least squares.
// Dual licensed under Apache 2.0 and MIT.
// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

//! Tunables for [`crate::nonlinear_least_squares`].

/// Options controlling a Levenberg-Marquardt solve. All fields have
/// sensible defaults; construct via [`SolverOptions::default`] and override
/// with the `with_*` setters.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOptions {
    /// Outer-loop iteration cap.
    pub max_iterations: usize,
    /// Inner damping-loop iteration cap, per outer iteration.
    pub max_inner_iterations: usize,
    /// Converged when `|prev_cost - cost| < cost_tolerance`.
    pub cost_tolerance: f64,
    /// Converged when `||delta|| < param_tolerance`.
    pub param_tolerance: f64,
    /// Converged when `||J^T r|| < gradient_tolerance`.
    pub gradient_tolerance: f64,
    /// Maximum halvings tried by the non-adaptive line search.
    pub line_search_steps: usize,
    /// Starting value of the damping parameter lambda.
    pub initial_damping: f64,
    /// When true, use adaptive damping (accept/reject + lambda rescaling).
    /// When false, use a backtracking line search instead.
    pub adaptive_damping: bool,
    /// Factor lambda is multiplied by after a rejected step.
    pub damping_increase_factor: f64,
    /// Factor lambda is divided by after an accepted step.
    pub damping_decrease_factor: f64,
    /// Solve the damped normal equations via Householder QR on the
    /// augmented system instead of Cholesky on `J^T J`.
    pub use_qr: bool,
    /// Maximum allowed step norm per outer iteration.
    pub trust_region_radius: f64,
    /// Emit a `log::debug!` trace line per outer iteration.
    pub verbose: bool,
}

impl Default for SolverOptions {
    fn default() -> Self {
        SolverOptions {
            max_iterations: 100,
            max_inner_iterations: 10,
            cost_tolerance: 1e-6,
            param_tolerance: 1e-6,
            gradient_tolerance: 1e-6,
            line_search_steps: 10,
            initial_damping: 1e-3,
            adaptive_damping: true,
            damping_increase_factor: 10.0,
            damping_decrease_factor: 10.0,
            use_qr: false,
            trust_region_radius: f64::INFINITY,
            verbose: false,
        }
    }
}

impl SolverOptions {
    /// Defaults, per §6 of the interface contract.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `max_iterations`.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set `max_inner_iterations`.
    #[must_use]
    pub fn with_max_inner_iterations(mut self, max_inner_iterations: usize) -> Self {
        self.max_inner_iterations = max_inner_iterations;
        self
    }

    /// Set `cost_tolerance`.
    #[must_use]
    pub fn with_cost_tolerance(mut self, cost_tolerance: f64) -> Self {
        self.cost_tolerance = cost_tolerance;
        self
    }

    /// Set `param_tolerance`.
    #[must_use]
    pub fn with_param_tolerance(mut self, param_tolerance: f64) -> Self {
        self.param_tolerance = param_tolerance;
        self
    }

    /// Set `gradient_tolerance`.
    #[must_use]
    pub fn with_gradient_tolerance(mut self, gradient_tolerance: f64) -> Self {
        self.gradient_tolerance = gradient_tolerance;
        self
    }

    /// Set `line_search_steps`.
    #[must_use]
    pub fn with_line_search_steps(mut self, line_search_steps: usize) -> Self {
        self.line_search_steps = line_search_steps;
        self
    }

    /// Set `initial_damping`.
    #[must_use]
    pub fn with_initial_damping(mut self, initial_damping: f64) -> Self {
        self.initial_damping = initial_damping;
        self
    }

    /// Set `adaptive_damping`.
    #[must_use]
    pub fn with_adaptive_damping(mut self, adaptive_damping: bool) -> Self {
        self.adaptive_damping = adaptive_damping;
        self
    }

    /// Set `use_qr`.
    #[must_use]
    pub fn with_use_qr(mut self, use_qr: bool) -> Self {
        self.use_qr = use_qr;
        self
    }

    /// Set `trust_region_radius`.
    #[must_use]
    pub fn with_trust_region_radius(mut self, trust_region_radius: f64) -> Self {
        self.trust_region_radius = trust_region_radius;
        self
    }

    /// Set `verbose`.
    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

#[cfg(test)]
mod tests_options {
    use super::*;

    #[test]
    fn defaults_match_the_documented_interface() {
        let opts = SolverOptions::default();
        assert_eq!(opts.max_iterations, 100);
        assert_eq!(opts.max_inner_iterations, 10);
        assert_eq!(opts.cost_tolerance, 1e-6);
        assert_eq!(opts.param_tolerance, 1e-6);
        assert_eq!(opts.gradient_tolerance, 1e-6);
        assert_eq!(opts.line_search_steps, 10);
        assert_eq!(opts.initial_damping, 1e-3);
        assert!(opts.adaptive_damping);
        assert_eq!(opts.damping_increase_factor, 10.0);
        assert_eq!(opts.damping_decrease_factor, 10.0);
        assert!(!opts.use_qr);
        assert!(opts.trust_region_radius.is_infinite());
        assert!(!opts.verbose);
    }

    #[test]
    fn builder_setters_compose() {
        let opts = SolverOptions::new().with_max_iterations(5).with_use_qr(true).with_verbose(true);
        assert_eq!(opts.max_iterations, 5);
        assert!(opts.use_qr);
        assert!(opts.verbose);
    }
}

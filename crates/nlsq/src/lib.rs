// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
// nlsq: scalar autodiff and nonlinear least squares.
// Dual licensed under Apache 2.0 and MIT.
// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

//! `nlsq`: a small, self-contained automatic differentiation and nonlinear
//! optimization engine for scalar-valued computations.
//!
//! Build an expression graph of scalar nodes with ordinary arithmetic and
//! transcendental operations, then either run reverse-mode differentiation
//! directly on it, or compile a residual-producing function into a cached
//! set of specialized kernels and hand those to a Levenberg-Marquardt
//! nonlinear least squares solver.
//!
//! ```
//! use nlsq::prelude::*;
//!
//! let graph = Graph::new();
//! let a = graph.var(2.0);
//! let b = graph.var(-3.0);
//! let c = graph.constant(10.0);
//! let f = (a * b + c).tanh();
//! f.backward();
//! assert!(a.grad().is_finite());
//! ```
//!
//! # Installation
//!
//! ```toml
//! [dependencies]
//! nlsq = "0.1"
//! ```

#![forbid(missing_docs)]
#![forbid(clippy::undocumented_unsafe_blocks)]
#![allow(clippy::doc_markdown)]

/// Re-exports of every public item across the workspace, for `use nlsq::prelude::*;`.
pub mod prelude {
    pub use nlsq_autodiff::*;
    pub use nlsq_error::*;
    pub use nlsq_jit::*;
    pub use nlsq_linalg::*;
    pub use nlsq_solver::*;
}

/// The scalar autodiff graph: node representation, forward evaluation, and
/// reverse-mode gradient propagation.
pub mod autodiff {
    pub use nlsq_autodiff::*;
}

/// Dense linear algebra: Cholesky, Householder QR, and normal-equations
/// assembly.
pub mod linalg {
    pub use nlsq_linalg::*;
}

/// The residual JIT compiler: graph canonicalization and the compiled
/// kernel cache.
pub mod jit {
    pub use nlsq_jit::*;
}

/// The Levenberg-Marquardt nonlinear least squares solver.
pub mod solver {
    pub use nlsq_solver::*;
}

/// Shared error types.
pub mod error {
    pub use nlsq_error::*;
}

#[cfg(test)]
mod tests_end_to_end {
    use crate::prelude::*;

    #[test]
    fn mse_loss_scenario_matches_literal_expected_gradient() {
        let graph = Graph::new();
        let inputs = graph.vars(&[2.0, 3.0]);
        let targets = graph.vars(&[5.0, 1.0]);
        let squared_errors: Vec<Variable> = inputs.iter().zip(&targets).map(|(&x, &t)| (x - t).square()).collect();
        let loss = mean(&squared_errors);
        loss.backward();
        assert!((loss.value() - 6.5).abs() < 1e-9);
        assert!((inputs[0].grad() - -3.0).abs() < 1e-9);
        assert!((inputs[1].grad() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn compiled_kernel_reuse_scenario() {
        let targets: Vec<f64> = (0..100).map(|i| i as f64 * 0.1).collect();
        let builder = move |graph: &Graph, values: &[f64]| -> Vec<usize> {
            let params = graph.vars(values);
            params
                .iter()
                .zip(&targets)
                .map(|(&p, &t)| {
                    let target = graph.constant(t);
                    (p - target).square().index()
                })
                .collect()
        };
        let values: Vec<f64> = (0..100).map(|i| i as f64 * 0.1).collect();
        let set = CompiledResidualSet::new(CompileMode::Eager, values.len(), builder, &values);
        assert_eq!(set.kernel_count(), 1);
        assert!((set.kernel_reuse_factor() - 100.0).abs() < 1e-9);
        let (value, gradient) = set.evaluate_sum_with_gradient(&values);
        assert!(value.abs() < 1e-9);
        assert!(gradient.iter().all(|&g| g.abs() < 1e-9));
    }

    #[test]
    fn solves_a_two_parameter_curve_fit() {
        let xs = [0.0, 1.0, 2.0, 3.0];
        let ys = [1.0, 3.0, 5.0, 7.0]; // y = 2x + 1
        let builder = move |graph: &Graph, values: &[f64]| -> Vec<usize> {
            let p = graph.vars(values);
            xs.iter()
                .zip(ys.iter())
                .map(|(&x, &y)| {
                    let x = graph.constant(x);
                    let y = graph.constant(y);
                    let prediction = p[0] * x + p[1];
                    (prediction - y).index()
                })
                .collect()
        };
        let result = nonlinear_least_squares(&GraphResidualSource::new(2, builder, &[0.0, 0.0]), &[0.0, 0.0], &SolverOptions::default());
        assert!(result.success);
        assert!((result.params[0] - 2.0).abs() < 1e-4);
        assert!((result.params[1] - 1.0).abs() < 1e-4);
    }
}

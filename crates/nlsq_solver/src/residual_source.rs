// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
// nlsq: scalar autodiff and nonlinear least squares.
// Dual licensed under Apache 2.0 and MIT.
// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

//! Unifies the two ways a residual function can be fed to the solver: a
//! plain graph walked fresh on every call (path 1 in the data-flow
//! description), or a [`CompiledResidualSet`] of cached kernels (path 2).
//! The solver's outer loop is written once against [`ResidualSource`].

use nlsq_autodiff::Graph;
use nlsq_jit::{CompiledResidualSet, ResidualBuilder};
use nlsq_linalg::Matrix;

/// Evaluates a fixed-size residual vector and its Jacobian at arbitrary
/// parameter values.
pub trait ResidualSource {
    /// Length of the parameter vector this source was built against.
    fn num_params(&self) -> usize;
    /// Number of residuals this source produces.
    fn num_residuals(&self) -> usize;
    /// Residual values at `params`.
    fn evaluate(&self, params: &[f64]) -> Vec<f64>;
    /// Residual values and the dense `m x n` Jacobian at `params`.
    fn evaluate_jacobian(&self, params: &[f64]) -> (Vec<f64>, Matrix);
}

/// Residual source backed by a fresh [`Graph`] rebuilt on every call.
///
/// A graph node's `data` is computed once, at construction time, so
/// changing a parameter leaf's value after the fact does not re-propagate
/// through the nodes that read it — there is no incremental re-evaluation.
/// Rebuilding from scratch is the only correct way to get residuals at a
/// new parameter vector without a compiled kernel; this is exactly the
/// performance gap [`CompiledResidualSet`] exists to close.
pub struct GraphResidualSource<B: ResidualBuilder> {
    num_params: usize,
    num_residuals: usize,
    builder: B,
}

impl<B: ResidualBuilder> GraphResidualSource<B> {
    /// Build against `initial_params` to record the residual count, then
    /// hold onto `builder` for every later call.
    pub fn new(num_params: usize, builder: B, initial_params: &[f64]) -> Self {
        let graph = Graph::with_capacity(num_params * 4);
        let roots = builder.build(&graph, initial_params);
        GraphResidualSource {
            num_params,
            num_residuals: roots.len(),
            builder,
        }
    }
}

impl<B: ResidualBuilder> ResidualSource for GraphResidualSource<B> {
    fn num_params(&self) -> usize {
        self.num_params
    }

    fn num_residuals(&self) -> usize {
        self.num_residuals
    }

    fn evaluate(&self, params: &[f64]) -> Vec<f64> {
        let graph = Graph::with_capacity(self.num_params * 4);
        let roots = self.builder.build(&graph, params);
        roots.iter().map(|&root| graph.value(root)).collect()
    }

    fn evaluate_jacobian(&self, params: &[f64]) -> (Vec<f64>, Matrix) {
        let graph = Graph::with_capacity(self.num_params * 4);
        let roots = self.builder.build(&graph, params);
        let mut residuals = Vec::with_capacity(roots.len());
        let mut jacobian = Matrix::zeros(roots.len(), self.num_params);
        for (i, &root) in roots.iter().enumerate() {
            residuals.push(graph.value(root));
            graph.zero_grad_tree(root);
            graph.backward_from(root, 1.0);
            for p in 0..self.num_params {
                jacobian[(i, p)] = graph.grad(p);
            }
        }
        (residuals, jacobian)
    }
}

impl<B: ResidualBuilder> ResidualSource for CompiledResidualSet<B> {
    fn num_params(&self) -> usize {
        CompiledResidualSet::num_params(self)
    }

    fn num_residuals(&self) -> usize {
        self.num_functions()
    }

    fn evaluate(&self, params: &[f64]) -> Vec<f64> {
        CompiledResidualSet::evaluate(self, params)
    }

    fn evaluate_jacobian(&self, params: &[f64]) -> (Vec<f64>, Matrix) {
        CompiledResidualSet::evaluate_jacobian(self, params)
    }
}

#[cfg(test)]
mod tests_residual_source {
    use super::*;
    use nlsq_utils::assert_approx_equal;

    fn offset_squares(graph: &Graph, values: &[f64]) -> Vec<usize> {
        let vars = graph.vars(values);
        vars.iter()
            .enumerate()
            .map(|(i, v)| {
                let offset = graph.constant(i as f64 * 0.1);
                ((*v - offset).square()).index()
            })
            .collect()
    }

    #[test]
    fn graph_source_jacobian_matches_analytic_derivative() {
        let source = GraphResidualSource::new(2, offset_squares, &[1.0, 2.0]);
        let (residuals, jac) = source.evaluate_jacobian(&[1.0, 2.0]);
        assert_approx_equal!(residuals[0], 1.0, 1e-12);
        assert_approx_equal!(jac[(0, 0)], 2.0, 1e-12);
        assert_approx_equal!(jac[(1, 1)], 2.0 * (2.0 - 0.1), 1e-12);
    }

    #[test]
    fn compiled_source_matches_graph_source() {
        let params = [1.0, 2.0, 3.0];
        let graph_source = GraphResidualSource::new(3, offset_squares, &params);
        let compiled = CompiledResidualSet::new(nlsq_jit::CompileMode::Eager, 3, offset_squares, &params);
        let (r_graph, j_graph) = graph_source.evaluate_jacobian(&params);
        let (r_compiled, j_compiled) = ResidualSource::evaluate_jacobian(&compiled, &params);
        for i in 0..3 {
            assert_approx_equal!(r_graph[i], r_compiled[i], 1e-9);
            assert_approx_equal!(j_graph[(i, i)], j_compiled[(i, i)], 1e-9);
        }
    }
}

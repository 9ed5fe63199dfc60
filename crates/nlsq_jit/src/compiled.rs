// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
// nlsq: scalar autodiff and nonlinear least squares.
// Dual licensed under Apache 2.0 and MIT.
// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

//! The compiled residual set: a batch of residuals, each bound to a
//! (possibly shared) compiled [`Kernel`], evaluated without ever touching
//! `nlsq_autodiff` again once compilation is done.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use nlsq_autodiff::Graph;
use nlsq_linalg::Matrix;

use crate::intern::{SignatureArena, SignatureId};
use crate::kernel::Kernel;
use crate::signature::canonicalize;

/// Builds a fresh graph and residual expressions from the current
/// parameter vector.
///
/// # Contract
///
/// The builder must create exactly `num_params` `Param` leaves first, in
/// parameter order (typically via `graph.vars(values)`), before
/// constructing any residual expression. This is what lets a residual's
/// canonical slot indices double as parameter-vector indices directly,
/// with no separate lookup table.
pub trait ResidualBuilder {
    /// Build residuals against `graph` for the given parameter `values`,
    /// returning the root node index of each residual.
    fn build(&self, graph: &Graph, values: &[f64]) -> Vec<usize>;
}

impl<F> ResidualBuilder for F
where
    F: Fn(&Graph, &[f64]) -> Vec<usize>,
{
    fn build(&self, graph: &Graph, values: &[f64]) -> Vec<usize> {
        self(graph, values)
    }
}

/// When a [`CompiledResidualSet`] re-checks residual structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileMode {
    /// Compile once at construction; never invoke the residual builder
    /// again. Cheapest, but silently wrong if the builder's structure
    /// depends on the parameter values (e.g. branches on their sign).
    Eager,
    /// Re-run the residual builder and re-canonicalize every residual on
    /// every call, recompiling only the residuals whose signature changed.
    Lazy,
}

struct Binding {
    signature: SignatureId,
    kernel: Rc<Kernel>,
    slots: Vec<usize>,
}

/// A compiled, reusable batch of residuals.
pub struct CompiledResidualSet<B: ResidualBuilder> {
    num_params: usize,
    mode: CompileMode,
    builder: B,
    arena: RefCell<SignatureArena>,
    cache: RefCell<HashMap<SignatureId, Rc<Kernel>>>,
    bindings: RefCell<Vec<Binding>>,
}

impl<B: ResidualBuilder> CompiledResidualSet<B> {
    /// Compile every residual `builder` produces for `initial_values`.
    pub fn new(mode: CompileMode, num_params: usize, builder: B, initial_values: &[f64]) -> Self {
        let set = CompiledResidualSet {
            num_params,
            mode,
            builder,
            arena: RefCell::new(SignatureArena::new()),
            cache: RefCell::new(HashMap::new()),
            bindings: RefCell::new(Vec::new()),
        };
        set.recompile(initial_values);
        set
    }

    fn recompile(&self, values: &[f64]) {
        let graph = Graph::with_capacity(self.num_params * 4);
        let roots = self.builder.build(&graph, values);
        let mut arena = self.arena.borrow_mut();
        let mut cache = self.cache.borrow_mut();
        let bindings = roots
            .into_iter()
            .map(|root| {
                let canon = canonicalize(&graph, root);
                let id = arena.intern(&canon.signature);
                let kernel = cache
                    .entry(id)
                    .or_insert_with(|| Rc::new(Kernel::compile(&graph, root, &canon)))
                    .clone();
                Binding { signature: id, kernel, slots: canon.slots }
            })
            .collect();
        *self.bindings.borrow_mut() = bindings;
    }

    fn refresh_for(&self, values: &[f64]) {
        if self.mode != CompileMode::Lazy {
            return;
        }
        let graph = Graph::with_capacity(self.num_params * 4);
        let roots = self.builder.build(&graph, values);
        assert_eq!(
            roots.len(),
            self.bindings.borrow().len(),
            "residual count changed across calls; CompiledResidualSet cannot reconcile that in lazy mode"
        );
        let mut arena = self.arena.borrow_mut();
        let mut cache = self.cache.borrow_mut();
        let mut bindings = self.bindings.borrow_mut();
        for (binding, root) in bindings.iter_mut().zip(roots) {
            let canon = canonicalize(&graph, root);
            let id = arena.intern(&canon.signature);
            if id != binding.signature {
                log::debug!("nlsq_jit: residual structure changed, recompiling kernel");
                let kernel = cache
                    .entry(id)
                    .or_insert_with(|| Rc::new(Kernel::compile(&graph, root, &canon)))
                    .clone();
                binding.kernel = kernel;
                binding.signature = id;
            }
            binding.slots = canon.slots;
        }
    }

    /// Evaluate every residual at `values`.
    pub fn evaluate(&self, values: &[f64]) -> Vec<f64> {
        self.refresh_for(values);
        self.bindings
            .borrow()
            .iter()
            .map(|b| {
                let slot_values: Vec<f64> = b.slots.iter().map(|&p| values[p]).collect();
                b.kernel.evaluate(&slot_values)
            })
            .collect()
    }

    /// Evaluate every residual and assemble the full Jacobian at `values`.
    pub fn evaluate_jacobian(&self, values: &[f64]) -> (Vec<f64>, Matrix) {
        self.refresh_for(values);
        let bindings = self.bindings.borrow();
        let mut residuals = Vec::with_capacity(bindings.len());
        let mut jacobian = Matrix::zeros(bindings.len(), self.num_params);
        for (i, b) in bindings.iter().enumerate() {
            let slot_values: Vec<f64> = b.slots.iter().map(|&p| values[p]).collect();
            let (value, grad) = b.kernel.evaluate_with_gradient(&slot_values);
            residuals.push(value);
            for (k, &p) in b.slots.iter().enumerate() {
                jacobian[(i, p)] = grad[k];
            }
        }
        (residuals, jacobian)
    }

    /// Evaluate the sum of all residuals and the gradient of that sum with
    /// respect to the full parameter vector, without assembling a
    /// Jacobian.
    pub fn evaluate_sum_with_gradient(&self, values: &[f64]) -> (f64, Vec<f64>) {
        self.refresh_for(values);
        let bindings = self.bindings.borrow();
        let mut sum = 0.0;
        let mut gradient = vec![0.0; self.num_params];
        for b in bindings.iter() {
            let slot_values: Vec<f64> = b.slots.iter().map(|&p| values[p]).collect();
            let (value, grad) = b.kernel.evaluate_with_gradient(&slot_values);
            sum += value;
            for (k, &p) in b.slots.iter().enumerate() {
                gradient[p] += grad[k];
            }
        }
        (sum, gradient)
    }

    /// Size of the outer parameter vector this set was compiled against.
    #[must_use]
    pub fn num_params(&self) -> usize {
        self.num_params
    }

    /// Number of residuals in this set.
    #[must_use]
    pub fn num_functions(&self) -> usize {
        self.bindings.borrow().len()
    }

    /// Number of distinct compiled kernels backing those residuals.
    #[must_use]
    pub fn kernel_count(&self) -> usize {
        self.cache.borrow().len()
    }

    /// Average number of residuals served by each distinct kernel —
    /// `1.0` means no structural reuse at all.
    #[must_use]
    pub fn kernel_reuse_factor(&self) -> f64 {
        let kernels = self.kernel_count().max(1);
        self.num_functions() as f64 / kernels as f64
    }
}

#[cfg(test)]
mod tests_compiled {
    use super::*;
    use nlsq_utils::assert_approx_equal;

    fn pairwise_distance_builder(graph: &Graph, values: &[f64]) -> Vec<usize> {
        let vars = graph.vars(values);
        let mut roots = Vec::new();
        for pair in vars.chunks(2) {
            let d = (pair[0] - pair[1]).square();
            roots.push(d.index());
        }
        roots
    }

    #[test]
    fn identical_structure_residuals_share_one_kernel() {
        let values = vec![1.0, 2.0, 10.0, 20.0, -3.0, 5.0];
        let set = CompiledResidualSet::new(CompileMode::Eager, values.len(), pairwise_distance_builder, &values);
        assert_eq!(set.num_functions(), 3);
        assert_eq!(set.kernel_count(), 1);
        assert_approx_equal!(set.kernel_reuse_factor(), 3.0, 1e-12);
    }

    #[test]
    fn evaluate_jacobian_matches_analytic_derivative() {
        let values = vec![3.0, 1.0];
        let set = CompiledResidualSet::new(CompileMode::Eager, values.len(), pairwise_distance_builder, &values);
        let (residuals, jac) = set.evaluate_jacobian(&values);
        assert_approx_equal!(residuals[0], 4.0, 1e-9);
        // d((a-b)^2)/da = 2(a-b), d/db = -2(a-b)
        assert_approx_equal!(jac[(0, 0)], 4.0, 1e-9);
        assert_approx_equal!(jac[(0, 1)], -4.0, 1e-9);
    }

    #[test]
    fn evaluate_sum_with_gradient_aggregates_across_residuals() {
        let values = vec![1.0, 0.0, 2.0, 0.0];
        let set = CompiledResidualSet::new(CompileMode::Eager, values.len(), pairwise_distance_builder, &values);
        let (sum, grad) = set.evaluate_sum_with_gradient(&values);
        assert_approx_equal!(sum, 1.0 + 4.0, 1e-9);
        assert_approx_equal!(grad[0], 2.0, 1e-9);
        assert_approx_equal!(grad[2], 4.0, 1e-9);
    }

    #[test]
    fn lazy_mode_recompiles_on_structural_change() {
        let values = vec![1.0, -1.0];
        let builder = |graph: &Graph, values: &[f64]| {
            let vars = graph.vars(values);
            let r = if vars[0].value() >= 0.0 {
                vars[0] + vars[1]
            } else {
                vars[0] * vars[1]
            };
            vec![r.index()]
        };
        let set = CompiledResidualSet::new(CompileMode::Lazy, 2, builder, &values);
        assert_eq!(set.kernel_count(), 1);
        let flipped = [-1.0, -1.0];
        let _ = set.evaluate(&flipped);
        assert_eq!(set.kernel_count(), 2);
    }
}

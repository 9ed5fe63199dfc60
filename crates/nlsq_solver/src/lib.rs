// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
// nlsq: scalar autodiff and nonlinear least squares.
// Dual licensed under Apache 2.0 and MIT.
// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

//! Levenberg-Marquardt nonlinear least squares, driven by either a fresh
//! [`Graph`](nlsq_autodiff::Graph) rebuild per iteration
//! ([`GraphResidualSource`]) or a compiled
//! [`CompiledResidualSet`](nlsq_jit::CompiledResidualSet). Both implement
//! [`ResidualSource`], the single interface [`nonlinear_least_squares`] is
//! written against.

mod options;
mod residual_source;
mod result;
mod solver;

pub use options::SolverOptions;
pub use residual_source::{GraphResidualSource, ResidualSource};
pub use result::{convergence_reason, SolverResult};
pub use solver::nonlinear_least_squares;

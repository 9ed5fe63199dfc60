// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
// nlsq: scalar autodiff and nonlinear least squares.
// Dual licensed under Apache 2.0 and MIT.
// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

//! Graph canonicalization and residual kernel compilation.
//!
//! Many residuals in a least-squares problem share the same shape — the
//! same operations applied to different leaves, such as one term per data
//! point in a curve fit. This crate detects that structural sharing
//! ([`signature::canonicalize`]) and compiles each distinct shape into one
//! reusable interpreted tape ([`Kernel`]), so a batch of thousands of
//! structurally identical residuals is evaluated by one compiled evaluator
//! instead of thousands.

mod compiled;
mod elemental;
mod intern;
mod kernel;
mod signature;

pub use compiled::{CompiledResidualSet, CompileMode, ResidualBuilder};
pub use intern::{SignatureArena, SignatureId};
pub use kernel::{Kernel, TapeNode};
pub use signature::{canonicalize, Canonical};

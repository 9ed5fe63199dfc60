// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
// nlsq: scalar autodiff and nonlinear least squares.
// Dual licensed under Apache 2.0 and MIT.
// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

//! Dense linear algebra for the Levenberg-Marquardt solver: a row-major
//! [`Matrix`], Cholesky factorization of the (damped) normal equations, a
//! Householder QR path for the better-conditioned alternative, and the
//! `J^T J` / `J^T r` assembly shared by both.

mod assembly;
mod cholesky;
mod matrix;
mod qr;

pub use assembly::{compute_jtj, compute_jtr};
pub use cholesky::{back_substitute, cholesky, cholesky_solve, forward_substitute};
pub use matrix::Matrix;
pub use qr::{qr_decompose, qr_solve};

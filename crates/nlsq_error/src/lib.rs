// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
// nlsq: scalar autodiff and nonlinear least squares.
// Dual licensed under Apache 2.0 and MIT.
// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

//! Shared error types for the `nlsq` workspace.
//!
//! Every failing operation in this workspace is either a genuine numerical
//! failure (a singular matrix, a rank-deficient pivot) or a reportable
//! solver outcome (damping exhausted, line search exhausted). The former is
//! propagated as a [`LinalgError`]; the latter is never propagated as an
//! `Err` at all — it is folded into a `SolverResult` with
//! `success = false`, since convergence failure is an outcome of the
//! algorithm, not an exception.

use thiserror::Error;

/// Errors raised by the dense linear algebra routines in `nlsq_linalg`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LinalgError {
    /// Cholesky decomposition encountered a non-positive diagonal pivot.
    #[error("matrix is not positive definite (pivot {index} = {value})")]
    NotPositiveDefinite {
        /// Index of the failing diagonal pivot.
        index: usize,
        /// The non-positive value encountered.
        value: f64,
    },

    /// Two matrices/vectors involved in an operation have incompatible shapes.
    #[error("dimension mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        /// Expected `(rows, cols)`.
        expected: (usize, usize),
        /// Actual `(rows, cols)`.
        actual: (usize, usize),
    },

    /// A triangular factor had a near-zero diagonal entry, so the system
    /// cannot be solved by back substitution without amplifying numerical
    /// noise unboundedly.
    #[error("rank deficient: R[{index}][{index}] = {value} is below tolerance")]
    RankDeficient {
        /// Index of the near-zero diagonal pivot.
        index: usize,
        /// The near-zero value encountered.
        value: f64,
    },
}

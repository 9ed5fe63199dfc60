// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
// nlsq: scalar autodiff and nonlinear least squares.
// Dual licensed under Apache 2.0 and MIT.
// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

//! Householder QR decomposition and the associated least-squares solve.
//!
//! Used by the solver's QR path: rather than forming the (potentially
//! ill-conditioned) normal equations `JtJ x = Jtr`, the damped system is
//! augmented and solved directly against `J`, which roughly squares the
//! effective condition number compared to Cholesky on `JtJ`.

use crate::matrix::Matrix;
use nlsq_error::LinalgError;

const RANK_TOLERANCE: f64 = 1e-12;

/// Decompose `a` (`m x n`, `m >= n`) into an orthogonal `Q` (`m x m`) and an
/// upper-triangular `R` (`m x n`) such that `a == Q * R`, via Householder
/// reflections applied column by column.
///
/// # Errors
///
/// Returns [`LinalgError::DimensionMismatch`] if `a` has fewer rows than
/// columns.
pub fn qr_decompose(a: &Matrix) -> Result<(Matrix, Matrix), LinalgError> {
    let (m, n) = a.shape();
    if m < n {
        return Err(LinalgError::DimensionMismatch {
            expected: (n, n),
            actual: (m, n),
        });
    }

    let mut r = a.clone();
    let mut q = Matrix::identity(m);

    for k in 0..n.min(m) {
        // Build the Householder vector for column k, rows k..m.
        let mut norm = 0.0;
        for i in k..m {
            norm += r[(i, k)] * r[(i, k)];
        }
        norm = norm.sqrt();
        if norm == 0.0 {
            continue;
        }

        let alpha = if r[(k, k)] >= 0.0 { -norm } else { norm };
        let mut v = vec![0.0; m];
        v[k] = r[(k, k)] - alpha;
        for i in (k + 1)..m {
            v[i] = r[(i, k)];
        }
        let v_norm_sq: f64 = v[k..m].iter().map(|x| x * x).sum();
        if v_norm_sq < f64::EPSILON {
            continue;
        }

        // Apply the reflection H = I - 2 v v^T / (v^T v) to R from the left.
        for j in 0..n {
            let mut dot = 0.0;
            for i in k..m {
                dot += v[i] * r[(i, j)];
            }
            let factor = 2.0 * dot / v_norm_sq;
            for i in k..m {
                r[(i, j)] -= factor * v[i];
            }
        }

        // Accumulate the same reflection into Q (applied from the right of
        // the running product, since Q = H_0 H_1 ... H_{n-1}).
        for j in 0..m {
            let mut dot = 0.0;
            for i in k..m {
                dot += v[i] * q[(j, i)];
            }
            let factor = 2.0 * dot / v_norm_sq;
            for i in k..m {
                q[(j, i)] -= factor * v[i];
            }
        }
    }

    Ok((q, r))
}

/// Solve the full-rank least-squares problem `min_x || a x - b ||^2` via
/// Householder QR: `a = Q R`, so `x` solves `R x = Q^T b` by back
/// substitution over the top `n` rows of `R`.
///
/// # Errors
///
/// Returns [`LinalgError::DimensionMismatch`] if `a` is not tall
/// (`m >= n`), and [`LinalgError::RankDeficient`] if a diagonal entry of
/// `R` falls below the numerical rank tolerance.
pub fn qr_solve(a: &Matrix, b: &[f64]) -> Result<Vec<f64>, LinalgError> {
    let (m, n) = a.shape();
    let (q, r) = qr_decompose(a)?;
    let qtb = q.transpose().mul_vec(b);

    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let pivot = r[(i, i)];
        if pivot.abs() < RANK_TOLERANCE {
            return Err(LinalgError::RankDeficient { index: i, value: pivot });
        }
        let mut sum = qtb[i];
        for k in (i + 1)..n {
            sum -= r[(i, k)] * x[k];
        }
        x[i] = sum / pivot;
    }
    debug_assert_eq!(m, q.rows());
    Ok(x)
}

#[cfg(test)]
mod tests_qr {
    use super::*;
    use nlsq_utils::assert_approx_equal;

    #[test]
    fn decomposition_reconstructs_the_input() {
        let a = Matrix::from_row_major(3, 2, vec![1.0, 1.0, 1.0, 2.0, 1.0, 3.0]);
        let (q, r) = qr_decompose(&a).unwrap();
        let reconstructed = q.mul_mat(&r);
        for i in 0..3 {
            for j in 0..2 {
                assert_approx_equal!(reconstructed[(i, j)], a[(i, j)], 1e-9);
            }
        }
    }

    #[test]
    fn solves_an_overdetermined_linear_fit() {
        // Fit y = x exactly through three collinear points.
        let a = Matrix::from_row_major(3, 1, vec![1.0, 2.0, 3.0]);
        let b = [1.0, 2.0, 3.0];
        let x = qr_solve(&a, &b).unwrap();
        assert_approx_equal!(x[0], 1.0, 1e-8);
    }

    #[test]
    fn rejects_rank_deficient_columns() {
        // Second column is a multiple of the first: rank 1, not 2.
        let a = Matrix::from_row_major(3, 2, vec![1.0, 2.0, 2.0, 4.0, 3.0, 6.0]);
        let err = qr_solve(&a, &[1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(err, LinalgError::RankDeficient { .. }));
    }
}

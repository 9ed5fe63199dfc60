// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
// nlsq: scalar autodiff and nonlinear least squares.
// Dual licensed under Apache 2.0 and MIT.
// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

//! Cholesky decomposition and triangular solves.

use crate::matrix::Matrix;
use nlsq_error::LinalgError;

/// Decompose symmetric positive-definite `a` into lower-triangular `L` such
/// that `a == L * L^T`.
///
/// # Errors
///
/// Returns [`LinalgError::NotPositiveDefinite`] at the first diagonal pivot
/// that is not strictly positive, naming the failing row.
pub fn cholesky(a: &Matrix) -> Result<Matrix, LinalgError> {
    let n = a.rows();
    if a.cols() != n {
        return Err(LinalgError::DimensionMismatch {
            expected: (n, n),
            actual: a.shape(),
        });
    }
    let mut l = Matrix::zeros(n, n);
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[(i, j)];
            for k in 0..j {
                sum -= l[(i, k)] * l[(j, k)];
            }
            if i == j {
                if sum <= 0.0 {
                    log::trace!("cholesky: non-positive pivot at row {i} ({sum})");
                    return Err(LinalgError::NotPositiveDefinite { index: i, value: sum });
                }
                l[(i, j)] = sum.sqrt();
            } else {
                l[(i, j)] = sum / l[(j, j)];
            }
        }
    }
    Ok(l)
}

/// Solve `L y = b` for lower-triangular `l` by forward substitution.
#[must_use]
pub fn forward_substitute(l: &Matrix, b: &[f64]) -> Vec<f64> {
    let n = l.rows();
    let mut y = vec![0.0; n];
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[(i, k)] * y[k];
        }
        y[i] = sum / l[(i, i)];
    }
    y
}

/// Solve `L^T x = y` for lower-triangular `l` by back substitution.
#[must_use]
pub fn back_substitute(l: &Matrix, y: &[f64]) -> Vec<f64> {
    let n = l.rows();
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = y[i];
        for k in (i + 1)..n {
            sum -= l[(k, i)] * x[k];
        }
        x[i] = sum / l[(i, i)];
    }
    x
}

/// Solve `a x = b` for symmetric positive-definite `a` via Cholesky
/// factorization followed by a forward and a back substitution.
///
/// # Errors
///
/// Propagates [`LinalgError::NotPositiveDefinite`] from [`cholesky`].
pub fn cholesky_solve(a: &Matrix, b: &[f64]) -> Result<Vec<f64>, LinalgError> {
    let l = cholesky(a)?;
    let y = forward_substitute(&l, b);
    Ok(back_substitute(&l, &y))
}

#[cfg(test)]
mod tests_cholesky {
    use super::*;
    use nlsq_utils::assert_approx_equal;

    #[test]
    fn solves_a_known_spd_system() {
        // a = [[4, 2], [2, 3]], b = [6, 5] -> x = [1, 1]
        let a = Matrix::from_row_major(2, 2, vec![4.0, 2.0, 2.0, 3.0]);
        let x = cholesky_solve(&a, &[6.0, 5.0]).unwrap();
        assert_approx_equal!(x[0], 1.0, 1e-9);
        assert_approx_equal!(x[1], 1.0, 1e-9);
    }

    #[test]
    fn rejects_non_positive_definite_matrix() {
        let a = Matrix::from_row_major(2, 2, vec![1.0, 2.0, 2.0, 1.0]);
        let err = cholesky(&a).unwrap_err();
        assert!(matches!(err, LinalgError::NotPositiveDefinite { index: 1, .. }));
    }

    #[test]
    fn identity_round_trips_any_rhs() {
        let i = Matrix::identity(3);
        let x = cholesky_solve(&i, &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(x, vec![1.0, 2.0, 3.0]);
    }
}

// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
// nlsq: scalar autodiff and nonlinear least squares.
// Dual licensed under Apache 2.0 and MIT.
// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

//! Normal-equations assembly: `J^T J` and `J^T r`, the core per-iteration
//! work of the Levenberg-Marquardt inner loop.

use crate::matrix::Matrix;

/// Compute `J^T J` for a Jacobian `j` (`m` residuals by `n` parameters).
#[must_use]
pub fn compute_jtj(j: &Matrix) -> Matrix {
    let (m, n) = j.shape();
    let mut jtj = Matrix::zeros(n, n);
    for k in 0..m {
        let row = j.row(k);
        for a in 0..n {
            let row_a = row[a];
            if row_a == 0.0 {
                continue;
            }
            for b in a..n {
                jtj[(a, b)] += row_a * row[b];
            }
        }
    }
    for a in 0..n {
        for b in 0..a {
            jtj[(a, b)] = jtj[(b, a)];
        }
    }
    jtj
}

/// Compute `J^T r` for a Jacobian `j` (`m x n`) and residual vector `r`
/// (length `m`).
#[must_use]
pub fn compute_jtr(j: &Matrix, r: &[f64]) -> Vec<f64> {
    let (m, n) = j.shape();
    assert_eq!(r.len(), m, "residual vector length mismatch");
    let mut jtr = vec![0.0; n];
    for k in 0..m {
        let row = j.row(k);
        let rk = r[k];
        if rk == 0.0 {
            continue;
        }
        for a in 0..n {
            jtr[a] += row[a] * rk;
        }
    }
    jtr
}

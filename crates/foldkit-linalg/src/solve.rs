use foldkit_core::{FoldkitError, Matrix, Result};

use crate::decomposition::{lu, qr};

/// Solve the square system Ax = b using LU decomposition.
pub fn solve(a: &Matrix, b: &[f64]) -> Result<Vec<f64>> {
    let n = a.rows();
    if b.len() != n {
        return Err(FoldkitError::ShapeMismatch {
            expected: vec![n],
            got: vec![b.len()],
        });
    }
    let decomp = lu(a)?;

    let pb: Vec<f64> = (0..n).map(|i| b[decomp.pivot[i]]).collect();

    // Forward substitution: L * y = Pb
    let mut y = vec![0.0; n];
    for i in 0..n {
        let sum: f64 = (0..i).map(|j| decomp.l.get(i, j) * y[j]).sum();
        y[i] = pb[i] - sum;
    }

    // Back substitution: U * x = y
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let sum: f64 = ((i + 1)..n).map(|j| decomp.u.get(i, j) * x[j]).sum();
        let diag = decomp.u.get(i, i);
        if diag.abs() < f64::EPSILON {
            return Err(FoldkitError::SingularMatrix);
        }
        x[i] = (y[i] - sum) / diag;
    }
    Ok(x)
}

/// Matrix inverse via one LU solve per column.
pub fn inv(a: &Matrix) -> Result<Matrix> {
    let n = a.rows();
    let mut out = Matrix::zeros(n, n);
    for col in 0..n {
        let mut e = vec![0.0; n];
        e[col] = 1.0;
        let x = solve(a, &e)?;
        out.set_col(col, &x)?;
    }
    Ok(out)
}

/// Least-squares solution of min ||Ax - b||² using QR decomposition.
///
/// Rank-deficient designs (including more columns than rows) are reported as
/// `SingularMatrix` rather than given an arbitrary minimum-norm answer.
pub fn lstsq(a: &Matrix, b: &[f64]) -> Result<Vec<f64>> {
    let (m, n) = a.shape();
    if b.len() != m {
        return Err(FoldkitError::ShapeMismatch {
            expected: vec![m],
            got: vec![b.len()],
        });
    }
    if n > m {
        return Err(FoldkitError::SingularMatrix);
    }

    let decomp = qr(a)?;
    let qtb = decomp.q.t().mul_vec(b)?;

    let max_diag = (0..n).map(|i| decomp.r.get(i, i).abs()).fold(0.0_f64, f64::max);
    let tol = 1e-10 * max_diag.max(1.0);

    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let sum: f64 = ((i + 1)..n).map(|j| decomp.r.get(i, j) * x[j]).sum();
        let diag = decomp.r.get(i, i);
        if diag.abs() < tol {
            return Err(FoldkitError::SingularMatrix);
        }
        x[i] = (qtb[i] - sum) / diag;
    }
    Ok(x)
}

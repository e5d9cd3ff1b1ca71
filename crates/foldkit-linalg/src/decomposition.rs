use foldkit_core::{FoldkitError, Matrix, Result};

/// LU decomposition result: P * A = L * U
pub struct LuDecomposition {
    pub l: Matrix,
    pub u: Matrix,
    pub pivot: Vec<usize>,
}

/// Thin QR decomposition result: A = Q * R
pub struct QrDecomposition {
    pub q: Matrix,
    pub r: Matrix,
}

/// LU decomposition with partial pivoting.
pub fn lu(a: &Matrix) -> Result<LuDecomposition> {
    let (n, m) = a.shape();
    if n != m {
        return Err(FoldkitError::ShapeMismatch {
            expected: vec![n, n],
            got: vec![n, m],
        });
    }

    let mut u = a.data().to_vec();
    let mut l = vec![0.0; n * n];
    let mut pivot: Vec<usize> = (0..n).collect();
    let scale = u.iter().fold(0.0_f64, |acc, v| acc.max(v.abs())).max(1.0);

    for k in 0..n {
        let mut max_val = u[k * n + k].abs();
        let mut max_row = k;
        for i in (k + 1)..n {
            let v = u[i * n + k].abs();
            if v > max_val {
                max_val = v;
                max_row = i;
            }
        }

        if max_val < 1e-12 * scale {
            return Err(FoldkitError::SingularMatrix);
        }

        if max_row != k {
            pivot.swap(k, max_row);
            for j in 0..n {
                u.swap(k * n + j, max_row * n + j);
            }
            for j in 0..k {
                l.swap(k * n + j, max_row * n + j);
            }
        }

        l[k * n + k] = 1.0;
        for i in (k + 1)..n {
            let factor = u[i * n + k] / u[k * n + k];
            l[i * n + k] = factor;
            for j in k..n {
                u[i * n + j] -= factor * u[k * n + j];
            }
        }
    }

    Ok(LuDecomposition {
        l: Matrix::new(l, n, n)?,
        u: Matrix::new(u, n, n)?,
        pivot,
    })
}

/// Thin QR decomposition via Householder reflections (m >= n).
pub fn qr(a: &Matrix) -> Result<QrDecomposition> {
    let (m, n) = a.shape();
    let k = m.min(n);

    let mut r = a.data().to_vec();
    let mut q = vec![0.0; m * m];
    for i in 0..m {
        q[i * m + i] = 1.0;
    }

    for j in 0..k {
        let mut x: Vec<f64> = (j..m).map(|i| r[i * n + j]).collect();
        let norm_x = x.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm_x < f64::EPSILON {
            continue;
        }

        let sign = if x[0] >= 0.0 { 1.0 } else { -1.0 };
        x[0] += sign * norm_x;
        let norm_v = x.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm_v < f64::EPSILON {
            continue;
        }
        x.iter_mut().for_each(|v| *v /= norm_v);

        // H = I - 2vvᵀ applied to R from the left
        for col in j..n {
            let dot: f64 = (j..m).map(|i| x[i - j] * r[i * n + col]).sum();
            for i in j..m {
                r[i * n + col] -= 2.0 * x[i - j] * dot;
            }
        }

        // and to Q from the right
        for row in 0..m {
            let dot: f64 = (j..m).map(|i| q[row * m + i] * x[i - j]).sum();
            for i in j..m {
                q[row * m + i] -= 2.0 * dot * x[i - j];
            }
        }
    }

    let mut q_thin = vec![0.0; m * k];
    for i in 0..m {
        for j in 0..k {
            q_thin[i * k + j] = q[i * m + j];
        }
    }
    let r_thin = r[..k * n].to_vec();

    Ok(QrDecomposition {
        q: Matrix::new(q_thin, m, k)?,
        r: Matrix::new(r_thin, k, n)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_lu() {
        let a = Matrix::new(vec![2.0, 1.0, 1.0, 4.0, 3.0, 3.0, 8.0, 7.0, 9.0], 3, 3).unwrap();
        let decomp = lu(&a).unwrap();
        let product = decomp.l.matmul(&decomp.u).unwrap();
        for i in 0..3 {
            for j in 0..3 {
                assert_abs_diff_eq!(product.get(i, j), a.get(decomp.pivot[i], j), epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn test_lu_singular() {
        let a = Matrix::new(vec![1.0, 2.0, 2.0, 4.0], 2, 2).unwrap();
        assert!(matches!(lu(&a), Err(FoldkitError::SingularMatrix)));
    }

    #[test]
    fn test_qr_reconstructs() {
        let a = Matrix::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 10.0, 1.0, 0.0, 1.0], 4, 3)
            .unwrap();
        let decomp = qr(&a).unwrap();
        let product = decomp.q.matmul(&decomp.r).unwrap();
        for i in 0..4 {
            for j in 0..3 {
                assert_abs_diff_eq!(product.get(i, j), a.get(i, j), epsilon = 1e-10);
            }
        }
        let qtq = decomp.q.t().matmul(&decomp.q).unwrap();
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(qtq.get(i, j), expected, epsilon = 1e-10);
            }
        }
    }
}

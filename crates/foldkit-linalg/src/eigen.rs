use foldkit_core::{FoldkitError, Matrix, Result};

/// Eigen-decomposition of a symmetric matrix.
pub struct SymmetricEigen {
    /// Eigenvalues, descending.
    pub values: Vec<f64>,
    /// Eigenvectors as columns, in the order of `values`.
    pub vectors: Matrix,
}

/// Cyclic Jacobi eigenvalue algorithm for symmetric matrices.
///
/// Each sweep rotates away every off-diagonal pair; iteration stops when the
/// off-diagonal mass falls below `1e-12` relative to the diagonal.
pub fn symmetric_eigen(a: &Matrix) -> Result<SymmetricEigen> {
    let (n, m) = a.shape();
    if n != m {
        return Err(FoldkitError::ShapeMismatch {
            expected: vec![n, n],
            got: vec![n, m],
        });
    }

    let mut s = a.data().to_vec();
    let mut v = vec![0.0; n * n];
    for i in 0..n {
        v[i * n + i] = 1.0;
    }

    let mut converged = n < 2;
    for _sweep in 0..100 {
        let off: f64 = (0..n)
            .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
            .map(|(i, j)| s[i * n + j] * s[i * n + j])
            .sum();
        let diag: f64 = (0..n).map(|i| s[i * n + i] * s[i * n + i]).sum();
        if off <= 1e-24 * diag.max(1e-300) {
            converged = true;
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = s[p * n + q];
                if apq.abs() < 1e-300 {
                    continue;
                }
                let app = s[p * n + p];
                let aqq = s[q * n + q];
                let theta = (aqq - app) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let t = if theta == 0.0 { 1.0 } else { t };
                let c = 1.0 / (t * t + 1.0).sqrt();
                let sn = t * c;

                for k in 0..n {
                    let skp = s[k * n + p];
                    let skq = s[k * n + q];
                    s[k * n + p] = c * skp - sn * skq;
                    s[k * n + q] = sn * skp + c * skq;
                }
                for k in 0..n {
                    let spk = s[p * n + k];
                    let sqk = s[q * n + k];
                    s[p * n + k] = c * spk - sn * sqk;
                    s[q * n + k] = sn * spk + c * sqk;
                }
                for k in 0..n {
                    let vkp = v[k * n + p];
                    let vkq = v[k * n + q];
                    v[k * n + p] = c * vkp - sn * vkq;
                    v[k * n + q] = sn * vkp + c * vkq;
                }
            }
        }
    }
    if !converged {
        return Err(FoldkitError::FitConvergence(
            "Jacobi eigen-decomposition did not converge".into(),
        ));
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| s[j * n + j].total_cmp(&s[i * n + i]));

    let values: Vec<f64> = order.iter().map(|&i| s[i * n + i]).collect();
    let mut vectors = Matrix::zeros(n, n);
    for (col, &src) in order.iter().enumerate() {
        // Sign convention: largest-magnitude loading positive.
        let mut sign = 1.0;
        let mut best = 0.0;
        for k in 0..n {
            let x = v[k * n + src];
            if x.abs() > best {
                best = x.abs();
                sign = x.signum();
            }
        }
        for k in 0..n {
            vectors.set(k, col, sign * v[k * n + src]);
        }
    }

    Ok(SymmetricEigen { values, vectors })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_diagonal() {
        let a = Matrix::new(vec![1.0, 0.0, 0.0, 3.0], 2, 2).unwrap();
        let e = symmetric_eigen(&a).unwrap();
        assert_abs_diff_eq!(e.values[0], 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(e.values[1], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(e.vectors.get(1, 0).abs(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_reconstruction() {
        let a = Matrix::new(vec![4.0, 1.0, 2.0, 1.0, 3.0, 0.5, 2.0, 0.5, 5.0], 3, 3).unwrap();
        let e = symmetric_eigen(&a).unwrap();
        // A v = λ v for each pair
        for k in 0..3 {
            let vk = e.vectors.col(k);
            let av = a.mul_vec(&vk).unwrap();
            for i in 0..3 {
                assert_abs_diff_eq!(av[i], e.values[k] * vk[i], epsilon = 1e-9);
            }
        }
        assert!(e.values[0] >= e.values[1] && e.values[1] >= e.values[2]);
    }
}

use foldkit_core::{FoldkitError, Matrix, Result};
use serde::{Deserialize, Serialize};

use crate::regression::{check_rows, linear_predict, not_fitted};

/// ElasticNet regression combines L1 (Lasso) and L2 (Ridge) penalties.
///
/// Minimizes `(1/2n)||y - b - Xw||² + λ·[(1 - α)/2·||w||²₂ + α·||w||₁]` with
/// `λ = penalty` and `α = mixture`, by cyclic coordinate descent on
/// standardized predictors. Coefficients are reported on the original scale.
///
/// When mixture = 1.0, equivalent to Lasso.
/// When mixture = 0.0, equivalent to Ridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElasticNet {
    pub penalty: f64,
    pub mixture: f64,
    pub weights: Option<Vec<f64>>,
    pub bias: Option<f64>,
    pub max_iter: usize,
    pub tol: f64,
}

impl ElasticNet {
    pub fn new(penalty: f64, mixture: f64) -> Self {
        ElasticNet {
            penalty,
            mixture,
            weights: None,
            bias: None,
            max_iter: 10_000,
            tol: 1e-9,
        }
    }

    pub fn fit(&mut self, x: &Matrix, y: &[f64]) -> Result<()> {
        check_rows(x, y.len())?;
        check_penalty(self.penalty, self.mixture)?;
        let n = x.rows() as f64;

        let scaling = Standardized::new(x);
        let weights = vec![1.0 / n; x.rows()];
        let mut w = vec![0.0; x.cols()];
        let mut b = y.iter().sum::<f64>() / n;
        descend(
            &scaling.x,
            y,
            &weights,
            self.penalty,
            self.mixture,
            (w.as_mut_slice(), &mut b),
            self.max_iter,
            self.tol,
        )?;

        let (w, b) = scaling.unscale(&w, b);
        self.weights = Some(w);
        self.bias = Some(b);
        Ok(())
    }

    pub fn predict(&self, x: &Matrix) -> Result<Vec<f64>> {
        let w = self.weights.as_ref().ok_or_else(not_fitted)?;
        linear_predict(x, w, self.bias.unwrap_or(0.0))
    }
}

pub(crate) fn check_penalty(penalty: f64, mixture: f64) -> Result<()> {
    if !(penalty >= 0.0 && penalty.is_finite()) {
        return Err(FoldkitError::config(format!("penalty must be >= 0, got {}", penalty)));
    }
    if !(0.0..=1.0).contains(&mixture) {
        return Err(FoldkitError::config(format!("mixture must be in [0, 1], got {}", mixture)));
    }
    Ok(())
}

/// Predictors centered and scaled to unit population variance. Constant
/// columns become all-zero and keep a zero coefficient.
pub(crate) struct Standardized {
    pub x: Matrix,
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl Standardized {
    pub fn new(x: &Matrix) -> Self {
        let (n, p) = x.shape();
        let means = x.column_means();
        let mut scales = vec![1.0; p];
        for (j, scale) in scales.iter_mut().enumerate() {
            let var = (0..n).map(|i| (x.get(i, j) - means[j]).powi(2)).sum::<f64>() / n as f64;
            if var > 0.0 {
                *scale = var.sqrt();
            }
        }
        let mut out = x.centered(&means);
        for i in 0..n {
            for j in 0..p {
                out.set(i, j, out.get(i, j) / scales[j]);
            }
        }
        Standardized {
            x: out,
            means,
            scales,
        }
    }

    /// Map coefficients fit on the standardized predictors back to the
    /// original scale.
    pub fn unscale(&self, w: &[f64], b: f64) -> (Vec<f64>, f64) {
        let w: Vec<f64> = w.iter().zip(&self.scales).map(|(c, s)| c / s).collect();
        let b = b - w.iter().zip(&self.means).map(|(c, m)| c * m).sum::<f64>();
        (w, b)
    }
}

fn soft_threshold(z: f64, gamma: f64) -> f64 {
    if z > gamma {
        z - gamma
    } else if z < -gamma {
        z + gamma
    } else {
        0.0
    }
}

/// Weighted elastic-net least squares by cyclic coordinate descent.
///
/// Minimizes `(1/2)·Σ vᵢ(zᵢ - b - xᵢ·w)² + λ·P_α(w)` starting from the given
/// `(w, b)`. The intercept is not penalized. Fails with `FitConvergence` when
/// the largest coefficient change is still above `tol` after `max_iter`
/// passes.
#[allow(clippy::too_many_arguments)]
pub(crate) fn descend(
    x: &Matrix,
    z: &[f64],
    v: &[f64],
    penalty: f64,
    mixture: f64,
    (w, b): (&mut [f64], &mut f64),
    max_iter: usize,
    tol: f64,
) -> Result<()> {
    let (n, p) = x.shape();
    let l1 = penalty * mixture;
    let l2 = penalty * (1.0 - mixture);
    let v_sum: f64 = v.iter().sum();
    let xv: Vec<f64> = (0..p)
        .map(|j| (0..n).map(|i| v[i] * x.get(i, j).powi(2)).sum())
        .collect();

    let mut residual: Vec<f64> = (0..n)
        .map(|i| z[i] - *b - x.row(i).iter().zip(w.iter()).map(|(a, c)| a * c).sum::<f64>())
        .collect();

    for _ in 0..max_iter {
        let mut max_change = 0.0_f64;

        // Update intercept
        let shift = residual.iter().zip(v).map(|(r, vi)| r * vi).sum::<f64>() / v_sum;
        *b += shift;
        residual.iter_mut().for_each(|r| *r -= shift);
        max_change = max_change.max(shift.abs());

        // Coordinate descent for each feature
        for j in 0..p {
            if xv[j] == 0.0 {
                continue;
            }
            let rho = (0..n).map(|i| v[i] * x.get(i, j) * residual[i]).sum::<f64>() + xv[j] * w[j];
            let updated = soft_threshold(rho, l1) / (xv[j] + l2);
            let delta = updated - w[j];
            if delta != 0.0 {
                for (i, r) in residual.iter_mut().enumerate() {
                    *r -= delta * x.get(i, j);
                }
                w[j] = updated;
                max_change = max_change.max(delta.abs());
            }
        }

        if max_change < tol {
            return Ok(());
        }
    }
    Err(FoldkitError::FitConvergence(format!(
        "coordinate descent did not converge in {} passes",
        max_iter
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LinearRegression;
    use approx::assert_abs_diff_eq;

    fn data() -> (Matrix, Vec<f64>) {
        let x = Matrix::from_rows(&[
            vec![1.0, 0.5],
            vec![2.0, -1.0],
            vec![3.0, 2.0],
            vec![4.0, 0.0],
            vec![5.0, 1.5],
            vec![6.0, -0.5],
        ])
        .unwrap();
        let y: Vec<f64> = (0..6)
            .map(|i| 1.0 + 2.0 * x.get(i, 0) - 0.5 * x.get(i, 1) + if i % 2 == 0 { 0.1 } else { -0.1 })
            .collect();
        (x, y)
    }

    #[test]
    fn test_zero_penalty_matches_least_squares() {
        let (x, y) = data();
        let mut ols = LinearRegression::new(true);
        ols.fit(&x, &y).unwrap();
        let mut model = ElasticNet::new(0.0, 0.5);
        model.fit(&x, &y).unwrap();

        assert_abs_diff_eq!(model.bias.unwrap(), ols.bias.unwrap(), epsilon = 1e-6);
        for (a, b) in model.weights.as_ref().unwrap().iter().zip(ols.weights.as_ref().unwrap()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_large_lasso_penalty_zeroes_everything() {
        let (x, y) = data();
        let mut model = ElasticNet::new(1e3, 1.0);
        model.fit(&x, &y).unwrap();
        assert!(model.weights.as_ref().unwrap().iter().all(|&w| w == 0.0));
        let mean = y.iter().sum::<f64>() / y.len() as f64;
        assert_abs_diff_eq!(model.bias.unwrap(), mean, epsilon = 1e-12);
    }

    #[test]
    fn test_ridge_penalty_raises_training_error() {
        let (x, y) = data();
        let sse = |penalty: f64| {
            let mut m = ElasticNet::new(penalty, 0.0);
            m.fit(&x, &y).unwrap();
            let pred = m.predict(&x).unwrap();
            pred.iter().zip(&y).map(|(p, t)| (p - t).powi(2)).sum::<f64>()
        };
        assert!(sse(0.0) < sse(0.1));
        assert!(sse(0.1) < sse(1.0));
    }

    #[test]
    fn test_lasso_drops_irrelevant_feature() {
        let x = Matrix::from_rows(&[
            vec![1.0, 0.3],
            vec![2.0, -0.2],
            vec![3.0, 0.1],
            vec![4.0, -0.3],
            vec![5.0, 0.2],
        ])
        .unwrap();
        let y = [2.0, 4.0, 6.0, 8.0, 10.0];
        let mut model = ElasticNet::new(0.2, 1.0);
        model.fit(&x, &y).unwrap();
        let w = model.weights.as_ref().unwrap();
        assert!(w[0] > 1.0);
        assert_eq!(w[1], 0.0);
    }

    #[test]
    fn test_constant_column_gets_zero() {
        let x = Matrix::from_rows(&[vec![1.0, 7.0], vec![2.0, 7.0], vec![3.0, 7.0]]).unwrap();
        let mut model = ElasticNet::new(0.01, 0.5);
        model.fit(&x, &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(model.weights.as_ref().unwrap()[1], 0.0);
    }

    #[test]
    fn test_invalid_penalty() {
        let (x, y) = data();
        assert!(matches!(ElasticNet::new(-1.0, 0.5).fit(&x, &y), Err(FoldkitError::Configuration(_))));
        assert!(matches!(ElasticNet::new(1.0, 1.5).fit(&x, &y), Err(FoldkitError::Configuration(_))));
    }
}

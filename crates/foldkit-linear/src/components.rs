use foldkit_core::{FoldkitError, Matrix, Result};
use foldkit_linalg::{lstsq, solve, symmetric_eigen};
use serde::{Deserialize, Serialize};

use crate::regression::{check_rows, linear_predict, not_fitted};

/// Largest usable component count for an `n × p` design: a centered design
/// has rank at most `min(p, n - 1)`. Requests above it are reduced to it.
fn max_components(n: usize, p: usize, requested: usize) -> Result<usize> {
    if requested == 0 {
        return Err(FoldkitError::config("num_comp must be at least 1"));
    }
    Ok(requested.min(p).min(n.saturating_sub(1)).max(1))
}

fn center(y: &[f64]) -> (Vec<f64>, f64) {
    let mean = y.iter().sum::<f64>() / y.len() as f64;
    (y.iter().map(|v| v - mean).collect(), mean)
}

/// Fold centering back into an intercept: `b = ȳ - x̄·w`.
fn intercept(y_mean: f64, x_means: &[f64], w: &[f64]) -> f64 {
    y_mean - x_means.iter().zip(w).map(|(m, c)| m * c).sum::<f64>()
}

/// Principal component regression.
///
/// Centers the predictors, projects them onto the leading `num_comp`
/// eigenvectors of their covariance, regresses the centered outcome on those
/// scores and maps the result back to one coefficient per predictor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrincipalComponentRegression {
    pub num_comp: usize,
    pub weights: Option<Vec<f64>>,
    pub bias: Option<f64>,
}

impl PrincipalComponentRegression {
    pub fn new(num_comp: usize) -> Self {
        PrincipalComponentRegression {
            num_comp,
            weights: None,
            bias: None,
        }
    }

    pub fn fit(&mut self, x: &Matrix, y: &[f64]) -> Result<()> {
        check_rows(x, y.len())?;
        let (n, p) = x.shape();
        let k = max_components(n, p, self.num_comp)?;

        let means = x.column_means();
        let xc = x.centered(&means);
        let mut cov = xc.t().matmul(&xc)?;
        let denom = (n.max(2) - 1) as f64;
        for i in 0..p {
            for j in 0..p {
                cov.set(i, j, cov.get(i, j) / denom);
            }
        }
        let eigen = symmetric_eigen(&cov)?;
        let rotation = eigen.vectors.select_cols(&(0..k).collect::<Vec<_>>());
        let scores = xc.matmul(&rotation)?;

        let (yc, y_mean) = center(y);
        let gamma = lstsq(&scores, &yc)?;
        let w = rotation.mul_vec(&gamma)?;
        self.bias = Some(intercept(y_mean, &means, &w));
        self.weights = Some(w);
        Ok(())
    }

    pub fn predict(&self, x: &Matrix) -> Result<Vec<f64>> {
        let w = self.weights.as_ref().ok_or_else(not_fitted)?;
        linear_predict(x, w, self.bias.unwrap_or(0.0))
    }
}

/// Partial least squares regression (PLS1, NIPALS).
///
/// Components are extracted one at a time from the centered predictors,
/// each maximizing covariance with the remaining outcome, with deflation in
/// between. Extraction stops early once the predictors carry no more
/// covariance with the outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialLeastSquares {
    pub num_comp: usize,
    pub weights: Option<Vec<f64>>,
    pub bias: Option<f64>,
}

impl PartialLeastSquares {
    pub fn new(num_comp: usize) -> Self {
        PartialLeastSquares {
            num_comp,
            weights: None,
            bias: None,
        }
    }

    pub fn fit(&mut self, x: &Matrix, y: &[f64]) -> Result<()> {
        check_rows(x, y.len())?;
        let (n, p) = x.shape();
        let k = max_components(n, p, self.num_comp)?;

        let means = x.column_means();
        let mut xr = x.centered(&means);
        let (mut yr, y_mean) = center(y);

        let mut w_cols: Vec<Vec<f64>> = Vec::with_capacity(k);
        let mut p_cols: Vec<Vec<f64>> = Vec::with_capacity(k);
        let mut q = Vec::with_capacity(k);
        for _ in 0..k {
            let mut w = xr.t().mul_vec(&yr)?;
            let norm = w.iter().map(|v| v * v).sum::<f64>().sqrt();
            if norm < 1e-12 {
                break;
            }
            w.iter_mut().for_each(|v| *v /= norm);

            let t = xr.mul_vec(&w)?;
            let tt: f64 = t.iter().map(|v| v * v).sum();
            if tt < 1e-12 {
                break;
            }
            let loading: Vec<f64> = xr.t().mul_vec(&t)?.into_iter().map(|v| v / tt).collect();
            let qa = t.iter().zip(&yr).map(|(a, b)| a * b).sum::<f64>() / tt;

            // Deflate
            for i in 0..n {
                for j in 0..p {
                    xr.set(i, j, xr.get(i, j) - t[i] * loading[j]);
                }
                yr[i] -= qa * t[i];
            }
            w_cols.push(w);
            p_cols.push(loading);
            q.push(qa);
        }

        let beta = if q.is_empty() {
            vec![0.0; p]
        } else {
            // β = W (PᵀW)⁻¹ q
            let w_mat = Matrix::from_columns(&w_cols)?;
            let p_mat = Matrix::from_columns(&p_cols)?;
            let ptw = p_mat.t().matmul(&w_mat)?;
            w_mat.mul_vec(&solve(&ptw, &q)?)?
        };
        self.bias = Some(intercept(y_mean, &means, &beta));
        self.weights = Some(beta);
        Ok(())
    }

    pub fn predict(&self, x: &Matrix) -> Result<Vec<f64>> {
        let w = self.weights.as_ref().ok_or_else(not_fitted)?;
        linear_predict(x, w, self.bias.unwrap_or(0.0))
    }
}

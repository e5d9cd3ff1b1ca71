use foldkit_core::{FoldkitError, Matrix, Result};
use serde::{Deserialize, Serialize};

use crate::elastic_net::{check_penalty, descend, Standardized};
use crate::regression::{check_rows, linear_predict, not_fitted};

/// Probabilities are kept this far from 0 and 1 inside the IRLS weights.
const PROB_EPS: f64 = 1e-5;

/// Binary logistic regression fit by iteratively reweighted
/// least squares.
///
/// Each outer pass forms the quadratic approximation of the log-likelihood at
/// the current fit and solves it with elastic-net coordinate descent, so the
/// optional `penalty`/`mixture` carry the same meaning as in
/// [`ElasticNet`](crate::ElasticNet). With no penalty this is plain maximum
/// likelihood; perfectly separable classes then never converge and the fit
/// fails with `FitConvergence`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub penalty: f64,
    pub mixture: f64,
    pub weights: Option<Vec<f64>>,
    pub bias: Option<f64>,
    pub max_iter: usize,
    pub tol: f64,
}

impl LogisticRegression {
    pub fn new(penalty: f64, mixture: f64) -> Self {
        LogisticRegression {
            penalty,
            mixture,
            weights: None,
            bias: None,
            max_iter: 100,
            tol: 1e-8,
        }
    }

    fn sigmoid_val(x: f64) -> f64 {
        1.0 / (1.0 + (-x).exp())
    }

    /// Fit on class codes `y`, each 0 or 1. The model predicts the
    /// probability of class 1.
    pub fn fit(&mut self, x: &Matrix, y: &[usize]) -> Result<()> {
        check_rows(x, y.len())?;
        check_penalty(self.penalty, self.mixture)?;
        if let Some(&bad) = y.iter().find(|&&c| c > 1) {
            return Err(FoldkitError::config(format!(
                "logistic regression is binary; got class code {}",
                bad
            )));
        }
        let n = x.rows();
        let y: Vec<f64> = y.iter().map(|&c| c as f64).collect();

        let scaling = Standardized::new(x);
        let xs = &scaling.x;
        let p_bar = (y.iter().sum::<f64>() / n as f64).clamp(PROB_EPS, 1.0 - PROB_EPS);
        let mut w = vec![0.0; x.cols()];
        let mut b = (p_bar / (1.0 - p_bar)).ln();

        let mut converged = false;
        for _ in 0..self.max_iter {
            let eta = linear_predict(xs, &w, b)?;
            let mut z = Vec::with_capacity(n);
            let mut v = Vec::with_capacity(n);
            for (e, yi) in eta.iter().zip(&y) {
                let p = Self::sigmoid_val(*e).clamp(PROB_EPS, 1.0 - PROB_EPS);
                let wi = p * (1.0 - p);
                z.push(e + (yi - p) / wi);
                v.push(wi / n as f64);
            }

            let (old_w, old_b) = (w.clone(), b);
            descend(
                xs,
                &z,
                &v,
                self.penalty,
                self.mixture,
                (w.as_mut_slice(), &mut b),
                10_000,
                self.tol * 0.1,
            )?;

            let change = w
                .iter()
                .zip(&old_w)
                .map(|(a, c)| (a - c).abs())
                .fold((b - old_b).abs(), f64::max);
            if change < self.tol {
                converged = true;
                break;
            }
        }
        if !converged {
            return Err(FoldkitError::FitConvergence(format!(
                "logistic regression did not converge in {} iterations",
                self.max_iter
            )));
        }

        let (w, b) = scaling.unscale(&w, b);
        self.weights = Some(w);
        self.bias = Some(b);
        Ok(())
    }

    /// Predict probabilities of class 1.
    pub fn predict_proba(&self, x: &Matrix) -> Result<Vec<f64>> {
        let w = self.weights.as_ref().ok_or_else(not_fitted)?;
        Ok(linear_predict(x, w, self.bias.unwrap_or(0.0))?
            .into_iter()
            .map(Self::sigmoid_val)
            .collect())
    }

    /// Predict class codes (threshold = 0.5).
    pub fn predict(&self, x: &Matrix) -> Result<Vec<usize>> {
        Ok(self
            .predict_proba(x)?
            .into_iter()
            .map(|p| usize::from(p > 0.5))
            .collect())
    }
}

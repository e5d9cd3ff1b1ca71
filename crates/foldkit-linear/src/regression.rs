use foldkit_core::{FoldkitError, Matrix, Result};
use foldkit_linalg::lstsq;
use serde::{Deserialize, Serialize};

/// Ordinary Least Squares linear regression.
///
/// Fits `y = Xw + b` by least squares on `[1 | X]` (Householder QR). A
/// rank-deficient design, or fewer rows than coefficients, is a
/// `SingularMatrix` error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRegression {
    pub weights: Option<Vec<f64>>,
    pub bias: Option<f64>,
    pub fit_intercept: bool,
}

impl LinearRegression {
    pub fn new(fit_intercept: bool) -> Self {
        LinearRegression {
            weights: None,
            bias: None,
            fit_intercept,
        }
    }

    pub fn fit(&mut self, x: &Matrix, y: &[f64]) -> Result<()> {
        check_rows(x, y.len())?;

        // Optionally prepend column of ones for intercept
        let design = if self.fit_intercept { with_intercept(x) } else { x.clone() };
        let w = lstsq(&design, y)?;

        if self.fit_intercept {
            self.bias = Some(w[0]);
            self.weights = Some(w[1..].to_vec());
        } else {
            self.bias = None;
            self.weights = Some(w);
        }
        Ok(())
    }

    pub fn predict(&self, x: &Matrix) -> Result<Vec<f64>> {
        let w = self.weights.as_ref().ok_or_else(not_fitted)?;
        linear_predict(x, w, self.bias.unwrap_or(0.0))
    }
}

// ─── Shared helpers ─────────────────────────────────────────────────────────

pub(crate) fn not_fitted() -> FoldkitError {
    FoldkitError::config("model not fitted")
}

pub(crate) fn check_rows(x: &Matrix, n: usize) -> Result<()> {
    if x.rows() != n {
        return Err(FoldkitError::ShapeMismatch {
            expected: vec![x.rows()],
            got: vec![n],
        });
    }
    if x.rows() == 0 {
        return Err(FoldkitError::config("cannot fit a model on zero rows"));
    }
    Ok(())
}

fn with_intercept(x: &Matrix) -> Matrix {
    let (n, p) = x.shape();
    let mut out = Matrix::zeros(n, p + 1);
    for i in 0..n {
        out.set(i, 0, 1.0);
        for (j, &v) in x.row(i).iter().enumerate() {
            out.set(i, j + 1, v);
        }
    }
    out
}

/// `Xw + b`, checking that `w` matches the column count.
pub(crate) fn linear_predict(x: &Matrix, w: &[f64], b: f64) -> Result<Vec<f64>> {
    if x.cols() != w.len() {
        return Err(FoldkitError::ShapeMismatch {
            expected: vec![w.len()],
            got: vec![x.cols()],
        });
    }
    Ok((0..x.rows())
        .map(|i| b + x.row(i).iter().zip(w).map(|(a, c)| a * c).sum::<f64>())
        .collect())
}

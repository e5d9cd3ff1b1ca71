use foldkit_core::{FoldkitError, Result};

fn check(metric: &str, truth: &[f64], estimate: &[f64]) -> Result<()> {
    if truth.len() != estimate.len() {
        return Err(FoldkitError::ShapeMismatch {
            expected: vec![truth.len()],
            got: vec![estimate.len()],
        });
    }
    if truth.is_empty() {
        return Err(FoldkitError::metric_domain(metric, "no rows to score"));
    }
    if estimate.iter().chain(truth).any(|v| !v.is_finite()) {
        return Err(FoldkitError::metric_domain(metric, "non-finite value"));
    }
    Ok(())
}

/// Mean Squared Error.
pub fn mse(truth: &[f64], estimate: &[f64]) -> Result<f64> {
    check("mse", truth, estimate)?;
    let sum: f64 = truth
        .iter()
        .zip(estimate)
        .map(|(t, p)| (t - p) * (t - p))
        .sum();
    Ok(sum / truth.len() as f64)
}

/// Root Mean Squared Error.
pub fn rmse(truth: &[f64], estimate: &[f64]) -> Result<f64> {
    check("rmse", truth, estimate)?;
    Ok(mse(truth, estimate)?.sqrt())
}

/// Mean Absolute Error.
pub fn mae(truth: &[f64], estimate: &[f64]) -> Result<f64> {
    check("mae", truth, estimate)?;
    let sum: f64 = truth.iter().zip(estimate).map(|(t, p)| (t - p).abs()).sum();
    Ok(sum / truth.len() as f64)
}

/// Root Mean Squared Log Error over `ln(1 + x)`.
///
/// Negative truth or estimates have no logarithm here and are a domain error.
pub fn rmsle(truth: &[f64], estimate: &[f64]) -> Result<f64> {
    check("rmsle", truth, estimate)?;
    if truth.iter().chain(estimate).any(|&v| v < 0.0) {
        return Err(FoldkitError::metric_domain("rmsle", "values must be non-negative"));
    }
    let sum: f64 = truth
        .iter()
        .zip(estimate)
        .map(|(t, p)| {
            let d = t.ln_1p() - p.ln_1p();
            d * d
        })
        .sum();
    Ok((sum / truth.len() as f64).sqrt())
}

/// R² (coefficient of determination), `1 - SS_res / SS_tot`.
pub fn rsq(truth: &[f64], estimate: &[f64]) -> Result<f64> {
    check("rsq", truth, estimate)?;
    let n = truth.len() as f64;
    let mean = truth.iter().sum::<f64>() / n;
    let ss_tot: f64 = truth.iter().map(|t| (t - mean) * (t - mean)).sum();
    if ss_tot < 1e-15 {
        return Err(FoldkitError::metric_domain("rsq", "truth is constant"));
    }
    let ss_res: f64 = truth
        .iter()
        .zip(estimate)
        .map(|(t, p)| (t - p) * (t - p))
        .sum();
    Ok(1.0 - ss_res / ss_tot)
}

use foldkit_core::{Column, ColumnKind, DataFrame, FoldkitError, Result};
use serde::{Deserialize, Serialize};

use crate::selector::require_kind;

/// λ is searched on this interval.
pub const LAMBDA_BOUNDS: (f64, f64) = (-5.0, 5.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerMethod {
    BoxCox,
    YeoJohnson,
}

/// Power transform with one maximum-likelihood λ per column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerTransformer {
    pub method: PowerMethod,
    pub columns: Vec<String>,
    /// `None` leaves the column untouched (fewer than two distinct values).
    pub lambdas: Vec<Option<f64>>,
}

impl PowerTransformer {
    pub fn fit(frame: &DataFrame, columns: &[String], method: PowerMethod) -> Result<Self> {
        require_kind(frame, columns, ColumnKind::Numeric, "power transform")?;
        let mut lambdas = Vec::with_capacity(columns.len());
        for name in columns {
            let observed: Vec<f64> = frame
                .column(name)?
                .numeric_values()?
                .iter()
                .copied()
                .filter(|v| !v.is_nan())
                .collect();
            if method == PowerMethod::BoxCox && observed.iter().any(|&v| v <= 0.0) {
                return Err(FoldkitError::config(format!(
                    "Box-Cox needs strictly positive values; column '{}' has some that are not",
                    name
                )));
            }
            let distinct = observed.iter().any(|&v| v != observed[0]);
            lambdas.push(distinct.then(|| estimate_lambda(&observed, method)));
        }
        Ok(PowerTransformer {
            method,
            columns: columns.to_vec(),
            lambdas,
        })
    }

    pub fn apply(&self, frame: &DataFrame) -> Result<DataFrame> {
        let mut out = frame.clone();
        for (name, lambda) in self.columns.iter().zip(&self.lambdas) {
            let Some(lambda) = *lambda else { continue };
            let values = frame.column(name)?.numeric_values()?;
            let transformed = values
                .iter()
                .map(|&x| match self.method {
                    PowerMethod::BoxCox => box_cox(x, lambda),
                    PowerMethod::YeoJohnson => yeo_johnson(x, lambda),
                })
                .collect();
            out.put_column(Column::numeric(name.clone(), transformed))?;
        }
        Ok(out)
    }
}

/// Box-Cox transform; values outside its domain become missing.
pub fn box_cox(x: f64, lambda: f64) -> f64 {
    if x.is_nan() || x <= 0.0 {
        return f64::NAN;
    }
    if lambda.abs() < 1e-8 {
        x.ln()
    } else {
        (x.powf(lambda) - 1.0) / lambda
    }
}

/// Yeo-Johnson transform, defined on the whole real line.
pub fn yeo_johnson(x: f64, lambda: f64) -> f64 {
    if x.is_nan() {
        return f64::NAN;
    }
    if x >= 0.0 {
        if lambda.abs() < 1e-8 {
            x.ln_1p()
        } else {
            ((x + 1.0).powf(lambda) - 1.0) / lambda
        }
    } else if (lambda - 2.0).abs() < 1e-8 {
        -(-x).ln_1p()
    } else {
        -((1.0 - x).powf(2.0 - lambda) - 1.0) / (2.0 - lambda)
    }
}

/// Profile log-likelihood of λ under a normal model for the transformed values.
fn log_likelihood(values: &[f64], lambda: f64, method: PowerMethod) -> f64 {
    let n = values.len() as f64;
    let (transformed, jacobian): (Vec<f64>, f64) = match method {
        PowerMethod::BoxCox => (
            values.iter().map(|&x| box_cox(x, lambda)).collect(),
            (lambda - 1.0) * values.iter().map(|x| x.ln()).sum::<f64>(),
        ),
        PowerMethod::YeoJohnson => (
            values.iter().map(|&x| yeo_johnson(x, lambda)).collect(),
            (lambda - 1.0)
                * values
                    .iter()
                    .map(|&x| x.signum() * x.abs().ln_1p())
                    .sum::<f64>(),
        ),
    };
    let mean = transformed.iter().sum::<f64>() / n;
    let var = transformed.iter().map(|t| (t - mean) * (t - mean)).sum::<f64>() / n;
    if !(var > 0.0) || !var.is_finite() {
        return f64::NEG_INFINITY;
    }
    -0.5 * n * var.ln() + jacobian
}

/// Golden-section search for the λ maximizing the log-likelihood.
fn estimate_lambda(values: &[f64], method: PowerMethod) -> f64 {
    let ratio = (5.0_f64.sqrt() - 1.0) / 2.0;
    let (mut a, mut b) = LAMBDA_BOUNDS;
    let mut c = b - ratio * (b - a);
    let mut d = a + ratio * (b - a);
    let mut fc = log_likelihood(values, c, method);
    let mut fd = log_likelihood(values, d, method);
    while b - a > 1e-6 {
        if fc > fd {
            b = d;
            d = c;
            fd = fc;
            c = b - ratio * (b - a);
            fc = log_likelihood(values, c, method);
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + ratio * (b - a);
            fd = log_likelihood(values, d, method);
        }
    }
    (a + b) / 2.0
}

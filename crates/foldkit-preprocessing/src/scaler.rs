use foldkit_core::{Column, ColumnKind, DataFrame, Result};
use serde::{Deserialize, Serialize};

use crate::selector::require_kind;

/// Center and scale numeric columns with statistics learned on the fit rows.
///
/// Missing values are ignored when fitting and stay missing when applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub columns: Vec<String>,
    pub means: Vec<f64>,
    /// Sample standard deviations (n − 1 denominator).
    pub sds: Vec<f64>,
}

impl StandardScaler {
    /// Compute mean and sd of each column over its observed values.
    pub fn fit(frame: &DataFrame, columns: &[String]) -> Result<Self> {
        require_kind(frame, columns, ColumnKind::Numeric, "normalize")?;
        let mut means = Vec::with_capacity(columns.len());
        let mut sds = Vec::with_capacity(columns.len());
        for name in columns {
            let (mean, sd) = mean_sd(frame.column(name)?.numeric_values()?);
            means.push(mean);
            sds.push(sd);
        }
        Ok(StandardScaler {
            columns: columns.to_vec(),
            means,
            sds,
        })
    }

    /// `(x - mean) / sd`; a zero sd scales by 1.
    pub fn apply(&self, frame: &DataFrame) -> Result<DataFrame> {
        let mut out = frame.clone();
        for ((name, &mean), &sd) in self.columns.iter().zip(&self.means).zip(&self.sds) {
            let values = frame.column(name)?.numeric_values()?;
            let sd_safe = if sd.abs() < f64::EPSILON || !sd.is_finite() { 1.0 } else { sd };
            let scaled = values.iter().map(|&v| (v - mean) / sd_safe).collect();
            out.put_column(Column::numeric(name.clone(), scaled))?;
        }
        Ok(out)
    }
}

/// Mean and sample sd of the non-NaN values; sd is 0 with fewer than two.
pub fn mean_sd(values: &[f64]) -> (f64, f64) {
    let observed: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    let n = observed.len();
    if n == 0 {
        return (0.0, 0.0);
    }
    let mean = observed.iter().sum::<f64>() / n as f64;
    if n < 2 {
        return (mean, 0.0);
    }
    let var = observed.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1) as f64;
    (mean, var.sqrt())
}

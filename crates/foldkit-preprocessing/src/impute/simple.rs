use foldkit_core::{Column, ColumnData, DataFrame, FoldkitError, Result, Value};
use serde::{Deserialize, Serialize};

use super::mode_category;

/// Summary statistic used as the fill value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Statistic {
    Mean,
    Median,
    /// Most frequent value; numeric or categorical.
    Mode,
}

/// Fills missing cells with one per-column statistic of the observed fit values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleImputer {
    pub statistic: Statistic,
    pub columns: Vec<String>,
    pub fills: Vec<Value>,
}

impl SimpleImputer {
    pub fn fit(frame: &DataFrame, columns: &[String], statistic: Statistic) -> Result<Self> {
        let mut fills = Vec::with_capacity(columns.len());
        for name in columns {
            let fill = match (frame.column(name)?.data(), statistic) {
                (ColumnData::Numeric(v), stat) => {
                    let mut observed: Vec<f64> = v.iter().copied().filter(|x| !x.is_nan()).collect();
                    if observed.is_empty() {
                        return Err(no_observed(name));
                    }
                    observed.sort_by(f64::total_cmp);
                    Value::Number(match stat {
                        Statistic::Mean => observed.iter().sum::<f64>() / observed.len() as f64,
                        Statistic::Median => median_sorted(&observed),
                        Statistic::Mode => mode_sorted(&observed),
                    })
                }
                (ColumnData::Categorical(v), Statistic::Mode) => {
                    Value::Category(mode_category(v.iter().flatten()).ok_or_else(|| no_observed(name))?)
                }
                (ColumnData::Categorical(_), stat) => {
                    return Err(FoldkitError::config(format!(
                        "{:?} imputation needs a numeric column; '{}' is categorical",
                        stat, name
                    )))
                }
            };
            fills.push(fill);
        }
        Ok(SimpleImputer {
            statistic,
            columns: columns.to_vec(),
            fills,
        })
    }

    pub fn apply(&self, frame: &DataFrame) -> Result<DataFrame> {
        let mut out = frame.clone();
        for (name, fill) in self.columns.iter().zip(&self.fills) {
            let column = match (frame.column(name)?.data(), fill) {
                (ColumnData::Numeric(v), Value::Number(f)) => Column::numeric(
                    name.clone(),
                    v.iter().map(|&x| if x.is_nan() { *f } else { x }).collect(),
                ),
                (ColumnData::Categorical(v), Value::Category(f)) => Column::categorical(
                    name.clone(),
                    v.iter().map(|x| Some(x.clone().unwrap_or_else(|| f.clone()))).collect(),
                ),
                _ => {
                    return Err(FoldkitError::config(format!(
                        "column '{}' changed kind since the imputer was fit",
                        name
                    )))
                }
            };
            out.put_column(column)?;
        }
        Ok(out)
    }
}

fn no_observed(name: &str) -> FoldkitError {
    FoldkitError::config(format!("column '{}' has no observed values to impute from", name))
}

fn median_sorted(v: &[f64]) -> f64 {
    let n = v.len();
    if n % 2 == 1 {
        v[n / 2]
    } else {
        (v[n / 2 - 1] + v[n / 2]) / 2.0
    }
}

/// Most frequent value of a sorted slice, smallest on ties.
fn mode_sorted(v: &[f64]) -> f64 {
    let mut best = (v[0], 0usize);
    let mut i = 0;
    while i < v.len() {
        let mut j = i;
        while j < v.len() && v[j] == v[i] {
            j += 1;
        }
        if j - i > best.1 {
            best = (v[i], j - i);
        }
        i = j;
    }
    best.0
}

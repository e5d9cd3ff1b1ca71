use foldkit_core::{ColumnData, DataFrame, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

fn default_freq_cut() -> f64 {
    95.0 / 5.0
}

fn default_unique_cut() -> f64 {
    10.0
}

/// Which predictors a filter step removes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    /// Columns with a single distinct observed value.
    ZeroVariance,
    /// Zero-variance columns, plus columns whose most common value outnumbers
    /// the runner-up by more than `freq_cut` while fewer than `unique_cut`
    /// percent of the values are distinct.
    NearZeroVariance {
        #[serde(default = "default_freq_cut")]
        freq_cut: f64,
        #[serde(default = "default_unique_cut")]
        unique_cut: f64,
    },
}

impl FilterKind {
    pub fn near_zero_default() -> Self {
        FilterKind::NearZeroVariance {
            freq_cut: default_freq_cut(),
            unique_cut: default_unique_cut(),
        }
    }
}

/// Counts of each distinct observed value, most frequent first.
fn value_counts(data: &ColumnData) -> Vec<usize> {
    let mut counts: Vec<usize> = match data {
        ColumnData::Numeric(v) => {
            let mut m: HashMap<u64, usize> = HashMap::new();
            for x in v.iter().filter(|x| !x.is_nan()) {
                // -0.0 and 0.0 are the same value
                *m.entry((x + 0.0).to_bits()).or_default() += 1;
            }
            m.into_values().collect()
        }
        ColumnData::Categorical(v) => {
            let mut m: HashMap<&str, usize> = HashMap::new();
            for s in v.iter().flatten() {
                *m.entry(s.as_str()).or_default() += 1;
            }
            m.into_values().collect()
        }
    };
    counts.sort_unstable_by(|a, b| b.cmp(a));
    counts
}

fn is_degenerate(data: &ColumnData, kind: FilterKind) -> bool {
    let counts = value_counts(data);
    if counts.len() <= 1 {
        return true;
    }
    match kind {
        FilterKind::ZeroVariance => false,
        FilterKind::NearZeroVariance { freq_cut, unique_cut } => {
            let observed: usize = counts.iter().sum();
            let freq_ratio = counts[0] as f64 / counts[1] as f64;
            let pct_unique = 100.0 * counts.len() as f64 / observed as f64;
            freq_ratio > freq_cut && pct_unique < unique_cut
        }
    }
}

/// Removes the predictors judged degenerate on the fit rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarianceFilter {
    pub kind: FilterKind,
    pub removed: Vec<String>,
}

impl VarianceFilter {
    pub fn fit(frame: &DataFrame, columns: &[String], kind: FilterKind) -> Result<Self> {
        let mut removed = Vec::new();
        for name in columns {
            if is_degenerate(frame.column(name)?.data(), kind) {
                removed.push(name.clone());
            }
        }
        if !removed.is_empty() {
            debug!(columns = ?removed, "variance filter drops columns");
        }
        Ok(VarianceFilter { kind, removed })
    }

    pub fn apply(&self, frame: &DataFrame) -> Result<DataFrame> {
        Ok(frame.drop_columns(&self.removed))
    }
}

/// Whole-frame cleanup meant to run before any split: drops every column
/// other than `keep` that the filter judges degenerate. Returns the cleaned
/// frame and the dropped names.
pub fn filter_near_zero_variance(
    frame: &DataFrame,
    keep: &[String],
    kind: FilterKind,
) -> Result<(DataFrame, Vec<String>)> {
    let candidates: Vec<String> = frame
        .column_names()
        .into_iter()
        .filter(|n| !keep.contains(n))
        .collect();
    let filter = VarianceFilter::fit(frame, &candidates, kind)?;
    Ok((filter.apply(frame)?, filter.removed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use foldkit_core::Column;

    fn frame() -> DataFrame {
        let mut rare = vec![0.0; 99];
        rare.push(1.0);
        DataFrame::new(vec![
            Column::numeric("constant", vec![3.0; 100]),
            Column::numeric("rare", rare),
            Column::numeric("spread", (0..100).map(|i| i as f64).collect()),
            Column::from_strs("flag", &["y"; 100]),
        ])
        .unwrap()
    }

    fn all(df: &DataFrame) -> Vec<String> {
        df.column_names()
    }

    #[test]
    fn test_zero_variance() {
        let df = frame();
        let f = VarianceFilter::fit(&df, &all(&df), FilterKind::ZeroVariance).unwrap();
        assert_eq!(f.removed, vec!["constant".to_string(), "flag".to_string()]);
    }

    #[test]
    fn test_near_zero_variance() {
        let df = frame();
        let f = VarianceFilter::fit(&df, &all(&df), FilterKind::near_zero_default()).unwrap();
        assert_eq!(
            f.removed,
            vec!["constant".to_string(), "rare".to_string(), "flag".to_string()]
        );
        assert_eq!(f.apply(&df).unwrap().column_names(), vec!["spread"]);
    }

    #[test]
    fn test_whole_frame_filter_keeps_outcome() {
        let df = frame();
        let (clean, dropped) =
            filter_near_zero_variance(&df, &["flag".to_string()], FilterKind::near_zero_default()).unwrap();
        assert_eq!(clean.column_names(), vec!["spread", "flag"]);
        assert_eq!(dropped.len(), 2);
    }
}

use foldkit_core::{ColumnData, DataFrame, FoldkitError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

fn default_breaks() -> usize {
    4
}

/// Options for the initial train/test partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitOptions {
    pub train_fraction: f64,
    #[serde(default)]
    pub stratify_by: Option<String>,
    /// Quantile bins used when the stratification column is numeric.
    #[serde(default = "default_breaks")]
    pub breaks: usize,
    pub seed: u64,
}

impl SplitOptions {
    pub fn new(train_fraction: f64, seed: u64) -> Self {
        SplitOptions {
            train_fraction,
            stratify_by: None,
            breaks: default_breaks(),
            seed,
        }
    }

    pub fn stratify_by(mut self, column: impl Into<String>) -> Self {
        self.stratify_by = Some(column.into());
        self
    }

    pub fn with_breaks(mut self, breaks: usize) -> Self {
        self.breaks = breaks;
        self
    }
}

/// Disjoint train/test row indices covering the whole frame. Both lists are sorted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    train_indices: Vec<usize>,
    test_indices: Vec<usize>,
}

impl Split {
    pub fn train_indices(&self) -> &[usize] {
        &self.train_indices
    }

    pub fn test_indices(&self) -> &[usize] {
        &self.test_indices
    }

    pub fn n_rows(&self) -> usize {
        self.train_indices.len() + self.test_indices.len()
    }

    pub fn training(&self, frame: &DataFrame) -> DataFrame {
        frame.select_rows(&self.train_indices)
    }

    pub fn testing(&self, frame: &DataFrame) -> DataFrame {
        frame.select_rows(&self.test_indices)
    }
}

/// Partition a frame into training and holdout rows.
///
/// With `stratify_by` each stratum (category, or quantile bin of a numeric
/// column) is split independently at `train_fraction`, so the stratum mix is
/// preserved on both sides up to rounding.
pub fn split(frame: &DataFrame, options: &SplitOptions) -> Result<Split> {
    let f = options.train_fraction;
    if !(f > 0.0 && f < 1.0) {
        return Err(FoldkitError::config(format!(
            "train_fraction must lie in (0, 1), got {}",
            f
        )));
    }
    if f > 0.8 {
        warn!(train_fraction = f, "training fraction above 0.8 leaves little data to assess overfitting");
    }
    let n = frame.n_rows();
    if n < 2 {
        return Err(FoldkitError::config("at least two rows are needed to split"));
    }

    let strata: Vec<Vec<usize>> = match &options.stratify_by {
        None => vec![(0..n).collect()],
        Some(name) => strata_for(frame, name, options.breaks)?,
    };

    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut train = Vec::with_capacity(n);
    let mut test = Vec::with_capacity(n);
    for mut members in strata {
        let size = members.len();
        members.shuffle(&mut rng);
        let n_train = ((size as f64) * f).round() as usize;
        let n_train = n_train.clamp(1, size - 1);
        train.extend_from_slice(&members[..n_train]);
        test.extend_from_slice(&members[n_train..]);
    }
    train.sort_unstable();
    test.sort_unstable();

    Ok(Split {
        train_indices: train,
        test_indices: test,
    })
}

/// Row groups for a stratification column, ordered deterministically.
pub fn strata_for(frame: &DataFrame, column: &str, breaks: usize) -> Result<Vec<Vec<usize>>> {
    let col = frame.column(column)?;
    let groups: Vec<Vec<usize>> = match col.data() {
        ColumnData::Categorical(values) => {
            let mut by_level: BTreeMap<Option<&str>, Vec<usize>> = BTreeMap::new();
            for (i, v) in values.iter().enumerate() {
                by_level.entry(v.as_deref()).or_default().push(i);
            }
            if let Some((level, members)) = by_level.iter().find(|(_, m)| m.len() < 2) {
                return Err(FoldkitError::config(format!(
                    "stratum '{}' of column '{}' has {} row(s); at least 2 are needed",
                    level.unwrap_or("<missing>"),
                    column,
                    members.len()
                )));
            }
            by_level.into_values().collect()
        }
        ColumnData::Numeric(values) => quantile_bins(values, column, breaks)?,
    };
    Ok(groups)
}

/// Rank-based quantile bins: nearly equal-sized groups of ascending values.
fn quantile_bins(values: &[f64], column: &str, breaks: usize) -> Result<Vec<Vec<usize>>> {
    if values.iter().any(|v| v.is_nan()) {
        return Err(FoldkitError::config(format!(
            "numeric stratification column '{}' has missing values",
            column
        )));
    }
    if breaks < 1 {
        return Err(FoldkitError::config("breaks must be at least 1"));
    }
    let n = values.len();
    // Every bin needs two members to land on both sides of the split.
    let bins = breaks.min(n / 2).max(1);

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]).then(a.cmp(&b)));

    let mut groups = vec![Vec::new(); bins];
    for (rank, &i) in order.iter().enumerate() {
        groups[rank * bins / n].push(i);
    }
    Ok(groups)
}

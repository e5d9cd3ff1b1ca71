use foldkit_core::{Column, ColumnKind, DataFrame, FoldkitError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::selector::require_kind;

/// Level that rare and unseen categories collapse into.
pub const OTHER_LEVEL: &str = "other";

/// Pool infrequent categories into [`OTHER_LEVEL`].
///
/// A level is kept when its share of the observed fit values is at least
/// `threshold`. Levels first met at apply time are pooled as well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OtherCollapser {
    pub threshold: f64,
    pub columns: Vec<String>,
    pub kept: Vec<Vec<String>>,
}

impl OtherCollapser {
    pub fn fit(frame: &DataFrame, columns: &[String], threshold: f64) -> Result<Self> {
        if !(0.0..1.0).contains(&threshold) {
            return Err(FoldkitError::config(format!(
                "other threshold must lie in [0, 1), got {}",
                threshold
            )));
        }
        require_kind(frame, columns, ColumnKind::Categorical, "other")?;
        let mut kept = Vec::with_capacity(columns.len());
        for name in columns {
            let values = frame.column(name)?.categorical_values()?;
            let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
            for v in values.iter().flatten() {
                *counts.entry(v.as_str()).or_default() += 1;
            }
            let observed: usize = counts.values().sum();
            kept.push(
                counts
                    .into_iter()
                    .filter(|&(_, c)| c as f64 >= threshold * observed as f64)
                    .map(|(level, _)| level.to_string())
                    .collect(),
            );
        }
        Ok(OtherCollapser {
            threshold,
            columns: columns.to_vec(),
            kept,
        })
    }

    pub fn apply(&self, frame: &DataFrame) -> Result<DataFrame> {
        let mut out = frame.clone();
        for (name, kept) in self.columns.iter().zip(&self.kept) {
            let values = frame.column(name)?.categorical_values()?;
            let pooled = values
                .iter()
                .map(|v| {
                    v.as_ref().map(|s| {
                        if kept.binary_search(s).is_ok() {
                            s.clone()
                        } else {
                            OTHER_LEVEL.to_string()
                        }
                    })
                })
                .collect();
            out.put_column(Column::categorical(name.clone(), pooled))?;
        }
        Ok(out)
    }
}

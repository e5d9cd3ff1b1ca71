//! Missing-value imputation.
//!
//! Every imputer learns from the fit rows only: summary statistics, donor
//! rows for nearest neighbors, and per-column trees for the iterative method.

mod iterative;
mod knn;
mod simple;

pub use iterative::TreeImputer;
pub use knn::KnnImputer;
pub use simple::{SimpleImputer, Statistic};

use foldkit_core::{DataFrame, Result};
use serde::{Deserialize, Serialize};

fn default_neighbors() -> usize {
    5
}

fn default_iterations() -> usize {
    5
}

fn default_max_depth() -> usize {
    5
}

/// Imputation strategy declared on a recipe step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ImputeMethod {
    Mean,
    Median,
    Mode,
    Knn {
        #[serde(default = "default_neighbors")]
        neighbors: usize,
    },
    Tree {
        #[serde(default = "default_iterations")]
        iterations: usize,
        #[serde(default = "default_max_depth")]
        max_depth: usize,
    },
}

/// A fitted imputer of any kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Imputer {
    Simple(SimpleImputer),
    Knn(KnnImputer),
    Tree(TreeImputer),
}

impl Imputer {
    pub fn fit(frame: &DataFrame, columns: &[String], method: ImputeMethod) -> Result<Self> {
        Ok(match method {
            ImputeMethod::Mean => Imputer::Simple(SimpleImputer::fit(frame, columns, Statistic::Mean)?),
            ImputeMethod::Median => {
                Imputer::Simple(SimpleImputer::fit(frame, columns, Statistic::Median)?)
            }
            ImputeMethod::Mode => Imputer::Simple(SimpleImputer::fit(frame, columns, Statistic::Mode)?),
            ImputeMethod::Knn { neighbors } => Imputer::Knn(KnnImputer::fit(frame, columns, neighbors)?),
            ImputeMethod::Tree {
                iterations,
                max_depth,
            } => Imputer::Tree(TreeImputer::fit(frame, columns, iterations, max_depth)?),
        })
    }

    pub fn apply(&self, frame: &DataFrame) -> Result<DataFrame> {
        match self {
            Imputer::Simple(i) => i.apply(frame),
            Imputer::Knn(i) => i.apply(frame),
            Imputer::Tree(i) => i.apply(frame),
        }
    }
}

/// Most frequent category, smallest level on ties.
fn mode_category<'a>(values: impl Iterator<Item = &'a String>) -> Option<String> {
    let mut counts: std::collections::BTreeMap<&str, usize> = std::collections::BTreeMap::new();
    for v in values {
        *counts.entry(v.as_str()).or_default() += 1;
    }
    let mut best: Option<(&str, usize)> = None;
    for (level, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((level, count));
        }
    }
    best.map(|(level, _)| level.to_string())
}

use foldkit_core::{FoldkitError, PredictorSpec, Result};
use foldkit_metrics::Metric;
use foldkit_pipeline::Step;
use foldkit_preprocessing::FilterKind;
use foldkit_resample::{Resampling, SplitOptions};
use foldkit_tune::{Budget, HyperGrid, ModelFamily};
use serde::{Deserialize, Serialize};

fn default_repeats() -> usize {
    5
}

/// Permutation importance settings, used for families without coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportanceOptions {
    #[serde(default = "default_repeats")]
    pub repeats: usize,
    #[serde(default)]
    pub seed: u64,
}

impl Default for ImportanceOptions {
    fn default() -> Self {
        ImportanceOptions {
            repeats: default_repeats(),
            seed: 0,
        }
    }
}

/// Everything a [`Workflow`](crate::Workflow) run needs, loadable from JSON.
///
/// ```json
/// {
///   "outcome": "price",
///   "split": { "train_fraction": 0.7, "seed": 123 },
///   "resampling": { "strategy": "k_fold", "k": 10 },
///   "family": "elastic_net",
///   "grid": { "params": { "penalty": [0.01, 0.1, 1.0] } },
///   "metric": "rmse"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub outcome: String,
    /// Explicit predictor list; every other column when absent.
    #[serde(default)]
    pub predictors: Option<Vec<String>>,
    /// Columns never used as predictors when `predictors` is absent.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Column whose classes (or quantile bins) each k-fold fold keeps in proportion.
    #[serde(default)]
    pub stratum: Option<String>,
    /// Whole-frame filter applied before the split.
    #[serde(default)]
    pub prefilter: Option<FilterKind>,
    pub split: SplitOptions,
    pub resampling: Resampling,
    #[serde(default)]
    pub resampling_seed: u64,
    #[serde(default)]
    pub steps: Vec<Step>,
    pub family: ModelFamily,
    #[serde(default)]
    pub grid: HyperGrid,
    pub metric: Metric,
    /// Select the simplest configuration within one standard error of the best.
    #[serde(default)]
    pub one_std_err: bool,
    #[serde(default)]
    pub budget: Budget,
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default)]
    pub event_level: Option<String>,
    #[serde(default)]
    pub importance: ImportanceOptions,
}

impl WorkflowConfig {
    /// Minimal configuration; everything optional left at its default.
    pub fn new(
        outcome: impl Into<String>,
        split: SplitOptions,
        resampling: Resampling,
        family: ModelFamily,
        metric: Metric,
    ) -> Self {
        WorkflowConfig {
            outcome: outcome.into(),
            predictors: None,
            exclude: Vec::new(),
            stratum: None,
            prefilter: None,
            split,
            resampling,
            resampling_seed: 0,
            steps: Vec::new(),
            family,
            grid: HyperGrid::default(),
            metric,
            one_std_err: false,
            budget: Budget::unlimited(),
            workers: None,
            event_level: None,
            importance: ImportanceOptions::default(),
        }
    }

    pub fn predictor_spec(&self) -> PredictorSpec {
        match &self.predictors {
            Some(names) => PredictorSpec::Explicit(names.clone()),
            None => PredictorSpec::AllExcept(self.exclude.clone()),
        }
    }

    /// Reject inconsistent settings before any data is touched.
    pub fn validate(&self) -> Result<()> {
        if self.outcome.is_empty() {
            return Err(FoldkitError::config("outcome column name is empty"));
        }
        if let Some(names) = &self.predictors {
            if names.is_empty() {
                return Err(FoldkitError::config("explicit predictor list is empty"));
            }
            if !self.exclude.is_empty() {
                return Err(FoldkitError::config("'exclude' only applies without an explicit predictor list"));
            }
        }
        let f = self.split.train_fraction;
        if !(f > 0.0 && f < 1.0) {
            return Err(FoldkitError::config(format!(
                "train_fraction must lie in (0, 1), got {}",
                f
            )));
        }
        match self.resampling {
            Resampling::KFold { k, repeats } => {
                if k < 2 {
                    return Err(FoldkitError::config(format!("k must be at least 2, got {}", k)));
                }
                if repeats < 1 {
                    return Err(FoldkitError::config("repeats must be at least 1"));
                }
            }
            Resampling::Bootstrap { iterations } => {
                if iterations < 1 {
                    return Err(FoldkitError::config("bootstrap needs at least one iteration"));
                }
                if self.stratum.is_some() {
                    return Err(FoldkitError::config("stratum only applies to k-fold resampling"));
                }
            }
        }
        if self.metric.is_classification() != self.family.is_classification() {
            return Err(FoldkitError::config(format!(
                "metric {} does not apply to {}",
                self.metric, self.family
            )));
        }
        if self.event_level.is_some() && !self.family.is_classification() {
            return Err(FoldkitError::config("event_level only applies to classification"));
        }
        self.family.validate_grid(&self.grid)?;
        self.grid.configurations()?;
        if let Some(s) = self.budget.max_seconds {
            if !(s.is_finite() && s >= 0.0) {
                return Err(FoldkitError::config(format!("budget max_seconds must be non-negative, got {}", s)));
            }
        }
        if self.workers == Some(0) {
            return Err(FoldkitError::config("workers must be at least 1"));
        }
        if self.importance.repeats == 0 {
            return Err(FoldkitError::config("importance repeats must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foldkit_preprocessing::{Encoding, Selector};

    const JSON: &str = r#"{
        "outcome": "attrition",
        "stratum": "attrition",
        "split": { "train_fraction": 0.7, "stratify_by": "attrition", "seed": 123 },
        "resampling": { "strategy": "k_fold", "k": 5, "repeats": 2 },
        "resampling_seed": 7,
        "steps": [
            { "step": "encode", "selector": "all_nominal_predictors", "encoding": { "one_hot": { "full_rank": true } } },
            { "step": "normalize", "selector": "all_numeric_predictors" }
        ],
        "family": "logistic",
        "grid": { "params": { "penalty": [0.001, 0.01, 0.1] } },
        "metric": "roc_auc",
        "one_std_err": true,
        "budget": { "max_cells": 100 },
        "workers": 2,
        "event_level": "Yes"
    }"#;

    #[test]
    fn test_parse_json() {
        let cfg: WorkflowConfig = serde_json::from_str(JSON).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.resampling, Resampling::KFold { k: 5, repeats: 2 });
        assert_eq!(cfg.split.breaks, 4);
        assert_eq!(cfg.family, ModelFamily::Logistic);
        assert_eq!(cfg.metric, Metric::RocAuc);
        assert_eq!(cfg.budget.max_cells, Some(100));
        assert_eq!(cfg.importance, ImportanceOptions::default());
        assert_eq!(
            cfg.steps[0],
            Step::Encode {
                selector: Selector::AllNominalPredictors,
                encoding: Encoding::OneHot { full_rank: true },
            }
        );
        assert_eq!(cfg.predictor_spec(), PredictorSpec::AllExcept(vec![]));
    }

    fn base() -> WorkflowConfig {
        WorkflowConfig::new(
            "y",
            SplitOptions::new(0.7, 1),
            Resampling::KFold { k: 10, repeats: 1 },
            ModelFamily::LinearRegression,
            Metric::Rmse,
        )
    }

    #[test]
    fn test_validate_rejects_inconsistent_settings() {
        base().validate().unwrap();

        let mut c = base();
        c.metric = Metric::Accuracy;
        assert!(c.validate().is_err());

        let mut c = base();
        c.split.train_fraction = 1.0;
        assert!(c.validate().is_err());

        let mut c = base();
        c.resampling = Resampling::KFold { k: 1, repeats: 1 };
        assert!(c.validate().is_err());

        let mut c = base();
        c.family = ModelFamily::ElasticNet;
        assert!(c.validate().is_err(), "elastic net needs a penalty grid");
        c.grid = HyperGrid::new().param("penalty", vec![0.1]);
        c.validate().unwrap();

        let mut c = base();
        c.workers = Some(0);
        assert!(c.validate().is_err());

        let mut c = base();
        c.event_level = Some("Yes".into());
        assert!(c.validate().is_err());
    }
}

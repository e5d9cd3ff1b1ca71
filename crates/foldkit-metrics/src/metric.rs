use foldkit_core::{FoldkitError, Predictions, Result, Target};
use serde::{Deserialize, Serialize};

use crate::classification;
use crate::regression;

/// Whether smaller or larger metric values are better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Minimize,
    Maximize,
}

impl Direction {
    /// True when `a` is strictly better than `b`.
    pub fn better(self, a: f64, b: f64) -> bool {
        match self {
            Direction::Minimize => a < b,
            Direction::Maximize => a > b,
        }
    }
}

/// Metrics a sweep can score folds with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Mse,
    Rmse,
    Mae,
    Rmsle,
    Rsq,
    Accuracy,
    Misclassification,
    MeanPerClassError,
    Brier,
    LogLoss,
    Precision,
    Recall,
    Specificity,
    RocAuc,
}

impl Metric {
    pub fn name(self) -> &'static str {
        match self {
            Metric::Mse => "mse",
            Metric::Rmse => "rmse",
            Metric::Mae => "mae",
            Metric::Rmsle => "rmsle",
            Metric::Rsq => "rsq",
            Metric::Accuracy => "accuracy",
            Metric::Misclassification => "misclassification",
            Metric::MeanPerClassError => "mean_per_class_error",
            Metric::Brier => "brier",
            Metric::LogLoss => "log_loss",
            Metric::Precision => "precision",
            Metric::Recall => "recall",
            Metric::Specificity => "specificity",
            Metric::RocAuc => "roc_auc",
        }
    }

    pub fn direction(self) -> Direction {
        match self {
            Metric::Rsq
            | Metric::Accuracy
            | Metric::Precision
            | Metric::Recall
            | Metric::Specificity
            | Metric::RocAuc => Direction::Maximize,
            _ => Direction::Minimize,
        }
    }

    pub fn is_classification(self) -> bool {
        !matches!(
            self,
            Metric::Mse | Metric::Rmse | Metric::Mae | Metric::Rmsle | Metric::Rsq
        )
    }

    /// Score predictions with the last outcome level as the event class.
    pub fn evaluate(self, truth: &Target, predictions: &Predictions) -> Result<f64> {
        self.evaluate_with_event(truth, predictions, None)
    }

    /// Score predictions; `event` names the positive class for binary
    /// precision, recall, specificity and ROC AUC.
    pub fn evaluate_with_event(
        self,
        truth: &Target,
        predictions: &Predictions,
        event: Option<&str>,
    ) -> Result<f64> {
        match (truth, predictions) {
            (Target::Numeric(t), Predictions::Numeric(p)) => match self {
                Metric::Mse => regression::mse(t, p),
                Metric::Rmse => regression::rmse(t, p),
                Metric::Mae => regression::mae(t, p),
                Metric::Rmsle => regression::rmsle(t, p),
                Metric::Rsq => regression::rsq(t, p),
                _ => Err(self.mismatch("a numeric outcome")),
            },
            (
                Target::Class { codes, levels },
                Predictions::Class {
                    labels,
                    probabilities,
                    ..
                },
            ) => {
                let k = levels.len();
                let event = event_code(levels, event)?;
                match self {
                    Metric::Accuracy => classification::accuracy(codes, labels, k),
                    Metric::Misclassification => classification::misclassification(codes, labels, k),
                    Metric::MeanPerClassError => {
                        classification::mean_per_class_error(codes, labels, k)
                    }
                    Metric::Brier => classification::brier(codes, probabilities),
                    Metric::LogLoss => classification::log_loss(codes, probabilities),
                    Metric::Precision => classification::precision(codes, labels, k, event),
                    Metric::Recall => classification::recall(codes, labels, k, event),
                    Metric::Specificity => classification::specificity(codes, labels, k, event),
                    Metric::RocAuc => classification::roc_auc(codes, probabilities, event),
                    _ => Err(self.mismatch("a categorical outcome")),
                }
            }
            _ => Err(FoldkitError::config(format!(
                "{}: predictions do not match the outcome kind",
                self.name()
            ))),
        }
    }

    fn mismatch(self, what: &str) -> FoldkitError {
        FoldkitError::config(format!("metric {} cannot score {}", self.name(), what))
    }
}

fn event_code(levels: &[String], event: Option<&str>) -> Result<usize> {
    match event {
        None => Ok(levels.len().saturating_sub(1)),
        Some(name) => levels.iter().position(|l| l == name).ok_or_else(|| {
            FoldkitError::config(format!("positive class '{}' is not an outcome level", name))
        }),
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

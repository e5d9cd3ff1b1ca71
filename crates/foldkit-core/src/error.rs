use thiserror::Error;

/// Error type shared by every foldkit crate.
///
/// Variants split into two groups: cell-level failures the hyperparameter
/// sweep excludes and keeps going past (`MetricDomain`, `FitConvergence`,
/// `SingularMatrix`), and everything else, which rejects the whole operation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FoldkitError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Metric {metric} is undefined here: {reason}")]
    MetricDomain { metric: String, reason: String },

    #[error("Model failed to converge: {0}")]
    FitConvergence(String),

    #[error("Transform leakage violation: {0}")]
    TransformLeakage(String),

    #[error("Singular matrix: cannot invert or decompose")]
    SingularMatrix,

    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("Column not found: {0}")]
    ColumnNotFound(String),
}

impl FoldkitError {
    pub fn config(msg: impl Into<String>) -> Self {
        FoldkitError::Configuration(msg.into())
    }

    pub fn metric_domain(metric: &str, reason: impl Into<String>) -> Self {
        FoldkitError::MetricDomain {
            metric: metric.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether a failure inside one (configuration, fold) cell can be
    /// recorded as a missing metric instead of aborting the sweep.
    pub fn is_cell_recoverable(&self) -> bool {
        matches!(
            self,
            FoldkitError::MetricDomain { .. }
                | FoldkitError::FitConvergence(_)
                | FoldkitError::SingularMatrix
        )
    }
}

pub type Result<T> = std::result::Result<T, FoldkitError>;

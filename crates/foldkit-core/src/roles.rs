use crate::error::{FoldkitError, Result};
use crate::frame::DataFrame;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnRole {
    Outcome,
    Predictor,
    Stratum,
}

/// How predictors are chosen before resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PredictorSpec {
    /// Every column except the outcome, the stratum, and the listed names.
    AllExcept(Vec<String>),
    /// Exactly these columns.
    Explicit(Vec<String>),
}

impl Default for PredictorSpec {
    fn default() -> Self {
        PredictorSpec::AllExcept(Vec::new())
    }
}

/// Resolved column roles for one modeling task.
///
/// Resolution happens once, against the loaded frame; the predictor list is
/// never re-derived from later subsets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Roles {
    pub outcome: String,
    pub predictors: Vec<String>,
    pub stratum: Option<String>,
}

impl Roles {
    pub fn resolve(
        frame: &DataFrame,
        outcome: &str,
        predictors: &PredictorSpec,
        stratum: Option<&str>,
    ) -> Result<Self> {
        frame.column(outcome)?;
        if let Some(s) = stratum {
            frame.column(s)?;
        }
        let resolved: Vec<String> = match predictors {
            PredictorSpec::AllExcept(excluded) => frame
                .column_names()
                .into_iter()
                .filter(|n| n != outcome && Some(n.as_str()) != stratum && !excluded.contains(n))
                .collect(),
            PredictorSpec::Explicit(names) => {
                for n in names {
                    frame.column(n)?;
                    if n == outcome {
                        return Err(FoldkitError::config(format!(
                            "outcome '{}' cannot also be a predictor",
                            n
                        )));
                    }
                }
                names.clone()
            }
        };
        if resolved.is_empty() {
            return Err(FoldkitError::config("no predictor columns resolved"));
        }
        Ok(Roles {
            outcome: outcome.to_string(),
            predictors: resolved,
            stratum: stratum.map(str::to_string),
        })
    }

    pub fn role_of(&self, column: &str) -> Option<ColumnRole> {
        if column == self.outcome {
            Some(ColumnRole::Outcome)
        } else if self.predictors.iter().any(|p| p == column) {
            Some(ColumnRole::Predictor)
        } else if self.stratum.as_deref() == Some(column) {
            Some(ColumnRole::Stratum)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Column;

    fn frame() -> DataFrame {
        DataFrame::new(vec![
            Column::numeric("price", vec![1.0, 2.0]),
            Column::numeric("area", vec![3.0, 4.0]),
            Column::from_strs("zone", &["a", "b"]),
            Column::from_strs("id", &["x", "y"]),
        ])
        .unwrap()
    }

    #[test]
    fn test_all_except_resolves_once() {
        let roles = Roles::resolve(
            &frame(),
            "price",
            &PredictorSpec::AllExcept(vec!["id".into()]),
            Some("zone"),
        )
        .unwrap();
        assert_eq!(roles.predictors, vec!["area"]);
        assert_eq!(roles.role_of("zone"), Some(ColumnRole::Stratum));
        assert_eq!(roles.role_of("id"), None);
    }

    #[test]
    fn test_explicit_rejects_outcome_and_unknown() {
        let df = frame();
        assert!(Roles::resolve(&df, "price", &PredictorSpec::Explicit(vec!["price".into()]), None).is_err());
        assert!(matches!(
            Roles::resolve(&df, "price", &PredictorSpec::Explicit(vec!["nope".into()]), None),
            Err(FoldkitError::ColumnNotFound(_))
        ));
    }
}

use foldkit_core::{ColumnKind, DataFrame, FoldkitError, Result};
use serde::{Deserialize, Serialize};

/// Which columns a step operates on. Resolved against the frame the step is
/// fit on; the outcome is only ever picked by naming it in `Columns`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selector {
    AllPredictors,
    AllNumericPredictors,
    AllNominalPredictors,
    Columns(Vec<String>),
}

impl Selector {
    pub fn resolve(&self, frame: &DataFrame, outcome: &str) -> Result<Vec<String>> {
        let predictors = frame.columns().iter().filter(|c| c.name() != outcome);
        let names = match self {
            Selector::AllPredictors => predictors.map(|c| c.name().to_string()).collect(),
            Selector::AllNumericPredictors => predictors
                .filter(|c| c.kind() == ColumnKind::Numeric)
                .map(|c| c.name().to_string())
                .collect(),
            Selector::AllNominalPredictors => predictors
                .filter(|c| c.kind() == ColumnKind::Categorical)
                .map(|c| c.name().to_string())
                .collect(),
            Selector::Columns(names) => {
                for n in names {
                    frame.column(n)?;
                }
                names.clone()
            }
        };
        Ok(names)
    }
}

/// Fail unless every named column has the given kind.
pub fn require_kind(frame: &DataFrame, columns: &[String], kind: ColumnKind, step: &str) -> Result<()> {
    for name in columns {
        let col = frame.column(name)?;
        if col.kind() != kind {
            return Err(FoldkitError::config(format!(
                "{} needs {:?} columns but '{}' is {:?}",
                step,
                kind,
                name,
                col.kind()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use foldkit_core::Column;

    fn frame() -> DataFrame {
        DataFrame::new(vec![
            Column::numeric("price", vec![1.0, 2.0]),
            Column::numeric("area", vec![3.0, 4.0]),
            Column::from_strs("zone", &["a", "b"]),
        ])
        .unwrap()
    }

    #[test]
    fn test_outcome_never_implicit() {
        let df = frame();
        assert_eq!(
            Selector::AllNumericPredictors.resolve(&df, "price").unwrap(),
            vec!["area".to_string()]
        );
        assert_eq!(
            Selector::AllPredictors.resolve(&df, "price").unwrap(),
            vec!["area".to_string(), "zone".to_string()]
        );
        assert_eq!(
            Selector::AllNominalPredictors.resolve(&df, "price").unwrap(),
            vec!["zone".to_string()]
        );
    }

    #[test]
    fn test_explicit_columns_must_exist() {
        let df = frame();
        assert!(matches!(
            Selector::Columns(vec!["nope".into()]).resolve(&df, "price"),
            Err(FoldkitError::ColumnNotFound(_))
        ));
    }

    #[test]
    fn test_require_kind() {
        let df = frame();
        assert!(require_kind(&df, &["zone".into()], ColumnKind::Numeric, "normalize").is_err());
        assert!(require_kind(&df, &["area".into()], ColumnKind::Numeric, "normalize").is_ok());
    }
}

use crate::error::{FoldkitError, Result};
use crate::frame::Column;
use crate::matrix::Matrix;
use serde::{Deserialize, Serialize};

/// Outcome values of a modeling task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Target {
    Numeric(Vec<f64>),
    /// Class codes index into `levels`.
    Class { codes: Vec<usize>, levels: Vec<String> },
}

impl Target {
    /// Numeric outcomes are copied, categorical ones coded against `levels`
    /// (or the column's own sorted levels when `levels` is `None`).
    pub fn from_column(column: &Column, levels: Option<&[String]>) -> Result<Self> {
        if let Some(v) = column.as_numeric() {
            if v.iter().any(|x| x.is_nan()) {
                return Err(FoldkitError::config(format!(
                    "outcome '{}' has missing values",
                    column.name()
                )));
            }
            return Ok(Target::Numeric(v.to_vec()));
        }
        let values = column.categorical_values()?;
        let levels: Vec<String> = match levels {
            Some(l) => l.to_vec(),
            None => column.levels(),
        };
        let codes = values
            .iter()
            .map(|v| {
                let v = v.as_ref().ok_or_else(|| {
                    FoldkitError::config(format!("outcome '{}' has missing values", column.name()))
                })?;
                levels.iter().position(|l| l == v).ok_or_else(|| {
                    FoldkitError::config(format!(
                        "outcome class '{}' was not seen when the model was fit",
                        v
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Target::Class { codes, levels })
    }

    pub fn len(&self) -> usize {
        match self {
            Target::Numeric(v) => v.len(),
            Target::Class { codes, .. } => codes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_class(&self) -> bool {
        matches!(self, Target::Class { .. })
    }

    pub fn select(&self, indices: &[usize]) -> Target {
        match self {
            Target::Numeric(v) => Target::Numeric(indices.iter().map(|&i| v[i]).collect()),
            Target::Class { codes, levels } => Target::Class {
                codes: indices.iter().map(|&i| codes[i]).collect(),
                levels: levels.clone(),
            },
        }
    }
}

/// Model output for a set of rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predictions {
    Numeric(Vec<f64>),
    /// `probabilities` is `[rows, levels.len()]`; `labels` the argmax codes.
    Class {
        labels: Vec<usize>,
        probabilities: Matrix,
        levels: Vec<String>,
    },
}

impl Predictions {
    /// Class predictions from a probability matrix; ties go to the lower code.
    pub fn from_probabilities(probabilities: Matrix, levels: Vec<String>) -> Self {
        let labels = (0..probabilities.rows())
            .map(|i| {
                let row = probabilities.row(i);
                let mut best = 0;
                for (j, &p) in row.iter().enumerate() {
                    if p > row[best] {
                        best = j;
                    }
                }
                best
            })
            .collect();
        Predictions::Class {
            labels,
            probabilities,
            levels,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Predictions::Numeric(v) => v.len(),
            Predictions::Class { labels, .. } => labels.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_target_uses_given_levels() {
        let col = Column::from_strs("attrition", &["Yes", "No", "No"]);
        let t = Target::from_column(&col, Some(&["No".to_string(), "Yes".to_string()])).unwrap();
        assert_eq!(
            t,
            Target::Class {
                codes: vec![1, 0, 0],
                levels: vec!["No".into(), "Yes".into()]
            }
        );
        assert!(Target::from_column(&col, Some(&["No".to_string()])).is_err());
    }

    #[test]
    fn test_argmax_labels() {
        let p = Matrix::from_rows(&[vec![0.2, 0.8], vec![0.5, 0.5]]).unwrap();
        match Predictions::from_probabilities(p, vec!["a".into(), "b".into()]) {
            Predictions::Class { labels, .. } => assert_eq!(labels, vec![1, 0]),
            _ => unreachable!(),
        }
    }
}

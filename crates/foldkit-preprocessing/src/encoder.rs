use foldkit_core::{Column, ColumnKind, DataFrame, Result};
use serde::{Deserialize, Serialize};

use crate::selector::require_kind;

/// How categorical columns become numeric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    /// Indicator columns `<column>_<level>`. With `full_rank` the first level
    /// is dropped, leaving n − 1 dummies, and an unseen category then encodes
    /// exactly like that reference level.
    OneHot { full_rank: bool },
    /// Integer codes into the sorted fit levels.
    Label,
}

/// Categorical encoder with levels learned on the fit rows.
///
/// Categories not seen at fit time never raise: one-hot gives them the zero
/// vector and label encoding the code `levels.len()`. Missing stays missing.
/// Under full-rank one-hot the zero vector is also the reference level's
/// encoding, so a model cannot tell an unseen category from the first level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalEncoder {
    pub encoding: Encoding,
    pub columns: Vec<String>,
    pub levels: Vec<Vec<String>>,
}

impl CategoricalEncoder {
    pub fn fit(frame: &DataFrame, columns: &[String], encoding: Encoding) -> Result<Self> {
        require_kind(frame, columns, ColumnKind::Categorical, "encode")?;
        let levels = columns
            .iter()
            .map(|name| Ok(frame.column(name)?.levels()))
            .collect::<Result<Vec<_>>>()?;
        Ok(CategoricalEncoder {
            encoding,
            columns: columns.to_vec(),
            levels,
        })
    }

    /// Names of the columns `column` expands into.
    pub fn output_names(&self, index: usize) -> Vec<String> {
        let name = &self.columns[index];
        match self.encoding {
            Encoding::Label => vec![name.clone()],
            Encoding::OneHot { full_rank } => self.levels[index]
                .iter()
                .skip(usize::from(full_rank))
                .map(|l| format!("{}_{}", name, l))
                .collect(),
        }
    }

    pub fn apply(&self, frame: &DataFrame) -> Result<DataFrame> {
        let mut out = frame.clone();
        for (index, (name, levels)) in self.columns.iter().zip(&self.levels).enumerate() {
            let values = frame.column(name)?.categorical_values()?;
            let codes: Vec<Option<usize>> = values
                .iter()
                .map(|v| {
                    v.as_ref()
                        .map(|s| levels.binary_search(s).unwrap_or(levels.len()))
                })
                .collect();
            let replacement = match self.encoding {
                Encoding::Label => vec![Column::numeric(
                    name.clone(),
                    codes.iter().map(|c| c.map_or(f64::NAN, |c| c as f64)).collect(),
                )],
                Encoding::OneHot { full_rank } => {
                    let first = usize::from(full_rank);
                    self.output_names(index)
                        .into_iter()
                        .zip(first..levels.len())
                        .map(|(out_name, level)| {
                            let indicator = codes
                                .iter()
                                .map(|c| match c {
                                    None => f64::NAN,
                                    Some(c) if *c == level => 1.0,
                                    Some(_) => 0.0,
                                })
                                .collect();
                            Column::numeric(out_name, indicator)
                        })
                        .collect()
                }
            };
            out = out.splice_columns(std::slice::from_ref(name), replacement)?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fit_frame() -> DataFrame {
        DataFrame::new(vec![
            Column::numeric("age", vec![30.0, 40.0, 50.0]),
            Column::from_strs("dept", &["sales", "hr", "rnd"]),
            Column::from_strs("attrition", &["No", "Yes", "No"]),
        ])
        .unwrap()
    }

    fn later() -> DataFrame {
        DataFrame::new(vec![
            Column::numeric("age", vec![1.0, 2.0, 3.0]),
            Column::categorical("dept", vec![Some("rnd".into()), Some("legal".into()), None]),
            Column::from_strs("attrition", &["No", "No", "No"]),
        ])
        .unwrap()
    }

    #[test]
    fn test_one_hot_indicators_in_place() {
        let enc = CategoricalEncoder::fit(&fit_frame(), &["dept".to_string()], Encoding::OneHot { full_rank: false })
            .unwrap();
        let out = enc.apply(&later()).unwrap();
        assert_eq!(
            out.column_names(),
            vec!["age", "dept_hr", "dept_rnd", "dept_sales", "attrition"]
        );
        assert_eq!(out.column("dept_rnd").unwrap().as_numeric().unwrap()[0], 1.0);
        // unseen level: zero vector
        for c in ["dept_hr", "dept_rnd", "dept_sales"] {
            assert_eq!(out.column(c).unwrap().as_numeric().unwrap()[1], 0.0);
            assert!(out.column(c).unwrap().as_numeric().unwrap()[2].is_nan());
        }
    }

    #[test]
    fn test_full_rank_drops_first_level() {
        let enc = CategoricalEncoder::fit(&fit_frame(), &["dept".to_string()], Encoding::OneHot { full_rank: true })
            .unwrap();
        let out = enc.apply(&fit_frame()).unwrap();
        assert_eq!(out.column_names(), vec!["age", "dept_rnd", "dept_sales", "attrition"]);
    }

    #[test]
    fn test_full_rank_unseen_matches_reference_level() {
        let enc = CategoricalEncoder::fit(&fit_frame(), &["dept".to_string()], Encoding::OneHot { full_rank: true })
            .unwrap();
        let frame = DataFrame::new(vec![
            Column::numeric("age", vec![1.0, 2.0]),
            Column::from_strs("dept", &["hr", "legal"]),
            Column::from_strs("attrition", &["No", "No"]),
        ])
        .unwrap();
        let out = enc.apply(&frame).unwrap();
        for c in ["dept_rnd", "dept_sales"] {
            assert_eq!(out.column(c).unwrap().as_numeric().unwrap(), &[0.0, 0.0]);
        }
    }

    #[test]
    fn test_label_codes_with_unseen_code() {
        let enc = CategoricalEncoder::fit(&fit_frame(), &["dept".to_string()], Encoding::Label).unwrap();
        let out = enc.apply(&later()).unwrap();
        let v = out.column("dept").unwrap().as_numeric().unwrap();
        assert_eq!(v[0], 1.0);
        assert_eq!(v[1], 3.0);
        assert!(v[2].is_nan());
    }
}

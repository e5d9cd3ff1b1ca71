use foldkit_core::{Column, ColumnData, DataFrame, FoldkitError, Matrix, Result};
use foldkit_tree::{DecisionTreeClassifier, DecisionTreeRegressor, TreeParams};
use serde::{Deserialize, Serialize};

use super::mode_category;

/// Per-column model predicting that column from the other selected ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum ColumnModel {
    Numeric(DecisionTreeRegressor),
    Categorical(DecisionTreeClassifier),
}

/// Column encoded for the trees: numeric values, or category codes into the
/// fit levels (unseen levels get `levels.len()`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Encoded {
    levels: Option<Vec<String>>,
    initial: f64,
}

/// Chained-equation imputer with CART trees.
///
/// Gaps start at the fit-row mean (numeric) or mode (categorical). Each pass
/// then re-predicts every gap from the other selected columns with a tree per
/// column: regression trees for numeric columns, Gini classification trees for
/// categorical ones. The trees kept are the ones grown in the last pass over
/// the fit rows; applying runs the same number of passes with them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeImputer {
    pub iterations: usize,
    pub columns: Vec<String>,
    encodings: Vec<Encoded>,
    models: Vec<ColumnModel>,
}

impl TreeImputer {
    pub fn fit(frame: &DataFrame, columns: &[String], iterations: usize, max_depth: usize) -> Result<Self> {
        if iterations < 1 {
            return Err(FoldkitError::config("tree imputation needs at least one iteration"));
        }
        let params = TreeParams {
            max_depth,
            min_samples_split: 2,
            min_samples_leaf: 1,
        };

        let mut encodings = Vec::with_capacity(columns.len());
        for name in columns {
            let col = frame.column(name)?;
            let no_observed = || {
                FoldkitError::config(format!("column '{}' has no observed values to impute from", name))
            };
            let enc = match col.data() {
                ColumnData::Numeric(v) => {
                    let observed: Vec<f64> = v.iter().copied().filter(|x| !x.is_nan()).collect();
                    if observed.is_empty() {
                        return Err(no_observed());
                    }
                    Encoded {
                        levels: None,
                        initial: observed.iter().sum::<f64>() / observed.len() as f64,
                    }
                }
                ColumnData::Categorical(v) => {
                    let levels = col.levels();
                    let mode = mode_category(v.iter().flatten()).ok_or_else(no_observed)?;
                    let initial = levels.iter().position(|l| *l == mode).unwrap_or(0) as f64;
                    Encoded {
                        levels: Some(levels),
                        initial,
                    }
                }
            };
            encodings.push(enc);
        }

        let mut imputer = TreeImputer {
            iterations,
            columns: columns.to_vec(),
            encodings,
            models: Vec::new(),
        };

        let (mut work, missing) = imputer.encode(frame)?;
        for _ in 0..iterations {
            let mut models = Vec::with_capacity(columns.len());
            for j in 0..columns.len() {
                let observed: Vec<usize> = (0..work[j].len()).filter(|&r| !missing[j][r]).collect();
                let x = features_without(&work, j)?.select_rows(&observed);
                let model = match &imputer.encodings[j].levels {
                    None => {
                        let y: Vec<f64> = observed.iter().map(|&r| work[j][r]).collect();
                        let mut tree = DecisionTreeRegressor::new(params);
                        tree.fit(&x, &y)?;
                        ColumnModel::Numeric(tree)
                    }
                    Some(levels) => {
                        let y: Vec<usize> = observed.iter().map(|&r| work[j][r] as usize).collect();
                        let mut tree = DecisionTreeClassifier::new(params);
                        tree.fit(&x, &y, levels.len())?;
                        ColumnModel::Categorical(tree)
                    }
                };
                refill(&mut work, &missing, j, &model)?;
                models.push(model);
            }
            imputer.models = models;
        }
        Ok(imputer)
    }

    /// Encode the selected columns, with gaps set to their initial fill.
    fn encode(&self, frame: &DataFrame) -> Result<(Vec<Vec<f64>>, Vec<Vec<bool>>)> {
        let mut work = Vec::with_capacity(self.columns.len());
        let mut missing = Vec::with_capacity(self.columns.len());
        for (name, enc) in self.columns.iter().zip(&self.encodings) {
            let col = frame.column(name)?;
            let (values, gaps): (Vec<f64>, Vec<bool>) = match (&enc.levels, col.data()) {
                (None, ColumnData::Numeric(v)) => v
                    .iter()
                    .map(|&x| if x.is_nan() { (enc.initial, true) } else { (x, false) })
                    .unzip(),
                (Some(levels), ColumnData::Categorical(v)) => v
                    .iter()
                    .map(|x| match x {
                        None => (enc.initial, true),
                        Some(s) => (levels.binary_search(s).unwrap_or(levels.len()) as f64, false),
                    })
                    .unzip(),
                _ => {
                    return Err(FoldkitError::config(format!(
                        "column '{}' changed kind since the imputer was fit",
                        name
                    )))
                }
            };
            work.push(values);
            missing.push(gaps);
        }
        Ok((work, missing))
    }

    pub fn apply(&self, frame: &DataFrame) -> Result<DataFrame> {
        let (mut work, missing) = self.encode(frame)?;
        if missing.iter().flatten().any(|&m| m) {
            for _ in 0..self.iterations {
                for (j, model) in self.models.iter().enumerate() {
                    refill(&mut work, &missing, j, model)?;
                }
            }
        }

        let mut out = frame.clone();
        for (j, (name, enc)) in self.columns.iter().zip(&self.encodings).enumerate() {
            if !missing[j].iter().any(|&m| m) {
                continue;
            }
            let column = match &enc.levels {
                None => Column::numeric(name.clone(), work[j].clone()),
                Some(levels) => {
                    let original = frame.column(name)?.categorical_values()?;
                    Column::categorical(
                        name.clone(),
                        original
                            .iter()
                            .zip(&work[j])
                            .map(|(v, &code)| match v {
                                Some(s) => Some(s.clone()),
                                None => levels.get(code as usize).cloned(),
                            })
                            .collect(),
                    )
                }
            };
            out.put_column(column)?;
        }
        Ok(out)
    }
}

fn features_without(work: &[Vec<f64>], skip: usize) -> Result<Matrix> {
    let n = work.first().map_or(0, |c| c.len());
    let cols: Vec<Vec<f64>> = work
        .iter()
        .enumerate()
        .filter(|&(k, _)| k != skip)
        .map(|(_, c)| c.clone())
        .collect();
    if cols.is_empty() {
        return Ok(Matrix::zeros(n, 0));
    }
    Matrix::from_columns(&cols)
}

/// Overwrite the gaps of column `j` with the model's predictions.
fn refill(work: &mut [Vec<f64>], missing: &[Vec<bool>], j: usize, model: &ColumnModel) -> Result<()> {
    let gaps: Vec<usize> = (0..work[j].len()).filter(|&r| missing[j][r]).collect();
    if gaps.is_empty() {
        return Ok(());
    }
    let x = features_without(work, j)?.select_rows(&gaps);
    let predicted: Vec<f64> = match model {
        ColumnModel::Numeric(tree) => tree.predict(&x)?,
        ColumnModel::Categorical(tree) => tree.predict(&x)?.into_iter().map(|c| c as f64).collect(),
    };
    for (&r, p) in gaps.iter().zip(predicted) {
        work[j][r] = p;
    }
    Ok(())
}

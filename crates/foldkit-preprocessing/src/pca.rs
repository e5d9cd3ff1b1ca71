use foldkit_core::{Column, ColumnKind, DataFrame, FoldkitError, Matrix, Result};
use foldkit_linalg::symmetric_eigen;
use serde::{Deserialize, Serialize};

use crate::selector::require_kind;

/// How many components a PCA step keeps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Retain {
    /// Smallest k whose cumulative explained variance reaches the fraction.
    Threshold(f64),
    NumComp(usize),
}

/// Principal Component Analysis (PCA).
///
/// Directions come from the eigen-decomposition of the fit rows' covariance
/// matrix; inputs are centered but not scaled, so add a normalize step first
/// when the columns are on different scales. Outputs `PC1..PCk` replace the
/// input columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pca {
    pub columns: Vec<String>,
    pub means: Vec<f64>,
    /// `[n_features, k]`, one loading vector per column.
    pub rotation: Matrix,
    /// Eigenvalues of every component, descending.
    pub variances: Vec<f64>,
}

impl Pca {
    pub fn fit(frame: &DataFrame, columns: &[String], retain: Retain) -> Result<Self> {
        require_kind(frame, columns, ColumnKind::Numeric, "pca")?;
        if columns.is_empty() {
            return Err(FoldkitError::config("pca needs at least one column"));
        }
        let x = numeric_block(frame, columns)?;
        if x.has_nan() {
            return Err(FoldkitError::config("pca input has missing values; impute first"));
        }
        let n = x.rows();
        if n < 2 {
            return Err(FoldkitError::config("pca needs at least two fit rows"));
        }
        let means = x.column_means();
        let centered = x.centered(&means);
        let scatter = centered.t().matmul(&centered)?;
        let cov = Matrix::new(
            scatter.data().iter().map(|v| v / (n - 1) as f64).collect(),
            columns.len(),
            columns.len(),
        )?;
        let eig = symmetric_eigen(&cov)?;
        let variances: Vec<f64> = eig.values.iter().map(|v| v.max(0.0)).collect();

        let p = columns.len();
        let k = match retain {
            Retain::NumComp(k) => {
                if k == 0 {
                    return Err(FoldkitError::config("num_comp must be at least 1"));
                }
                k.min(p)
            }
            Retain::Threshold(t) => {
                if !(t > 0.0 && t <= 1.0) {
                    return Err(FoldkitError::config(format!(
                        "pca threshold must lie in (0, 1], got {}",
                        t
                    )));
                }
                components_for_threshold(&variances, t)
            }
        };
        let keep: Vec<usize> = (0..k).collect();
        Ok(Pca {
            columns: columns.to_vec(),
            means,
            rotation: eig.vectors.select_cols(&keep),
            variances,
        })
    }

    pub fn n_components(&self) -> usize {
        self.rotation.cols()
    }

    /// Fraction of total variance carried by each component.
    pub fn explained_variance_ratio(&self) -> Vec<f64> {
        let total: f64 = self.variances.iter().sum();
        self.variances
            .iter()
            .map(|v| if total > 0.0 { v / total } else { 0.0 })
            .collect()
    }

    pub fn apply(&self, frame: &DataFrame) -> Result<DataFrame> {
        let x = numeric_block(frame, &self.columns)?;
        let scores = x.centered(&self.means).matmul(&self.rotation)?;
        let replacement = (0..self.n_components())
            .map(|j| Column::numeric(format!("PC{}", j + 1), scores.col(j)))
            .collect();
        frame.splice_columns(&self.columns, replacement)
    }
}

fn components_for_threshold(variances: &[f64], threshold: f64) -> usize {
    let total: f64 = variances.iter().sum();
    if total <= 0.0 {
        return 1;
    }
    let mut cumulative = 0.0;
    for (i, v) in variances.iter().enumerate() {
        cumulative += v / total;
        if cumulative >= threshold - 1e-12 {
            return i + 1;
        }
    }
    variances.len()
}

fn numeric_block(frame: &DataFrame, columns: &[String]) -> Result<Matrix> {
    let cols = columns
        .iter()
        .map(|name| Ok(frame.column(name)?.numeric_values()?.to_vec()))
        .collect::<Result<Vec<_>>>()?;
    Matrix::from_columns(&cols)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn correlated() -> DataFrame {
        let a: Vec<f64> = (0..50).map(|i| i as f64).collect();
        let b: Vec<f64> = a.iter().map(|v| 2.0 * v + if (*v as usize) % 2 == 0 { 0.5 } else { -0.5 }).collect();
        DataFrame::new(vec![
            Column::numeric("a", a),
            Column::numeric("b", b),
            Column::from_strs("label", &["x"; 50]),
        ])
        .unwrap()
    }

    fn ab() -> Vec<String> {
        vec!["a".into(), "b".into()]
    }

    #[test]
    fn test_threshold_keeps_one_component() {
        let df = correlated();
        let pca = Pca::fit(&df, &ab(), Retain::Threshold(0.95)).unwrap();
        assert_eq!(pca.n_components(), 1);
        assert!(pca.explained_variance_ratio()[0] > 0.99);

        let out = pca.apply(&df).unwrap();
        assert_eq!(out.column_names(), vec!["PC1", "label"]);
        let pc1 = out.column("PC1").unwrap().as_numeric().unwrap();
        // scores are centered on the fit rows
        assert_abs_diff_eq!(pc1.iter().sum::<f64>(), 0.0, epsilon = 1e-8);
    }

    #[test]
    fn test_num_comp_is_capped() {
        let pca = Pca::fit(&correlated(), &ab(), Retain::NumComp(5)).unwrap();
        assert_eq!(pca.n_components(), 2);
    }

    #[test]
    fn test_missing_values_rejected() {
        let df = DataFrame::new(vec![
            Column::numeric("a", vec![1.0, f64::NAN, 3.0]),
            Column::numeric("b", vec![1.0, 2.0, 3.0]),
        ])
        .unwrap();
        assert!(Pca::fit(&df, &ab(), Retain::NumComp(1)).is_err());
    }
}

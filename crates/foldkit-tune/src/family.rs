use foldkit_core::{FoldkitError, Matrix, Predictions, Result, Target};
use foldkit_linear::{
    ElasticNet, LinearRegression, LogisticRegression, PartialLeastSquares, PrincipalComponentRegression,
};
use foldkit_neighbors::{KnnClassifier, KnnRegressor};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::grid::{Configuration, HyperGrid};

/// The closed set of model families a sweep can fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    /// Ordinary least squares.
    LinearRegression,
    /// `penalty` λ ≥ 0, `mixture` α ∈ [0, 1] (default 1, the lasso).
    ElasticNet,
    /// Principal component regression on `num_comp` components.
    PrincipalComponents,
    /// Partial least squares on `num_comp` components.
    PartialLeastSquares,
    NearestNeighborsRegression,
    NearestNeighborsClassification,
    /// Binary; optional `penalty` (default 0) and `mixture` (default 1).
    Logistic,
}

impl ModelFamily {
    pub fn name(self) -> &'static str {
        match self {
            ModelFamily::LinearRegression => "linear_regression",
            ModelFamily::ElasticNet => "elastic_net",
            ModelFamily::PrincipalComponents => "principal_components",
            ModelFamily::PartialLeastSquares => "partial_least_squares",
            ModelFamily::NearestNeighborsRegression => "nearest_neighbors_regression",
            ModelFamily::NearestNeighborsClassification => "nearest_neighbors_classification",
            ModelFamily::Logistic => "logistic",
        }
    }

    pub fn is_classification(self) -> bool {
        matches!(self, ModelFamily::NearestNeighborsClassification | ModelFamily::Logistic)
    }

    /// Hyperparameters the family reads.
    pub fn parameters(self) -> &'static [&'static str] {
        match self {
            ModelFamily::LinearRegression => &[],
            ModelFamily::ElasticNet | ModelFamily::Logistic => &["penalty", "mixture"],
            ModelFamily::PrincipalComponents | ModelFamily::PartialLeastSquares => &["num_comp"],
            ModelFamily::NearestNeighborsRegression | ModelFamily::NearestNeighborsClassification => {
                &["neighbors"]
            }
        }
    }

    /// Hyperparameters every configuration must set.
    fn required(self) -> &'static [&'static str] {
        match self {
            ModelFamily::ElasticNet => &["penalty"],
            ModelFamily::Logistic | ModelFamily::LinearRegression => &[],
            _ => self.parameters(),
        }
    }

    /// Reject grids that name unknown parameters, miss required ones or hold
    /// out-of-domain values.
    pub fn validate_grid(self, grid: &HyperGrid) -> Result<()> {
        for name in grid.params.keys() {
            if !self.parameters().contains(&name.as_str()) {
                return Err(FoldkitError::config(format!(
                    "{} does not take hyperparameter '{}'",
                    self.name(),
                    name
                )));
            }
        }
        for name in self.required() {
            if !grid.params.contains_key(*name) {
                return Err(FoldkitError::config(format!(
                    "{} needs hyperparameter '{}'",
                    self.name(),
                    name
                )));
            }
        }
        for (name, values) in &grid.params {
            for &v in values {
                let ok = match name.as_str() {
                    "penalty" => v >= 0.0,
                    "mixture" => (0.0..=1.0).contains(&v),
                    _ => v >= 1.0 && v.fract() == 0.0,
                };
                if !ok {
                    return Err(FoldkitError::config(format!("{} = {} is out of range", name, v)));
                }
            }
        }
        Ok(())
    }

    /// The outcome kind must suit the family before any cell runs.
    pub fn check_target(self, target: &Target) -> Result<()> {
        match (self.is_classification(), target) {
            (false, Target::Numeric(_)) => Ok(()),
            (true, Target::Class { levels, .. }) => {
                if self == ModelFamily::Logistic && levels.len() != 2 {
                    return Err(FoldkitError::config(format!(
                        "logistic regression needs exactly two outcome classes, got {}",
                        levels.len()
                    )));
                }
                Ok(())
            }
            (false, Target::Class { .. }) => Err(FoldkitError::config(format!(
                "{} needs a numeric outcome",
                self.name()
            ))),
            (true, Target::Numeric(_)) => Err(FoldkitError::config(format!(
                "{} needs a categorical outcome",
                self.name()
            ))),
        }
    }

    /// Order configurations from simplest to most complex: larger `penalty`,
    /// then fewer `num_comp`, then more `neighbors`.
    pub fn simplicity(self, a: &Configuration, b: &Configuration) -> Ordering {
        let get = |c: &Configuration, key: &str| c.get(key).copied().unwrap_or(0.0);
        get(b, "penalty")
            .total_cmp(&get(a, "penalty"))
            .then(get(a, "num_comp").total_cmp(&get(b, "num_comp")))
            .then(get(b, "neighbors").total_cmp(&get(a, "neighbors")))
    }

    /// Fit the family with one configuration on a numeric design matrix.
    pub fn fit(
        self,
        config: &Configuration,
        x: &Matrix,
        target: &Target,
        predictors: &[String],
    ) -> Result<FittedModel> {
        self.check_target(target)?;
        if x.cols() != predictors.len() {
            return Err(FoldkitError::ShapeMismatch {
                expected: vec![predictors.len()],
                got: vec![x.cols()],
            });
        }
        let param = |key: &str, default: Option<f64>| {
            config.get(key).copied().or(default).ok_or_else(|| {
                FoldkitError::config(format!("{} needs hyperparameter '{}'", self.name(), key))
            })
        };
        let count = |key: &str| param(key, None).map(|v| v as usize);

        let model = match target {
            Target::Numeric(y) => match self {
                ModelFamily::LinearRegression => {
                    let mut m = LinearRegression::new(true);
                    m.fit(x, y)?;
                    Model::Linear(m)
                }
                ModelFamily::ElasticNet => {
                    let mut m = ElasticNet::new(param("penalty", None)?, param("mixture", Some(1.0))?);
                    m.fit(x, y)?;
                    Model::ElasticNet(m)
                }
                ModelFamily::PrincipalComponents => {
                    let mut m = PrincipalComponentRegression::new(count("num_comp")?);
                    m.fit(x, y)?;
                    Model::PrincipalComponents(m)
                }
                ModelFamily::PartialLeastSquares => {
                    let mut m = PartialLeastSquares::new(count("num_comp")?);
                    m.fit(x, y)?;
                    Model::PartialLeastSquares(m)
                }
                _ => {
                    let mut m = KnnRegressor::new(count("neighbors")?);
                    m.fit(x, y)?;
                    Model::NeighborsRegression(m)
                }
            },
            Target::Class { codes, levels } => match self {
                ModelFamily::Logistic => {
                    let mut m =
                        LogisticRegression::new(param("penalty", Some(0.0))?, param("mixture", Some(1.0))?);
                    m.fit(x, codes)?;
                    Model::Logistic(m)
                }
                _ => {
                    let mut m = KnnClassifier::new(count("neighbors")?);
                    m.fit(x, codes, levels.len())?;
                    Model::NeighborsClassification(m)
                }
            },
        };

        Ok(FittedModel {
            family: self,
            config: config.clone(),
            predictors: predictors.to_vec(),
            predictor_sds: column_sds(x),
            levels: match target {
                Target::Class { levels, .. } => Some(levels.clone()),
                Target::Numeric(_) => None,
            },
            model,
        })
    }
}

impl std::fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Sample standard deviation of each column (0 for fewer than two rows).
fn column_sds(x: &Matrix) -> Vec<f64> {
    let n = x.rows();
    let means = x.column_means();
    (0..x.cols())
        .map(|j| {
            if n < 2 {
                return 0.0;
            }
            let ss: f64 = (0..n).map(|i| (x.get(i, j) - means[j]).powi(2)).sum();
            (ss / (n - 1) as f64).sqrt()
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Model {
    Linear(LinearRegression),
    ElasticNet(ElasticNet),
    PrincipalComponents(PrincipalComponentRegression),
    PartialLeastSquares(PartialLeastSquares),
    NeighborsRegression(KnnRegressor),
    NeighborsClassification(KnnClassifier),
    Logistic(LogisticRegression),
}

/// A model fit with one configuration, together with the predictor names
/// and class levels it was fit against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    family: ModelFamily,
    config: Configuration,
    predictors: Vec<String>,
    predictor_sds: Vec<f64>,
    levels: Option<Vec<String>>,
    model: Model,
}

impl FittedModel {
    pub fn family(&self) -> ModelFamily {
        self.family
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn predictors(&self) -> &[String] {
        &self.predictors
    }

    pub fn predict(&self, x: &Matrix) -> Result<Predictions> {
        let levels = || self.levels.clone().unwrap_or_default();
        Ok(match &self.model {
            Model::Linear(m) => Predictions::Numeric(m.predict(x)?),
            Model::ElasticNet(m) => Predictions::Numeric(m.predict(x)?),
            Model::PrincipalComponents(m) => Predictions::Numeric(m.predict(x)?),
            Model::PartialLeastSquares(m) => Predictions::Numeric(m.predict(x)?),
            Model::NeighborsRegression(m) => Predictions::Numeric(m.predict(x)?),
            Model::NeighborsClassification(m) => Predictions::from_probabilities(m.predict_proba(x)?, levels()),
            Model::Logistic(m) => {
                let p = m.predict_proba(x)?;
                let rows: Vec<Vec<f64>> = p.into_iter().map(|pi| vec![1.0 - pi, pi]).collect();
                let probabilities = if rows.is_empty() { Matrix::zeros(0, 2) } else { Matrix::from_rows(&rows)? };
                Predictions::from_probabilities(probabilities, levels())
            }
        })
    }

    fn weights_and_bias(&self) -> Option<(&[f64], f64)> {
        let (w, b) = match &self.model {
            Model::Linear(m) => (m.weights.as_deref(), m.bias),
            Model::ElasticNet(m) => (m.weights.as_deref(), m.bias),
            Model::PrincipalComponents(m) => (m.weights.as_deref(), m.bias),
            Model::PartialLeastSquares(m) => (m.weights.as_deref(), m.bias),
            Model::Logistic(m) => (m.weights.as_deref(), m.bias),
            Model::NeighborsRegression(_) | Model::NeighborsClassification(_) => return None,
        };
        Some((w?, b.unwrap_or(0.0)))
    }

    /// Coefficients by predictor name; `None` for families without them.
    pub fn coefficients(&self) -> Option<Vec<(String, f64)>> {
        let (w, _) = self.weights_and_bias()?;
        Some(self.predictors.iter().cloned().zip(w.iter().copied()).collect())
    }

    pub fn intercept(&self) -> Option<f64> {
        self.weights_and_bias().map(|(_, b)| b)
    }

    /// Coefficients times the sample standard deviation of their predictor
    /// over the fit rows, so magnitudes are comparable across predictors.
    pub fn standardized_coefficients(&self) -> Option<Vec<(String, f64)>> {
        let coef = self.coefficients()?;
        Some(
            coef.into_iter()
                .zip(&self.predictor_sds)
                .map(|((name, c), sd)| (name, c * sd))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn config(pairs: &[(&str, f64)]) -> Configuration {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn names(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("x{}", i)).collect()
    }

    #[test]
    fn test_linear_coefficients_by_name() {
        let x = Matrix::from_rows(&[vec![1.0, 2.0], vec![2.0, 1.0], vec![3.0, 4.0], vec![4.0, 3.0]]).unwrap();
        let y = Target::Numeric(vec![9.0, 8.0, 19.0, 18.0]);
        let model = ModelFamily::LinearRegression.fit(&Configuration::new(), &x, &y, &names(2)).unwrap();
        let coef = model.coefficients().unwrap();
        assert_eq!(coef[0].0, "x1");
        assert_abs_diff_eq!(coef[0].1, 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(coef[1].1, 3.0, epsilon = 1e-9);
        assert_abs_diff_eq!(model.intercept().unwrap(), 1.0, epsilon = 1e-9);
        assert!(matches!(model.predict(&x).unwrap(), Predictions::Numeric(_)));
    }

    #[test]
    fn test_outcome_kind_must_match() {
        let class = Target::Class {
            codes: vec![0, 1],
            levels: vec!["No".into(), "Yes".into()],
        };
        assert!(ModelFamily::ElasticNet.check_target(&class).is_err());
        assert!(ModelFamily::Logistic.check_target(&class).is_ok());
        assert!(ModelFamily::Logistic.check_target(&Target::Numeric(vec![1.0])).is_err());
        let three = Target::Class {
            codes: vec![0, 1, 2],
            levels: vec!["a".into(), "b".into(), "c".into()],
        };
        assert!(ModelFamily::Logistic.check_target(&three).is_err());
        assert!(ModelFamily::NearestNeighborsClassification.check_target(&three).is_ok());
    }

    #[test]
    fn test_grid_validation() {
        let ok = HyperGrid::new().param("penalty", vec![0.0, 1.0]).param("mixture", vec![0.5]);
        assert!(ModelFamily::ElasticNet.validate_grid(&ok).is_ok());
        let unknown = HyperGrid::new().param("neighbors", vec![3.0]);
        assert!(ModelFamily::ElasticNet.validate_grid(&unknown).is_err());
        assert!(ModelFamily::ElasticNet.validate_grid(&HyperGrid::new()).is_err());
        let fractional = HyperGrid::new().param("num_comp", vec![1.5]);
        assert!(ModelFamily::PartialLeastSquares.validate_grid(&fractional).is_err());
        let bad_mixture = HyperGrid::new().param("penalty", vec![1.0]).param("mixture", vec![2.0]);
        assert!(ModelFamily::ElasticNet.validate_grid(&bad_mixture).is_err());
    }

    #[test]
    fn test_simplicity_order() {
        let f = ModelFamily::ElasticNet;
        assert_eq!(f.simplicity(&config(&[("penalty", 1.0)]), &config(&[("penalty", 0.1)])), Ordering::Less);
        let f = ModelFamily::PartialLeastSquares;
        assert_eq!(f.simplicity(&config(&[("num_comp", 2.0)]), &config(&[("num_comp", 5.0)])), Ordering::Less);
        let f = ModelFamily::NearestNeighborsRegression;
        assert_eq!(f.simplicity(&config(&[("neighbors", 15.0)]), &config(&[("neighbors", 5.0)])), Ordering::Less);
    }

    #[test]
    fn test_logistic_predictions_carry_levels() {
        let x = Matrix::from_rows(&[vec![0.0], vec![1.0], vec![2.0], vec![3.0], vec![4.0], vec![5.0]]).unwrap();
        let y = Target::Class {
            codes: vec![0, 0, 0, 1, 1, 1],
            levels: vec!["No".into(), "Yes".into()],
        };
        let model = ModelFamily::Logistic
            .fit(&config(&[("penalty", 0.1), ("mixture", 0.0)]), &x, &y, &names(1))
            .unwrap();
        match model.predict(&x).unwrap() {
            Predictions::Class {
                labels,
                probabilities,
                levels,
            } => {
                assert_eq!(labels, vec![0, 0, 0, 1, 1, 1]);
                assert_eq!(levels, vec!["No".to_string(), "Yes".to_string()]);
                assert_abs_diff_eq!(probabilities.get(0, 0) + probabilities.get(0, 1), 1.0, epsilon = 1e-12);
            }
            other => panic!("expected class predictions, got {:?}", other),
        }
    }

    #[test]
    fn test_neighbors_have_no_coefficients() {
        let x = Matrix::from_rows(&[vec![0.0], vec![1.0], vec![2.0]]).unwrap();
        let y = Target::Numeric(vec![0.0, 1.0, 2.0]);
        let model = ModelFamily::NearestNeighborsRegression
            .fit(&config(&[("neighbors", 2.0)]), &x, &y, &names(1))
            .unwrap();
        assert!(model.coefficients().is_none());
        assert!(model.standardized_coefficients().is_none());
    }
}

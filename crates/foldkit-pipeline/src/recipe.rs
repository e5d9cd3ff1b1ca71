use foldkit_core::{ColumnData, DataFrame, FoldkitError, Matrix, Result, Roles};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::step::{FittedStep, Step};

/// Ordered feature transforms over a task's columns.
///
/// A recipe is only a declaration. [`Recipe::fit`] estimates every step on a
/// set of fit rows and returns a [`PreparedRecipe`], which is what gets
/// applied to fit and validation rows alike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    roles: Roles,
    steps: Vec<Step>,
}

impl Recipe {
    pub fn new(roles: Roles) -> Self {
        Recipe {
            roles,
            steps: Vec::new(),
        }
    }

    /// Append a step.
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_steps(mut self, steps: Vec<Step>) -> Self {
        self.steps.extend(steps);
        self
    }

    pub fn roles(&self) -> &Roles {
        &self.roles
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Fit every step, in order, on `rows` of `frame`.
    ///
    /// Each step sees the fit rows as transformed by the already fitted steps
    /// before it. Nothing outside `rows` is read.
    pub fn fit(&self, frame: &DataFrame, rows: &[usize]) -> Result<PreparedRecipe> {
        if rows.is_empty() {
            return Err(FoldkitError::config("a recipe needs at least one fit row"));
        }
        if let Some(&bad) = rows.iter().find(|&&r| r >= frame.n_rows()) {
            return Err(FoldkitError::config(format!(
                "fit row {} is out of range for {} rows",
                bad,
                frame.n_rows()
            )));
        }

        let mut working = task_columns(&self.roles, &frame.select_rows(rows))?;
        let mut fitted = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            let f = step.fit(&working, &self.roles.outcome)?;
            working = f.apply(&working)?;
            fitted.push(f);
        }

        let predictors: Vec<String> = working
            .column_names()
            .into_iter()
            .filter(|n| *n != self.roles.outcome)
            .collect();
        debug!(
            steps = fitted.len(),
            rows = rows.len(),
            predictors = predictors.len(),
            "recipe prepared"
        );
        Ok(PreparedRecipe {
            roles: self.roles.clone(),
            steps: fitted,
            fit_rows: RowSet::new(rows),
            predictors,
        })
    }
}

/// Keep the predictors, plus the outcome when the frame carries it.
fn task_columns(roles: &Roles, frame: &DataFrame) -> Result<DataFrame> {
    let mut names = roles.predictors.clone();
    if frame.has_column(&roles.outcome) {
        names.push(roles.outcome.clone());
    }
    frame.select_columns(&names)
}

/// Distinct rows a recipe was fit on, sorted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowSet(Vec<usize>);

impl RowSet {
    pub fn new(rows: &[usize]) -> Self {
        let mut v = rows.to_vec();
        v.sort_unstable();
        v.dedup();
        RowSet(v)
    }

    pub fn contains(&self, row: usize) -> bool {
        self.0.binary_search(&row).is_ok()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }
}

/// A recipe with every step's parameters learned from one set of fit rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreparedRecipe {
    roles: Roles,
    steps: Vec<FittedStep>,
    fit_rows: RowSet,
    predictors: Vec<String>,
}

impl PreparedRecipe {
    pub fn roles(&self) -> &Roles {
        &self.roles
    }

    pub fn steps(&self) -> &[FittedStep] {
        &self.steps
    }

    pub fn fit_rows(&self) -> &RowSet {
        &self.fit_rows
    }

    /// Predictor columns produced by the recipe, in output order.
    pub fn predictors(&self) -> &[String] {
        &self.predictors
    }

    /// Run the fitted steps over `frame`. Deterministic; no parameter is
    /// re-estimated.
    pub fn apply(&self, frame: &DataFrame) -> Result<DataFrame> {
        let mut working = task_columns(&self.roles, frame)?;
        for step in &self.steps {
            working = step.apply(&working)?;
        }
        Ok(working)
    }

    /// Fail unless the recipe was fit on exactly these rows.
    pub fn verify_fit_rows(&self, rows: &[usize]) -> Result<()> {
        if RowSet::new(rows) != self.fit_rows {
            return Err(FoldkitError::TransformLeakage(format!(
                "recipe was fit on {} distinct rows, not on the {} rows of this fold",
                self.fit_rows.len(),
                RowSet::new(rows).len()
            )));
        }
        Ok(())
    }

    /// Fail if any `validation` row was among the fit rows.
    pub fn verify_holdout(&self, validation: &[usize]) -> Result<()> {
        verify_disjoint(self.fit_rows.as_slice(), validation)
    }

    /// Numeric design matrix of the recipe's predictors.
    pub fn design_matrix(&self, prepared: &DataFrame) -> Result<Matrix> {
        design_matrix(prepared, &self.predictors)
    }
}

/// Fail if any row is in both sets.
pub fn verify_disjoint(fit: &[usize], validation: &[usize]) -> Result<()> {
    let fit = RowSet::new(fit);
    if let Some(&row) = validation.iter().find(|&&r| fit.contains(r)) {
        return Err(FoldkitError::TransformLeakage(format!(
            "row {} is in both the fit and the validation rows",
            row
        )));
    }
    Ok(())
}

/// Gather predictors into a matrix. Models get no implicit encoding: a
/// categorical or missing predictor value is a configuration error.
pub fn design_matrix(frame: &DataFrame, predictors: &[String]) -> Result<Matrix> {
    let mut columns = Vec::with_capacity(predictors.len());
    for name in predictors {
        let col = frame.column(name)?;
        match col.data() {
            ColumnData::Numeric(v) => {
                if v.iter().any(|x| x.is_nan()) {
                    return Err(FoldkitError::config(format!(
                        "predictor '{}' has missing values; add an impute step",
                        name
                    )));
                }
                columns.push(v.clone());
            }
            ColumnData::Categorical(_) => {
                return Err(FoldkitError::config(format!(
                    "predictor '{}' is categorical; add an encode step",
                    name
                )))
            }
        }
    }
    if columns.is_empty() {
        return Ok(Matrix::zeros(frame.n_rows(), 0));
    }
    Matrix::from_columns(&columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use foldkit_core::{Column, PredictorSpec};
    use foldkit_preprocessing::{Encoding, ImputeMethod, Selector};

    fn frame() -> DataFrame {
        DataFrame::new(vec![
            Column::numeric("x", vec![10.0, 20.0, 30.0, 100.0]),
            Column::categorical(
                "dept",
                vec![Some("a".into()), None, Some("b".into()), Some("c".into())],
            ),
            Column::numeric("y", vec![1.0, 2.0, 3.0, 4.0]),
        ])
        .unwrap()
    }

    fn recipe(df: &DataFrame) -> Recipe {
        let roles = Roles::resolve(df, "y", &PredictorSpec::default(), None).unwrap();
        Recipe::new(roles)
            .step(Step::Impute {
                selector: Selector::AllNominalPredictors,
                method: ImputeMethod::Mode,
            })
            .step(Step::Encode {
                selector: Selector::AllNominalPredictors,
                encoding: Encoding::OneHot { full_rank: false },
            })
            .step(Step::Normalize {
                selector: Selector::Columns(vec!["x".into()]),
            })
    }

    #[test]
    fn test_parameters_come_from_fit_rows() {
        let df = frame();
        let prepared = recipe(&df).fit(&df, &[0, 1, 2]).unwrap();
        let validation = prepared.apply(&df.select_rows(&[3])).unwrap();
        // mean 20, sd 10 from the fit rows: (100 - 20) / 10
        assert_abs_diff_eq!(validation.column("x").unwrap().as_numeric().unwrap()[0], 8.0, epsilon = 1e-12);
        // "c" was never seen: zero indicators
        assert_eq!(validation.column("dept_a").unwrap().as_numeric().unwrap()[0], 0.0);
        assert_eq!(validation.column("dept_b").unwrap().as_numeric().unwrap()[0], 0.0);
        assert_eq!(prepared.predictors(), &["x", "dept_a", "dept_b"]);
    }

    #[test]
    fn test_apply_is_idempotent() {
        let df = frame();
        let prepared = recipe(&df).fit(&df, &[0, 1, 2]).unwrap();
        let a = prepared.apply(&df).unwrap();
        let b = prepared.apply(&df).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_provenance_checks() {
        let df = frame();
        let prepared = recipe(&df).fit(&df, &[2, 0, 1, 1]).unwrap();
        assert!(prepared.verify_fit_rows(&[0, 1, 2]).is_ok());
        assert!(matches!(
            prepared.verify_fit_rows(&[0, 1, 3]),
            Err(FoldkitError::TransformLeakage(_))
        ));
        assert!(prepared.verify_holdout(&[3]).is_ok());
        assert!(matches!(
            prepared.verify_holdout(&[2, 3]),
            Err(FoldkitError::TransformLeakage(_))
        ));
    }

    #[test]
    fn test_design_matrix_rejects_categorical() {
        let df = frame();
        let roles = Roles::resolve(&df, "y", &PredictorSpec::default(), None).unwrap();
        let prepared = Recipe::new(roles).fit(&df, &[0, 1, 2, 3]).unwrap();
        let out = prepared.apply(&df).unwrap();
        assert!(matches!(prepared.design_matrix(&out), Err(FoldkitError::Configuration(_))));
    }

    #[test]
    fn test_outcome_optional_at_apply() {
        let df = frame();
        let prepared = recipe(&df).fit(&df, &[0, 1, 2]).unwrap();
        let no_outcome = df.drop_columns(&["y".to_string()]);
        let out = prepared.apply(&no_outcome).unwrap();
        assert!(!out.has_column("y"));
        assert_eq!(prepared.design_matrix(&out).unwrap().shape(), (4, 3));
    }
}

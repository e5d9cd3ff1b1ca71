use foldkit_core::{Column, DataFrame, FoldkitError, Matrix, Result, Target};
use foldkit_metrics::Metric;
use foldkit_pipeline::{verify_disjoint, Recipe};
use foldkit_resample::{Fold, FoldPlan};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::family::ModelFamily;
use crate::grid::{describe, Configuration, HyperGrid};

/// Caller-supplied bound on a sweep. Once exceeded no new cell starts; cells
/// already running finish. A configuration cut short by the budget is marked
/// incomplete and takes no part in selection.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Budget {
    #[serde(default)]
    pub max_cells: Option<usize>,
    #[serde(default)]
    pub max_seconds: Option<f64>,
}

impl Budget {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn cells(max_cells: usize) -> Self {
        Budget {
            max_cells: Some(max_cells),
            max_seconds: None,
        }
    }

    pub fn seconds(max_seconds: f64) -> Self {
        Budget {
            max_cells: None,
            max_seconds: Some(max_seconds),
        }
    }

    pub fn max_duration(&self) -> Option<Duration> {
        self.max_seconds.map(|s| Duration::from_secs_f64(s.max(0.0)))
    }

    /// How many folds of the next configuration may run, given the cells
    /// already run and the time spent. Cells are admitted in (configuration,
    /// fold) order; nothing starts once the time budget is spent.
    fn admits(&self, started: usize, elapsed: Duration, folds: usize) -> usize {
        if self.max_duration().map_or(false, |d| elapsed >= d) {
            return 0;
        }
        match self.max_cells {
            Some(m) => m.saturating_sub(started).min(folds),
            None => folds,
        }
    }
}

/// Outcome of one (configuration, fold) cell. A cell excluded for a
/// recoverable failure has no metric and carries the error text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldResult {
    pub config_id: usize,
    pub fold: String,
    pub metric: Option<f64>,
    pub error: Option<String>,
}

/// Every executed cell of a sweep, in (configuration, fold) order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsTable {
    pub family: ModelFamily,
    pub metric: Metric,
    pub configurations: Vec<Configuration>,
    pub folds: Vec<String>,
    pub results: Vec<FoldResult>,
    pub total_cells: usize,
    pub completed_cells: usize,
}

impl ResultsTable {
    /// Share of planned cells that ran; below 1 when a budget stopped the sweep.
    pub fn completion_fraction(&self) -> f64 {
        if self.total_cells == 0 {
            return 1.0;
        }
        self.completed_cells as f64 / self.total_cells as f64
    }

    pub fn is_complete(&self) -> bool {
        self.completed_cells == self.total_cells
    }

    /// One row per executed cell: a column per hyperparameter, then `fold`,
    /// the metric (NaN when excluded) and `error`.
    pub fn to_frame(&self) -> Result<DataFrame> {
        let mut columns = parameter_columns(
            &self.configurations,
            self.results.iter().map(|r| r.config_id),
        );
        columns.push(Column::categorical(
            "fold",
            self.results.iter().map(|r| Some(r.fold.clone())).collect(),
        ));
        columns.push(Column::numeric(
            self.metric.name(),
            self.results.iter().map(|r| r.metric.unwrap_or(f64::NAN)).collect(),
        ));
        columns.push(Column::categorical(
            "error",
            self.results.iter().map(|r| r.error.clone()).collect(),
        ));
        DataFrame::new(columns)
    }
}

/// A numeric column per hyperparameter name, one value per listed config id.
pub(crate) fn parameter_columns(
    configurations: &[Configuration],
    ids: impl Iterator<Item = usize> + Clone,
) -> Vec<Column> {
    let names: BTreeSet<&String> = configurations.iter().flat_map(|c| c.keys()).collect();
    names
        .into_iter()
        .map(|name| {
            Column::numeric(
                name.clone(),
                ids.clone()
                    .map(|id| configurations[id].get(name).copied().unwrap_or(f64::NAN))
                    .collect(),
            )
        })
        .collect()
}

/// Transformed fit and validation data of one fold.
struct FoldData {
    predictors: Vec<String>,
    x_fit: Matrix,
    y_fit: Target,
    x_validation: Matrix,
    y_validation: Target,
}

struct PreparedFold {
    id: String,
    /// A recoverable preparation failure excludes every cell of the fold.
    data: Result<FoldData>,
}

/// Fits a model family across a hyperparameter grid and a fold plan.
///
/// Each fold's recipe is prepared once, on that fold's fit rows only, and
/// shared read-only by the fold's cells. Cells run on a rayon pool.
#[derive(Debug, Clone)]
pub struct Sweep {
    pub family: ModelFamily,
    pub grid: HyperGrid,
    pub recipe: Recipe,
    pub metric: Metric,
    /// Positive class for event-based metrics; defaults to the last level.
    pub event_level: Option<String>,
    pub budget: Budget,
    /// Worker threads; `None` runs on rayon's global pool.
    pub workers: Option<usize>,
}

impl Sweep {
    pub fn new(family: ModelFamily, grid: HyperGrid, recipe: Recipe, metric: Metric) -> Self {
        Sweep {
            family,
            grid,
            recipe,
            metric,
            event_level: None,
            budget: Budget::unlimited(),
            workers: None,
        }
    }

    pub fn with_budget(mut self, budget: Budget) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn with_event_level(mut self, level: impl Into<String>) -> Self {
        self.event_level = Some(level.into());
        self
    }

    /// The outcome of `frame` as a target, checked against the family.
    /// Class levels come from the whole frame so every fold shares them.
    pub fn target(&self, frame: &DataFrame) -> Result<Target> {
        let target = Target::from_column(frame.column(&self.recipe.roles().outcome)?, None)?;
        self.family.check_target(&target)?;
        if let (Some(event), Target::Class { levels, .. }) = (&self.event_level, &target) {
            if !levels.contains(event) {
                return Err(FoldkitError::config(format!("event level '{}' is not an outcome class", event)));
            }
        }
        Ok(target)
    }

    /// Evaluate every configuration on every fold of `plan`, whose indices
    /// refer to rows of `frame`.
    pub fn run(&self, frame: &DataFrame, plan: &FoldPlan) -> Result<ResultsTable> {
        self.family.validate_grid(&self.grid)?;
        if self.metric.is_classification() != self.family.is_classification() {
            return Err(FoldkitError::config(format!(
                "metric {} does not apply to {}",
                self.metric, self.family
            )));
        }
        if plan.n() != frame.n_rows() {
            return Err(FoldkitError::config(format!(
                "fold plan covers {} rows but the frame has {}",
                plan.n(),
                frame.n_rows()
            )));
        }
        if plan.is_empty() {
            return Err(FoldkitError::config("fold plan has no folds"));
        }
        let configurations = self.grid.configurations()?;
        let target = self.target(frame)?;

        match self.workers {
            Some(n) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| FoldkitError::config(format!("cannot start {} workers: {}", n, e)))?;
                pool.install(|| self.execute(frame, plan, &target, configurations))
            }
            None => self.execute(frame, plan, &target, configurations),
        }
    }

    fn execute(
        &self,
        frame: &DataFrame,
        plan: &FoldPlan,
        target: &Target,
        configurations: Vec<Configuration>,
    ) -> Result<ResultsTable> {
        let total_cells = configurations.len() * plan.len();
        info!(
            family = %self.family,
            metric = %self.metric,
            configurations = configurations.len(),
            folds = plan.len(),
            cells = total_cells,
            "sweep started"
        );

        let prepared = plan
            .folds()
            .par_iter()
            .map(|fold| self.prepare(frame, target, fold))
            .collect::<Result<Vec<_>>>()?;

        // Configurations run in grid order, each over its folds in parallel,
        // so a budget always admits the same cells.
        let start = Instant::now();
        let mut results: Vec<FoldResult> = Vec::with_capacity(total_cells);
        for (c, config) in configurations.iter().enumerate() {
            let admitted = self.budget.admits(results.len(), start.elapsed(), prepared.len());
            if admitted == 0 {
                break;
            }
            let cells = prepared[..admitted]
                .par_iter()
                .map(|fold| self.run_cell(c, config, fold))
                .collect::<Result<Vec<_>>>()?;
            results.extend(cells);
        }

        let completed_cells = results.len();
        let excluded = results.iter().filter(|r| r.metric.is_none()).count();
        if completed_cells < total_cells {
            warn!(
                completed = completed_cells,
                total = total_cells,
                "budget exhausted; results are partial"
            );
        }
        info!(completed = completed_cells, excluded, "sweep finished");

        Ok(ResultsTable {
            family: self.family,
            metric: self.metric,
            configurations,
            folds: prepared.into_iter().map(|p| p.id).collect(),
            results,
            total_cells,
            completed_cells,
        })
    }

    fn prepare(&self, frame: &DataFrame, target: &Target, fold: &Fold) -> Result<PreparedFold> {
        match self.prepare_data(frame, target, fold) {
            Ok(data) => {
                debug!(
                    fold = %fold.id,
                    fit_rows = fold.fit_indices.len(),
                    validation_rows = fold.validation_indices.len(),
                    predictors = data.predictors.len(),
                    "fold prepared"
                );
                Ok(PreparedFold {
                    id: fold.id.clone(),
                    data: Ok(data),
                })
            }
            Err(e) if e.is_cell_recoverable() => {
                warn!(fold = %fold.id, error = %e, "fold preparation failed; its cells are excluded");
                Ok(PreparedFold {
                    id: fold.id.clone(),
                    data: Err(e),
                })
            }
            Err(e) => Err(e),
        }
    }

    fn prepare_data(&self, frame: &DataFrame, target: &Target, fold: &Fold) -> Result<FoldData> {
        verify_disjoint(&fold.fit_indices, &fold.validation_indices)?;
        let recipe = self.recipe.fit(frame, &fold.fit_indices)?;
        recipe.verify_holdout(&fold.validation_indices)?;

        let fit = recipe.apply(&frame.select_rows(&fold.fit_indices))?;
        let validation = recipe.apply(&frame.select_rows(&fold.validation_indices))?;
        Ok(FoldData {
            predictors: recipe.predictors().to_vec(),
            x_fit: recipe.design_matrix(&fit)?,
            y_fit: target.select(&fold.fit_indices),
            x_validation: recipe.design_matrix(&validation)?,
            y_validation: target.select(&fold.validation_indices),
        })
    }

    fn run_cell(&self, config_id: usize, config: &Configuration, fold: &PreparedFold) -> Result<FoldResult> {
        let scored = match &fold.data {
            Ok(data) => self.score(config, data),
            Err(e) => Err(e.clone()),
        };
        match scored {
            Ok(value) => Ok(FoldResult {
                config_id,
                fold: fold.id.clone(),
                metric: Some(value),
                error: None,
            }),
            Err(e) if e.is_cell_recoverable() => {
                warn!(config = %describe(config), fold = %fold.id, error = %e, "cell excluded");
                Ok(FoldResult {
                    config_id,
                    fold: fold.id.clone(),
                    metric: None,
                    error: Some(e.to_string()),
                })
            }
            Err(e) => Err(e),
        }
    }

    fn score(&self, config: &Configuration, data: &FoldData) -> Result<f64> {
        let model = self.family.fit(config, &data.x_fit, &data.y_fit, &data.predictors)?;
        let predictions = model.predict(&data.x_validation)?;
        self.metric
            .evaluate_with_event(&data.y_validation, &predictions, self.event_level.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foldkit_core::{PredictorSpec, Roles};
    use foldkit_pipeline::Step;
    use foldkit_preprocessing::Selector;
    use foldkit_resample::{make_folds, Resampling};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn frame(n: usize) -> DataFrame {
        let mut rng = StdRng::seed_from_u64(3);
        let x1: Vec<f64> = (0..n).map(|_| rng.gen_range(0.0..10.0)).collect();
        let x2: Vec<f64> = (0..n).map(|_| rng.gen_range(0.0..10.0)).collect();
        let y = x1
            .iter()
            .zip(&x2)
            .map(|(a, b)| 2.0 + 3.0 * a - b + rng.gen_range(-0.5..0.5))
            .collect();
        DataFrame::new(vec![
            Column::numeric("x1", x1),
            Column::numeric("x2", x2),
            Column::numeric("y", y),
        ])
        .unwrap()
    }

    fn recipe(df: &DataFrame) -> Recipe {
        let roles = Roles::resolve(df, "y", &PredictorSpec::default(), None).unwrap();
        Recipe::new(roles).step(Step::Normalize {
            selector: Selector::AllNumericPredictors,
        })
    }

    fn plan(n: usize) -> FoldPlan {
        make_folds(n, &Resampling::KFold { k: 5, repeats: 1 }, 11).unwrap()
    }

    #[test]
    fn test_full_sweep() {
        let df = frame(60);
        let grid = HyperGrid::new().param("penalty", vec![0.0, 0.1, 10.0]).param("mixture", vec![1.0]);
        let table = Sweep::new(ModelFamily::ElasticNet, grid, recipe(&df), Metric::Rmse)
            .with_workers(2)
            .run(&df, &plan(60))
            .unwrap();

        assert_eq!(table.total_cells, 15);
        assert!(table.is_complete());
        assert_eq!(table.completion_fraction(), 1.0);
        assert_eq!(table.results.len(), 15);
        assert!(table.results.iter().all(|r| r.metric.is_some()));
        // (configuration, fold) order
        assert_eq!(table.results[5].config_id, 1);
        assert_eq!(table.results[5].fold, table.folds[0]);

        let frame = table.to_frame().unwrap();
        assert_eq!(frame.column_names(), vec!["mixture", "penalty", "fold", "rmse", "error"]);
        assert_eq!(frame.n_rows(), 15);
    }

    #[test]
    fn test_sweep_is_reproducible() {
        let df = frame(40);
        let grid = HyperGrid::new().param("neighbors", vec![1.0, 3.0, 5.0]);
        let sweep = Sweep::new(ModelFamily::NearestNeighborsRegression, grid, recipe(&df), Metric::Mae);
        let a = sweep.run(&df, &plan(40)).unwrap();
        let b = sweep.clone().with_workers(3).run(&df, &plan(40)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_recoverable_cells_are_excluded_not_zeroed() {
        let df = frame(20);
        // 16 fit rows per fold: 20 neighbors cannot be found
        let grid = HyperGrid::new().param("neighbors", vec![3.0, 20.0]);
        let table = Sweep::new(ModelFamily::NearestNeighborsRegression, grid, recipe(&df), Metric::Rmse)
            .run(&df, &plan(20))
            .unwrap();
        assert!(table.is_complete());
        let (ok, excluded): (Vec<_>, Vec<_>) = table.results.iter().partition(|r| r.config_id == 0);
        assert!(ok.iter().all(|r| r.metric.is_some()));
        assert!(excluded.iter().all(|r| r.metric.is_none() && r.error.is_some()));
    }

    #[test]
    fn test_cell_budget_gives_partial_table() {
        let df = frame(30);
        let grid = HyperGrid::new().param("penalty", vec![0.0, 1.0]);
        let table = Sweep::new(ModelFamily::ElasticNet, grid, recipe(&df), Metric::Rmse)
            .with_budget(Budget::cells(4))
            .run(&df, &plan(30))
            .unwrap();
        assert_eq!(table.total_cells, 10);
        assert_eq!(table.completed_cells, 4);
        assert_eq!(table.completion_fraction(), 0.4);
        assert!(!table.is_complete());
        // first configuration, first four folds
        assert!(table.results.iter().all(|r| r.config_id == 0));
        let folds: Vec<&String> = table.results.iter().map(|r| &r.fold).collect();
        assert_eq!(folds, table.folds[..4].iter().collect::<Vec<_>>());

        let summary = table.aggregate();
        assert!(!summary.rows[0].complete);
        assert!(!summary.rows[1].complete);
        assert!(summary.select_best().is_err());
    }

    #[test]
    fn test_overlapping_fold_aborts_the_sweep() {
        let df = frame(10);
        let plan: FoldPlan = serde_json::from_str(
            r#"{"n": 10, "folds": [
                {"id": "Fold1", "repeat": 1, "fit_indices": [0, 1, 2, 3, 4, 5, 6], "validation_indices": [7, 8, 9]},
                {"id": "Fold2", "repeat": 1, "fit_indices": [0, 1, 2, 3, 4, 5, 6, 7], "validation_indices": [7, 8]}
            ]}"#,
        )
        .unwrap();
        let grid = HyperGrid::new().param("penalty", vec![0.1]);
        let err = Sweep::new(ModelFamily::ElasticNet, grid, recipe(&df), Metric::Rmse)
            .run(&df, &plan)
            .unwrap_err();
        assert!(matches!(err, FoldkitError::TransformLeakage(_)));
    }

    #[test]
    fn test_cell_budget_admits_the_same_cells_every_run() {
        let df = frame(50);
        let grid = HyperGrid::new().param("neighbors", (1..=10).map(f64::from).collect());
        let sweep = Sweep::new(ModelFamily::NearestNeighborsRegression, grid, recipe(&df), Metric::Rmse)
            .with_budget(Budget::cells(23))
            .with_workers(8);
        let folds = plan(50);
        let first = sweep.run(&df, &folds).unwrap();

        let ids: Vec<usize> = first.results.iter().map(|r| r.config_id).collect();
        let mut expected = vec![0; 5];
        expected.extend([1; 5]);
        expected.extend([2; 5]);
        expected.extend([3; 5]);
        expected.extend([4; 3]);
        assert_eq!(ids, expected);
        for _ in 0..10 {
            assert_eq!(sweep.run(&df, &folds).unwrap(), first);
        }

        let summary = first.aggregate();
        let complete: Vec<bool> = summary.rows.iter().map(|r| r.complete).collect();
        assert_eq!(complete[..5], [true, true, true, true, false]);
        assert!(summary.select_best().unwrap().config_id < 4);
    }

    #[test]
    fn test_mismatched_metric_or_outcome_is_fatal() {
        let df = frame(20);
        let sweep = Sweep::new(ModelFamily::LinearRegression, HyperGrid::new(), recipe(&df), Metric::Accuracy);
        assert!(matches!(sweep.run(&df, &plan(20)), Err(FoldkitError::Configuration(_))));

        let sweep = Sweep::new(ModelFamily::Logistic, HyperGrid::new(), recipe(&df), Metric::Accuracy);
        assert!(matches!(sweep.run(&df, &plan(20)), Err(FoldkitError::Configuration(_))));
    }

    #[test]
    fn test_categorical_predictor_without_encoding_is_fatal() {
        let mut df = frame(20);
        df.put_column(Column::from_strs("dept", &["a", "b"].repeat(10))).unwrap();
        let roles = Roles::resolve(&df, "y", &PredictorSpec::default(), None).unwrap();
        let sweep = Sweep::new(ModelFamily::LinearRegression, HyperGrid::new(), Recipe::new(roles), Metric::Rmse);
        assert!(matches!(sweep.run(&df, &plan(20)), Err(FoldkitError::Configuration(_))));
    }
}

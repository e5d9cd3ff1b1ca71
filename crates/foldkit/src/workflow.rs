use foldkit_core::{DataFrame, Result, Roles};
use foldkit_pipeline::{verify_disjoint, PreparedRecipe, Recipe};
use foldkit_preprocessing::filter_near_zero_variance;
use foldkit_resample::{make_folds, make_stratified_folds, split, strata_for, FoldPlan, Resampling, Split};
use foldkit_tune::{
    describe, permutation_importance, rank_importance, ConfigSummary, Configuration, FittedModel,
    ResultsTable, Summary, Sweep,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::WorkflowConfig;

// ─── Results ────────────────────────────────────────────────────────────────

/// The selected configuration refit on the whole training split and scored
/// once on the untouched test split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalFit {
    pub config: Configuration,
    pub recipe: PreparedRecipe,
    pub model: FittedModel,
    pub test_metric: f64,
    /// Predictor importance scaled to 0..=100, most important first.
    pub importance: Vec<(String, f64)>,
}

#[derive(Debug, Clone)]
pub struct WorkflowReport {
    /// Columns removed by the pre-split filter.
    pub dropped: Vec<String>,
    pub roles: Roles,
    pub split: Split,
    pub plan: FoldPlan,
    pub results: ResultsTable,
    pub summary: Summary,
    pub selected: ConfigSummary,
    pub final_fit: FinalFit,
}

// ─── Workflow ───────────────────────────────────────────────────────────────

/// Split, resample, sweep, select and refit, driven by one [`WorkflowConfig`].
#[derive(Debug, Clone)]
pub struct Workflow {
    config: WorkflowConfig,
}

impl Workflow {
    pub fn new(config: WorkflowConfig) -> Result<Self> {
        config.validate()?;
        Ok(Workflow { config })
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn run(&self, data: &DataFrame) -> Result<WorkflowReport> {
        let cfg = &self.config;

        // Degenerate columns go before the split, judged on every row.
        let (frame, dropped) = match cfg.prefilter {
            Some(kind) => {
                let keep: Vec<String> = std::iter::once(cfg.outcome.clone())
                    .chain(cfg.stratum.clone())
                    .chain(cfg.split.stratify_by.clone())
                    .chain(cfg.predictors.iter().flatten().cloned())
                    .collect();
                let (frame, dropped) = filter_near_zero_variance(data, &keep, kind)?;
                if !dropped.is_empty() {
                    info!(columns = ?dropped, "dropped near-zero-variance columns before splitting");
                }
                (frame, dropped)
            }
            None => (data.clone(), Vec::new()),
        };

        let roles = Roles::resolve(&frame, &cfg.outcome, &cfg.predictor_spec(), cfg.stratum.as_deref())?;
        let split = split(&frame, &cfg.split)?;
        let train = split.training(&frame);
        let plan = self.plan(&train)?;

        let mut sweep = Sweep::new(
            cfg.family,
            cfg.grid.clone(),
            Recipe::new(roles.clone()).with_steps(cfg.steps.clone()),
            cfg.metric,
        )
        .with_budget(cfg.budget);
        if let Some(n) = cfg.workers {
            sweep = sweep.with_workers(n);
        }
        if let Some(level) = &cfg.event_level {
            sweep = sweep.with_event_level(level.clone());
        }

        let results = sweep.run(&train, &plan)?;
        let summary = results.aggregate();
        let selected = if cfg.one_std_err {
            summary.select_one_std_err()?.clone()
        } else {
            summary.select_best()?.clone()
        };
        info!(
            config = %describe(&selected.config),
            mean = ?selected.mean,
            std_err = ?selected.std_err,
            "configuration selected"
        );

        let final_fit = self.final_fit(&sweep, &frame, &split, &selected.config)?;
        Ok(WorkflowReport {
            dropped,
            roles,
            split,
            plan,
            results,
            summary,
            selected,
            final_fit,
        })
    }

    /// Folds over the training split, stratified when a stratum is set.
    fn plan(&self, train: &DataFrame) -> Result<FoldPlan> {
        let cfg = &self.config;
        match (&cfg.stratum, &cfg.resampling) {
            (Some(column), Resampling::KFold { k, repeats }) => {
                let mut labels = vec![String::new(); train.n_rows()];
                for (g, rows) in strata_for(train, column, cfg.split.breaks)?.iter().enumerate() {
                    for &i in rows {
                        labels[i] = g.to_string();
                    }
                }
                make_stratified_folds(&labels, *k, *repeats, cfg.resampling_seed)
            }
            (_, strategy) => make_folds(train.n_rows(), strategy, cfg.resampling_seed),
        }
    }

    fn final_fit(&self, sweep: &Sweep, frame: &DataFrame, split: &Split, config: &Configuration) -> Result<FinalFit> {
        let cfg = &self.config;
        verify_disjoint(split.train_indices(), split.test_indices())?;

        // Levels from every row so train and test share class codes.
        let target = sweep.target(frame)?;
        let y_train = target.select(split.train_indices());
        let y_test = target.select(split.test_indices());

        let train = split.training(frame);
        let all_rows: Vec<usize> = (0..train.n_rows()).collect();
        let recipe = sweep.recipe.fit(&train, &all_rows)?;
        let x_train = recipe.design_matrix(&recipe.apply(&train)?)?;
        let model = cfg.family.fit(config, &x_train, &y_train, recipe.predictors())?;

        let x_test = recipe.design_matrix(&recipe.apply(&split.testing(frame))?)?;
        let predictions = model.predict(&x_test)?;
        let test_metric = cfg
            .metric
            .evaluate_with_event(&y_test, &predictions, cfg.event_level.as_deref())?;
        info!(metric = %cfg.metric, value = test_metric, "final model scored on the test split");

        let importance = if model.coefficients().is_some() {
            rank_importance(&model)?
        } else {
            permutation_importance(
                &model,
                &x_test,
                &y_test,
                cfg.metric,
                cfg.importance.repeats,
                cfg.importance.seed,
            )?
        };

        Ok(FinalFit {
            config: config.clone(),
            recipe,
            model,
            test_metric,
            importance,
        })
    }
}

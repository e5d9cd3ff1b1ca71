use foldkit_core::{Column, DataFrame, FoldkitError, Result};
use foldkit_metrics::{Direction, Metric};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::family::ModelFamily;
use crate::grid::Configuration;
use crate::sweep::{parameter_columns, ResultsTable};

/// Fold statistics of one configuration. Excluded and unexecuted folds count
/// as missing and enter no statistic. A configuration the budget cut off
/// before every fold ran is not `complete` and is never selected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSummary {
    pub config_id: usize,
    pub config: Configuration,
    pub n_scored: usize,
    pub n_missing: usize,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    /// Sample standard deviation; needs two scored folds.
    pub std_dev: Option<f64>,
    pub std_err: Option<f64>,
    /// Every fold was executed, whether or not it produced a score.
    pub complete: bool,
}

impl ConfigSummary {
    fn from_scores(
        config_id: usize,
        config: Configuration,
        mut scores: Vec<f64>,
        executed: usize,
        n_folds: usize,
    ) -> Self {
        let n = scores.len();
        scores.sort_by(f64::total_cmp);
        let mean = (n > 0).then(|| scores.iter().sum::<f64>() / n as f64);
        let median = (n > 0).then(|| {
            if n % 2 == 1 {
                scores[n / 2]
            } else {
                (scores[n / 2 - 1] + scores[n / 2]) / 2.0
            }
        });
        let std_dev = match mean {
            Some(m) if n >= 2 => {
                Some((scores.iter().map(|s| (s - m).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt())
            }
            _ => None,
        };
        ConfigSummary {
            config_id,
            config,
            n_scored: n,
            n_missing: n_folds.saturating_sub(n),
            mean,
            median,
            std_dev,
            std_err: std_dev.map(|sd| sd / (n as f64).sqrt()),
            complete: executed == n_folds,
        }
    }
}

/// Per-configuration summary of a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub family: ModelFamily,
    pub metric: Metric,
    pub rows: Vec<ConfigSummary>,
}

impl ResultsTable {
    pub fn aggregate(&self) -> Summary {
        let rows = self
            .configurations
            .iter()
            .enumerate()
            .map(|(id, config)| {
                let cells: Vec<_> = self.results.iter().filter(|r| r.config_id == id).collect();
                let scores = cells.iter().filter_map(|r| r.metric).collect();
                ConfigSummary::from_scores(id, config.clone(), scores, cells.len(), self.folds.len())
            })
            .collect();
        Summary {
            family: self.family,
            metric: self.metric,
            rows,
        }
    }
}

impl Summary {
    fn scored(&self) -> impl Iterator<Item = (&ConfigSummary, f64)> {
        self.rows
            .iter()
            .filter(|r| r.complete)
            .filter_map(|r| r.mean.map(|m| (r, m)))
    }

    /// Simpler first; equally simple ones by better mean, then grid order.
    fn preference(&self, a: (&ConfigSummary, f64), b: (&ConfigSummary, f64)) -> Ordering {
        self.family.simplicity(&a.0.config, &b.0.config).then_with(|| {
            if self.metric.direction().better(a.1, b.1) {
                Ordering::Less
            } else if self.metric.direction().better(b.1, a.1) {
                Ordering::Greater
            } else {
                a.0.config_id.cmp(&b.0.config_id)
            }
        })
    }

    /// Configuration with the best mean metric; ties go to the simpler one.
    pub fn select_best(&self) -> Result<&ConfigSummary> {
        let direction = self.metric.direction();
        let mut best: Option<(&ConfigSummary, f64)> = None;
        for cand in self.scored() {
            best = match best {
                None => Some(cand),
                Some(b) if direction.better(cand.1, b.1) => Some(cand),
                Some(b) if cand.1 == b.1 && self.preference(cand, b) == Ordering::Less => Some(cand),
                keep => keep,
            };
        }
        best.map(|(r, _)| r).ok_or_else(|| no_scores(self.metric))
    }

    /// Simplest configuration whose mean lies within one standard error of
    /// the best mean.
    pub fn select_one_std_err(&self) -> Result<&ConfigSummary> {
        let best = self.select_best()?;
        let best_mean = best.mean.ok_or_else(|| no_scores(self.metric))?;
        let se = best.std_err.unwrap_or(0.0);
        let within = |m: f64| match self.metric.direction() {
            Direction::Minimize => m <= best_mean + se,
            Direction::Maximize => m >= best_mean - se,
        };
        self.scored()
            .filter(|&(_, m)| within(m))
            .min_by(|&a, &b| self.preference(a, b))
            .map(|(r, _)| r)
            .ok_or_else(|| no_scores(self.metric))
    }

    /// One row per configuration: hyperparameters, fold counts and statistics
    /// (NaN where undefined).
    pub fn to_frame(&self) -> Result<DataFrame> {
        let configurations: Vec<Configuration> = self.rows.iter().map(|r| r.config.clone()).collect();
        let mut columns = parameter_columns(&configurations, 0..self.rows.len());
        columns.push(Column::categorical(
            "metric",
            self.rows.iter().map(|_| Some(self.metric.name().to_string())).collect(),
        ));
        let count = |f: fn(&ConfigSummary) -> usize| -> Vec<f64> { self.rows.iter().map(|r| f(r) as f64).collect() };
        let stat = |f: fn(&ConfigSummary) -> Option<f64>| -> Vec<f64> {
            self.rows.iter().map(|r| f(r).unwrap_or(f64::NAN)).collect()
        };
        columns.push(Column::numeric("n_scored", count(|r| r.n_scored)));
        columns.push(Column::numeric("n_missing", count(|r| r.n_missing)));
        columns.push(Column::numeric("mean", stat(|r| r.mean)));
        columns.push(Column::numeric("median", stat(|r| r.median)));
        columns.push(Column::numeric("std_dev", stat(|r| r.std_dev)));
        columns.push(Column::numeric("std_err", stat(|r| r.std_err)));
        columns.push(Column::categorical(
            "complete",
            self.rows.iter().map(|r| Some(r.complete.to_string())).collect(),
        ));
        DataFrame::new(columns)
    }
}

fn no_scores(metric: Metric) -> FoldkitError {
    FoldkitError::metric_domain(metric.name(), "no fully evaluated configuration was scored on any fold")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sweep::FoldResult;
    use approx::assert_abs_diff_eq;

    fn penalty(p: f64) -> Configuration {
        [("penalty".to_string(), p)].into_iter().collect()
    }

    fn row(id: usize, p: f64, mean: f64, se: f64) -> ConfigSummary {
        ConfigSummary {
            config_id: id,
            config: penalty(p),
            n_scored: 10,
            n_missing: 0,
            mean: Some(mean),
            median: Some(mean),
            std_dev: Some(se * 10f64.sqrt()),
            std_err: Some(se),
            complete: true,
        }
    }

    fn summary(metric: Metric, rows: Vec<ConfigSummary>) -> Summary {
        Summary {
            family: ModelFamily::ElasticNet,
            metric,
            rows,
        }
    }

    #[test]
    fn test_one_std_err_rule() {
        // means [100, 102, 105], SEs [3, 2, 1]; larger penalty is simpler
        let s = summary(
            Metric::Rmse,
            vec![row(0, 0.01, 100.0, 3.0), row(1, 0.1, 102.0, 2.0), row(2, 1.0, 105.0, 1.0)],
        );
        assert_eq!(s.select_best().unwrap().config_id, 0);
        assert_eq!(s.select_one_std_err().unwrap().config_id, 1);
    }

    #[test]
    fn test_one_std_err_rule_when_larger_is_better() {
        let s = summary(
            Metric::Rsq,
            vec![row(0, 0.01, 0.90, 0.02), row(1, 0.1, 0.89, 0.01), row(2, 1.0, 0.80, 0.01)],
        );
        assert_eq!(s.select_best().unwrap().config_id, 0);
        assert_eq!(s.select_one_std_err().unwrap().config_id, 1);
    }

    #[test]
    fn test_best_tie_goes_to_simpler() {
        let s = summary(Metric::Mae, vec![row(0, 0.01, 5.0, 1.0), row(1, 0.5, 5.0, 1.0)]);
        assert_eq!(s.select_best().unwrap().config_id, 1);
    }

    #[test]
    fn test_aggregate_skips_missing_cells() {
        let fold = |config_id, fold: &str, metric| FoldResult {
            config_id,
            fold: fold.to_string(),
            metric,
            error: metric.is_none().then(|| "Model failed to converge".to_string()),
        };
        let table = ResultsTable {
            family: ModelFamily::ElasticNet,
            metric: Metric::Rmse,
            configurations: vec![penalty(0.1), penalty(1.0)],
            folds: vec!["Fold1".into(), "Fold2".into(), "Fold3".into()],
            results: vec![
                fold(0, "Fold1", Some(1.0)),
                fold(0, "Fold2", Some(2.0)),
                fold(0, "Fold3", Some(6.0)),
                fold(1, "Fold1", Some(4.0)),
                fold(1, "Fold2", None),
            ],
            total_cells: 6,
            completed_cells: 5,
        };
        let s = table.aggregate();
        let a = &s.rows[0];
        assert_eq!((a.n_scored, a.n_missing), (3, 0));
        assert_abs_diff_eq!(a.mean.unwrap(), 3.0);
        assert_abs_diff_eq!(a.median.unwrap(), 2.0);
        assert_abs_diff_eq!(a.std_dev.unwrap(), 7f64.sqrt(), epsilon = 1e-12);
        assert_abs_diff_eq!(a.std_err.unwrap(), (7.0f64 / 3.0).sqrt(), epsilon = 1e-12);

        assert!(a.complete);

        // one excluded and one unexecuted fold
        let b = &s.rows[1];
        assert_eq!((b.n_scored, b.n_missing), (1, 2));
        assert_eq!(b.mean, Some(4.0));
        assert_eq!(b.std_dev, None);
        assert!(!b.complete);

        let frame = s.to_frame().unwrap();
        assert_eq!(frame.n_rows(), 2);
        assert_eq!(frame.column("n_missing").unwrap().as_numeric().unwrap(), &[0.0, 2.0]);
        assert!(frame.column("std_err").unwrap().as_numeric().unwrap()[1].is_nan());
        assert_eq!(frame.column("complete").unwrap().levels(), vec!["false", "true"]);
    }

    #[test]
    fn test_incomplete_configuration_is_never_selected() {
        let mut cut = row(2, 1.0, 50.0, 1.0);
        cut.complete = false;
        let s = summary(Metric::Rmse, vec![row(0, 0.01, 100.0, 3.0), row(1, 0.1, 102.0, 2.0), cut]);
        assert_eq!(s.select_best().unwrap().config_id, 0);
        assert_eq!(s.select_one_std_err().unwrap().config_id, 1);

        let mut only = row(0, 0.1, 1.0, 0.1);
        only.complete = false;
        let s = summary(Metric::Rmse, vec![only]);
        assert!(matches!(s.select_best(), Err(FoldkitError::MetricDomain { .. })));
    }

    #[test]
    fn test_excluded_fold_keeps_configuration_complete() {
        let table = ResultsTable {
            family: ModelFamily::ElasticNet,
            metric: Metric::Rmse,
            configurations: vec![penalty(0.1)],
            folds: vec!["Fold1".into(), "Fold2".into()],
            results: vec![
                FoldResult {
                    config_id: 0,
                    fold: "Fold1".into(),
                    metric: Some(1.5),
                    error: None,
                },
                FoldResult {
                    config_id: 0,
                    fold: "Fold2".into(),
                    metric: None,
                    error: Some("Model failed to converge".into()),
                },
            ],
            total_cells: 2,
            completed_cells: 2,
        };
        let s = table.aggregate();
        assert!(s.rows[0].complete);
        assert_eq!(s.select_best().unwrap().config_id, 0);
    }

    #[test]
    fn test_nothing_scored() {
        let mut r = row(0, 1.0, 0.0, 0.0);
        r.mean = None;
        let s = summary(Metric::Rmse, vec![r]);
        assert!(matches!(s.select_best(), Err(FoldkitError::MetricDomain { .. })));
    }
}

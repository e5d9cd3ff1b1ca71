use foldkit_core::{FoldkitError, Matrix, Result, Target};
use foldkit_metrics::{Direction, Metric};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::family::FittedModel;

/// Rescale so the top score is exactly 100 and the lowest 0, sorted
/// descending (predictor order on ties). Equal scores all become 100.
fn normalize(scores: Vec<(String, f64)>) -> Vec<(String, f64)> {
    let max = scores.iter().map(|s| s.1).fold(f64::NEG_INFINITY, f64::max);
    let min = scores.iter().map(|s| s.1).fold(f64::INFINITY, f64::min);
    let range = max - min;
    let mut ranked: Vec<(String, f64)> = scores
        .into_iter()
        .map(|(name, s)| {
            let scaled = if range > 0.0 { 100.0 * (s - min) / range } else { 100.0 };
            (name, scaled)
        })
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked
}

/// Importance from the magnitude of standardized coefficients, for the
/// families that have coefficients.
///
/// Scores are scaled to 0..=100 over the observed range. When every
/// predictor scores the same, including a single-predictor model, there is
/// no range and all of them get 100.
pub fn rank_importance(model: &FittedModel) -> Result<Vec<(String, f64)>> {
    let coef = model.standardized_coefficients().ok_or_else(|| {
        FoldkitError::config(format!(
            "{} has no coefficients; use permutation importance",
            model.family()
        ))
    })?;
    Ok(normalize(coef.into_iter().map(|(name, c)| (name, c.abs())).collect()))
}

/// Importance as the mean metric degradation when one predictor column is
/// shuffled, over `repeats` shuffles per predictor. Works for any family.
///
/// Scaled like [`rank_importance`]: equal degradations all become 100.
pub fn permutation_importance(
    model: &FittedModel,
    x: &Matrix,
    target: &Target,
    metric: Metric,
    repeats: usize,
    seed: u64,
) -> Result<Vec<(String, f64)>> {
    if repeats == 0 {
        return Err(FoldkitError::config("permutation importance needs at least one repeat"));
    }
    if x.cols() != model.predictors().len() {
        return Err(FoldkitError::ShapeMismatch {
            expected: vec![model.predictors().len()],
            got: vec![x.cols()],
        });
    }
    let baseline = metric.evaluate(target, &model.predict(x)?)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut order: Vec<usize> = (0..x.rows()).collect();

    let mut scores = Vec::with_capacity(x.cols());
    for (j, name) in model.predictors().iter().enumerate() {
        let original = x.col(j);
        let mut shuffled = x.clone();
        let mut total = 0.0;
        for _ in 0..repeats {
            order.shuffle(&mut rng);
            let permuted: Vec<f64> = order.iter().map(|&i| original[i]).collect();
            shuffled.set_col(j, &permuted)?;
            let score = metric.evaluate(target, &model.predict(&shuffled)?)?;
            total += match metric.direction() {
                Direction::Minimize => score - baseline,
                Direction::Maximize => baseline - score,
            };
        }
        scores.push((name.clone(), total / repeats as f64));
    }
    Ok(normalize(scores))
}

use foldkit_core::{FoldkitError, Matrix, Result};

/// Probabilities are clipped to `[EPS, 1 - EPS]` before taking logs.
pub const LOG_LOSS_EPS: f64 = 1e-15;

fn check_labels(metric: &str, truth: &[usize], labels: &[usize], n_classes: usize) -> Result<()> {
    if truth.len() != labels.len() {
        return Err(FoldkitError::ShapeMismatch {
            expected: vec![truth.len()],
            got: vec![labels.len()],
        });
    }
    if truth.is_empty() {
        return Err(FoldkitError::metric_domain(metric, "no rows to score"));
    }
    if truth.iter().chain(labels).any(|&c| c >= n_classes) {
        return Err(FoldkitError::config(format!(
            "{}: class code out of range for {} classes",
            metric, n_classes
        )));
    }
    Ok(())
}

fn check_probabilities(metric: &str, truth: &[usize], probabilities: &Matrix) -> Result<()> {
    let (rows, cols) = probabilities.shape();
    if rows != truth.len() {
        return Err(FoldkitError::ShapeMismatch {
            expected: vec![truth.len(), cols],
            got: vec![rows, cols],
        });
    }
    if truth.is_empty() {
        return Err(FoldkitError::metric_domain(metric, "no rows to score"));
    }
    if probabilities.has_nan() {
        return Err(FoldkitError::metric_domain(metric, "predicted probability is NaN"));
    }
    if truth.iter().any(|&c| c >= cols) {
        return Err(FoldkitError::config(format!(
            "{}: class code out of range for {} classes",
            metric, cols
        )));
    }
    Ok(())
}

// ─── Label metrics ──────────────────────────────────────────────────────────

/// Confusion matrix indexed `[truth][predicted]`.
pub fn confusion_matrix(truth: &[usize], labels: &[usize], n_classes: usize) -> Vec<Vec<usize>> {
    let mut matrix = vec![vec![0usize; n_classes]; n_classes];
    for (&t, &p) in truth.iter().zip(labels) {
        if t < n_classes && p < n_classes {
            matrix[t][p] += 1;
        }
    }
    matrix
}

/// Fraction of correct predictions.
pub fn accuracy(truth: &[usize], labels: &[usize], n_classes: usize) -> Result<f64> {
    check_labels("accuracy", truth, labels, n_classes)?;
    let correct = truth.iter().zip(labels).filter(|(t, p)| t == p).count();
    Ok(correct as f64 / truth.len() as f64)
}

/// Fraction of incorrect predictions.
pub fn misclassification(truth: &[usize], labels: &[usize], n_classes: usize) -> Result<f64> {
    check_labels("misclassification", truth, labels, n_classes)?;
    Ok(1.0 - accuracy(truth, labels, n_classes)?)
}

/// Average over the classes present in `truth` of each class's miss rate.
pub fn mean_per_class_error(truth: &[usize], labels: &[usize], n_classes: usize) -> Result<f64> {
    check_labels("mean_per_class_error", truth, labels, n_classes)?;
    let cm = confusion_matrix(truth, labels, n_classes);
    let errors: Vec<f64> = (0..n_classes)
        .filter_map(|c| {
            let total: usize = cm[c].iter().sum();
            (total > 0).then(|| 1.0 - cm[c][c] as f64 / total as f64)
        })
        .collect();
    Ok(errors.iter().sum::<f64>() / errors.len() as f64)
}

struct OneVsRest {
    tp: usize,
    fp: usize,
    tn: usize,
    fn_: usize,
}

fn one_vs_rest(cm: &[Vec<usize>], class: usize) -> OneVsRest {
    let n: usize = cm.iter().flatten().sum();
    let tp = cm[class][class];
    let fp: usize = (0..cm.len()).filter(|&t| t != class).map(|t| cm[t][class]).sum();
    let fn_: usize = cm[class].iter().sum::<usize>() - tp;
    OneVsRest {
        tp,
        fp,
        tn: n - tp - fp - fn_,
        fn_,
    }
}

/// Binary value against `event`, or the macro average over all classes when
/// there are more than two. Classes where the ratio is undefined are left out
/// of the average; if every class is undefined the metric is a domain error.
fn binary_or_macro(
    metric: &str,
    truth: &[usize],
    labels: &[usize],
    n_classes: usize,
    event: usize,
    ratio: impl Fn(&OneVsRest) -> Option<f64>,
) -> Result<f64> {
    check_labels(metric, truth, labels, n_classes)?;
    let cm = confusion_matrix(truth, labels, n_classes);
    let classes: Vec<usize> = if n_classes <= 2 { vec![event] } else { (0..n_classes).collect() };
    let values: Vec<f64> = classes
        .iter()
        .filter_map(|&c| ratio(&one_vs_rest(&cm, c)))
        .collect();
    if values.is_empty() {
        return Err(FoldkitError::metric_domain(metric, "undefined for every class"));
    }
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

fn ratio(num: usize, den: usize) -> Option<f64> {
    (den > 0).then(|| num as f64 / den as f64)
}

/// TP / (TP + FP).
pub fn precision(truth: &[usize], labels: &[usize], n_classes: usize, event: usize) -> Result<f64> {
    binary_or_macro("precision", truth, labels, n_classes, event, |c| ratio(c.tp, c.tp + c.fp))
}

/// TP / (TP + FN), also called sensitivity.
pub fn recall(truth: &[usize], labels: &[usize], n_classes: usize, event: usize) -> Result<f64> {
    binary_or_macro("recall", truth, labels, n_classes, event, |c| ratio(c.tp, c.tp + c.fn_))
}

/// TN / (TN + FP).
pub fn specificity(truth: &[usize], labels: &[usize], n_classes: usize, event: usize) -> Result<f64> {
    binary_or_macro("specificity", truth, labels, n_classes, event, |c| ratio(c.tn, c.tn + c.fp))
}

// ─── Probability metrics ────────────────────────────────────────────────────

/// Multi-class Brier score: mean over rows of the summed squared difference
/// between the probability row and the one-hot truth.
pub fn brier(truth: &[usize], probabilities: &Matrix) -> Result<f64> {
    check_probabilities("brier", truth, probabilities)?;
    let sum: f64 = truth
        .iter()
        .enumerate()
        .map(|(i, &t)| {
            probabilities
                .row(i)
                .iter()
                .enumerate()
                .map(|(j, &p)| {
                    let target = if j == t { 1.0 } else { 0.0 };
                    (p - target) * (p - target)
                })
                .sum::<f64>()
        })
        .sum();
    Ok(sum / truth.len() as f64)
}

/// Cross-entropy of the true class probability.
pub fn log_loss(truth: &[usize], probabilities: &Matrix) -> Result<f64> {
    check_probabilities("log_loss", truth, probabilities)?;
    let sum: f64 = truth
        .iter()
        .enumerate()
        .map(|(i, &t)| {
            let p = probabilities.get(i, t).clamp(LOG_LOSS_EPS, 1.0 - LOG_LOSS_EPS);
            -p.ln()
        })
        .sum();
    Ok(sum / truth.len() as f64)
}

/// Area under the ROC curve.
///
/// Binary: rows ranked by the `event` column's probability. More than two
/// classes: one-vs-rest macro average over the classes present in `truth`.
pub fn roc_auc(truth: &[usize], probabilities: &Matrix, event: usize) -> Result<f64> {
    check_probabilities("roc_auc", truth, probabilities)?;
    let n_classes = probabilities.cols();
    if n_classes <= 2 {
        let positive: Vec<bool> = truth.iter().map(|&t| t == event).collect();
        return binary_auc(&positive, &probabilities.col(event));
    }
    let aucs: Vec<f64> = (0..n_classes)
        .filter(|c| truth.contains(c))
        .map(|c| {
            let positive: Vec<bool> = truth.iter().map(|&t| t == c).collect();
            binary_auc(&positive, &probabilities.col(c))
        })
        .collect::<Result<_>>()?;
    if aucs.len() < 2 {
        return Err(FoldkitError::metric_domain("roc_auc", "only one class present"));
    }
    Ok(aucs.iter().sum::<f64>() / aucs.len() as f64)
}

/// Trapezoidal AUC of TPR over FPR, with tied scores stepping together.
fn binary_auc(positive: &[bool], scores: &[f64]) -> Result<f64> {
    let n_pos = positive.iter().filter(|&&p| p).count();
    let n_neg = positive.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(FoldkitError::metric_domain("roc_auc", "only one class present"));
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let (mut tp, mut fp) = (0usize, 0usize);
    let (mut prev_tpr, mut prev_fpr) = (0.0, 0.0);
    let mut area = 0.0;
    let mut i = 0;
    while i < order.len() {
        let score = scores[order[i]];
        while i < order.len() && scores[order[i]] == score {
            if positive[order[i]] {
                tp += 1;
            } else {
                fp += 1;
            }
            i += 1;
        }
        let tpr = tp as f64 / n_pos as f64;
        let fpr = fp as f64 / n_neg as f64;
        area += (fpr - prev_fpr) * (tpr + prev_tpr) / 2.0;
        prev_tpr = tpr;
        prev_fpr = fpr;
    }
    Ok(area)
}

// ─── Impurity ───────────────────────────────────────────────────────────────

/// Gini impurity `1 - Σ p_c²` of a class count vector; 0 for an empty node.
pub fn gini_from_counts(counts: &[usize]) -> f64 {
    let n: usize = counts.iter().sum();
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    1.0 - counts.iter().map(|&c| (c as f64 / n).powi(2)).sum::<f64>()
}

/// Gini impurity of a set of class codes.
pub fn gini_impurity(labels: &[usize], n_classes: usize) -> Result<f64> {
    if labels.is_empty() {
        return Err(FoldkitError::metric_domain("gini", "no rows"));
    }
    let mut counts = vec![0usize; n_classes];
    for &c in labels {
        let slot = counts.get_mut(c).ok_or_else(|| {
            FoldkitError::config(format!("gini: class code {} out of range", c))
        })?;
        *slot += 1;
    }
    Ok(gini_from_counts(&counts))
}

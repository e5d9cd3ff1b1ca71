use foldkit_core::{FoldkitError, Matrix, Result};
use foldkit_metrics::gini_from_counts;
use serde::{Deserialize, Serialize};

/// A node in the decision tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum TreeNode {
    /// Internal node: rows with `x[feature] <= threshold` go left.
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
    /// Leaf: a regression value or a class code.
    Leaf { value: f64 },
}

impl TreeNode {
    fn predict(&self, row: &[f64]) -> f64 {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }
}

/// Split quality, accumulated row by row so each feature needs one sorted scan.
trait Impurity {
    type Acc: Clone;
    fn empty(&self) -> Self::Acc;
    fn add(&self, acc: &mut Self::Acc, row: usize);
    fn remove(&self, acc: &mut Self::Acc, row: usize);
    /// Node impurity weighted by node size.
    fn cost(&self, acc: &Self::Acc) -> f64;
    fn leaf_value(&self, acc: &Self::Acc) -> f64;
}

struct Variance<'a> {
    y: &'a [f64],
}

impl Impurity for Variance<'_> {
    type Acc = (usize, f64, f64);

    fn empty(&self) -> Self::Acc {
        (0, 0.0, 0.0)
    }

    fn add(&self, acc: &mut Self::Acc, row: usize) {
        let v = self.y[row];
        acc.0 += 1;
        acc.1 += v;
        acc.2 += v * v;
    }

    fn remove(&self, acc: &mut Self::Acc, row: usize) {
        let v = self.y[row];
        acc.0 -= 1;
        acc.1 -= v;
        acc.2 -= v * v;
    }

    fn cost(&self, acc: &Self::Acc) -> f64 {
        if acc.0 == 0 {
            return 0.0;
        }
        (acc.2 - acc.1 * acc.1 / acc.0 as f64).max(0.0)
    }

    fn leaf_value(&self, acc: &Self::Acc) -> f64 {
        if acc.0 == 0 {
            0.0
        } else {
            acc.1 / acc.0 as f64
        }
    }
}

struct Gini<'a> {
    codes: &'a [usize],
    n_classes: usize,
}

impl Impurity for Gini<'_> {
    type Acc = Vec<usize>;

    fn empty(&self) -> Self::Acc {
        vec![0; self.n_classes]
    }

    fn add(&self, acc: &mut Self::Acc, row: usize) {
        acc[self.codes[row]] += 1;
    }

    fn remove(&self, acc: &mut Self::Acc, row: usize) {
        acc[self.codes[row]] -= 1;
    }

    fn cost(&self, acc: &Self::Acc) -> f64 {
        acc.iter().sum::<usize>() as f64 * gini_from_counts(acc)
    }

    fn leaf_value(&self, acc: &Self::Acc) -> f64 {
        // majority class, lowest code on ties
        let mut best = 0;
        for (c, &n) in acc.iter().enumerate() {
            if n > acc[best] {
                best = c;
            }
        }
        best as f64
    }
}

/// Growth limits shared by both tree kinds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        TreeParams {
            max_depth: 10,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

fn build<I: Impurity>(x: &Matrix, crit: &I, rows: &[usize], params: &TreeParams, depth: usize) -> TreeNode {
    let mut total = crit.empty();
    rows.iter().for_each(|&r| crit.add(&mut total, r));
    let leaf = TreeNode::Leaf {
        value: crit.leaf_value(&total),
    };
    let node_cost = crit.cost(&total);
    if depth >= params.max_depth || rows.len() < params.min_samples_split.max(2) || node_cost <= 1e-12 {
        return leaf;
    }

    let min_leaf = params.min_samples_leaf.max(1);
    let mut best: Option<(f64, usize, f64)> = None;
    for feature in 0..x.cols() {
        let mut sorted = rows.to_vec();
        sorted.sort_by(|&a, &b| x.get(a, feature).total_cmp(&x.get(b, feature)));
        let mut left = crit.empty();
        let mut right = total.clone();
        for pos in 0..sorted.len() - 1 {
            let r = sorted[pos];
            crit.add(&mut left, r);
            crit.remove(&mut right, r);
            let here = x.get(r, feature);
            let next = x.get(sorted[pos + 1], feature);
            let n_left = pos + 1;
            if here == next || n_left < min_leaf || sorted.len() - n_left < min_leaf {
                continue;
            }
            let cost = crit.cost(&left) + crit.cost(&right);
            if best.map_or(true, |(c, _, _)| cost < c - 1e-12) {
                best = Some((cost, feature, (here + next) / 2.0));
            }
        }
    }

    let Some((cost, feature, threshold)) = best else {
        return leaf;
    };
    if cost >= node_cost {
        return leaf;
    }
    let (l, r): (Vec<usize>, Vec<usize>) = rows.iter().copied().partition(|&i| x.get(i, feature) <= threshold);
    TreeNode::Split {
        feature,
        threshold,
        left: Box::new(build(x, crit, &l, params, depth + 1)),
        right: Box::new(build(x, crit, &r, params, depth + 1)),
    }
}

fn check_fit_input(x: &Matrix, n_targets: usize) -> Result<()> {
    if x.rows() != n_targets {
        return Err(FoldkitError::ShapeMismatch {
            expected: vec![n_targets, x.cols()],
            got: vec![x.rows(), x.cols()],
        });
    }
    if x.rows() == 0 {
        return Err(FoldkitError::config("cannot grow a tree on zero rows"));
    }
    if x.has_nan() {
        return Err(FoldkitError::config("tree features contain missing values"));
    }
    Ok(())
}

fn predict_rows(tree: Option<&TreeNode>, n_features: usize, x: &Matrix) -> Result<Vec<f64>> {
    let tree = tree.ok_or_else(|| FoldkitError::config("tree is not fitted"))?;
    if x.cols() != n_features {
        return Err(FoldkitError::ShapeMismatch {
            expected: vec![x.rows(), n_features],
            got: vec![x.rows(), x.cols()],
        });
    }
    Ok((0..x.rows()).map(|i| tree.predict(x.row(i))).collect())
}

// ─── Regressor ──────────────────────────────────────────────────────────────

/// Decision Tree Regressor using CART (squared-error criterion).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTreeRegressor {
    pub params: TreeParams,
    n_features: usize,
    tree: Option<TreeNode>,
}

impl DecisionTreeRegressor {
    pub fn new(params: TreeParams) -> Self {
        DecisionTreeRegressor {
            params,
            n_features: 0,
            tree: None,
        }
    }

    pub fn fit(&mut self, x: &Matrix, y: &[f64]) -> Result<()> {
        check_fit_input(x, y.len())?;
        let rows: Vec<usize> = (0..x.rows()).collect();
        self.n_features = x.cols();
        self.tree = Some(build(x, &Variance { y }, &rows, &self.params, 0));
        Ok(())
    }

    pub fn predict(&self, x: &Matrix) -> Result<Vec<f64>> {
        predict_rows(self.tree.as_ref(), self.n_features, x)
    }
}

// ─── Classifier ─────────────────────────────────────────────────────────────

/// Decision Tree Classifier using CART (Gini impurity).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTreeClassifier {
    pub params: TreeParams,
    n_classes: usize,
    n_features: usize,
    tree: Option<TreeNode>,
}

impl DecisionTreeClassifier {
    pub fn new(params: TreeParams) -> Self {
        DecisionTreeClassifier {
            params,
            n_classes: 0,
            n_features: 0,
            tree: None,
        }
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn fit(&mut self, x: &Matrix, codes: &[usize], n_classes: usize) -> Result<()> {
        check_fit_input(x, codes.len())?;
        if let Some(&bad) = codes.iter().find(|&&c| c >= n_classes) {
            return Err(FoldkitError::config(format!(
                "class code {} out of range for {} classes",
                bad, n_classes
            )));
        }
        let rows: Vec<usize> = (0..x.rows()).collect();
        self.n_classes = n_classes;
        self.n_features = x.cols();
        let crit = Gini { codes, n_classes };
        self.tree = Some(build(x, &crit, &rows, &self.params, 0));
        Ok(())
    }

    pub fn predict(&self, x: &Matrix) -> Result<Vec<usize>> {
        let raw = predict_rows(self.tree.as_ref(), self.n_features, x)?;
        Ok(raw.into_iter().map(|v| v as usize).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(values: &[f64]) -> Matrix {
        Matrix::from_rows(&values.iter().map(|&v| vec![v]).collect::<Vec<_>>()).unwrap()
    }

    #[test]
    fn test_decision_tree_classifier() {
        let x = column(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        let y = [0, 0, 0, 0, 1, 1, 1, 1];

        let mut tree = DecisionTreeClassifier::new(TreeParams::default());
        tree.fit(&x, &y, 2).unwrap();
        assert_eq!(tree.predict(&x).unwrap(), y.to_vec());
        assert_eq!(tree.predict(&column(&[3.4, 3.6])).unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_decision_tree_regressor() {
        let x = column(&[1.0, 2.0, 3.0, 4.0]);
        let y = [2.0, 4.0, 6.0, 8.0];

        let mut tree = DecisionTreeRegressor::new(TreeParams::default());
        tree.fit(&x, &y).unwrap();
        let pred = tree.predict(&x).unwrap();
        for i in 0..4 {
            assert!((pred[i] - y[i]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_depth_limit_gives_group_means() {
        let x = column(&[1.0, 2.0, 10.0, 11.0]);
        let y = [1.0, 3.0, 10.0, 12.0];
        let mut tree = DecisionTreeRegressor::new(TreeParams {
            max_depth: 1,
            ..TreeParams::default()
        });
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.predict(&x).unwrap(), vec![2.0, 2.0, 11.0, 11.0]);
    }

    #[test]
    fn test_picks_informative_feature() {
        // second feature separates the classes, first is noise
        let x = Matrix::from_rows(&[
            vec![5.0, 0.0],
            vec![1.0, 0.1],
            vec![4.0, 0.2],
            vec![2.0, 0.9],
            vec![3.0, 1.0],
            vec![0.0, 1.1],
        ])
        .unwrap();
        let mut tree = DecisionTreeClassifier::new(TreeParams {
            max_depth: 1,
            ..TreeParams::default()
        });
        tree.fit(&x, &[0, 0, 0, 1, 1, 1], 2).unwrap();
        assert_eq!(tree.predict(&x).unwrap(), vec![0, 0, 0, 1, 1, 1]);
    }

    #[test]
    fn test_unfitted_and_nan_inputs_rejected() {
        let tree = DecisionTreeRegressor::new(TreeParams::default());
        assert!(tree.predict(&column(&[1.0])).is_err());
        let mut tree = DecisionTreeRegressor::new(TreeParams::default());
        assert!(tree.fit(&column(&[1.0, f64::NAN]), &[1.0, 2.0]).is_err());
    }
}

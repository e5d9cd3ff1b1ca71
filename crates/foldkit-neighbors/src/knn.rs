use foldkit_core::{FoldkitError, Matrix, Result};
use serde::{Deserialize, Serialize};

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Indices of the `k` training rows closest to `query` in Euclidean
/// distance; equal distances keep the earlier training row.
fn nearest(train: &Matrix, query: &[f64], k: usize) -> Vec<usize> {
    let mut dists: Vec<(f64, usize)> = (0..train.rows())
        .map(|j| (squared_distance(query, train.row(j)), j))
        .collect();
    dists.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    dists.into_iter().take(k).map(|(_, j)| j).collect()
}

fn check_fit(k: usize, x: &Matrix, n_targets: usize) -> Result<()> {
    if k == 0 {
        return Err(FoldkitError::config("neighbors must be at least 1"));
    }
    if x.rows() != n_targets {
        return Err(FoldkitError::ShapeMismatch {
            expected: vec![x.rows()],
            got: vec![n_targets],
        });
    }
    if k > x.rows() {
        return Err(FoldkitError::FitConvergence(format!(
            "{} neighbors requested but only {} training rows",
            k,
            x.rows()
        )));
    }
    Ok(())
}

fn check_query(train: &Matrix, x: &Matrix) -> Result<()> {
    if x.cols() != train.cols() {
        return Err(FoldkitError::ShapeMismatch {
            expected: vec![train.cols()],
            got: vec![x.cols()],
        });
    }
    Ok(())
}

fn not_fitted() -> FoldkitError {
    FoldkitError::config("model not fitted")
}

/// K-Nearest Neighbors Regressor: the mean outcome of the `k` closest
/// training rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnnRegressor {
    pub k: usize,
    x_train: Option<Matrix>,
    y_train: Option<Vec<f64>>,
}

impl KnnRegressor {
    pub fn new(k: usize) -> Self {
        KnnRegressor {
            k,
            x_train: None,
            y_train: None,
        }
    }

    /// Training rows fewer than `k` is a `FitConvergence` error.
    pub fn fit(&mut self, x: &Matrix, y: &[f64]) -> Result<()> {
        check_fit(self.k, x, y.len())?;
        self.x_train = Some(x.clone());
        self.y_train = Some(y.to_vec());
        Ok(())
    }

    pub fn predict(&self, x: &Matrix) -> Result<Vec<f64>> {
        let (x_train, y_train) = self
            .x_train
            .as_ref()
            .zip(self.y_train.as_ref())
            .ok_or_else(not_fitted)?;
        check_query(x_train, x)?;
        Ok((0..x.rows())
            .map(|i| {
                let idx = nearest(x_train, x.row(i), self.k);
                idx.iter().map(|&j| y_train[j]).sum::<f64>() / idx.len() as f64
            })
            .collect())
    }
}

/// K-Nearest Neighbors Classifier: class probabilities are the vote shares
/// among the `k` closest training rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnnClassifier {
    pub k: usize,
    pub n_classes: usize,
    x_train: Option<Matrix>,
    y_train: Option<Vec<usize>>,
}

impl KnnClassifier {
    pub fn new(k: usize) -> Self {
        KnnClassifier {
            k,
            n_classes: 0,
            x_train: None,
            y_train: None,
        }
    }

    pub fn fit(&mut self, x: &Matrix, y: &[usize], n_classes: usize) -> Result<()> {
        check_fit(self.k, x, y.len())?;
        if let Some(&bad) = y.iter().find(|&&c| c >= n_classes) {
            return Err(FoldkitError::config(format!(
                "class code {} out of range for {} classes",
                bad, n_classes
            )));
        }
        self.x_train = Some(x.clone());
        self.y_train = Some(y.to_vec());
        self.n_classes = n_classes;
        Ok(())
    }

    /// `[rows, n_classes]` vote shares.
    pub fn predict_proba(&self, x: &Matrix) -> Result<Matrix> {
        let (x_train, y_train) = self
            .x_train
            .as_ref()
            .zip(self.y_train.as_ref())
            .ok_or_else(not_fitted)?;
        check_query(x_train, x)?;
        let mut proba = Matrix::zeros(x.rows(), self.n_classes);
        for i in 0..x.rows() {
            let idx = nearest(x_train, x.row(i), self.k);
            let share = 1.0 / idx.len() as f64;
            for j in idx {
                let c = y_train[j];
                proba.set(i, c, proba.get(i, c) + share);
            }
        }
        Ok(proba)
    }

    /// Majority vote; ties go to the lower class code.
    pub fn predict(&self, x: &Matrix) -> Result<Vec<usize>> {
        let proba = self.predict_proba(x)?;
        Ok((0..proba.rows())
            .map(|i| {
                let row = proba.row(i);
                (0..row.len()).fold(0, |best, c| if row[c] > row[best] { c } else { best })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn points() -> Matrix {
        Matrix::from_rows(&[
            vec![0.0, 0.0],
            vec![0.5, 0.5],
            vec![1.0, 1.0],
            vec![5.0, 5.0],
            vec![5.5, 5.5],
            vec![6.0, 6.0],
        ])
        .unwrap()
    }

    #[test]
    fn test_knn_classifier() {
        let y = [0, 0, 0, 1, 1, 1];
        let mut knn = KnnClassifier::new(3);
        knn.fit(&points(), &y, 2).unwrap();
        assert_eq!(knn.predict(&points()).unwrap(), y.to_vec());

        let proba = knn.predict_proba(&Matrix::from_rows(&[vec![0.2, 0.2]]).unwrap()).unwrap();
        assert_abs_diff_eq!(proba.get(0, 0), 1.0);
        assert_abs_diff_eq!(proba.get(0, 1), 0.0);
    }

    #[test]
    fn test_knn_regressor_averages_neighbors() {
        let y = [1.0, 2.0, 3.0, 10.0, 11.0, 12.0];
        let mut knn = KnnRegressor::new(2);
        knn.fit(&points(), &y).unwrap();
        let pred = knn.predict(&Matrix::from_rows(&[vec![5.6, 5.6]]).unwrap()).unwrap();
        assert_abs_diff_eq!(pred[0], 11.5);
    }

    #[test]
    fn test_too_many_neighbors_is_cell_level() {
        let mut knn = KnnRegressor::new(10);
        let err = knn.fit(&points(), &[0.0; 6]).unwrap_err();
        assert!(err.is_cell_recoverable());
    }

    #[test]
    fn test_vote_tie_goes_to_lower_class() {
        let x = Matrix::from_rows(&[vec![0.0], vec![2.0]]).unwrap();
        let mut knn = KnnClassifier::new(2);
        knn.fit(&x, &[1, 0], 2).unwrap();
        assert_eq!(knn.predict(&Matrix::from_rows(&[vec![1.0]]).unwrap()).unwrap(), vec![0]);
    }
}

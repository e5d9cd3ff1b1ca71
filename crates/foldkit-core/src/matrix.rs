use crate::error::{FoldkitError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Dense 2-D matrix of `f64`: the numeric design matrix handed to models.
///
/// Stores data in a flat contiguous `Vec<f64>` with row-major (C-order) layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    data: Vec<f64>,
    rows: usize,
    cols: usize,
}

// ─── Construction ───────────────────────────────────────────────────────────

impl Matrix {
    /// Create a matrix from raw row-major data.
    pub fn new(data: Vec<f64>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(FoldkitError::ShapeMismatch {
                expected: vec![rows, cols],
                got: vec![data.len()],
            });
        }
        Ok(Matrix { data, rows, cols })
    }

    /// Create a matrix filled with zeros.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Matrix {
            data: vec![0.0; rows * cols],
            rows,
            cols,
        }
    }

    /// Identity matrix.
    pub fn eye(n: usize) -> Self {
        let mut m = Matrix::zeros(n, n);
        for i in 0..n {
            m.data[i * n + i] = 1.0;
        }
        m
    }

    /// Create a matrix from a slice of equal-length rows.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let n = rows.len();
        let p = rows.first().map(|r| r.len()).unwrap_or(0);
        let mut data = Vec::with_capacity(n * p);
        for r in rows {
            if r.len() != p {
                return Err(FoldkitError::ShapeMismatch {
                    expected: vec![p],
                    got: vec![r.len()],
                });
            }
            data.extend_from_slice(r);
        }
        Ok(Matrix { data, rows: n, cols: p })
    }

    /// Create a matrix from equal-length columns.
    pub fn from_columns(columns: &[Vec<f64>]) -> Result<Self> {
        let p = columns.len();
        let n = columns.first().map(|c| c.len()).unwrap_or(0);
        let mut m = Matrix::zeros(n, p);
        for (j, c) in columns.iter().enumerate() {
            if c.len() != n {
                return Err(FoldkitError::ShapeMismatch {
                    expected: vec![n],
                    got: vec![c.len()],
                });
            }
            for (i, &v) in c.iter().enumerate() {
                m.data[i * p + j] = v;
            }
        }
        Ok(m)
    }
}

// ─── Access ─────────────────────────────────────────────────────────────────

impl Matrix {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Element at `(i, j)`; panics when out of bounds like slice indexing.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.cols + j]
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        self.data[i * self.cols + j] = value;
    }

    /// Borrow row `i`.
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// Copy out column `j`.
    pub fn col(&self, j: usize) -> Vec<f64> {
        (0..self.rows).map(|i| self.get(i, j)).collect()
    }

    /// Overwrite column `j`.
    pub fn set_col(&mut self, j: usize, values: &[f64]) -> Result<()> {
        if values.len() != self.rows {
            return Err(FoldkitError::ShapeMismatch {
                expected: vec![self.rows],
                got: vec![values.len()],
            });
        }
        for (i, &v) in values.iter().enumerate() {
            self.set(i, j, v);
        }
        Ok(())
    }

    /// Gather the given rows (duplicates allowed) into a new matrix.
    pub fn select_rows(&self, indices: &[usize]) -> Matrix {
        let mut data = Vec::with_capacity(indices.len() * self.cols);
        for &i in indices {
            data.extend_from_slice(self.row(i));
        }
        Matrix {
            data,
            rows: indices.len(),
            cols: self.cols,
        }
    }

    /// Gather the given columns into a new matrix.
    pub fn select_cols(&self, indices: &[usize]) -> Matrix {
        let mut data = Vec::with_capacity(self.rows * indices.len());
        for i in 0..self.rows {
            for &j in indices {
                data.push(self.get(i, j));
            }
        }
        Matrix {
            data,
            rows: self.rows,
            cols: indices.len(),
        }
    }

    pub fn has_nan(&self) -> bool {
        self.data.iter().any(|v| v.is_nan())
    }
}

// ─── Linear algebra primitives ──────────────────────────────────────────────

impl Matrix {
    /// Transpose.
    pub fn t(&self) -> Matrix {
        let mut out = Matrix::zeros(self.cols, self.rows);
        for i in 0..self.rows {
            for j in 0..self.cols {
                out.data[j * self.rows + i] = self.data[i * self.cols + j];
            }
        }
        out
    }

    /// Matrix product `self @ other`.
    pub fn matmul(&self, other: &Matrix) -> Result<Matrix> {
        if self.cols != other.rows {
            return Err(FoldkitError::ShapeMismatch {
                expected: vec![self.cols],
                got: vec![other.rows],
            });
        }
        let mut out = Matrix::zeros(self.rows, other.cols);
        for i in 0..self.rows {
            for k in 0..self.cols {
                let a = self.data[i * self.cols + k];
                if a == 0.0 {
                    continue;
                }
                for j in 0..other.cols {
                    out.data[i * other.cols + j] += a * other.data[k * other.cols + j];
                }
            }
        }
        Ok(out)
    }

    /// Matrix-vector product `self @ v`.
    pub fn mul_vec(&self, v: &[f64]) -> Result<Vec<f64>> {
        if v.len() != self.cols {
            return Err(FoldkitError::ShapeMismatch {
                expected: vec![self.cols],
                got: vec![v.len()],
            });
        }
        Ok((0..self.rows)
            .map(|i| self.row(i).iter().zip(v).map(|(a, b)| a * b).sum())
            .collect())
    }

    /// Per-column means.
    pub fn column_means(&self) -> Vec<f64> {
        let mut means = vec![0.0; self.cols];
        if self.rows == 0 {
            return means;
        }
        for i in 0..self.rows {
            for (j, m) in means.iter_mut().enumerate() {
                *m += self.get(i, j);
            }
        }
        let n = self.rows as f64;
        means.iter_mut().for_each(|m| *m /= n);
        means
    }

    /// Copy with each column shifted by `-means[j]`.
    pub fn centered(&self, means: &[f64]) -> Matrix {
        let mut out = self.clone();
        for i in 0..self.rows {
            for j in 0..self.cols {
                out.data[i * self.cols + j] -= means[j];
            }
        }
        out
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Matrix({}x{})", self.rows, self.cols)?;
        for i in 0..self.rows.min(10) {
            let row: Vec<String> = self.row(i).iter().map(|v| format!("{:.4}", v)).collect();
            writeln!(f, "  [{}]", row.join(", "))?;
        }
        if self.rows > 10 {
            writeln!(f, "  ... {} more rows", self.rows - 10)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_checks_shape() {
        assert!(Matrix::new(vec![1.0, 2.0, 3.0], 2, 2).is_err());
        let m = Matrix::new(vec![1.0, 2.0, 3.0, 4.0], 2, 2).unwrap();
        assert_eq!(m.get(1, 0), 3.0);
    }

    #[test]
    fn test_matmul_and_transpose() {
        let a = Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]).unwrap();
        let ata = a.t().matmul(&a).unwrap();
        assert_eq!(ata.shape(), (2, 2));
        assert_eq!(ata.get(0, 0), 35.0);
        assert_eq!(ata.get(0, 1), 44.0);
        assert_eq!(ata.get(1, 1), 56.0);
        assert!(a.matmul(&a).is_err());
    }

    #[test]
    fn test_select_rows_with_duplicates() {
        let a = Matrix::from_rows(&[vec![1.0], vec![2.0], vec![3.0]]).unwrap();
        let b = a.select_rows(&[2, 2, 0]);
        assert_eq!(b.data(), &[3.0, 3.0, 1.0]);
    }

    #[test]
    fn test_from_columns_roundtrip() {
        let m = Matrix::from_columns(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(m.row(0), &[1.0, 3.0]);
        assert_eq!(m.col(1), vec![3.0, 4.0]);
        assert_eq!(m.column_means(), vec![1.5, 3.5]);
    }
}

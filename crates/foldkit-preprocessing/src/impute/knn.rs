use foldkit_core::{Column, ColumnData, DataFrame, FoldkitError, Result};
use serde::{Deserialize, Serialize};

use super::mode_category;

/// Nearest-neighbor imputer.
///
/// Donors are the fit rows. Distance is the root mean squared difference over
/// the other numeric selected columns both rows observe, each scaled by its
/// fit-row range. Numeric gaps get the donor mean, categorical gaps the donor
/// mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnnImputer {
    pub neighbors: usize,
    pub columns: Vec<String>,
    /// Fit rows restricted to `columns`.
    donors: DataFrame,
    /// Indices into `columns` of the numeric ones, with their fit minimum and range.
    numeric: Vec<(usize, f64, f64)>,
}

impl KnnImputer {
    pub fn fit(frame: &DataFrame, columns: &[String], neighbors: usize) -> Result<Self> {
        if neighbors < 1 {
            return Err(FoldkitError::config("knn imputation needs at least one neighbor"));
        }
        let donors = frame.select_columns(columns)?;
        let mut numeric = Vec::new();
        for (j, col) in donors.columns().iter().enumerate() {
            if col.missing_count() == col.len() {
                return Err(FoldkitError::config(format!(
                    "column '{}' has no observed values to impute from",
                    col.name()
                )));
            }
            if let ColumnData::Numeric(v) = col.data() {
                let observed = v.iter().copied().filter(|x| !x.is_nan());
                let (lo, hi) = observed.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| {
                    (lo.min(x), hi.max(x))
                });
                let range = if hi - lo > 0.0 { hi - lo } else { 1.0 };
                numeric.push((j, lo, range));
            }
        }
        Ok(KnnImputer {
            neighbors,
            columns: columns.to_vec(),
            donors,
            numeric,
        })
    }

    /// Scaled numeric features of one row of `frame` (NaN when missing).
    fn features(&self, frame: &DataFrame, row: usize) -> Result<Vec<f64>> {
        self.numeric
            .iter()
            .map(|&(j, lo, range)| {
                let v = frame.column(&self.columns[j])?.numeric_values()?[row];
                Ok((v - lo) / range)
            })
            .collect()
    }

    fn distance(a: &[f64], b: &[f64], skip: Option<usize>) -> f64 {
        let mut count = 0usize;
        let mut accum = 0.0;
        for (k, (&ai, &bi)) in a.iter().zip(b).enumerate() {
            if Some(k) == skip || ai.is_nan() || bi.is_nan() {
                continue;
            }
            count += 1;
            accum += (ai - bi) * (ai - bi);
        }
        if count == 0 {
            return f64::INFINITY;
        }
        (accum / count as f64).sqrt()
    }

    pub fn apply(&self, frame: &DataFrame) -> Result<DataFrame> {
        for name in &self.columns {
            let kind = frame.column(name)?.kind();
            if kind != self.donors.column(name)?.kind() {
                return Err(FoldkitError::config(format!(
                    "column '{}' changed kind since the imputer was fit",
                    name
                )));
            }
        }
        let donor_features = (0..self.donors.n_rows())
            .map(|r| self.features(&self.donors, r))
            .collect::<Result<Vec<_>>>()?;

        let mut out = frame.clone();
        for (j, name) in self.columns.iter().enumerate() {
            let target = frame.column(name)?;
            let missing: Vec<usize> = (0..target.len()).filter(|&r| target.is_missing(r)).collect();
            if missing.is_empty() {
                continue;
            }
            let donor_col = self.donors.column(name)?;
            let candidates: Vec<usize> = (0..donor_col.len()).filter(|&r| !donor_col.is_missing(r)).collect();
            let skip = self.numeric.iter().position(|&(k, _, _)| k == j);

            let mut imputed = target.clone();
            for &row in &missing {
                let query = self.features(frame, row)?;
                let mut ranked: Vec<(f64, usize)> = candidates
                    .iter()
                    .map(|&d| (Self::distance(&query, &donor_features[d], skip), d))
                    .collect();
                ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
                let nearest: Vec<usize> = ranked.iter().take(self.neighbors).map(|&(_, d)| d).collect();
                imputed = fill_one(imputed, row, donor_col, &nearest);
            }
            out.put_column(imputed)?;
        }
        Ok(out)
    }
}

fn fill_one(column: Column, row: usize, donors: &Column, nearest: &[usize]) -> Column {
    let name = column.name().to_string();
    match (column.data(), donors.data()) {
        (ColumnData::Numeric(v), ColumnData::Numeric(d)) => {
            let mut v = v.clone();
            v[row] = nearest.iter().map(|&i| d[i]).sum::<f64>() / nearest.len() as f64;
            Column::numeric(name, v)
        }
        (ColumnData::Categorical(v), ColumnData::Categorical(d)) => {
            let mut v = v.clone();
            v[row] = mode_category(nearest.iter().filter_map(|&i| d[i].as_ref()));
            Column::categorical(name, v)
        }
        _ => column,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fit_frame() -> DataFrame {
        DataFrame::new(vec![
            Column::numeric("height", vec![150.0, 152.0, 180.0, 182.0, 184.0]),
            Column::numeric("weight", vec![50.0, 52.0, 80.0, 82.0, 90.0]),
            Column::from_strs("size", &["s", "s", "l", "l", "l"]),
        ])
        .unwrap()
    }

    fn cols() -> Vec<String> {
        vec!["height".into(), "weight".into(), "size".into()]
    }

    #[test]
    fn test_numeric_gap_gets_donor_mean() {
        let imp = KnnImputer::fit(&fit_frame(), &cols(), 2).unwrap();
        let later = DataFrame::new(vec![
            Column::numeric("height", vec![151.0]),
            Column::numeric("weight", vec![f64::NAN]),
            Column::categorical("size", vec![None]),
        ])
        .unwrap();
        let out = imp.apply(&later).unwrap();
        assert_eq!(out.column("weight").unwrap().as_numeric().unwrap()[0], 51.0);
        assert_eq!(out.column("size").unwrap().as_categorical().unwrap()[0], Some("s".to_string()));
    }

    #[test]
    fn test_donors_are_fit_rows_only() {
        let imp = KnnImputer::fit(&fit_frame().select_rows(&[2, 3, 4]), &cols(), 1).unwrap();
        let later = DataFrame::new(vec![
            Column::numeric("height", vec![150.0]),
            Column::numeric("weight", vec![f64::NAN]),
            Column::from_strs("size", &["s"]),
        ])
        .unwrap();
        let out = imp.apply(&later).unwrap();
        // nearest remaining donor is the 180 cm row
        assert_eq!(out.column("weight").unwrap().as_numeric().unwrap()[0], 80.0);
    }

    #[test]
    fn test_idempotent() {
        let df = DataFrame::new(vec![
            Column::numeric("height", vec![150.0, f64::NAN, 181.0]),
            Column::numeric("weight", vec![f64::NAN, 60.0, 81.0]),
            Column::from_strs("size", &["s", "s", "l"]),
        ])
        .unwrap();
        let imp = KnnImputer::fit(&fit_frame(), &cols(), 3).unwrap();
        let once = imp.apply(&df).unwrap();
        assert_eq!(imp.apply(&once).unwrap(), once);
    }
}

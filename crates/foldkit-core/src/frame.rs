use crate::error::{FoldkitError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// A single scalar cell of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Number(f64),
    Category(String),
    Missing,
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        if v.is_nan() {
            Value::Missing
        } else {
            Value::Number(v)
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Category(v.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

/// Column storage. Numeric missing values are `NaN`, categorical ones `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnData {
    Numeric(Vec<f64>),
    Categorical(Vec<Option<String>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Categorical(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            ColumnData::Numeric(_) => ColumnKind::Numeric,
            ColumnData::Categorical(_) => ColumnKind::Categorical,
        }
    }

    fn select(&self, indices: &[usize]) -> ColumnData {
        match self {
            ColumnData::Numeric(v) => ColumnData::Numeric(indices.iter().map(|&i| v[i]).collect()),
            ColumnData::Categorical(v) => {
                ColumnData::Categorical(indices.iter().map(|&i| v[i].clone()).collect())
            }
        }
    }
}

/// A named column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    name: String,
    data: ColumnData,
}

impl Column {
    pub fn numeric(name: impl Into<String>, values: Vec<f64>) -> Self {
        Column {
            name: name.into(),
            data: ColumnData::Numeric(values),
        }
    }

    pub fn categorical(name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        Column {
            name: name.into(),
            data: ColumnData::Categorical(values),
        }
    }

    /// Convenience constructor for fully observed string columns.
    pub fn from_strs(name: impl Into<String>, values: &[&str]) -> Self {
        Column::categorical(name, values.iter().map(|s| Some(s.to_string())).collect())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    pub fn kind(&self) -> ColumnKind {
        self.data.kind()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_numeric(&self) -> Option<&[f64]> {
        match &self.data {
            ColumnData::Numeric(v) => Some(v),
            ColumnData::Categorical(_) => None,
        }
    }

    pub fn as_categorical(&self) -> Option<&[Option<String>]> {
        match &self.data {
            ColumnData::Categorical(v) => Some(v),
            ColumnData::Numeric(_) => None,
        }
    }

    /// Numeric values, or a configuration error naming the column.
    pub fn numeric_values(&self) -> Result<&[f64]> {
        self.as_numeric().ok_or_else(|| {
            FoldkitError::config(format!("column '{}' is categorical, expected numeric", self.name))
        })
    }

    /// Categorical values, or a configuration error naming the column.
    pub fn categorical_values(&self) -> Result<&[Option<String>]> {
        self.as_categorical().ok_or_else(|| {
            FoldkitError::config(format!("column '{}' is numeric, expected categorical", self.name))
        })
    }

    pub fn is_missing(&self, row: usize) -> bool {
        match &self.data {
            ColumnData::Numeric(v) => v[row].is_nan(),
            ColumnData::Categorical(v) => v[row].is_none(),
        }
    }

    pub fn missing_count(&self) -> usize {
        (0..self.len()).filter(|&i| self.is_missing(i)).count()
    }

    pub fn value(&self, row: usize) -> Value {
        match &self.data {
            ColumnData::Numeric(v) => Value::from(v[row]),
            ColumnData::Categorical(v) => match &v[row] {
                Some(s) => Value::Category(s.clone()),
                None => Value::Missing,
            },
        }
    }

    /// Sorted distinct non-missing categories; empty for numeric columns.
    pub fn levels(&self) -> Vec<String> {
        match &self.data {
            ColumnData::Categorical(v) => v
                .iter()
                .flatten()
                .cloned()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
            ColumnData::Numeric(_) => Vec::new(),
        }
    }

    pub fn select(&self, indices: &[usize]) -> Column {
        Column {
            name: self.name.clone(),
            data: self.data.select(indices),
        }
    }
}

/// Column-oriented table of equal-length named columns.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataFrame {
    columns: Vec<Column>,
}

impl DataFrame {
    /// Build a frame, checking equal lengths and unique names.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let mut seen = HashSet::new();
        for c in &columns {
            if !seen.insert(c.name.clone()) {
                return Err(FoldkitError::config(format!("duplicate column '{}'", c.name)));
            }
        }
        if let Some(first) = columns.first() {
            let n = first.len();
            if let Some(bad) = columns.iter().find(|c| c.len() != n) {
                return Err(FoldkitError::ShapeMismatch {
                    expected: vec![n],
                    got: vec![bad.len()],
                });
            }
        }
        Ok(DataFrame { columns })
    }

    /// Build a frame from records. Every record must carry the same column set,
    /// and a column may not mix numbers and categories.
    pub fn from_records(records: &[BTreeMap<String, Value>]) -> Result<Self> {
        let Some(first) = records.first() else {
            return Ok(DataFrame::default());
        };
        let names: Vec<String> = first.keys().cloned().collect();
        for (i, r) in records.iter().enumerate() {
            if r.len() != names.len() || !names.iter().all(|n| r.contains_key(n)) {
                return Err(FoldkitError::config(format!(
                    "record {} does not share the column set of record 0",
                    i
                )));
            }
        }

        let mut columns = Vec::with_capacity(names.len());
        for name in &names {
            let cells: Vec<&Value> = records.iter().map(|r| &r[name]).collect();
            let has_num = cells.iter().any(|v| matches!(v, Value::Number(_)));
            let has_cat = cells.iter().any(|v| matches!(v, Value::Category(_)));
            if has_num && has_cat {
                return Err(FoldkitError::config(format!(
                    "column '{}' mixes numeric and categorical values",
                    name
                )));
            }
            let column = if has_cat {
                Column::categorical(
                    name.clone(),
                    cells
                        .iter()
                        .map(|v| match v {
                            Value::Category(s) => Some(s.clone()),
                            _ => None,
                        })
                        .collect(),
                )
            } else {
                Column::numeric(
                    name.clone(),
                    cells
                        .iter()
                        .map(|v| match v {
                            Value::Number(x) => *x,
                            _ => f64::NAN,
                        })
                        .collect(),
                )
            };
            columns.push(column);
        }
        DataFrame::new(columns)
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map(|c| c.len()).unwrap_or(0)
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Result<&Column> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| FoldkitError::ColumnNotFound(name.to_string()))
    }

    /// Rows gathered in the given order; duplicates are kept.
    pub fn select_rows(&self, indices: &[usize]) -> DataFrame {
        DataFrame {
            columns: self.columns.iter().map(|c| c.select(indices)).collect(),
        }
    }

    /// Keep only the named columns, in the given order.
    pub fn select_columns(&self, names: &[String]) -> Result<DataFrame> {
        let columns = names
            .iter()
            .map(|n| self.column(n).cloned())
            .collect::<Result<Vec<_>>>()?;
        Ok(DataFrame { columns })
    }

    pub fn drop_columns(&self, names: &[String]) -> DataFrame {
        DataFrame {
            columns: self
                .columns
                .iter()
                .filter(|c| !names.contains(&c.name))
                .cloned()
                .collect(),
        }
    }

    /// Replace a column in place, or append it when absent.
    pub fn put_column(&mut self, column: Column) -> Result<()> {
        if !self.columns.is_empty() && column.len() != self.n_rows() {
            return Err(FoldkitError::ShapeMismatch {
                expected: vec![self.n_rows()],
                got: vec![column.len()],
            });
        }
        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(slot) => *slot = column,
            None => self.columns.push(column),
        }
        Ok(())
    }

    /// Replace the named columns with `replacement`, inserted where the first
    /// removed column stood.
    pub fn splice_columns(&self, removed: &[String], replacement: Vec<Column>) -> Result<DataFrame> {
        let pos = self
            .columns
            .iter()
            .position(|c| removed.contains(&c.name))
            .unwrap_or(self.columns.len());
        let mut out: Vec<Column> = Vec::with_capacity(self.columns.len() + replacement.len());
        let mut inserted = false;
        for (i, c) in self.columns.iter().enumerate() {
            if i == pos {
                out.extend(replacement.iter().cloned());
                inserted = true;
            }
            if !removed.contains(&c.name) {
                out.push(c.clone());
            }
        }
        if !inserted {
            out.extend(replacement);
        }
        DataFrame::new(out)
    }

    /// Records view, mainly for debugging and hand-off.
    pub fn records(&self) -> Vec<BTreeMap<String, Value>> {
        (0..self.n_rows())
            .map(|i| {
                self.columns
                    .iter()
                    .map(|c| (c.name.clone(), c.value(i)))
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_from_records_infers_kinds() {
        let records = vec![
            record(&[("price", Value::Number(10.0)), ("zone", "A".into())]),
            record(&[("price", Value::Missing), ("zone", Value::Missing)]),
        ];
        let df = DataFrame::from_records(&records).unwrap();
        assert_eq!(df.n_rows(), 2);
        assert_eq!(df.column("price").unwrap().kind(), ColumnKind::Numeric);
        assert_eq!(df.column("zone").unwrap().kind(), ColumnKind::Categorical);
        assert!(df.column("price").unwrap().is_missing(1));
        assert!(df.column("zone").unwrap().is_missing(1));
    }

    #[test]
    fn test_from_records_rejects_ragged_column_sets() {
        let records = vec![
            record(&[("a", Value::Number(1.0))]),
            record(&[("b", Value::Number(1.0))]),
        ];
        assert!(matches!(
            DataFrame::from_records(&records),
            Err(FoldkitError::Configuration(_))
        ));
    }

    #[test]
    fn test_from_records_rejects_mixed_column() {
        let records = vec![
            record(&[("a", Value::Number(1.0))]),
            record(&[("a", "x".into())]),
        ];
        assert!(DataFrame::from_records(&records).is_err());
    }

    #[test]
    fn test_splice_columns_keeps_position() {
        let df = DataFrame::new(vec![
            Column::numeric("y", vec![1.0, 2.0]),
            Column::from_strs("c", &["a", "b"]),
            Column::numeric("z", vec![0.0, 0.0]),
        ])
        .unwrap();
        let out = df
            .splice_columns(
                &["c".to_string()],
                vec![Column::numeric("c_a", vec![1.0, 0.0]), Column::numeric("c_b", vec![0.0, 1.0])],
            )
            .unwrap();
        assert_eq!(out.column_names(), vec!["y", "c_a", "c_b", "z"]);
    }

    #[test]
    fn test_levels_sorted_and_unique() {
        let c = Column::from_strs("c", &["b", "a", "b"]);
        assert_eq!(c.levels(), vec!["a", "b"]);
    }
}

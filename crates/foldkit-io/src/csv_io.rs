use foldkit_core::{Column, DataFrame, Value};
use std::io::{Read, Write};
use std::path::Path;

use crate::error::IoResult;

/// Cell text read as a missing value.
pub const MISSING_TOKENS: [&str; 3] = ["", "NA", "NaN"];

fn is_missing(field: &str) -> bool {
    MISSING_TOKENS.contains(&field)
}

/// Read a CSV file with a header row into a frame.
///
/// A column is numeric when every non-missing cell parses as a number and
/// categorical otherwise. Empty cells, `NA` and `NaN` are missing.
pub fn read_csv(path: impl AsRef<Path>) -> IoResult<DataFrame> {
    let rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;
    frame_from_reader(rdr)
}

/// Same as [`read_csv`], from any reader.
pub fn read_csv_from<R: Read>(reader: R) -> IoResult<DataFrame> {
    let rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    frame_from_reader(rdr)
}

fn frame_from_reader<R: Read>(mut rdr: csv::Reader<R>) -> IoResult<DataFrame> {
    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();
    let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for result in rdr.records() {
        let record = result?;
        for (column, field) in cells.iter_mut().zip(record.iter()) {
            column.push(field.to_string());
        }
    }

    let columns = headers
        .into_iter()
        .zip(cells)
        .map(|(name, values)| infer_column(name, values))
        .collect();
    Ok(DataFrame::new(columns)?)
}

pub(crate) fn infer_column(name: String, values: Vec<String>) -> Column {
    let numbers: Option<Vec<f64>> = values
        .iter()
        .map(|v| if is_missing(v) { Some(f64::NAN) } else { v.parse::<f64>().ok() })
        .collect();
    match numbers {
        Some(v) => Column::numeric(name, v),
        None => Column::categorical(
            name,
            values
                .into_iter()
                .map(|v| if is_missing(&v) { None } else { Some(v) })
                .collect(),
        ),
    }
}

/// Write a frame as CSV with a header row; missing cells are written as `NA`.
pub fn write_csv(path: impl AsRef<Path>, frame: &DataFrame) -> IoResult<()> {
    let wtr = csv::Writer::from_path(path)?;
    write_frame(wtr, frame)
}

/// Same as [`write_csv`], to any writer.
pub fn write_csv_to<W: Write>(writer: W, frame: &DataFrame) -> IoResult<()> {
    write_frame(csv::Writer::from_writer(writer), frame)
}

fn write_frame<W: Write>(mut wtr: csv::Writer<W>, frame: &DataFrame) -> IoResult<()> {
    wtr.write_record(frame.columns().iter().map(|c| c.name()))?;
    for i in 0..frame.n_rows() {
        let row: Vec<String> = frame
            .columns()
            .iter()
            .map(|c| match c.value(i) {
                Value::Number(v) => v.to_string(),
                Value::Category(s) => s,
                Value::Missing => "NA".to_string(),
            })
            .collect();
        wtr.write_record(&row)?;
    }
    wtr.flush()?;
    Ok(())
}

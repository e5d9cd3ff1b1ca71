use arrow::array::{Array, ArrayRef, AsArray, Float64Array, StringArray};
use arrow::compute::{cast, concat_batches};
use arrow::datatypes::{DataType, Field, Float64Type, Schema};
use arrow::record_batch::RecordBatch;
use foldkit_core::{Column, ColumnData, DataFrame};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use crate::csv_io::infer_column;
use crate::error::IoResult;

/// Read a Parquet file into a frame.
///
/// Numeric physical columns become numeric with nulls as missing. Every
/// other column is read as text and typed the way [`read_csv`](crate::read_csv)
/// types a CSV column: numeric when every non-missing value parses, with
/// nulls, empty strings, `NA` and `NaN` missing.
pub fn read_parquet(path: impl AsRef<Path>) -> IoResult<DataFrame> {
    let file = File::open(path.as_ref())?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let batches = builder.build()?.collect::<Result<Vec<_>, _>>()?;
    let batch = concat_batches(&schema, &batches)?;

    let columns = schema
        .fields()
        .iter()
        .zip(batch.columns())
        .map(|(field, array)| read_column(field.name(), array))
        .collect::<IoResult<Vec<_>>>()?;
    Ok(DataFrame::new(columns)?)
}

fn read_column(name: &str, array: &ArrayRef) -> IoResult<Column> {
    if array.data_type().is_numeric() {
        let values = cast(array.as_ref(), &DataType::Float64)?;
        let values = values
            .as_primitive::<Float64Type>()
            .iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect();
        return Ok(Column::numeric(name, values));
    }
    let text = cast(array.as_ref(), &DataType::Utf8)?;
    let text = text
        .as_string::<i32>()
        .iter()
        .map(|v| v.unwrap_or_default().trim().to_string())
        .collect();
    Ok(infer_column(name.to_string(), text))
}

/// Write a frame as Parquet: numeric columns as nullable `Float64`,
/// categorical ones as nullable UTF-8. Missing values are written as nulls.
pub fn write_parquet(path: impl AsRef<Path>, frame: &DataFrame) -> IoResult<()> {
    let mut fields = Vec::with_capacity(frame.n_cols());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(frame.n_cols());
    for column in frame.columns() {
        match column.data() {
            ColumnData::Numeric(v) => {
                fields.push(Field::new(column.name(), DataType::Float64, true));
                let values: Float64Array = v.iter().map(|&x| (!x.is_nan()).then_some(x)).collect();
                arrays.push(Arc::new(values));
            }
            ColumnData::Categorical(v) => {
                fields.push(Field::new(column.name(), DataType::Utf8, true));
                arrays.push(Arc::new(v.iter().map(|s| s.as_deref()).collect::<StringArray>()));
            }
        }
    }
    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), arrays)?;

    let file = File::create(path.as_ref())?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

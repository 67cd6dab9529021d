use super::TableCodec;
use crate::error::{PipelineError, PipelineResult};
use crate::table::{ColumnType, Table, Value};
use arrow::array::{
    Array, ArrayRef, BooleanArray, Date32Array, Float64Array, Int64Array, StringArray,
    Time64MicrosecondArray, TimestampMicrosecondArray, UInt64Array,
};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::io::Cursor;
use std::sync::Arc;
use tracing::debug;

/// Days from 0001-01-01 (CE day 1) to 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Parquet artifacts via Arrow record batches
#[derive(Debug, Clone, Copy, Default)]
pub struct ParquetCodec;

impl ParquetCodec {
    pub fn new() -> Self {
        Self
    }
}

impl TableCodec for ParquetCodec {
    fn extension(&self) -> &'static str {
        "parquet"
    }

    fn content_type(&self) -> &'static str {
        "application/vnd.apache.parquet"
    }

    fn encode(&self, table: &Table) -> PipelineResult<Vec<u8>> {
        if table.columns.is_empty() {
            return Err(PipelineError::Codec(format!(
                "table '{}' has no columns",
                table.name
            )));
        }

        let mut fields = Vec::with_capacity(table.columns.len());
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(table.columns.len());

        for (idx, column) in table.columns.iter().enumerate() {
            let column_type = infer_type(table, idx)?;
            let array = build_array(table, idx, column_type);
            fields.push(Field::new(column, array.data_type().clone(), true));
            arrays.push(array);
        }

        let schema = Arc::new(Schema::new(fields));
        let batch = RecordBatch::try_new(schema.clone(), arrays)?;

        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .set_created_by("starline".to_string())
            .build();

        let mut cursor = Cursor::new(Vec::<u8>::new());
        let mut writer = ArrowWriter::try_new(&mut cursor, schema, Some(props))?;
        writer.write(&batch)?;
        writer.close()?;

        let data = cursor.into_inner();
        debug!(table = %table.name, rows = table.len(), bytes = data.len(), "Encoded parquet artifact");
        Ok(data)
    }

    fn decode(&self, name: &str, data: &[u8]) -> PipelineResult<Table> {
        let builder = ParquetRecordBatchReaderBuilder::try_new(Bytes::copy_from_slice(data))?;
        let schema = builder.schema().clone();
        let reader = builder.build()?;

        let mut table = Table::new(name, schema.fields().iter().map(|f| f.name().clone()));

        for batch in reader {
            let batch = batch?;
            let columns = batch
                .columns()
                .iter()
                .zip(schema.fields())
                .map(|(array, field)| read_column(name, field.name(), array))
                .collect::<PipelineResult<Vec<_>>>()?;

            for row in 0..batch.num_rows() {
                table.push_row(columns.iter().map(|c| c[row].clone()).collect())?;
            }
        }

        debug!(table = %name, rows = table.len(), "Decoded parquet artifact");
        Ok(table)
    }
}

/// Pick one physical type for a column from its non-null values
fn infer_type(table: &Table, idx: usize) -> PipelineResult<ColumnType> {
    let mut inferred: Option<ColumnType> = None;

    for row in &table.rows {
        let Some(found) = row[idx].column_type() else {
            continue;
        };
        inferred = match (inferred, found) {
            (None, t) => Some(t),
            (Some(a), b) if a == b => Some(a),
            (Some(ColumnType::Int), ColumnType::Float) | (Some(ColumnType::Float), ColumnType::Int) => {
                Some(ColumnType::Float)
            }
            (Some(a), b) => {
                return Err(PipelineError::invalid_value(
                    &table.name,
                    &table.columns[idx],
                    format!("mixed column types {:?} and {:?}", a, b),
                ))
            }
        };
    }

    Ok(inferred.unwrap_or(ColumnType::Text))
}

fn build_array(table: &Table, idx: usize, column_type: ColumnType) -> ArrayRef {
    let cells = table.rows.iter().map(|row| &row[idx]);

    match column_type {
        ColumnType::Bool => Arc::new(
            cells
                .map(|v| match v {
                    Value::Bool(b) => Some(*b),
                    _ => None,
                })
                .collect::<BooleanArray>(),
        ),
        ColumnType::Int => Arc::new(cells.map(Value::as_int).collect::<Int64Array>()),
        ColumnType::Float => Arc::new(
            cells
                .map(|v| match v {
                    Value::Float(f) => Some(*f),
                    Value::Int(i) => Some(*i as f64),
                    _ => None,
                })
                .collect::<Float64Array>(),
        ),
        ColumnType::Text => Arc::new(cells.map(Value::as_str).collect::<StringArray>()),
        ColumnType::Timestamp => Arc::new(
            cells
                .map(|v| v.as_timestamp().map(|ts| ts.and_utc().timestamp_micros()))
                .collect::<TimestampMicrosecondArray>(),
        ),
        ColumnType::Date => Arc::new(
            cells
                .map(|v| match v {
                    Value::Date(d) => Some(d.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE),
                    _ => None,
                })
                .collect::<Date32Array>(),
        ),
        ColumnType::Time => Arc::new(
            cells
                .map(|v| match v {
                    Value::Time(t) => Some(
                        i64::from(t.num_seconds_from_midnight()) * 1_000_000
                            + i64::from(t.nanosecond() / 1_000),
                    ),
                    _ => None,
                })
                .collect::<Time64MicrosecondArray>(),
        ),
    }
}

fn downcast<'a, T: 'static>(array: &'a ArrayRef, table: &str, column: &str) -> PipelineResult<&'a T> {
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| PipelineError::invalid_value(table, column, "unexpected arrow array type"))
}

fn cells<T, F>(array: &T, f: F) -> Vec<Value>
where
    T: Array,
    F: Fn(usize) -> Value,
{
    (0..array.len())
        .map(|i| if array.is_null(i) { Value::Null } else { f(i) })
        .collect()
}

/// Convert one arrow column into cell values, normalising widths and units
fn read_column(table: &str, column: &str, array: &ArrayRef) -> PipelineResult<Vec<Value>> {
    let values = match array.data_type() {
        DataType::Null => vec![Value::Null; array.len()],
        DataType::Boolean => {
            let a = downcast::<BooleanArray>(array, table, column)?;
            cells(a, |i| Value::Bool(a.value(i)))
        }
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32 => {
            let casted = cast(array, &DataType::Int64)?;
            let a = downcast::<Int64Array>(&casted, table, column)?;
            cells(a, |i| Value::Int(a.value(i)))
        }
        // the default cast turns out-of-range values into nulls
        DataType::UInt64 => {
            let a = downcast::<UInt64Array>(array, table, column)?;
            (0..a.len())
                .map(|i| {
                    if a.is_null(i) {
                        return Ok(Value::Null);
                    }
                    i64::try_from(a.value(i)).map(Value::Int).map_err(|_| {
                        PipelineError::invalid_value(
                            table,
                            column,
                            format!("{} does not fit in a signed 64-bit integer", a.value(i)),
                        )
                    })
                })
                .collect::<PipelineResult<Vec<_>>>()?
        }
        DataType::Float16
        | DataType::Float32
        | DataType::Float64
        | DataType::Decimal128(_, _)
        | DataType::Decimal256(_, _) => {
            let casted = cast(array, &DataType::Float64)?;
            let a = downcast::<Float64Array>(&casted, table, column)?;
            cells(a, |i| Value::Float(a.value(i)))
        }
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => {
            let casted = cast(array, &DataType::Utf8)?;
            let a = downcast::<StringArray>(&casted, table, column)?;
            cells(a, |i| Value::Text(a.value(i).to_string()))
        }
        DataType::Timestamp(_, tz) => {
            let casted = cast(array, &DataType::Timestamp(TimeUnit::Microsecond, tz.clone()))?;
            let a = downcast::<TimestampMicrosecondArray>(&casted, table, column)?;
            cells(a, |i| micros_to_timestamp(a.value(i)).map_or(Value::Null, Value::Timestamp))
        }
        DataType::Date32 | DataType::Date64 => {
            let casted = cast(array, &DataType::Date32)?;
            let a = downcast::<Date32Array>(&casted, table, column)?;
            cells(a, |i| {
                NaiveDate::from_num_days_from_ce_opt(a.value(i) + UNIX_EPOCH_DAYS_FROM_CE)
                    .map_or(Value::Null, Value::Date)
            })
        }
        DataType::Time32(_) | DataType::Time64(_) => {
            let casted = cast(array, &DataType::Time64(TimeUnit::Microsecond))?;
            let a = downcast::<Time64MicrosecondArray>(&casted, table, column)?;
            cells(a, |i| micros_to_time(a.value(i)).map_or(Value::Null, Value::Time))
        }
        other => {
            return Err(PipelineError::invalid_value(
                table,
                column,
                format!("unsupported parquet column type {}", other),
            ))
        }
    };

    Ok(values)
}

fn micros_to_timestamp(micros: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_micros(micros).map(|dt| dt.naive_utc())
}

fn micros_to_time(micros: i64) -> Option<NaiveTime> {
    let secs = u32::try_from(micros / 1_000_000).ok()?;
    let nanos = u32::try_from((micros % 1_000_000) * 1_000).ok()?;
    NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn sample() -> Table {
        let created = NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_micro_opt(10, 30, 0, 123_456)
            .unwrap();

        Table::from_rows(
            "sales_order",
            [
                "sales_order_id",
                "unit_price",
                "currency_code",
                "created_at",
                "agreed_delivery_date",
                "created_time",
                "is_priority",
                "notes",
            ],
            vec![
                vec![
                    1.into(),
                    3.5.into(),
                    "GBP".into(),
                    created.into(),
                    created.date().into(),
                    created.time().into(),
                    true.into(),
                    Value::Null,
                ],
                vec![
                    2.into(),
                    Value::Int(4),
                    Value::Null,
                    Value::Null,
                    Value::Null,
                    Value::Null,
                    false.into(),
                    Value::Null,
                ],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_roundtrip_preserves_values_and_order() {
        let codec = ParquetCodec::new();
        let table = sample();

        let bytes = codec.encode(&table).unwrap();
        let decoded = codec.decode("sales_order", &bytes).unwrap();

        assert_eq!(decoded.columns, table.columns);
        assert_eq!(decoded.rows[0], table.rows[0]);
        // mixed int/float widens to float
        assert_eq!(decoded.value(1, "unit_price"), Some(&Value::Float(4.0)));
        // all-null column comes back as nulls
        assert_eq!(decoded.value(0, "notes"), Some(&Value::Null));
    }

    #[test]
    fn test_empty_table_keeps_schema() {
        let codec = ParquetCodec::new();
        let table = Table::new("design", ["design_id", "design_name"]);

        let decoded = codec.decode("design", &codec.encode(&table).unwrap()).unwrap();
        assert_eq!(decoded.columns, vec!["design_id", "design_name"]);
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_mixed_column_types_are_rejected() {
        let table = Table::from_rows("t", ["x"], vec![vec![1.into()], vec!["one".into()]]).unwrap();
        let err = ParquetCodec::new().encode(&table).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidValue { .. }));
    }

    #[test]
    fn test_garbage_input_is_a_codec_error() {
        let err = ParquetCodec::new().decode("t", b"not parquet").unwrap_err();
        assert!(matches!(err, PipelineError::Codec(_)));
    }

    #[test]
    fn test_decode_casts_narrow_integers() {
        let schema = Arc::new(Schema::new(vec![Field::new("n", DataType::Int32, true)]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![Arc::new(arrow::array::Int32Array::from(vec![Some(7), None]))],
        )
        .unwrap();

        let mut buf = Vec::new();
        let mut writer = ArrowWriter::try_new(&mut buf, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let decoded = ParquetCodec::new().decode("t", &buf).unwrap();
        assert_eq!(decoded.rows, vec![vec![Value::Int(7)], vec![Value::Null]]);
    }

    fn unsigned_parquet(values: Vec<Option<u64>>) -> Vec<u8> {
        let schema = Arc::new(Schema::new(vec![Field::new("n", DataType::UInt64, true)]));
        let batch =
            RecordBatch::try_new(schema.clone(), vec![Arc::new(UInt64Array::from(values))]).unwrap();

        let mut buf = Vec::new();
        let mut writer = ArrowWriter::try_new(&mut buf, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();
        buf
    }

    #[test]
    fn test_decode_unsigned_in_range() {
        let buf = unsigned_parquet(vec![Some(42), None]);
        let decoded = ParquetCodec::new().decode("t", &buf).unwrap();
        assert_eq!(decoded.rows, vec![vec![Value::Int(42)], vec![Value::Null]]);
    }

    #[test]
    fn test_decode_rejects_unsigned_overflow() {
        let buf = unsigned_parquet(vec![Some(1), Some(u64::MAX)]);
        let err = ParquetCodec::new().decode("t", &buf).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidValue { .. }));
        assert!(err.to_string().contains(&u64::MAX.to_string()));
    }
}

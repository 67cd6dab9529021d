//! Fact table shaping

use crate::error::{PipelineError, PipelineResult};
use crate::table::{Table, Value};

/// Leading columns of `fact_sales_order`; any other source columns follow
/// in their original order
const FACT_SALES_ORDER_LEADING: [&str; 6] = [
    "sales_order_id",
    "created_date",
    "created_time",
    "last_updated_date",
    "last_updated_time",
    "sales_staff_id",
];

/// Sales orders with timestamps split into date and time columns
///
/// `created_at` and `last_updated` become `*_date`/`*_time` pairs and are
/// dropped, `staff_id` becomes `sales_staff_id`, and the agreed payment and
/// delivery dates are normalised to dates.
pub fn fact_sales_order(sales_order: &Table) -> PipelineResult<Table> {
    sales_order.require_column("staff_id")?;

    let mut table = split_timestamp(sales_order.clone(), "created_at", "created_date", "created_time")?;
    table = split_timestamp(table, "last_updated", "last_updated_date", "last_updated_time")?;

    for column in ["agreed_payment_date", "agreed_delivery_date"] {
        if let Some(idx) = table.column_index(column) {
            for row in table.rows.iter_mut() {
                row[idx] = to_date(&sales_order.name, column, &row[idx])?;
            }
        }
    }

    let table = table
        .drop_columns(&["created_at", "last_updated"])
        .rename(&[("staff_id", "sales_staff_id")]);

    let mut order: Vec<&str> = FACT_SALES_ORDER_LEADING
        .iter()
        .copied()
        .filter(|c| table.column_index(c).is_some())
        .collect();
    order.extend(
        table
            .columns
            .iter()
            .map(String::as_str)
            .filter(|c| !FACT_SALES_ORDER_LEADING.iter().any(|leading| leading == c)),
    );

    Ok(table.select(&order)?.with_name("fact_sales_order"))
}

fn split_timestamp(table: Table, source: &str, date_column: &str, time_column: &str) -> PipelineResult<Table> {
    let idx = table.require_column(source)?;
    let name = table.name.clone();

    table
        .add_column(date_column, |row| {
            Ok(match parse_ts(&name, source, &row[idx])? {
                Some(ts) => Value::Date(ts.date()),
                None => Value::Null,
            })
        })?
        .add_column(time_column, |row| {
            Ok(match parse_ts(&name, source, &row[idx])? {
                Some(ts) => Value::Time(ts.time()),
                None => Value::Null,
            })
        })
}

fn parse_ts(table: &str, column: &str, value: &Value) -> PipelineResult<Option<chrono::NaiveDateTime>> {
    if value.is_null() {
        return Ok(None);
    }
    value
        .to_timestamp()
        .map(Some)
        .ok_or_else(|| PipelineError::invalid_value(table, column, format!("not a timestamp: {}", value)))
}

fn to_date(table: &str, column: &str, value: &Value) -> PipelineResult<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    value
        .to_date()
        .map(Value::Date)
        .ok_or_else(|| PipelineError::invalid_value(table, column, format!("not a date: {}", value)))
}

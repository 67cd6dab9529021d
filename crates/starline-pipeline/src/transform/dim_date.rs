//! Calendar dimension

use crate::error::{PipelineError, PipelineResult};
use crate::table::{Table, Value};
use chrono::{Datelike, NaiveDate};

pub const DIM_DATE_COLUMNS: [&str; 8] = [
    "date_id",
    "year",
    "month",
    "day",
    "day_of_week",
    "day_name",
    "month_name",
    "quarter",
];

/// One row per day from `start` to `end`, both inclusive
///
/// `day_of_week` runs from 1 (Monday) to 7 (Sunday).
pub fn dim_date(start: NaiveDate, end: NaiveDate) -> PipelineResult<Table> {
    if end < start {
        return Err(PipelineError::config(format!(
            "dim_date range is empty: {} is after {}",
            start, end
        )));
    }

    let mut table = Table::new("dim_date", DIM_DATE_COLUMNS);
    for date in start.iter_days().take_while(|d| *d <= end) {
        table.push_row(vec![
            Value::Date(date),
            Value::Int(date.year().into()),
            Value::Int(date.month().into()),
            Value::Int(date.day().into()),
            Value::Int(date.weekday().number_from_monday().into()),
            Value::Text(date.format("%A").to_string()),
            Value::Text(date.format("%B").to_string()),
            Value::Int(((date.month0() / 3) + 1).into()),
        ])?;
    }
    Ok(table)
}

use super::{quote_ident, SourceDatabase};
use crate::error::{PipelineError, PipelineResult};
use crate::table::{Table, Value};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::types::BigDecimal;
use sqlx::{Column, Row, TypeInfo};
use tracing::{debug, instrument};

/// Postgres-backed [`SourceDatabase`]
#[derive(Clone)]
pub struct PgSource {
    pool: PgPool,
    schema: String,
    excluded: Vec<String>,
}

impl PgSource {
    pub fn new(pool: PgPool, schema: impl Into<String>, excluded: Vec<String>) -> Self {
        Self {
            pool,
            schema: schema.into(),
            excluded,
        }
    }
}

#[async_trait]
impl SourceDatabase for PgSource {
    #[instrument(skip(self))]
    async fn list_tables(&self) -> PipelineResult<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT table_name::text
            FROM information_schema.tables
            WHERE table_schema = $1 AND table_type = 'BASE TABLE'
            ORDER BY table_name
            "#,
        )
        .bind(&self.schema)
        .fetch_all(&self.pool)
        .await?;

        let tables: Vec<String> = names
            .into_iter()
            .filter(|name| !self.excluded.contains(name))
            .collect();

        debug!(schema = %self.schema, count = tables.len(), "Listed source tables");
        Ok(tables)
    }

    #[instrument(skip(self))]
    async fn fetch_rows(
        &self,
        table: &str,
        watermark_column: &str,
        since: Option<NaiveDateTime>,
    ) -> PipelineResult<Table> {
        let relation = format!("{}.{}", quote_ident(&self.schema), quote_ident(table));
        let column = quote_ident(watermark_column);

        let rows = match since {
            Some(ts) => {
                let sql = format!(
                    "SELECT * FROM {} WHERE {} > $1 ORDER BY {}",
                    relation, column, column
                );
                sqlx::query(&sql).bind(ts).fetch_all(&self.pool).await?
            }
            None => {
                let sql = format!("SELECT * FROM {} ORDER BY {}", relation, column);
                sqlx::query(&sql).fetch_all(&self.pool).await?
            }
        };

        let columns: Vec<String> = rows
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();

        let mut result = Table::new(table, columns);
        for row in &rows {
            let values = (0..row.len())
                .map(|idx| decode_cell(table, row, idx))
                .collect::<PipelineResult<Vec<_>>>()?;
            result.push_row(values)?;
        }

        debug!(table, rows = result.len(), "Fetched source rows");
        Ok(result)
    }
}

/// Decode one cell by its Postgres type name
fn decode_cell(table: &str, row: &PgRow, idx: usize) -> PipelineResult<Value> {
    let column = &row.columns()[idx];
    let type_name = column.type_info().name();

    let value: Value = match type_name {
        "BOOL" => row.try_get::<Option<bool>, _>(idx)?.into(),
        "INT2" => row.try_get::<Option<i16>, _>(idx)?.map(i64::from).into(),
        "INT4" => row.try_get::<Option<i32>, _>(idx)?.map(i64::from).into(),
        "INT8" => row.try_get::<Option<i64>, _>(idx)?.into(),
        "FLOAT4" => row.try_get::<Option<f32>, _>(idx)?.map(f64::from).into(),
        "FLOAT8" => row.try_get::<Option<f64>, _>(idx)?.into(),
        "NUMERIC" => match row.try_get::<Option<BigDecimal>, _>(idx)? {
            Some(decimal) => {
                let parsed = decimal.to_string().parse::<f64>().map_err(|e| {
                    PipelineError::invalid_value(table, column.name(), e.to_string())
                })?;
                Value::Float(parsed)
            }
            None => Value::Null,
        },
        "TEXT" | "VARCHAR" | "BPCHAR" | "CHAR" | "NAME" => {
            row.try_get::<Option<String>, _>(idx)?.into()
        }
        "TIMESTAMP" => row.try_get::<Option<NaiveDateTime>, _>(idx)?.into(),
        "TIMESTAMPTZ" => row
            .try_get::<Option<DateTime<Utc>>, _>(idx)?
            .map(|ts| ts.naive_utc())
            .into(),
        "DATE" => row.try_get::<Option<NaiveDate>, _>(idx)?.into(),
        "TIME" => row.try_get::<Option<NaiveTime>, _>(idx)?.into(),
        "JSON" | "JSONB" => row
            .try_get::<Option<serde_json::Value>, _>(idx)?
            .map(|json| json.to_string())
            .into(),
        other => row
            .try_get::<Option<String>, _>(idx)
            .map_err(|_| {
                PipelineError::invalid_value(
                    table,
                    column.name(),
                    format!("unsupported column type {}", other),
                )
            })?
            .into(),
    };

    Ok(value)
}

//! Postgres source and warehouse adapters
//!
//! Needs a scratch database: set `STARLINE_TEST_DATABASE_URL` to run these,
//! otherwise they return early.
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use chrono::NaiveDate;
use common::*;
use serial_test::serial;
use sqlx::PgPool;
use starline_pipeline::db::{create_pool, health_check, DbConfig};
use starline_pipeline::load::{PgWarehouse, WarehouseSink};
use starline_pipeline::source::{PgSource, SourceDatabase};
use starline_pipeline::{Table, Value};

const SCHEMA: &str = "starline_it";

async fn pool() -> Option<PgPool> {
    let Ok(url) = std::env::var("STARLINE_TEST_DATABASE_URL") else {
        eprintln!("STARLINE_TEST_DATABASE_URL not set, skipping");
        return None;
    };
    let pool = create_pool(&DbConfig::new(url)).await.unwrap();
    health_check(&pool).await.unwrap();

    for statement in [
        format!("DROP SCHEMA IF EXISTS {SCHEMA} CASCADE"),
        format!("CREATE SCHEMA {SCHEMA}"),
        format!(
            "CREATE TABLE {SCHEMA}.currency (
                currency_id INT PRIMARY KEY,
                currency_code TEXT NOT NULL,
                rate NUMERIC(10, 4),
                last_updated TIMESTAMP NOT NULL
            )"
        ),
        format!("CREATE TABLE {SCHEMA}._prisma_migrations (id TEXT)"),
        format!(
            "INSERT INTO {SCHEMA}.currency VALUES
                (1, 'GBP', 1.0000, '2025-06-01 09:00:00'),
                (2, 'USD', 0.7900, '2025-06-01 10:30:00')"
        ),
    ] {
        sqlx::query(&statement).execute(&pool).await.unwrap();
    }
    Some(pool)
}

#[tokio::test]
#[serial]
async fn test_pg_source_lists_tables_minus_denylist() {
    let Some(pool) = pool().await else { return };
    let source = PgSource::new(pool, SCHEMA, vec!["_prisma_migrations".to_string()]);

    let tables = source.list_tables().await.unwrap();
    assert_eq!(tables, vec!["currency"]);
}

#[tokio::test]
#[serial]
async fn test_pg_source_fetches_rows_after_watermark() {
    init_tracing();
    let Some(pool) = pool().await else { return };
    let source = PgSource::new(pool, SCHEMA, Vec::new());

    let all = source.fetch_rows("currency", "last_updated", None).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all.value(0, "currency_code"), Some(&Value::from("GBP")));
    assert_eq!(all.value(1, "rate"), Some(&Value::Float(0.79)));

    let newer = source
        .fetch_rows("currency", "last_updated", Some(ts(2025, 6, 1, 9, 0, 0)))
        .await
        .unwrap();
    assert_eq!(newer.len(), 1);
    assert_eq!(newer.value(0, "currency_id"), Some(&Value::Int(2)));
    assert_eq!(
        newer.value(0, "last_updated"),
        Some(&Value::Timestamp(ts(2025, 6, 1, 10, 30, 0)))
    );
}

#[tokio::test]
#[serial]
async fn test_pg_warehouse_inserts_rows_with_nulls() {
    init_tracing();
    let Some(pool) = pool().await else { return };
    sqlx::query(&format!(
        "CREATE TABLE {SCHEMA}.dim_currency (
            currency_id INT PRIMARY KEY,
            currency_code TEXT NOT NULL,
            currency_name TEXT,
            valid_from DATE
        )"
    ))
    .execute(&pool)
    .await
    .unwrap();

    // one connection, so the search_path below applies to the insert
    let url = std::env::var("STARLINE_TEST_DATABASE_URL").unwrap();
    let single = create_pool(&DbConfig {
        max_connections: 1,
        ..DbConfig::new(url)
    })
    .await
    .unwrap();
    sqlx::query(&format!("SET search_path TO {SCHEMA}"))
        .execute(&single)
        .await
        .unwrap();

    let june_first = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
    let rows = Table::from_rows(
        "dim_currency",
        ["currency_id", "currency_code", "currency_name", "valid_from"],
        vec![
            vec![Value::Int(1), Value::from("GBP"), Value::from("British Pound"), Value::Date(june_first)],
            vec![Value::Int(3), Value::from("XYZ"), Value::Null, Value::Null],
        ],
    )
    .unwrap();

    let inserted = PgWarehouse::new(single)
        .insert_rows("dim_currency", &rows)
        .await
        .unwrap();
    assert_eq!(inserted, 2);

    let names: Vec<Option<String>> = sqlx::query_scalar(&format!(
        "SELECT currency_name FROM {SCHEMA}.dim_currency ORDER BY currency_id"
    ))
    .fetch_all(&pool)
    .await
    .unwrap();
    assert_eq!(names, vec![Some("British Pound".to_string()), None]);
}

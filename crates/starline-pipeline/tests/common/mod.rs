//! Shared fixtures for the pipeline integration tests
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use starline_pipeline::codec::{ParquetCodec, TableCodec};
use starline_pipeline::extract::{ExtractSettings, ExtractionEngine};
use starline_pipeline::load::WarehouseSink;
use starline_pipeline::source::MemorySource;
use starline_pipeline::state::StateStore;
use starline_pipeline::storage::{BlobStore, MemoryBlobStore, UploadResult};
use starline_pipeline::transform::{TransformEngine, TransformSettings};
use starline_pipeline::{PipelineError, PipelineResult, Table, Value};
use std::sync::Arc;
use tokio::sync::Mutex;

pub const INGEST: &str = "starline-ingest";
pub const PROCESSED: &str = "starline-processed";
pub const STATE_KEY: &str = "pipeline_state.json";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("starline_pipeline=debug")
        .with_test_writer()
        .try_init();
}

pub fn ts(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, mi, s)
        .unwrap()
}

// ============================================================================
// Wiring
// ============================================================================

pub struct Harness {
    pub source: MemorySource,
    pub blobs: MemoryBlobStore,
    pub state_store: StateStore,
    pub extract: ExtractionEngine,
    pub transform: TransformEngine,
}

impl Harness {
    pub fn new(watermark_column: &str) -> Self {
        let blobs = MemoryBlobStore::new();
        Self::with_store(watermark_column, MemorySource::new(), blobs.clone(), Arc::new(blobs))
    }

    /// Engines write through `store`; `blobs` is the backing store tests inspect
    pub fn with_store(
        watermark_column: &str,
        source: MemorySource,
        blobs: MemoryBlobStore,
        store: Arc<dyn BlobStore>,
    ) -> Self {
        let codec: Arc<dyn TableCodec> = Arc::new(ParquetCodec::new());
        let state_store = StateStore::new(store.clone(), INGEST, STATE_KEY);

        let extract = ExtractionEngine::new(
            Arc::new(source.clone()),
            store.clone(),
            codec.clone(),
            state_store.clone(),
            ExtractSettings {
                ingest_bucket: INGEST.to_string(),
                watermark_column: watermark_column.to_string(),
            },
        );

        let transform = TransformEngine::new(
            store,
            codec,
            state_store.clone(),
            TransformSettings {
                ingest_bucket: INGEST.to_string(),
                processed_bucket: PROCESSED.to_string(),
                dim_date_start: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                dim_date_end: NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
            },
        );

        Self {
            source,
            blobs,
            state_store,
            extract,
            transform,
        }
    }

    pub async fn read_artifact(&self, bucket: &str, key: &str, name: &str) -> Table {
        let data = self.blobs.get(bucket, key).await.unwrap();
        ParquetCodec::new().decode(name, &data).unwrap()
    }
}

/// Delegates to a [`MemoryBlobStore`] but rejects puts whose key contains
/// `fail_on`
pub struct FailingBlobStore {
    pub inner: MemoryBlobStore,
    pub fail_on: String,
}

#[async_trait]
impl BlobStore for FailingBlobStore {
    async fn get(&self, bucket: &str, key: &str) -> PipelineResult<Vec<u8>> {
        self.inner.get(bucket, key).await
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> PipelineResult<UploadResult> {
        if key.contains(&self.fail_on) {
            return Err(PipelineError::storage(bucket, key, "simulated outage"));
        }
        self.inner.put(bucket, key, data, content_type).await
    }

    async fn list(&self, bucket: &str, prefix: &str) -> PipelineResult<Vec<String>> {
        self.inner.list(bucket, prefix).await
    }
}

/// Warehouse sink that records inserts in memory
#[derive(Default)]
pub struct RecordingWarehouse {
    pub inserts: Mutex<Vec<Table>>,
}

#[async_trait]
impl WarehouseSink for RecordingWarehouse {
    async fn insert_rows(&self, table: &str, rows: &Table) -> PipelineResult<u64> {
        self.inserts
            .lock()
            .await
            .push(rows.clone().with_name(table));
        Ok(rows.len() as u64)
    }
}

// ============================================================================
// Source tables
// ============================================================================

pub fn currency(rows: &[(i64, &str, NaiveDateTime)]) -> Table {
    Table::from_rows(
        "currency",
        ["currency_id", "currency_code", "last_updated"],
        rows.iter()
            .map(|(id, code, at)| vec![Value::Int(*id), Value::from(*code), Value::Timestamp(*at)])
            .collect(),
    )
    .unwrap()
}

pub fn design(rows: &[(i64, &str, NaiveDateTime)]) -> Table {
    Table::from_rows(
        "design",
        ["design_id", "design_name", "file_location", "file_name", "last_updated"],
        rows.iter()
            .map(|(id, name, at)| {
                vec![
                    Value::Int(*id),
                    Value::from(*name),
                    Value::from("/usr/share"),
                    Value::from(format!("{}-20221103.json", name.to_lowercase())),
                    Value::Timestamp(*at),
                ]
            })
            .collect(),
    )
    .unwrap()
}

pub fn department(rows: &[(i64, &str, &str, NaiveDateTime)]) -> Table {
    Table::from_rows(
        "department",
        ["department_id", "department_name", "location", "last_updated"],
        rows.iter()
            .map(|(id, name, location, at)| {
                vec![
                    Value::Int(*id),
                    Value::from(*name),
                    Value::from(*location),
                    Value::Timestamp(*at),
                ]
            })
            .collect(),
    )
    .unwrap()
}

pub fn staff(rows: &[(i64, &str, i64, NaiveDateTime)]) -> Table {
    Table::from_rows(
        "staff",
        [
            "staff_id",
            "first_name",
            "last_name",
            "department_id",
            "email_address",
            "last_updated",
        ],
        rows.iter()
            .map(|(id, first, department_id, at)| {
                vec![
                    Value::Int(*id),
                    Value::from(*first),
                    Value::from("Smith"),
                    Value::Int(*department_id),
                    Value::from(format!("{}.smith@terrifictotes.com", first.to_lowercase())),
                    Value::Timestamp(*at),
                ]
            })
            .collect(),
    )
    .unwrap()
}

pub fn address(rows: &[(i64, &str, NaiveDateTime)]) -> Table {
    Table::from_rows(
        "address",
        [
            "address_id",
            "address_line_1",
            "address_line_2",
            "district",
            "city",
            "postal_code",
            "country",
            "phone",
            "last_updated",
        ],
        rows.iter()
            .map(|(id, city, at)| {
                vec![
                    Value::Int(*id),
                    Value::from(format!("{} High Street", id)),
                    Value::Null,
                    Value::from("Avon"),
                    Value::from(*city),
                    Value::from("28441"),
                    Value::from("United Kingdom"),
                    Value::from("1803 637401"),
                    Value::Timestamp(*at),
                ]
            })
            .collect(),
    )
    .unwrap()
}

pub fn counterparty(rows: &[(i64, &str, i64, NaiveDateTime)]) -> Table {
    Table::from_rows(
        "counterparty",
        [
            "counterparty_id",
            "counterparty_legal_name",
            "legal_address_id",
            "last_updated",
        ],
        rows.iter()
            .map(|(id, name, address_id, at)| {
                vec![
                    Value::Int(*id),
                    Value::from(*name),
                    Value::Int(*address_id),
                    Value::Timestamp(*at),
                ]
            })
            .collect(),
    )
    .unwrap()
}

pub fn sales_order(id: i64, created_at: NaiveDateTime, last_updated: NaiveDateTime) -> Table {
    Table::from_rows(
        "sales_order",
        [
            "sales_order_id",
            "created_at",
            "last_updated",
            "design_id",
            "staff_id",
            "counterparty_id",
            "units_sold",
            "unit_price",
            "currency_id",
            "agreed_delivery_date",
            "agreed_payment_date",
            "agreed_delivery_location_id",
        ],
        vec![vec![
            Value::Int(id),
            Value::Timestamp(created_at),
            Value::Timestamp(last_updated),
            Value::Int(3),
            Value::Int(19),
            Value::Int(8),
            Value::Int(42972),
            Value::Float(3.94),
            Value::Int(2),
            Value::from("2025-06-07"),
            Value::from("2025-06-08"),
            Value::Int(8),
        ]],
    )
    .unwrap()
}

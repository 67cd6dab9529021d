//! Bulk loading of staged warehouse artifacts

use crate::codec::TableCodec;
use crate::error::{PipelineError, PipelineResult};
use crate::source::quote_ident;
use crate::state::TransformResult;
use crate::stats::StageStats;
use crate::storage::BlobStore;
use crate::table::{Table, Value};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgPool, Postgres};
use sqlx::query_builder::Separated;
use sqlx::QueryBuilder;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, instrument, Instrument};
use uuid::Uuid;

/// Postgres accepts at most this many bind parameters per statement
const MAX_BIND_PARAMS: usize = 65_535;

/// Destination for warehouse rows
#[async_trait]
pub trait WarehouseSink: Send + Sync {
    /// Insert every row of `rows` into `table`; returns the rows written
    async fn insert_rows(&self, table: &str, rows: &Table) -> PipelineResult<u64>;
}

/// [`WarehouseSink`] writing to Postgres with multi-row `INSERT`s
#[derive(Clone)]
pub struct PgWarehouse {
    pool: PgPool,
}

impl PgWarehouse {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WarehouseSink for PgWarehouse {
    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    async fn insert_rows(&self, table: &str, rows: &Table) -> PipelineResult<u64> {
        if rows.columns.is_empty() {
            return Err(PipelineError::invalid_value(table, "*", "artifact has no columns"));
        }

        let columns = rows
            .columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let chunk_size = (MAX_BIND_PARAMS / rows.columns.len()).max(1);

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;

        for chunk in rows.rows.chunks(chunk_size) {
            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new(format!("INSERT INTO {} ({}) ", quote_ident(table), columns));
            builder.push_values(chunk, |mut row_builder, row| {
                for value in row {
                    push_value(&mut row_builder, value);
                }
            });

            let result = builder.build().execute(&mut *tx).await?;
            inserted += result.rows_affected();
            debug!(table, chunk = chunk.len(), "Inserted chunk");
        }

        tx.commit().await?;
        Ok(inserted)
    }
}

fn push_value(builder: &mut Separated<'_, '_, Postgres, &'static str>, value: &Value) {
    match value {
        Value::Null => {
            builder.push("NULL");
        }
        Value::Bool(b) => {
            builder.push_bind(*b);
        }
        Value::Int(i) => {
            builder.push_bind(*i);
        }
        Value::Float(f) => {
            builder.push_bind(*f);
        }
        Value::Text(s) => {
            builder.push_bind(s.clone());
        }
        Value::Timestamp(ts) => {
            builder.push_bind(*ts);
        }
        Value::Date(d) => {
            builder.push_bind(*d);
        }
        Value::Time(t) => {
            builder.push_bind(*t);
        }
    }
}

/// Outcome of loading one artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadedArtifact {
    pub table_name: String,
    pub key: String,
    pub rows: u64,
}

/// Reads transform artifacts from the processed bucket into the warehouse
pub struct Loader {
    store: Arc<dyn BlobStore>,
    codec: Arc<dyn TableCodec>,
    sink: Arc<dyn WarehouseSink>,
    processed_bucket: String,
}

impl Loader {
    pub fn new(
        store: Arc<dyn BlobStore>,
        codec: Arc<dyn TableCodec>,
        sink: Arc<dyn WarehouseSink>,
        processed_bucket: impl Into<String>,
    ) -> Self {
        Self {
            store,
            codec,
            sink,
            processed_bucket: processed_bucket.into(),
        }
    }

    /// Load every artifact, dimensions before facts
    ///
    /// Empty artifacts are skipped. The first failure aborts the load;
    /// artifacts already inserted stay committed.
    pub async fn load(&self, results: &[TransformResult]) -> PipelineResult<Vec<LoadedArtifact>> {
        let run_id = Uuid::new_v4();
        let span = info_span!("load", %run_id);

        async move {
            let mut stats = StageStats::new("load");
            let mut loaded = Vec::new();

            for result in load_order(results) {
                match self.load_one(result).await {
                    Ok(Some(artifact)) => {
                        stats.inc_written(artifact.rows as usize, 0);
                        loaded.push(artifact);
                    }
                    Ok(None) => stats.inc_skipped(),
                    Err(e) => {
                        error!(table = %result.table_name, key = %result.key, stage = "load", error = %e, "Load failed, aborting run");
                        return Err(e);
                    }
                }
            }

            stats.log_summary();
            Ok(loaded)
        }
        .instrument(span)
        .await
    }

    async fn load_one(&self, result: &TransformResult) -> PipelineResult<Option<LoadedArtifact>> {
        let data = self.store.get(&self.processed_bucket, &result.key).await?;
        let table = self.codec.decode(&result.table_name, &data)?;

        if table.is_empty() {
            info!(table = %result.table_name, key = %result.key, "No entries to load");
            return Ok(None);
        }

        let rows = self.sink.insert_rows(&result.table_name, &table).await?;
        info!(table = %result.table_name, rows, "Loaded artifact");

        Ok(Some(LoadedArtifact {
            table_name: result.table_name.clone(),
            key: result.key.clone(),
            rows,
        }))
    }
}

/// Dimensions first, then facts, then anything else; stable within a group
fn load_order(results: &[TransformResult]) -> Vec<&TransformResult> {
    let rank = |name: &str| {
        if name.starts_with("dim_") {
            0
        } else if name.starts_with("fact_") {
            1
        } else {
            2
        }
    };

    let mut ordered: Vec<&TransformResult> = results.iter().collect();
    ordered.sort_by_key(|r| rank(&r.table_name));
    ordered
}

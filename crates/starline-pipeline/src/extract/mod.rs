//! Incremental extraction from the source database
//!
//! For every source table the engine fetches the rows newer than the
//! table's watermark, stages them as one artifact in the ingest bucket and
//! only then advances the watermark. The state document is saved after each
//! table, so a crash loses at most the tables not yet reached.

mod keys;

pub use keys::{artifact_key, ArtifactKey};

use crate::codec::TableCodec;
use crate::error::{PipelineError, PipelineResult};
use crate::source::SourceDatabase;
use crate::state::{ExtractionResult, IngestLogEntry, State, StateStore};
use crate::stats::StageStats;
use crate::storage::BlobStore;
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ExtractSettings {
    pub ingest_bucket: String,
    /// Column holding each row's last modification time
    pub watermark_column: String,
}

pub struct ExtractionEngine {
    source: Arc<dyn SourceDatabase>,
    store: Arc<dyn BlobStore>,
    codec: Arc<dyn TableCodec>,
    state_store: StateStore,
    settings: ExtractSettings,
}

impl ExtractionEngine {
    pub fn new(
        source: Arc<dyn SourceDatabase>,
        store: Arc<dyn BlobStore>,
        codec: Arc<dyn TableCodec>,
        state_store: StateStore,
        settings: ExtractSettings,
    ) -> Self {
        Self {
            source,
            store,
            codec,
            state_store,
            settings,
        }
    }

    /// Extract every source table once
    ///
    /// Returns one result per staged artifact, in table order. Tables with
    /// no new rows are left out. The first failing table aborts the run;
    /// `state` then reflects every table completed before it.
    pub async fn extract_all(&self, state: &mut State) -> PipelineResult<Vec<ExtractionResult>> {
        let run_id = Uuid::new_v4();
        let span = info_span!("extract", %run_id);

        async move {
            let mut stats = StageStats::new("extract");

            let tables = self.source.list_tables().await.inspect_err(|e| {
                error!(stage = "extract", error = %e, "Failed to list source tables");
            })?;
            info!(tables = tables.len(), "Starting extraction");

            let mut results = Vec::new();
            for table in &tables {
                match self.extract_table(table, state).await {
                    Ok(Some((entry, rows, bytes))) => {
                        stats.inc_written(rows, bytes);
                        results.push(entry);
                    }
                    Ok(None) => stats.inc_skipped(),
                    Err(e) => {
                        error!(table = %table, stage = "extract", error = %e, "Extraction failed, aborting run");
                        return Err(e);
                    }
                }
            }

            stats.log_summary();
            Ok(results)
        }
        .instrument(span)
        .await
    }

    async fn extract_table(
        &self,
        table: &str,
        state: &mut State,
    ) -> PipelineResult<Option<(IngestLogEntry, usize, i64)>> {
        let column = self.settings.watermark_column.as_str();
        let watermark = state.watermark(table);

        let rows = self.source.fetch_rows(table, column, watermark).await?;
        if rows.is_empty() {
            info!(table = %table, watermark = ?watermark, "No new rows, skipping");
            return Ok(None);
        }

        let new_watermark = rows
            .max_timestamp(column)?
            .ok_or_else(|| PipelineError::invalid_value(table, column, "every row has a null watermark"))?;

        let artifact = artifact_key(table, new_watermark, self.codec.extension());
        let data = self.codec.encode(&rows)?;
        let upload = self
            .store
            .put(
                &self.settings.ingest_bucket,
                &artifact.key,
                data,
                self.codec.content_type(),
            )
            .await?;

        let entry = IngestLogEntry {
            table_name: table.to_string(),
            extraction_timestamp: Utc::now().naive_utc(),
            last_updated: new_watermark,
            file_name: artifact.file_name,
            key: artifact.key,
        };

        let next = state.clone().record_ingest(entry.clone());
        self.state_store.save(&next).await?;
        *state = next;

        info!(
            table = %table,
            rows = rows.len(),
            key = %entry.key,
            checksum = %upload.checksum,
            watermark = %new_watermark,
            "Staged extraction artifact"
        );

        Ok(Some((entry, rows.len(), upload.size)))
    }
}

//! Star-schema shaping of extracted artifacts
//!
//! The transform stage reads the artifacts named by an extraction run, maps
//! each source table to its warehouse table through a [`ShapingRule`], and
//! stages the result in the processed bucket. Only tables present in the
//! current extraction run are transformed. On the very first run the
//! calendar dimension is generated as well.

mod dim_date;
mod dimensions;
mod facts;
mod references;
mod rules;

pub use dim_date::{dim_date, DIM_DATE_COLUMNS};
pub use dimensions::{
    dim_counterparty, dim_currency, dim_design, dim_location, dim_staff, CURRENCY_NAMES,
    DIM_COUNTERPARTY_COLUMNS, DIM_CURRENCY_COLUMNS, DIM_DESIGN_COLUMNS, DIM_LOCATION_COLUMNS,
    DIM_STAFF_COLUMNS,
};
pub use facts::fact_sales_order;
pub use references::resolve_reference;
pub use rules::{ShapingRule, TableSet};

use crate::codec::TableCodec;
use crate::error::PipelineResult;
use crate::extract::artifact_key;
use crate::state::{ExtractionResult, State, StateStore, TransformLogEntry, TransformResult};
use crate::stats::StageStats;
use crate::storage::BlobStore;
use crate::table::Table;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use std::sync::Arc;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct TransformSettings {
    pub ingest_bucket: String,
    pub processed_bucket: String,
    pub dim_date_start: NaiveDate,
    pub dim_date_end: NaiveDate,
}

pub struct TransformEngine {
    store: Arc<dyn BlobStore>,
    codec: Arc<dyn TableCodec>,
    state_store: StateStore,
    settings: TransformSettings,
}

impl TransformEngine {
    pub fn new(
        store: Arc<dyn BlobStore>,
        codec: Arc<dyn TableCodec>,
        state_store: StateStore,
        settings: TransformSettings,
    ) -> Self {
        Self {
            store,
            codec,
            state_store,
            settings,
        }
    }

    /// Transform the artifacts of one extraction run
    ///
    /// Returns one result per staged warehouse artifact. Transform logs are
    /// saved after each one; the stage watermark is saved only when every
    /// rule has succeeded. A missing reference table or a failing rule
    /// aborts the run.
    pub async fn transform(
        &self,
        extraction_results: &[ExtractionResult],
        state: &mut State,
    ) -> PipelineResult<Vec<TransformResult>> {
        let run_id = Uuid::new_v4();
        let span = info_span!("transform", %run_id);

        async move {
            let mut stats = StageStats::new("transform");
            let mut results = Vec::new();

            if state.transform_watermark().is_none() {
                let (entry, rows, bytes) = self.stage_dim_date(state).await.inspect_err(|e| {
                    error!(table = "dim_date", stage = "transform", error = %e, "Failed to stage calendar dimension");
                })?;
                stats.inc_written(rows, bytes);
                results.push(entry);
            }

            if extraction_results.is_empty() {
                info!("No extraction results to transform");
            }

            let batch = self.read_batch(extraction_results).await?;

            for (source, watermark) in batch_order(extraction_results) {
                let Some(rule) = ShapingRule::for_source(source) else {
                    info!(table = %source, "No shaping rule for table, skipping");
                    stats.inc_skipped();
                    continue;
                };

                match self.run_rule(rule, &batch, watermark, state).await {
                    Ok(Some((entry, rows, bytes))) => {
                        stats.inc_written(rows, bytes);
                        results.push(entry);
                    }
                    Ok(None) => stats.inc_skipped(),
                    Err(e) => {
                        error!(table = %source, stage = "transform", error = %e, "Transform failed, aborting run");
                        return Err(e);
                    }
                }
            }

            // a failed run leaves the stage watermark unset, so a retry
            // still seeds dim_date
            if let Some(latest) = results.iter().map(|r| r.transformation_timestamp).max() {
                let next = state.clone().complete_transform(latest);
                self.state_store.save(&next).await.inspect_err(|e| {
                    error!(stage = "transform", error = %e, "Failed to persist transform watermark");
                })?;
                *state = next;
            }

            stats.log_summary();
            Ok(results)
        }
        .instrument(span)
        .await
    }

    /// Decode the artifacts of the current run that some rule reads
    async fn read_batch(&self, extraction_results: &[ExtractionResult]) -> PipelineResult<TableSet> {
        let mut batch = TableSet::new();

        for result in extraction_results {
            let table = result.table_name.as_str();
            let used = ShapingRule::ALL
                .iter()
                .any(|rule| rule.required_tables().iter().any(|t| *t == table));
            if !used {
                continue;
            }

            let data = self
                .store
                .get(&self.settings.ingest_bucket, &result.key)
                .await
                .inspect_err(|e| {
                    error!(table = %table, key = %result.key, stage = "transform", error = %e, "Failed to read extraction artifact");
                })?;
            let decoded = self.codec.decode(table, &data)?;

            let merged = match batch.get(table) {
                Some(existing) => existing.clone().concat(&decoded)?,
                None => decoded,
            };
            batch.insert(merged);
        }

        Ok(batch)
    }

    async fn run_rule(
        &self,
        rule: ShapingRule,
        batch: &TableSet,
        watermark: NaiveDateTime,
        state: &mut State,
    ) -> PipelineResult<Option<(TransformResult, usize, i64)>> {
        let source = rule.source_table();
        let mut inputs = TableSet::new();
        if let Some(primary) = batch.get(source) {
            inputs.insert(primary.clone());
        }

        for reference in rule.reference_tables() {
            let resolved = resolve_reference(
                self.store.as_ref(),
                self.codec.as_ref(),
                &self.settings.ingest_bucket,
                state,
                reference,
                batch.get(reference),
            )
            .await?;
            if let Some(table) = resolved {
                inputs.insert(table);
            }
        }

        let output = rule.apply(&inputs)?;
        if output.is_empty() {
            info!(table = %source, target = rule.target_table(), "Rule produced no rows, skipping");
            return Ok(None);
        }

        let (entry, bytes) = self.stage(source, &output, watermark, state).await?;
        Ok(Some((entry, output.len(), bytes)))
    }

    async fn stage_dim_date(&self, state: &mut State) -> PipelineResult<(TransformResult, usize, i64)> {
        let table = dim_date(self.settings.dim_date_start, self.settings.dim_date_end)?;
        let now = Utc::now().naive_utc();
        let (entry, bytes) = self.stage("dim_date", &table, now, state).await?;
        Ok((entry, table.len(), bytes))
    }

    /// Stage `output` and record it under `source` in the transform state
    async fn stage(
        &self,
        source: &str,
        output: &Table,
        watermark: NaiveDateTime,
        state: &mut State,
    ) -> PipelineResult<(TransformResult, i64)> {
        let artifact = artifact_key(&output.name, watermark, self.codec.extension());
        let data = self.codec.encode(output)?;
        let upload = self
            .store
            .put(
                &self.settings.processed_bucket,
                &artifact.key,
                data,
                self.codec.content_type(),
            )
            .await?;

        let entry = TransformLogEntry {
            table_name: output.name.clone(),
            transformation_timestamp: Utc::now().naive_utc(),
            last_updated: watermark,
            file_name: artifact.file_name,
            key: artifact.key,
        };

        let next = state.clone().record_transform(source, entry.clone());
        self.state_store.save(&next).await?;
        *state = next;

        info!(
            table = %source,
            target = %output.name,
            rows = output.len(),
            key = %entry.key,
            "Staged transform artifact"
        );
        Ok((entry, upload.size))
    }
}

/// Distinct source tables of a run, in first-seen order, each with its
/// newest watermark
fn batch_order(extraction_results: &[ExtractionResult]) -> Vec<(&str, NaiveDateTime)> {
    let mut order: Vec<(&str, NaiveDateTime)> = Vec::new();
    for result in extraction_results {
        match order.iter_mut().find(|(name, _)| *name == result.table_name) {
            Some((_, watermark)) => *watermark = (*watermark).max(result.last_updated),
            None => order.push((result.table_name.as_str(), result.last_updated)),
        }
    }
    order
}

//! Rebuilding reference tables from the ingest log
//!
//! Extraction is incremental, so the artifact for `address` in one batch only
//! holds the rows that changed. A join needs the whole table: it is rebuilt
//! by decoding every logged artifact in order and keeping the newest version
//! of each `<table>_id`.

use crate::codec::TableCodec;
use crate::error::PipelineResult;
use crate::state::State;
use crate::storage::BlobStore;
use crate::table::Table;
use tracing::{debug, instrument};

/// Full current contents of `table`
///
/// Falls back to `batch` when the state has never logged the table. Returns
/// `None` when neither is available.
#[instrument(skip(store, codec, state, batch))]
pub async fn resolve_reference(
    store: &dyn BlobStore,
    codec: &dyn TableCodec,
    ingest_bucket: &str,
    state: &State,
    table: &str,
    batch: Option<&Table>,
) -> PipelineResult<Option<Table>> {
    let log = state.ingest_log(table);
    if log.is_empty() {
        debug!(table, from_batch = batch.is_some(), "No ingest log for reference table");
        return Ok(batch.cloned());
    }

    let mut merged = Table::new(table, Vec::<String>::new());
    for entry in log {
        let data = store.get(ingest_bucket, &entry.key).await?;
        let part = codec.decode(table, &data)?;
        merged = merged.concat(&part)?;
    }

    let rebuilt = merged
        .with_name(table)
        .latest_by_key(&format!("{}_id", table))?;

    debug!(table, artifacts = log.len(), rows = rebuilt.len(), "Rebuilt reference table");
    Ok(Some(rebuilt))
}

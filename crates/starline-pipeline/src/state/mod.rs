//! Watermark state shared by the extract and transform stages
//!
//! The whole pipeline keeps one JSON document:
//!
//! ```json
//! {
//!   "ingest_state": {
//!     "currency": {
//!       "last_updated": "2025-06-01T10:30:00",
//!       "ingest_log": [{ "table_name": "currency", "key": "2025/6/1/...", ... }]
//!     }
//!   },
//!   "transform_state": { "last_updated": null, "tables": {} }
//! }
//! ```
//!
//! Helpers that change the state take it by value and return the new
//! version, so callers always hold a complete copy of the prior state until
//! the new one has been persisted. Log lists are only ever appended to.

mod store;

pub use store::StateStore;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct State {
    #[serde(default)]
    pub ingest_state: BTreeMap<String, TableIngestState>,
    #[serde(default)]
    pub transform_state: TransformState,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableIngestState {
    pub last_updated: Option<NaiveDateTime>,
    #[serde(default)]
    pub ingest_log: Vec<IngestLogEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransformState {
    pub last_updated: Option<NaiveDateTime>,
    #[serde(default)]
    pub tables: BTreeMap<String, TableTransformState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableTransformState {
    pub last_updated: Option<NaiveDateTime>,
    #[serde(default)]
    pub transform_log: Vec<TransformLogEntry>,
}

/// One staged extraction artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestLogEntry {
    pub table_name: String,
    pub extraction_timestamp: NaiveDateTime,
    /// Greatest watermark value among the extracted rows
    pub last_updated: NaiveDateTime,
    pub file_name: String,
    pub key: String,
}

/// One staged warehouse artifact; `table_name` is the warehouse table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformLogEntry {
    pub table_name: String,
    pub transformation_timestamp: NaiveDateTime,
    /// Watermark of the source artifact the output was built from
    pub last_updated: NaiveDateTime,
    pub file_name: String,
    pub key: String,
}

/// What the extract stage hands to the transform stage
pub type ExtractionResult = IngestLogEntry;

/// What the transform stage hands to the load stage
pub type TransformResult = TransformLogEntry;

impl State {
    /// Ensure `table` has an ingest entry
    pub fn initialize_table(mut self, table: &str) -> State {
        if !self.ingest_state.contains_key(table) {
            self.ingest_state
                .insert(table.to_string(), TableIngestState::default());
        }
        self
    }

    /// Ensure `table` has a transform entry
    pub fn initialize_transform_table(mut self, table: &str) -> State {
        if !self.transform_state.tables.contains_key(table) {
            self.transform_state
                .tables
                .insert(table.to_string(), TableTransformState::default());
        }
        self
    }

    /// Append an extraction and advance the table's watermark
    ///
    /// The watermark never moves backwards, even if `entry` carries an
    /// older value.
    pub fn record_ingest(self, entry: IngestLogEntry) -> State {
        let table = entry.table_name.clone();
        let mut state = self.initialize_table(&table);
        if let Some(ingest) = state.ingest_state.get_mut(&table) {
            ingest.last_updated = max_opt(ingest.last_updated, entry.last_updated);
            ingest.ingest_log.push(entry);
        }
        state
    }

    /// Append a transformation of `source_table` and advance the table's
    /// transform watermark
    ///
    /// The stage watermark is left alone; it only moves through
    /// [`State::complete_transform`] once a whole run has succeeded.
    pub fn record_transform(self, source_table: &str, entry: TransformLogEntry) -> State {
        let mut state = self.initialize_transform_table(source_table);
        if let Some(table) = state.transform_state.tables.get_mut(source_table) {
            table.last_updated = max_opt(table.last_updated, entry.last_updated);
            table.transform_log.push(entry);
        }
        state
    }

    /// Advance the stage watermark after a successful transform run
    pub fn complete_transform(mut self, transformed_at: NaiveDateTime) -> State {
        self.transform_state.last_updated =
            max_opt(self.transform_state.last_updated, transformed_at);
        self
    }

    /// Extraction watermark for `table`, `None` before its first extraction
    pub fn watermark(&self, table: &str) -> Option<NaiveDateTime> {
        self.ingest_state.get(table).and_then(|t| t.last_updated)
    }

    pub fn transform_watermark(&self) -> Option<NaiveDateTime> {
        self.transform_state.last_updated
    }

    pub fn ingest_log(&self, table: &str) -> &[IngestLogEntry] {
        self.ingest_state
            .get(table)
            .map(|t| t.ingest_log.as_slice())
            .unwrap_or_default()
    }

    pub fn latest_ingest_key(&self, table: &str) -> Option<&str> {
        self.ingest_log(table).last().map(|entry| entry.key.as_str())
    }
}

fn max_opt(current: Option<NaiveDateTime>, candidate: NaiveDateTime) -> Option<NaiveDateTime> {
    Some(current.map_or(candidate, |c| c.max(candidate)))
}

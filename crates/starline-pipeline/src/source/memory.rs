use super::SourceDatabase;
use crate::error::{PipelineError, PipelineResult};
use crate::table::Table;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-process [`SourceDatabase`] holding whole tables
///
/// Tables are listed in name order. Clones share the same tables, so a test
/// can add rows between two runs.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    tables: Arc<RwLock<BTreeMap<String, Table>>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a table, keyed by its name
    pub async fn insert_table(&self, table: Table) {
        self.tables.write().await.insert(table.name.clone(), table);
    }

    /// Append rows to an existing table
    pub async fn append(&self, table: &Table) -> PipelineResult<()> {
        let mut tables = self.tables.write().await;
        let existing = tables.remove(&table.name).unwrap_or_default();
        let merged = existing.concat(table)?.with_name(table.name.clone());
        tables.insert(table.name.clone(), merged);
        Ok(())
    }
}

#[async_trait]
impl SourceDatabase for MemorySource {
    async fn list_tables(&self) -> PipelineResult<Vec<String>> {
        Ok(self.tables.read().await.keys().cloned().collect())
    }

    async fn fetch_rows(
        &self,
        table: &str,
        watermark_column: &str,
        since: Option<NaiveDateTime>,
    ) -> PipelineResult<Table> {
        let tables = self.tables.read().await;
        let source = tables
            .get(table)
            .ok_or_else(|| PipelineError::invalid_value(table, "*", "no such source table"))?;

        let Some(since) = since else {
            return Ok(source.clone());
        };

        let idx = source.require_column(watermark_column)?;
        let mut result = Table::new(table, source.columns.clone());
        for row in &source.rows {
            if row[idx].to_timestamp().is_some_and(|ts| ts > since) {
                result.push_row(row.clone())?;
            }
        }
        Ok(result)
    }
}

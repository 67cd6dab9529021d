//! Operational database the extract stage reads from

use crate::error::PipelineResult;
use crate::table::Table;
use async_trait::async_trait;
use chrono::NaiveDateTime;

mod memory;
mod postgres;

pub use memory::MemorySource;
pub use postgres::PgSource;

#[async_trait]
pub trait SourceDatabase: Send + Sync {
    /// Tables eligible for extraction, in a stable order
    async fn list_tables(&self) -> PipelineResult<Vec<String>>;

    /// Rows of `table`, restricted to `watermark_column > since` when
    /// `since` is set
    async fn fetch_rows(
        &self,
        table: &str,
        watermark_column: &str,
        since: Option<NaiveDateTime>,
    ) -> PipelineResult<Table>;
}

/// Quote a SQL identifier, doubling embedded quotes
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("sales_order"), "\"sales_order\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}

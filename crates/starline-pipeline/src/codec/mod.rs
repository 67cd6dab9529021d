//! Serialization of tables into staged artifacts

mod parquet_codec;

pub use parquet_codec::ParquetCodec;

use crate::error::PipelineResult;
use crate::table::Table;

/// Encodes a [`Table`] to bytes and back
///
/// Implementations must round-trip column names, column order, row order
/// and every value kind a source database can produce.
pub trait TableCodec: Send + Sync {
    /// File extension without the dot, used in artifact keys
    fn extension(&self) -> &'static str;

    fn content_type(&self) -> &'static str;

    fn encode(&self, table: &Table) -> PipelineResult<Vec<u8>>;

    /// Decode an artifact; `name` becomes the table name
    fn decode(&self, name: &str, data: &[u8]) -> PipelineResult<Table>;
}

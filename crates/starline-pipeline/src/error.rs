//! Error types for the pipeline stages

use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Source or warehouse query failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Object not found: s3://{bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("Storage error for s3://{bucket}/{key}: {message}")]
    Storage {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A shaping rule was run without one of its input tables
    #[error("Rule '{rule}' requires table '{table}', which is missing")]
    MissingInput { rule: &'static str, table: String },

    #[error("Table '{table}' has no column '{column}'")]
    MissingColumn { table: String, column: String },

    #[error("Invalid value in {table}.{column}: {message}")]
    InvalidValue {
        table: String,
        column: String,
        message: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn storage(bucket: &str, key: &str, message: impl Into<String>) -> Self {
        Self::Storage {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message: message.into(),
        }
    }

    pub fn invalid_value(table: &str, column: &str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            table: table.to_string(),
            column: column.to_string(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<arrow::error::ArrowError> for PipelineError {
    fn from(err: arrow::error::ArrowError) -> Self {
        Self::Codec(err.to_string())
    }
}

impl From<parquet::errors::ParquetError> for PipelineError {
    fn from(err: parquet::errors::ParquetError) -> Self {
        Self::Codec(err.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_input_names_table() {
        let err = PipelineError::MissingInput {
            rule: "dim_counterparty",
            table: "address".to_string(),
        };
        assert!(err.to_string().contains("address"));
        assert!(err.to_string().contains("dim_counterparty"));
    }

    #[test]
    fn test_is_not_found() {
        let err = PipelineError::NotFound {
            bucket: "b".into(),
            key: "k".into(),
        };
        assert!(err.is_not_found());
        assert!(!PipelineError::config("x").is_not_found());
    }
}

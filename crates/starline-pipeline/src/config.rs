//! Pipeline configuration
//!
//! Loaded once at startup from the environment (and `.env`, if present),
//! then handed to each engine through its settings struct.
//!
//! | variable | default |
//! |---|---|
//! | `STARLINE_INGEST_BUCKET` | required |
//! | `STARLINE_PROCESSED_BUCKET` | required |
//! | `STARLINE_STATE_BUCKET` | the ingest bucket |
//! | `STARLINE_STATE_KEY` | `pipeline_state.json` |
//! | `STARLINE_SOURCE_SCHEMA` | `public` |
//! | `STARLINE_EXCLUDED_TABLES` | `_prisma_migrations` |
//! | `STARLINE_WATERMARK_COLUMN` | `last_updated` |
//! | `STARLINE_DIM_DATE_START` / `_END` | `2022-11-02` / `2040-01-01` |
//! | `SOURCE_DATABASE_URL`, `WAREHOUSE_DATABASE_URL` | required by the stage using them |

use crate::error::{PipelineError, PipelineResult};
use crate::extract::ExtractSettings;
use crate::storage::StorageConfig;
use crate::transform::TransformSettings;
use chrono::NaiveDate;
use std::env;

pub const DEFAULT_STATE_KEY: &str = "pipeline_state.json";
pub const DEFAULT_SOURCE_SCHEMA: &str = "public";
pub const DEFAULT_EXCLUDED_TABLES: &str = "_prisma_migrations";
pub const DEFAULT_WATERMARK_COLUMN: &str = "last_updated";
pub const DEFAULT_DIM_DATE_START: &str = "2022-11-02";
pub const DEFAULT_DIM_DATE_END: &str = "2040-01-01";

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub ingest_bucket: String,
    pub processed_bucket: String,
    pub state_bucket: String,
    pub state_key: String,
    pub source_schema: String,
    pub excluded_tables: Vec<String>,
    pub watermark_column: String,
    pub dim_date_start: NaiveDate,
    pub dim_date_end: NaiveDate,
    pub storage: StorageConfig,
}

impl PipelineConfig {
    pub fn from_env() -> PipelineResult<Self> {
        dotenvy::dotenv().ok();

        let ingest_bucket = required("STARLINE_INGEST_BUCKET")?;
        let processed_bucket = required("STARLINE_PROCESSED_BUCKET")?;

        let config = Self {
            state_bucket: env::var("STARLINE_STATE_BUCKET").unwrap_or_else(|_| ingest_bucket.clone()),
            ingest_bucket,
            processed_bucket,
            state_key: env::var("STARLINE_STATE_KEY").unwrap_or_else(|_| DEFAULT_STATE_KEY.to_string()),
            source_schema: env::var("STARLINE_SOURCE_SCHEMA")
                .unwrap_or_else(|_| DEFAULT_SOURCE_SCHEMA.to_string()),
            excluded_tables: parse_list(
                &env::var("STARLINE_EXCLUDED_TABLES")
                    .unwrap_or_else(|_| DEFAULT_EXCLUDED_TABLES.to_string()),
            ),
            watermark_column: env::var("STARLINE_WATERMARK_COLUMN")
                .unwrap_or_else(|_| DEFAULT_WATERMARK_COLUMN.to_string()),
            dim_date_start: parse_date(
                "STARLINE_DIM_DATE_START",
                &env::var("STARLINE_DIM_DATE_START")
                    .unwrap_or_else(|_| DEFAULT_DIM_DATE_START.to_string()),
            )?,
            dim_date_end: parse_date(
                "STARLINE_DIM_DATE_END",
                &env::var("STARLINE_DIM_DATE_END").unwrap_or_else(|_| DEFAULT_DIM_DATE_END.to_string()),
            )?,
            storage: StorageConfig::from_env(),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> PipelineResult<()> {
        for (name, value) in [
            ("ingest bucket", &self.ingest_bucket),
            ("processed bucket", &self.processed_bucket),
            ("state bucket", &self.state_bucket),
            ("state key", &self.state_key),
            ("watermark column", &self.watermark_column),
        ] {
            if value.trim().is_empty() {
                return Err(PipelineError::config(format!("{} must not be empty", name)));
            }
        }

        if self.ingest_bucket == self.processed_bucket {
            return Err(PipelineError::config(
                "ingest and processed buckets must differ",
            ));
        }

        if self.dim_date_end < self.dim_date_start {
            return Err(PipelineError::config(format!(
                "dim_date range is inverted: {} > {}",
                self.dim_date_start, self.dim_date_end
            )));
        }

        Ok(())
    }

    pub fn extract_settings(&self) -> ExtractSettings {
        ExtractSettings {
            ingest_bucket: self.ingest_bucket.clone(),
            watermark_column: self.watermark_column.clone(),
        }
    }

    pub fn transform_settings(&self) -> TransformSettings {
        TransformSettings {
            ingest_bucket: self.ingest_bucket.clone(),
            processed_bucket: self.processed_bucket.clone(),
            dim_date_start: self.dim_date_start,
            dim_date_end: self.dim_date_end,
        }
    }
}

fn required(var: &str) -> PipelineResult<String> {
    env::var(var).map_err(|_| PipelineError::config(format!("{} must be set", var)))
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_date(var: &str, raw: &str) -> PipelineResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| PipelineError::config(format!("{}: invalid date '{}': {}", var, raw, e)))
}

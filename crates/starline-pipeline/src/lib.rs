//! Starline warehouse pipeline
//!
//! Incremental ETL from an operational Postgres database into a star-schema
//! warehouse, in three independently invoked stages:
//!
//! 1. **extract**: rows newer than each table's watermark are staged as
//!    Parquet artifacts in the ingest bucket ([`extract::ExtractionEngine`])
//! 2. **transform**: staged artifacts are shaped into dimension and fact
//!    tables in the processed bucket ([`transform::TransformEngine`])
//! 3. **load**: processed artifacts are bulk-inserted into the warehouse
//!    ([`load::Loader`])
//!
//! Stages share nothing but object storage and one JSON state document
//! ([`state::State`]) holding the watermarks and artifact logs.
//!
//! # Example
//!
//! ```no_run
//! use starline_pipeline::{
//!     codec::ParquetCodec, config::PipelineConfig, db, extract::ExtractionEngine,
//!     source::PgSource, state::StateStore, storage::S3BlobStore,
//! };
//! use std::sync::Arc;
//!
//! # async fn run() -> starline_pipeline::PipelineResult<()> {
//! let config = PipelineConfig::from_env()?;
//! let pool = db::create_pool(&db::DbConfig::from_env(db::SOURCE_DATABASE_URL)?).await?;
//! let store = Arc::new(S3BlobStore::new(&config.storage).await);
//! let state_store = StateStore::new(store.clone(), &config.state_bucket, &config.state_key);
//!
//! let engine = ExtractionEngine::new(
//!     Arc::new(PgSource::new(pool, &config.source_schema, config.excluded_tables.clone())),
//!     store,
//!     Arc::new(ParquetCodec::new()),
//!     state_store.clone(),
//!     config.extract_settings(),
//! );
//!
//! let mut state = state_store.load().await?;
//! let staged = engine.extract_all(&mut state).await?;
//! # Ok(())
//! # }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod codec;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod load;
pub mod manifest;
pub mod source;
pub mod state;
pub mod stats;
pub mod storage;
pub mod table;
pub mod transform;

pub use error::{PipelineError, PipelineResult};
pub use table::{Table, Value};

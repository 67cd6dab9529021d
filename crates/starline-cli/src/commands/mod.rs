//! CLI command implementations
//!
//! Each subcommand has its own module with a `run` function. They share the
//! wiring in [`Pipeline`] and the manifest helpers below.

pub mod extract;
pub mod load;
pub mod run;
pub mod transform;

use anyhow::{Context, Result};
use starline_pipeline::codec::{ParquetCodec, TableCodec};
use starline_pipeline::config::PipelineConfig;
use starline_pipeline::db::{self, DbConfig};
use starline_pipeline::extract::ExtractionEngine;
use starline_pipeline::load::{Loader, PgWarehouse};
use starline_pipeline::manifest::StageManifest;
use starline_pipeline::source::PgSource;
use starline_pipeline::state::StateStore;
use starline_pipeline::storage::{BlobStore, S3BlobStore};
use starline_pipeline::transform::TransformEngine;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Collaborators shared by every stage
pub struct Pipeline {
    pub config: PipelineConfig,
    pub store: Arc<dyn BlobStore>,
    pub codec: Arc<dyn TableCodec>,
    pub state_store: StateStore,
}

impl Pipeline {
    pub async fn from_env() -> Result<Self> {
        let config = PipelineConfig::from_env().context("Failed to load pipeline configuration")?;
        let store: Arc<dyn BlobStore> = Arc::new(S3BlobStore::new(&config.storage).await);
        let state_store = StateStore::new(store.clone(), &config.state_bucket, &config.state_key);

        info!(
            ingest = %config.ingest_bucket,
            processed = %config.processed_bucket,
            state = %state_store.location(),
            "Pipeline configured"
        );

        Ok(Self {
            config,
            store,
            codec: Arc::new(ParquetCodec::new()),
            state_store,
        })
    }

    pub async fn extraction_engine(&self) -> Result<ExtractionEngine> {
        let db_config = DbConfig::from_env(db::SOURCE_DATABASE_URL)?;
        let pool = db::create_pool(&db_config)
            .await
            .context("Failed to connect to the source database")?;
        db::health_check(&pool)
            .await
            .context("Source database health check failed")?;
        let source = PgSource::new(
            pool,
            &self.config.source_schema,
            self.config.excluded_tables.clone(),
        );

        Ok(ExtractionEngine::new(
            Arc::new(source),
            self.store.clone(),
            self.codec.clone(),
            self.state_store.clone(),
            self.config.extract_settings(),
        ))
    }

    pub fn transform_engine(&self) -> TransformEngine {
        TransformEngine::new(
            self.store.clone(),
            self.codec.clone(),
            self.state_store.clone(),
            self.config.transform_settings(),
        )
    }

    pub async fn loader(&self) -> Result<Loader> {
        let db_config = DbConfig::from_env(db::WAREHOUSE_DATABASE_URL)?;
        let pool = db::create_pool(&db_config)
            .await
            .context("Failed to connect to the warehouse database")?;
        db::health_check(&pool)
            .await
            .context("Warehouse database health check failed")?;

        Ok(Loader::new(
            self.store.clone(),
            self.codec.clone(),
            Arc::new(PgWarehouse::new(pool)),
            &self.config.processed_bucket,
        ))
    }
}

/// Read a manifest written by an earlier stage
pub fn read_manifest<T>(path: &Path) -> Result<StageManifest<T>>
where
    T: for<'de> serde::Deserialize<'de>,
{
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest {}", path.display()))?;
    StageManifest::from_json(&json).with_context(|| format!("Invalid manifest {}", path.display()))
}

/// Write a manifest to `output`, or to stdout when no path is given
pub fn write_manifest<T: serde::Serialize>(manifest: &StageManifest<T>, output: Option<&Path>) -> Result<()> {
    let json = manifest.to_json()?;
    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write manifest {}", path.display()))?;
            info!(path = %path.display(), files = manifest.files_to_process.len(), "Wrote manifest");
        }
        None => print_manifest(&json, &mut std::io::stdout().lock())?,
    }
    Ok(())
}

/// Write manifest JSON as the only content of `out`
pub fn print_manifest<W: Write>(json: &str, out: &mut W) -> Result<()> {
    writeln!(out, "{}", json).context("Failed to write manifest to stdout")?;
    out.flush()?;
    Ok(())
}

/// Pretty JSON for command summaries
pub fn to_pretty_json<T: serde::Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

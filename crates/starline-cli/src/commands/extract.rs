//! `starline extract` command implementation
//!
//! Stages new source rows and emits the extraction manifest.

use super::{write_manifest, Pipeline};
use anyhow::{Context, Result};
use starline_pipeline::manifest::ExtractManifest;
use std::path::PathBuf;
use tracing::info;

pub async fn run(output: Option<PathBuf>) -> Result<()> {
    let pipeline = Pipeline::from_env().await?;
    let manifest = extract(&pipeline).await?;
    write_manifest(&manifest, output.as_deref())
}

pub(crate) async fn extract(pipeline: &Pipeline) -> Result<ExtractManifest> {
    let engine = pipeline.extraction_engine().await?;
    let mut state = pipeline
        .state_store
        .load()
        .await
        .context("Failed to load pipeline state")?;

    let results = engine.extract_all(&mut state).await.context("Extraction failed")?;
    if results.is_empty() {
        info!("No new rows in any source table");
    }
    Ok(ExtractManifest::new(results))
}

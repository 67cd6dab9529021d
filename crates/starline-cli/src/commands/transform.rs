//! `starline transform` command implementation
//!
//! Shapes the artifacts named by an extraction manifest and emits the
//! transform manifest.

use super::{read_manifest, write_manifest, Pipeline};
use anyhow::{Context, Result};
use starline_pipeline::manifest::{ExtractManifest, TransformManifest};
use std::path::PathBuf;

pub async fn run(manifest: PathBuf, output: Option<PathBuf>) -> Result<()> {
    let extracted: ExtractManifest = read_manifest(&manifest)?;
    let pipeline = Pipeline::from_env().await?;
    let transformed = transform(&pipeline, &extracted).await?;
    write_manifest(&transformed, output.as_deref())
}

pub(crate) async fn transform(pipeline: &Pipeline, extracted: &ExtractManifest) -> Result<TransformManifest> {
    let mut state = pipeline
        .state_store
        .load()
        .await
        .context("Failed to load pipeline state")?;

    let results = pipeline
        .transform_engine()
        .transform(&extracted.files_to_process, &mut state)
        .await
        .context("Transform failed")?;
    Ok(TransformManifest::new(results))
}

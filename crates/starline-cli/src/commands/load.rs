//! `starline load` command implementation

use super::{read_manifest, to_pretty_json, Pipeline};
use anyhow::{Context, Result};
use starline_pipeline::load::LoadedArtifact;
use starline_pipeline::manifest::TransformManifest;
use std::path::PathBuf;

pub async fn run(manifest: PathBuf) -> Result<()> {
    let transformed: TransformManifest = read_manifest(&manifest)?;
    let pipeline = Pipeline::from_env().await?;
    let loaded = load(&pipeline, &transformed).await?;
    println!("{}", to_pretty_json(&loaded)?);
    Ok(())
}

pub(crate) async fn load(pipeline: &Pipeline, transformed: &TransformManifest) -> Result<Vec<LoadedArtifact>> {
    if transformed.is_empty() {
        tracing::info!("Transform manifest is empty, nothing to load");
        return Ok(Vec::new());
    }

    let loader = pipeline.loader().await?;
    loader
        .load(&transformed.files_to_process)
        .await
        .context("Load failed")
}

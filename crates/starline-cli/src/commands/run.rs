//! `starline run` command implementation
//!
//! Runs the three stages back to back in one process. Manifests are passed
//! in memory; state is still persisted after every artifact.

use super::{extract::extract, load::load, to_pretty_json, transform::transform, Pipeline};
use anyhow::Result;
use tracing::info;

pub async fn run() -> Result<()> {
    let pipeline = Pipeline::from_env().await?;

    let extracted = extract(&pipeline).await?;
    let transformed = transform(&pipeline, &extracted).await?;
    let loaded = load(&pipeline, &transformed).await?;

    info!(
        extracted = extracted.files_to_process.len(),
        transformed = transformed.files_to_process.len(),
        loaded = loaded.len(),
        "Pipeline run complete"
    );
    println!("{}", to_pretty_json(&loaded)?);
    Ok(())
}

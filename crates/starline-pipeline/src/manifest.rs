//! JSON envelope passed from one stage to the next
//!
//! ```json
//! { "files_to_process": [ { "table_name": "currency", "key": "2025/6/1/...", ... } ] }
//! ```

use crate::error::PipelineResult;
use crate::state::{ExtractionResult, TransformResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageManifest<T> {
    pub files_to_process: Vec<T>,
}

/// Output of extract, input of transform
pub type ExtractManifest = StageManifest<ExtractionResult>;

/// Output of transform, input of load
pub type TransformManifest = StageManifest<TransformResult>;

impl<T> StageManifest<T> {
    pub fn new(files_to_process: Vec<T>) -> Self {
        Self { files_to_process }
    }

    pub fn is_empty(&self) -> bool {
        self.files_to_process.is_empty()
    }
}

impl<T: Serialize> StageManifest<T> {
    pub fn to_json(&self) -> PipelineResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl<T: for<'de> Deserialize<'de>> StageManifest<T> {
    pub fn from_json(json: &str) -> PipelineResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

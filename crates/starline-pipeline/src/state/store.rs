use super::State;
use crate::error::PipelineResult;
use crate::storage::{BlobStore, UploadResult};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Reads and overwrites the state document at one bucket/key
#[derive(Clone)]
pub struct StateStore {
    store: Arc<dyn BlobStore>,
    bucket: String,
    key: String,
}

impl StateStore {
    pub fn new(store: Arc<dyn BlobStore>, bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    pub fn location(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }

    /// Fetch the current state
    ///
    /// A missing document is created empty and persisted. A document that
    /// does not parse is logged and replaced by an empty state in memory;
    /// it is only overwritten on the next save. Other storage errors are
    /// returned.
    #[instrument(skip(self), fields(location = %self.location()))]
    pub async fn load(&self) -> PipelineResult<State> {
        let data = match self.store.get(&self.bucket, &self.key).await {
            Ok(data) => data,
            Err(e) if e.is_not_found() => {
                info!("No state document found, creating an empty one");
                let state = State::default();
                self.save(&state).await?;
                return Ok(state);
            }
            Err(e) => {
                error!(error = %e, "Failed to read state document");
                return Err(e);
            }
        };

        match serde_json::from_slice::<State>(&data) {
            Ok(state) => Ok(state),
            Err(e) => {
                error!(error = %e, "State document is not valid JSON, starting from empty state");
                Ok(State::default())
            }
        }
    }

    /// Overwrite the stored document with `state`
    #[instrument(skip(self, state), fields(location = %self.location()))]
    pub async fn save(&self, state: &State) -> PipelineResult<UploadResult> {
        let data = serde_json::to_vec_pretty(state)?;
        self.store
            .put(&self.bucket, &self.key, data, "application/json")
            .await
            .inspect_err(|e| warn!(error = %e, "Failed to persist state document"))
    }
}

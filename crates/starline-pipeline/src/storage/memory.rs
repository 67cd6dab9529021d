use super::{BlobStore, UploadResult};
use crate::error::{PipelineError, PipelineResult};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

type Objects = BTreeMap<(String, String), Vec<u8>>;

/// In-process [`BlobStore`], used by tests and dry runs
///
/// Clones share the same objects.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    objects: Arc<RwLock<Objects>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn object_count(&self, bucket: &str) -> usize {
        self.objects
            .read()
            .await
            .keys()
            .filter(|(b, _)| b == bucket)
            .count()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, bucket: &str, key: &str) -> PipelineResult<Vec<u8>> {
        self.objects
            .read()
            .await
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| PipelineError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> PipelineResult<UploadResult> {
        let result = UploadResult::for_data(key, &data);
        self.objects
            .write()
            .await
            .insert((bucket.to_string(), key.to_string()), data);
        Ok(result)
    }

    async fn list(&self, bucket: &str, prefix: &str) -> PipelineResult<Vec<String>> {
        Ok(self
            .objects
            .read()
            .await
            .keys()
            .filter(|(b, k)| b == bucket && k.starts_with(prefix))
            .map(|(_, k)| k.clone())
            .collect())
    }
}

//! Blob storage for staged artifacts and the state document

use crate::error::{PipelineError, PipelineResult};
use async_trait::async_trait;
use aws_sdk_s3::{
    config::{Credentials, Region},
    error::DisplayErrorContext,
    primitives::ByteStream,
    Client,
};
use starline_common::checksum::sha256_hex;
use tracing::{debug, info, instrument};

pub mod config;
mod memory;

pub use config::StorageConfig;
pub use memory::MemoryBlobStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub key: String,
    pub checksum: String,
    pub size: i64,
}

impl UploadResult {
    pub fn for_data(key: &str, data: &[u8]) -> Self {
        Self {
            key: key.to_string(),
            checksum: sha256_hex(data),
            size: data.len() as i64,
        }
    }
}

/// Key-addressed object storage
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch an object; a missing key is [`PipelineError::NotFound`]
    async fn get(&self, bucket: &str, key: &str) -> PipelineResult<Vec<u8>>;

    /// Create or overwrite an object
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> PipelineResult<UploadResult>;

    /// Keys under `prefix`, in lexicographic order
    async fn list(&self, bucket: &str, prefix: &str) -> PipelineResult<Vec<String>>;
}

/// [`BlobStore`] backed by S3 or an S3-compatible service
#[derive(Clone)]
pub struct S3BlobStore {
    client: Client,
}

impl S3BlobStore {
    pub async fn new(config: &StorageConfig) -> Self {
        debug!("Initializing storage with config: {:?}", config);

        let mut builder = match (&config.access_key, &config.secret_key) {
            (Some(access_key), Some(secret_key)) => aws_sdk_s3::Config::builder()
                .credentials_provider(Credentials::new(
                    access_key,
                    secret_key,
                    None,
                    None,
                    "starline-storage",
                ))
                .region(Region::new(config.region.clone())),
            _ => {
                let shared = aws_config::defaults(aws_config::BehaviorVersion::latest())
                    .region(Region::new(config.region.clone()))
                    .load()
                    .await;
                aws_sdk_s3::config::Builder::from(&shared)
            }
        };

        builder = builder.force_path_style(config.path_style);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        info!(
            region = %config.region,
            endpoint = ?config.endpoint,
            static_credentials = config.has_static_credentials(),
            "Storage client initialized"
        );

        Self {
            client: Client::from_conf(builder.build()),
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    #[instrument(skip(self))]
    async fn get(&self, bucket: &str, key: &str) -> PipelineResult<Vec<u8>> {
        debug!("Downloading from s3://{}/{}", bucket, key);

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                let err = err.into_service_error();
                if err.is_no_such_key() {
                    PipelineError::NotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    }
                } else {
                    PipelineError::storage(bucket, key, DisplayErrorContext(&err).to_string())
                }
            })?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| PipelineError::storage(bucket, key, format!("failed to read body: {}", e)))?
            .into_bytes()
            .to_vec();

        debug!("Downloaded {} bytes from s3://{}/{}", data.len(), bucket, key);
        Ok(data)
    }

    #[instrument(skip(self, data))]
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> PipelineResult<UploadResult> {
        let result = UploadResult::for_data(key, &data);

        debug!("Uploading {} bytes to s3://{}/{}", result.size, bucket, key);

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|err| PipelineError::storage(bucket, key, DisplayErrorContext(&err).to_string()))?;

        info!("Successfully uploaded to s3://{}/{}", bucket, key);
        Ok(result)
    }

    #[instrument(skip(self))]
    async fn list(&self, bucket: &str, prefix: &str) -> PipelineResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let response = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|err| {
                    PipelineError::storage(bucket, prefix, DisplayErrorContext(&err).to_string())
                })?;

            keys.extend(
                response
                    .contents()
                    .iter()
                    .filter_map(|obj| obj.key().map(str::to_string)),
            );

            continuation = response.next_continuation_token().map(str::to_string);
            if response.is_truncated() != Some(true) || continuation.is_none() {
                break;
            }
        }

        keys.sort();
        debug!("Listed {} objects under s3://{}/{}", keys.len(), bucket, prefix);
        Ok(keys)
    }
}

use serde::{Deserialize, Serialize};
use std::env;

pub const DEFAULT_REGION: &str = "eu-west-2";

/// Connection settings for the S3-compatible object store
///
/// Bucket names are not part of this config; each stage addresses the
/// ingest, processed and state buckets explicitly.
#[derive(Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub endpoint: Option<String>,
    pub region: String,
    /// Static credentials; when unset the default AWS provider chain is used
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub path_style: bool,
}

impl StorageConfig {
    pub fn from_env() -> Self {
        Self {
            endpoint: env::var("S3_ENDPOINT").ok(),
            region: env::var("S3_REGION")
                .or_else(|_| env::var("AWS_REGION"))
                .unwrap_or_else(|_| DEFAULT_REGION.to_string()),
            access_key: env::var("S3_ACCESS_KEY").ok(),
            secret_key: env::var("S3_SECRET_KEY").ok(),
            path_style: env::var("S3_PATH_STYLE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
        }
    }

    pub fn has_static_credentials(&self) -> bool {
        self.access_key.is_some() && self.secret_key.is_some()
    }
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("access_key", &self.access_key.as_ref().map(|_| "***"))
            .field("secret_key", &self.secret_key.as_ref().map(|_| "***"))
            .field("path_style", &self.path_style)
            .finish()
    }
}

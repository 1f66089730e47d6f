mod s3;

pub use s3::{S3UrlIssuer, S3UrlIssuerConfig};

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

/// A short-lived upload grant. The key is what clients hand back when
/// registering the uploaded file; the URL itself is never persisted.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrlGrant {
    pub upload_url: String,
    pub file_key: String,
    pub bucket_name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Object storage unavailable: {0}")]
    Unavailable(String),
}

/// Issues pre-signed URLs against the object store. The server never
/// proxies file bytes, clients talk to the bucket directly.
#[async_trait]
pub trait StorageUrlIssuer: Send + Sync {
    async fn issue_upload_url(
        &self,
        file_name: &str,
        content_type: &str,
    ) -> Result<UploadUrlGrant, StorageError>;

    async fn issue_download_url(&self, file_key: &str) -> Result<String, StorageError>;
}

/// Object keys are prefixed with a fresh UUID so concurrent uploads of the
/// same file name never collide.
pub fn file_key_for(file_name: &str) -> String {
    format!("{}-{}", Uuid::new_v4(), file_name)
}

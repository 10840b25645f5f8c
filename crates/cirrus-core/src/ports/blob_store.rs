//! BlobStore port - Blob ストレージ（S3 互換）

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("object s3://{bucket}/{key} does not exist")]
    NotFound { bucket: String, key: String },

    #[error("blob store error: {0}")]
    Backend(String),
}

impl BlobError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, BlobError::NotFound { .. })
    }
}

/// Get/put of whole objects addressed by bucket + key.
///
/// `expires` is advisory: the backend may drop the object after that instant.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, BlobError>;

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        expires: Option<DateTime<Utc>>,
    ) -> Result<(), BlobError>;
}

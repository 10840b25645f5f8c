//! InMemoryBlobStore - 開発用の Blob ストア

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::ports::{BlobError, BlobStore};

#[derive(Debug, Clone)]
struct StoredObject {
    body: Vec<u8>,
    expires: Option<DateTime<Utc>>,
}

/// Objects live in a `HashMap<(bucket, key), _>`; expiry is recorded but never enforced.
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    objects: Mutex<HashMap<(String, String), StoredObject>>,
    fail_gets: AtomicBool,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object, e.g. a JSON document.
    pub async fn insert(&self, bucket: &str, key: &str, body: impl Into<Vec<u8>>) {
        self.objects.lock().await.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                body: body.into(),
                expires: None,
            },
        );
    }

    pub async fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .await
            .get(&(bucket.to_string(), key.to_string()))
            .map(|o| o.body.clone())
    }

    pub async fn expires_of(&self, bucket: &str, key: &str) -> Option<DateTime<Utc>> {
        self.objects
            .lock()
            .await
            .get(&(bucket.to_string(), key.to_string()))
            .and_then(|o| o.expires)
    }

    pub async fn len(&self) -> usize {
        self.objects.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Make every subsequent `get_object` fail with a backend error.
    pub fn fail_gets(&self, fail: bool) {
        self.fail_gets.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, BlobError> {
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(BlobError::Backend("access denied".to_string()));
        }
        self.object(bucket, key)
            .await
            .ok_or_else(|| BlobError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        expires: Option<DateTime<Utc>>,
    ) -> Result<(), BlobError> {
        self.objects.lock().await.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject { body, expires },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get() {
        let store = InMemoryBlobStore::new();
        store
            .put_object("b", "k", b"hello".to_vec(), None)
            .await
            .unwrap();
        assert_eq!(store.get_object("b", "k").await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let store = InMemoryBlobStore::new();
        let err = store.get_object("b", "nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn injected_failures_are_backend_errors() {
        let store = InMemoryBlobStore::new();
        store.insert("b", "k", "x").await;
        store.fail_gets(true);
        let err = store.get_object("b", "k").await.unwrap_err();
        assert!(!err.is_not_found());
    }
}

//! ==============================================================================
//! storage.rs - Object Store Access
//! ==============================================================================
//!
//! purpose:
//!     provides a unified interface for the durable blob store that holds
//!     the reading log. abstracts away the difference between the real
//!     Supabase Storage bucket (reached over HTTPS) and an in-memory map
//!     used by tests and credential-less development runs.
//!
//! contract:
//!     the store is a plain key/value blob interface: `get` returns the
//!     current bytes or "never written", `put` replaces the whole blob
//!     (last write wins, no versioning). everything smarter - CSV layout,
//!     retention, ordering - lives in history.rs, so the backend can be
//!     swapped without touching the log logic.
//!
//! ==============================================================================

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// Failure talking to the blob store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The request never completed (DNS, TLS, connection reset, ...).
    #[error("storage request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The store answered with a non-success status.
    #[error("storage returned {status} for {key}: {message}")]
    Rejected {
        status: u16,
        key: String,
        message: String,
    },
}

/// Durable blob store holding the reading log.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch a blob. `Ok(None)` means the key has never been written.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Write a blob, replacing any previous content.
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError>;
}

// ==============================================================================
// SUPABASE STORAGE (the production backend)
// ==============================================================================

/// Client for the Supabase Storage REST API. One bucket, service-role
/// authentication, upsert uploads.
pub struct SupabaseStore {
    client: reqwest::Client,
    project_url: String,
    bucket: String,
    service_key: String,
}

impl SupabaseStore {
    pub fn new(project_url: &str, bucket: &str, service_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            project_url: project_url.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
            service_key: service_key.to_string(),
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.project_url, self.bucket, key)
    }
}

#[async_trait]
impl ObjectStore for SupabaseStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let response = self
            .client
            .get(self.object_url(key))
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .send()
            .await?;

        // Depending on gateway version a missing object comes back as
        // 404 or as 400 with an "Object not found" body.
        let status = response.status();
        if status.as_u16() == 404 || status.as_u16() == 400 {
            debug!(key, "object not found");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(StorageError::Rejected {
                status: status.as_u16(),
                key: key.to_string(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        Ok(Some(response.bytes().await?.to_vec()))
    }

    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let response = self
            .client
            .post(self.object_url(key))
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .header("x-upsert", "true")
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Rejected {
                status: status.as_u16(),
                key: key.to_string(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }
}

// ==============================================================================
// MEMORY STORE (tests and credential-less development)
// ==============================================================================

/// Blob store backed by a process-local map. Used by the test suite and
/// by the `memory` storage backend so the hub runs without a bucket.
#[derive(Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.blobs.lock().unwrap().get(key).cloned())
    }

    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        self.blobs.lock().unwrap().insert(key.to_string(), bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_reports_missing_keys() {
        let store = MemoryStore::new();
        assert!(store.get("never-written.csv").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn memory_store_roundtrips_bytes() {
        let store = MemoryStore::new();
        store
            .put("log.csv", b"hello".to_vec(), "text/csv")
            .await
            .unwrap();
        assert_eq!(store.get("log.csv").await.unwrap().unwrap(), b"hello");
    }

    #[tokio::test]
    async fn memory_store_overwrites_on_put() {
        let store = MemoryStore::new();
        store.put("log.csv", b"one".to_vec(), "text/csv").await.unwrap();
        store.put("log.csv", b"two".to_vec(), "text/csv").await.unwrap();
        assert_eq!(store.get("log.csv").await.unwrap().unwrap(), b"two");
    }
}

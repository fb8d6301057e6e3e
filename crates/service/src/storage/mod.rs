//! Object storage for review images.
//!
//! `ObjectStore` is the seam between the review pipeline and whichever blob
//! store is configured. References returned by `put` are opaque strings the
//! pipeline persists verbatim; `delete` must accept them back unchanged.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use uuid::Uuid;

pub mod memory;
pub mod s3;

pub use memory::InMemoryObjectStore;
pub use s3::S3ObjectStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store rejected object: {0}")]
    Rejected(String),
    #[error("reference not owned by this store: {0}")]
    InvalidReference(String),
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
}

/// Metadata attached to an uploaded blob.
#[derive(Debug, Clone, Default)]
pub struct BlobMetadata {
    pub content_type: String,
    pub file_name: Option<String>,
    pub owner: Option<Uuid>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store a blob and return its stable reference.
    async fn put(&self, blob: Bytes, meta: &BlobMetadata) -> Result<String, StoreError>;
    /// Remove a blob. Deleting a reference that no longer exists is not an error.
    async fn delete(&self, reference: &str) -> Result<(), StoreError>;
}

/// `put` bounded by `limit`; expiry surfaces as `StoreError::Timeout`.
pub async fn put_with_timeout(
    store: &dyn ObjectStore,
    blob: Bytes,
    meta: &BlobMetadata,
    limit: Duration,
) -> Result<String, StoreError> {
    match tokio::time::timeout(limit, store.put(blob, meta)).await {
        Ok(res) => res,
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}

/// `delete` bounded by `limit`; expiry surfaces as `StoreError::Timeout`.
pub async fn delete_with_timeout(
    store: &dyn ObjectStore,
    reference: &str,
    limit: Duration,
) -> Result<(), StoreError> {
    match tokio::time::timeout(limit, store.delete(reference)).await {
        Ok(res) => res,
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}

/// File extension for an image content type.
pub fn extension_for(content_type: &str) -> &'static str {
    match content_type.to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/bmp" => "bmp",
        _ => "bin",
    }
}

/// Object key partitioned by upload date.
/// Format: {prefix}/{YYYY-MM-DD}/{uuid}.{ext}
pub fn object_key(prefix: &str, content_type: &str) -> String {
    let date = chrono::Utc::now().format("%Y-%m-%d");
    let id = Uuid::new_v4();
    let ext = extension_for(content_type);
    if prefix.is_empty() {
        format!("{date}/{id}.{ext}")
    } else {
        format!("{prefix}/{date}/{id}.{ext}")
    }
}

/// Build the store selected by configuration.
pub async fn from_config(cfg: &configs::StorageConfig) -> anyhow::Result<Arc<dyn ObjectStore>> {
    match cfg.backend {
        configs::StorageBackend::S3 => Ok(Arc::new(S3ObjectStore::new(cfg).await?)),
        configs::StorageBackend::Memory => {
            tracing::warn!("using in-memory object store; uploaded images are lost on restart");
            let base = cfg.public_base_url.clone().unwrap_or_else(|| "memory://".to_string());
            Ok(Arc::new(InMemoryObjectStore::with_base_url(base, cfg.key_prefix.clone())))
        }
    }
}

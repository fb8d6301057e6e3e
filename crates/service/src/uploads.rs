//! Upload intake: limit checks and fan-out of file parts to the object store.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::future::join_all;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::compensation::reclaim;
use crate::errors::ReviewError;
use crate::storage::{put_with_timeout, BlobMetadata, ObjectStore};

/// One file from a multipart form.
#[derive(Debug, Clone)]
pub struct FilePart {
    pub file_name: Option<String>,
    pub content_type: String,
    pub data: Bytes,
}

impl FilePart {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self { file_name: Some(file_name.into()), content_type: content_type.into(), data: data.into() }
    }

    fn display_name(&self) -> String {
        self.file_name.clone().unwrap_or_else(|| "<unnamed>".to_string())
    }
}

#[derive(Debug, Clone)]
pub struct UploadLimits {
    pub max_files: usize,
    pub max_file_bytes: usize,
    pub allowed_content_types: Vec<String>,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self::from(&configs::UploadConfig::default())
    }
}

impl From<&configs::UploadConfig> for UploadLimits {
    fn from(c: &configs::UploadConfig) -> Self {
        Self {
            max_files: c.max_files,
            max_file_bytes: c.max_file_bytes,
            allowed_content_types: c.allowed_content_types.iter().map(|t| t.to_ascii_lowercase()).collect(),
        }
    }
}

impl UploadLimits {
    pub fn allows_content_type(&self, content_type: &str) -> bool {
        let ct = content_type.to_ascii_lowercase();
        // ignore parameters such as `; charset=...`
        let base = ct.split(';').next().unwrap_or("").trim();
        self.allowed_content_types.iter().any(|t| t == base)
    }
}

pub struct UploadIntake {
    store: Arc<dyn ObjectStore>,
    limits: UploadLimits,
    op_timeout: Duration,
}

impl UploadIntake {
    pub fn new(store: Arc<dyn ObjectStore>, limits: UploadLimits, op_timeout: Duration) -> Self {
        Self { store, limits, op_timeout }
    }

    pub fn limits(&self) -> &UploadLimits { &self.limits }

    /// Count, size and content-type checks. No I/O.
    pub fn check(&self, parts: &[FilePart]) -> Result<(), ReviewError> {
        if parts.len() > self.limits.max_files {
            return Err(ReviewError::TooManyFiles { max: self.limits.max_files, got: parts.len() });
        }
        for part in parts {
            if part.data.len() > self.limits.max_file_bytes {
                return Err(ReviewError::FileTooLarge { name: part.display_name(), max_bytes: self.limits.max_file_bytes });
            }
            if !self.limits.allows_content_type(&part.content_type) {
                return Err(ReviewError::validation(format!(
                    "unsupported content type {} for {}",
                    part.content_type,
                    part.display_name()
                )));
            }
        }
        Ok(())
    }

    /// Upload every part concurrently and return references in input order.
    ///
    /// All uploads are awaited. If any failed, the ones that succeeded in this
    /// call are deleted before `UploadFailed` is returned, so a failed intake
    /// leaves no blobs behind.
    #[instrument(skip(self, parts), fields(files = parts.len()))]
    pub async fn upload(&self, parts: Vec<FilePart>, owner: Option<Uuid>) -> Result<Vec<String>, ReviewError> {
        self.check(&parts)?;
        if parts.is_empty() {
            return Ok(Vec::new());
        }

        let store = self.store.as_ref();
        let limit = self.op_timeout;
        let uploads = parts.into_iter().map(|part| async move {
            let meta = BlobMetadata { content_type: part.content_type.clone(), file_name: part.file_name.clone(), owner };
            let name = part.display_name();
            put_with_timeout(store, part.data, &meta, limit).await.map_err(|e| (name, e))
        });
        let results = join_all(uploads).await;

        let mut stored = Vec::with_capacity(results.len());
        let mut first_error = None;
        for res in results {
            match res {
                Ok(reference) => stored.push(reference),
                Err((name, e)) => {
                    warn!(file = %name, error = %e, "image upload failed");
                    first_error.get_or_insert(format!("{name}: {e}"));
                }
            }
        }

        if let Some(err) = first_error {
            let report = reclaim(store, &stored, limit, "intake_rollback").await;
            if !report.is_clean() {
                warn!(orphaned = report.failed().count(), "intake rollback left blobs behind");
            }
            return Err(ReviewError::UploadFailed(err));
        }

        info!(count = stored.len(), "images uploaded");
        Ok(stored)
    }
}

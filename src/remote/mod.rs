//! Idempotent upload of local files to an object store
//!
//! [`Uploader`] owns the upload policy (bucket resolution, existence check,
//! error wrapping and logging); [`ObjectStore`] implementations only speak
//! to a backend.

use crate::error::StorageError;
use crate::types::UploadOutcome;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

mod gcs;
mod memory;

pub use gcs::{Credentials, GcsStore, METADATA_TOKEN_URL, TOKEN_ENV_VAR};
pub use memory::MemoryStore;

/// Backend operations needed by the [`Uploader`]
///
/// Implementations report raw failures (usually [`StorageError::Transport`]
/// or [`StorageError::Auth`]); the uploader wraps them into the
/// operation-specific variants.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Whether `bucket` exists
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StorageError>;

    /// Create `bucket`
    async fn create_bucket(&self, bucket: &str) -> Result<(), StorageError>;

    /// Whether `object` exists in `bucket`
    async fn object_exists(&self, bucket: &str, object: &str) -> Result<bool, StorageError>;

    /// Write `data` to `object` unless it already exists
    ///
    /// Returns [`UploadOutcome::SkippedAlreadyExists`] when the backend
    /// refused the write because the object appeared in the meantime.
    async fn put_object(
        &self,
        bucket: &str,
        object: &str,
        data: Vec<u8>,
    ) -> Result<UploadOutcome, StorageError>;
}

/// Uploads stored files, never overwriting existing objects
#[derive(Clone)]
pub struct Uploader {
    store: Arc<dyn ObjectStore>,
}

impl Uploader {
    /// Create an uploader backed by `store`
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Upload `source` to `bucket`/`destination`
    ///
    /// 1. Resolve the bucket, creating it when missing and
    ///    `create_bucket_if_missing` is set.
    /// 2. Skip with a warning if `destination` already exists.
    /// 3. Otherwise upload the file's bytes.
    ///
    /// Every failure is logged with bucket and object context before it is
    /// returned.
    pub async fn upload(
        &self,
        bucket: &str,
        source: &Path,
        destination: &str,
        create_bucket_if_missing: bool,
    ) -> Result<UploadOutcome, StorageError> {
        let result = self
            .try_upload(bucket, source, destination, create_bucket_if_missing)
            .await;

        if let Err(e) = &result {
            tracing::error!(
                bucket,
                object = destination,
                source = %source.display(),
                error = %e,
                "upload to object store failed"
            );
        }
        result
    }

    async fn try_upload(
        &self,
        bucket: &str,
        source: &Path,
        destination: &str,
        create_bucket_if_missing: bool,
    ) -> Result<UploadOutcome, StorageError> {
        self.ensure_bucket(bucket, create_bucket_if_missing).await?;

        if self.store.object_exists(bucket, destination).await? {
            tracing::warn!(
                bucket,
                object = destination,
                "object already exists, skipping upload"
            );
            return Ok(UploadOutcome::SkippedAlreadyExists);
        }

        let data = tokio::fs::read(source)
            .await
            .map_err(|e| StorageError::Source {
                path: source.to_path_buf(),
                source: e,
            })?;

        let outcome = self
            .store
            .put_object(bucket, destination, data)
            .await
            .map_err(|e| match e {
                StorageError::Upload { .. } => e,
                other => StorageError::Upload {
                    bucket: bucket.to_string(),
                    object: destination.to_string(),
                    reason: other.to_string(),
                },
            })?;

        match outcome {
            UploadOutcome::Uploaded => {
                tracing::info!(
                    bucket,
                    object = destination,
                    "uploaded gs://{}/{}",
                    bucket,
                    destination
                );
            }
            UploadOutcome::SkippedAlreadyExists => {
                tracing::warn!(
                    bucket,
                    object = destination,
                    "object already exists, skipping upload"
                );
            }
        }
        Ok(outcome)
    }

    async fn ensure_bucket(
        &self,
        bucket: &str,
        create_if_missing: bool,
    ) -> Result<(), StorageError> {
        if self.store.bucket_exists(bucket).await? {
            tracing::debug!(bucket, "found bucket");
            return Ok(());
        }

        if !create_if_missing {
            return Err(StorageError::BucketNotFound {
                bucket: bucket.to_string(),
            });
        }

        self.store
            .create_bucket(bucket)
            .await
            .map_err(|e| StorageError::BucketCreate {
                bucket: bucket.to_string(),
                reason: e.to_string(),
            })?;
        tracing::info!(bucket, "created bucket");
        Ok(())
    }
}

/// Join object path segments with `/`, dropping empty segments and stray slashes
///
/// ```
/// use api_pipeline::remote::object_path;
///
/// assert_eq!(object_path(&["dev/", "census", "a.json"]), "dev/census/a.json");
/// assert_eq!(object_path(&["", "census", "a.json"]), "census/a.json");
/// ```
pub fn object_path(segments: &[&str]) -> String {
    segments
        .iter()
        .map(|s| s.trim_matches('/'))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

//! In-process object store

use super::ObjectStore;
use crate::error::StorageError;
use crate::types::UploadOutcome;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

/// Object store kept in memory
///
/// Useful for dry runs and tests. Failure switches simulate a backend that
/// refuses bucket creation or object writes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    buckets: HashMap<String, BTreeMap<String, Vec<u8>>>,
    writes: usize,
    reject_bucket_creation: bool,
    reject_uploads: bool,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an existing, empty bucket
    pub fn with_bucket(self, bucket: &str) -> Self {
        self.lock().buckets.entry(bucket.to_string()).or_default();
        self
    }

    /// Make every bucket creation fail
    pub fn reject_bucket_creation(self) -> Self {
        self.lock().reject_bucket_creation = true;
        self
    }

    /// Make every object write fail
    pub fn reject_uploads(self) -> Self {
        self.lock().reject_uploads = true;
        self
    }

    /// Whether `bucket` exists
    pub fn has_bucket(&self, bucket: &str) -> bool {
        self.lock().buckets.contains_key(bucket)
    }

    /// Contents of `object` in `bucket`
    pub fn object(&self, bucket: &str, object: &str) -> Option<Vec<u8>> {
        self.lock()
            .buckets
            .get(bucket)
            .and_then(|objects| objects.get(object))
            .cloned()
    }

    /// Object names in `bucket`, sorted
    pub fn objects(&self, bucket: &str) -> Vec<String> {
        self.lock()
            .buckets
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of successful object writes
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StorageError> {
        Ok(self.has_bucket(bucket))
    }

    async fn create_bucket(&self, bucket: &str) -> Result<(), StorageError> {
        let mut state = self.lock();
        if state.reject_bucket_creation {
            let reason = format!("bucket creation rejected for '{bucket}'");
            return Err(StorageError::Transport(reason));
        }
        state.buckets.entry(bucket.to_string()).or_default();
        Ok(())
    }

    async fn object_exists(&self, bucket: &str, object: &str) -> Result<bool, StorageError> {
        Ok(self
            .lock()
            .buckets
            .get(bucket)
            .is_some_and(|objects| objects.contains_key(object)))
    }

    async fn put_object(
        &self,
        bucket: &str,
        object: &str,
        data: Vec<u8>,
    ) -> Result<UploadOutcome, StorageError> {
        let mut state = self.lock();
        if state.reject_uploads {
            return Err(StorageError::Transport("upload rejected".to_string()));
        }

        let Some(objects) = state.buckets.get_mut(bucket) else {
            let reason = format!("no such bucket '{bucket}'");
            return Err(StorageError::Transport(reason));
        };
        if objects.contains_key(object) {
            return Ok(UploadOutcome::SkippedAlreadyExists);
        }
        objects.insert(object.to_string(), data);
        state.writes += 1;
        Ok(UploadOutcome::Uploaded)
    }
}

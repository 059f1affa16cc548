//! In-process object store
//!
//! Keeps objects in a map so the full router can be exercised without a
//! bucket. A failure switch simulates backend outages.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;

use super::{ObjectStore, PutObject, StorageError};

/// Object kept by [`MemoryStorage`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: String,
    pub acl: Option<String>,
}

/// Map-backed object store
#[derive(Debug, Default)]
pub struct MemoryStorage {
    objects: Mutex<HashMap<String, StoredObject>>,
    failure: Mutex<Option<StorageError>>,
    put_calls: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following call fail with `error` (or succeed again with `None`)
    pub fn set_failure(&self, error: Option<StorageError>) {
        *self.failure.lock().unwrap_or_else(|p| p.into_inner()) = error;
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(key)
            .cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Number of `put_object` calls, including failed ones
    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    fn check_failure(&self) -> Result<(), StorageError> {
        match self.failure.lock().unwrap_or_else(|p| p.into_inner()).as_ref() {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryStorage {
    async fn put_object(&self, object: PutObject) -> Result<(), StorageError> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;

        if object.content_length != object.body.len() as u64 {
            return Err(StorageError::new(
                "IncompleteBody",
                format!(
                    "declared {} bytes, received {}",
                    object.content_length,
                    object.body.len()
                ),
            ));
        }

        self.objects.lock().unwrap_or_else(|p| p.into_inner()).insert(
            object.key,
            StoredObject {
                body: object.body,
                content_type: object.content_type,
                acl: object.acl,
            },
        );
        Ok(())
    }

    async fn probe(&self) -> Result<(), StorageError> {
        self.check_failure()
    }
}

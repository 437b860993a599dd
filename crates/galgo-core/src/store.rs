//! Persistence seam for ingested media.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::collections::HashSet;
use std::sync::Mutex;

use crate::error::StoreError;
use crate::types::MediaRecord;

/// Receives each successfully assembled record.
///
/// Implementations enforce uniqueness over
/// (content identity, byte size, capture timestamp) and report a violation
/// as [`StoreError::AlreadyExists`].
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn insert(&self, record: &MediaRecord) -> Result<(), StoreError>;
}

type UniqueKey = (String, u64, Option<NaiveDateTime>);

#[derive(Default)]
struct Inner {
    records: Vec<MediaRecord>,
    keys: HashSet<UniqueKey>,
}

/// In-process store used by the CLI and tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of inserted records, in insertion order.
    pub fn records(&self) -> Vec<MediaRecord> {
        self.lock().records.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock still holds consistent data: every mutation is a
        // single insert into each collection.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl MediaStore for MemoryStore {
    async fn insert(&self, record: &MediaRecord) -> Result<(), StoreError> {
        let key = (
            record.content_identity.clone(),
            record.byte_size,
            record.capture.taken_at,
        );
        let mut inner = self.lock();
        if !inner.keys.insert(key) {
            return Err(StoreError::AlreadyExists {
                content_identity: record.content_identity.clone(),
            });
        }
        inner.records.push(record.clone());
        Ok(())
    }
}

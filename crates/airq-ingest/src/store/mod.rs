//! Durable storage for canonical measurements
//!
//! Stores upsert: writing a record whose [`RecordKey`] already exists
//! replaces it. Expiry is the store's job, driven by the `expireAt`
//! attribute; the ingestion core never deletes.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::CollaboratorFailure;
use crate::record::{CanonicalMeasurementRecord, RecordKey};

pub mod dynamodb;

pub use dynamodb::DynamoDbRecordStore;

/// Accepts one canonical record at a time.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn put(&self, record: &CanonicalMeasurementRecord) -> Result<(), CollaboratorFailure>;
}

#[async_trait]
impl<T: RecordStore + ?Sized> RecordStore for Arc<T> {
    async fn put(&self, record: &CanonicalMeasurementRecord) -> Result<(), CollaboratorFailure> {
        (**self).put(record).await
    }
}

/// In-process store for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: Mutex<BTreeMap<RecordKey, CanonicalMeasurementRecord>>,
    puts: AtomicUsize,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `put` calls, including overwrites.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    pub async fn get(&self, key: &RecordKey) -> Option<CanonicalMeasurementRecord> {
        self.records.lock().await.get(key).cloned()
    }

    /// All records in key order.
    pub async fn records(&self) -> Vec<CanonicalMeasurementRecord> {
        self.records.lock().await.values().cloned().collect()
    }

    /// Records that have not expired at `now` (epoch seconds).
    pub async fn live_records(&self, now: i64) -> Vec<CanonicalMeasurementRecord> {
        self.records
            .lock()
            .await
            .values()
            .filter(|record| record.expire_at() > now)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn put(&self, record: &CanonicalMeasurementRecord) -> Result<(), CollaboratorFailure> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.records.lock().await.insert(record.key(), record.clone());
        Ok(())
    }
}

//! Shared fixtures for clean stage integration tests
//!
//! - [`MeasurementFixture`]: builder for raw measurement JSON
//! - [`StaticFetcher`]: serves batches from memory
//! - [`FlakyStore`]: memory store that fails on chosen `put` calls

#![allow(dead_code)]

use airq_common::types::ObjectRef;
use airq_ingest::{
    CanonicalMeasurementRecord, CollaboratorFailure, MemoryRecordStore, RawMeasurementRecord,
    RecordStore, SourceFetcher,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,airq_ingest=debug")),
        )
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Measurement Fixtures
// ============================================================================

/// Builder for raw measurements with sensible Brussels defaults
#[derive(Debug, Clone)]
pub struct MeasurementFixture {
    fields: serde_json::Map<String, Value>,
}

impl MeasurementFixture {
    pub fn new() -> Self {
        let Value::Object(fields) = json!({
            "location": "Brussels-Arts",
            "city": "Brussels",
            "country": "BE",
            "coordinates": { "latitude": 50.8, "longitude": 4.3 },
            "parameter": "pm10",
            "value": 5,
            "unit": "µg/m³",
            "lastUpdated": "2024-01-01T10:00:00+0000",
            "sourceName": "EEA Belgium",
        }) else {
            unreachable!("fixture literal is an object")
        };
        Self { fields }
    }

    pub fn with(mut self, field: &str, value: Value) -> Self {
        self.fields.insert(field.to_string(), value);
        self
    }

    pub fn without(mut self, field: &str) -> Self {
        self.fields.remove(field);
        self
    }

    pub fn location(self, location: &str) -> Self {
        self.with("location", json!(location))
    }

    pub fn value(self, value: Value) -> Self {
        self.with("value", value)
    }

    pub fn last_updated(self, last_updated: &str) -> Self {
        self.with("lastUpdated", json!(last_updated))
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    pub fn build(&self) -> RawMeasurementRecord {
        RawMeasurementRecord::new(self.fields.clone())
    }
}

/// Serialize fixtures as a batch payload.
pub fn batch_payload(fixtures: &[MeasurementFixture]) -> Vec<u8> {
    let batch: Vec<Value> = fixtures.iter().map(MeasurementFixture::to_json).collect();
    serde_json::to_vec(&batch).unwrap()
}

// ============================================================================
// Collaborator Fakes
// ============================================================================

/// Serves pre-loaded objects; anything else is a fetch failure.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    objects: HashMap<ObjectRef, Vec<u8>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(mut self, object: ObjectRef, bytes: Vec<u8>) -> Self {
        self.objects.insert(object, bytes);
        self
    }
}

#[async_trait]
impl SourceFetcher for StaticFetcher {
    async fn fetch(&self, object: &ObjectRef) -> Result<Vec<u8>, CollaboratorFailure> {
        self.objects
            .get(object)
            .cloned()
            .ok_or_else(|| CollaboratorFailure::Fetch {
                location: object.to_string(),
                source: "NoSuchKey".into(),
            })
    }
}

/// Memory store whose n-th `put` calls (0-based) fail.
#[derive(Debug, Default)]
pub struct FlakyStore {
    pub inner: MemoryRecordStore,
    failing_calls: HashSet<usize>,
    calls: AtomicUsize,
}

impl FlakyStore {
    pub fn failing_on(calls: impl IntoIterator<Item = usize>) -> Self {
        Self {
            failing_calls: calls.into_iter().collect(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn put(&self, record: &CanonicalMeasurementRecord) -> Result<(), CollaboratorFailure> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_calls.contains(&call) {
            return Err(CollaboratorFailure::Store {
                key: record.key().to_string(),
                source: "ProvisionedThroughputExceededException".into(),
            });
        }
        self.inner.put(record).await
    }
}

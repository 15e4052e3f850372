//! Where raw batches come from
//!
//! A batch is one JSON array of measurement objects stored under an
//! [`ObjectRef`]. Fetching and decoding are separate so that a download
//! failure (infrastructure) and a bad payload (data) stay distinguishable.

use airq_common::types::ObjectRef;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::error::{CollaboratorFailure, MalformedRecord};
use crate::record::RawMeasurementRecord;

pub mod local;
pub mod s3;

pub use local::LocalFileFetcher;
pub use s3::S3SourceFetcher;

/// Delivers the bytes of a raw batch.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, object: &ObjectRef) -> Result<Vec<u8>, CollaboratorFailure>;
}

#[async_trait]
impl<T: SourceFetcher + ?Sized> SourceFetcher for Arc<T> {
    async fn fetch(&self, object: &ObjectRef) -> Result<Vec<u8>, CollaboratorFailure> {
        (**self).fetch(object).await
    }
}

/// Decode a batch payload into raw records, keeping input order.
pub fn decode_batch(bytes: &[u8]) -> Result<Vec<RawMeasurementRecord>, MalformedRecord> {
    let elements: Vec<Value> =
        serde_json::from_slice(bytes).map_err(|e| MalformedRecord::NotAnArray {
            reason: e.to_string(),
        })?;

    elements
        .into_iter()
        .enumerate()
        .map(|(index, element)| match element {
            Value::Object(fields) => Ok(RawMeasurementRecord::new(fields)),
            _ => Err(MalformedRecord::NotAnObject { index }),
        })
        .collect()
}

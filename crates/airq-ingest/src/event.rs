//! S3 "object created" notifications that trigger the clean stage

use airq_common::types::ObjectRef;
use serde::{Deserialize, Serialize};

use crate::error::CollaboratorFailure;

/// The subset of an S3 event notification the clean stage reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Event {
    #[serde(rename = "Records")]
    pub records: Vec<S3EventRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3EventRecord {
    pub s3: S3Entity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Entity {
    pub bucket: S3Bucket,
    pub object: S3Object,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Bucket {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Object {
    /// Form-encoded, as S3 delivers it.
    pub key: String,
}

impl S3Event {
    pub fn from_json(value: serde_json::Value) -> Result<Self, CollaboratorFailure> {
        serde_json::from_value(value).map_err(|e| CollaboratorFailure::Event {
            reason: e.to_string(),
        })
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CollaboratorFailure> {
        serde_json::from_slice(bytes).map_err(|e| CollaboratorFailure::Event {
            reason: e.to_string(),
        })
    }

    /// Event for a single object, with the key given already decoded.
    pub fn for_object(object: &ObjectRef) -> Self {
        let encoded = urlencode_key(&object.key);
        Self {
            records: vec![S3EventRecord {
                s3: S3Entity {
                    bucket: S3Bucket {
                        name: object.bucket.clone(),
                    },
                    object: S3Object { key: encoded },
                },
            }],
        }
    }

    /// Objects referenced by the event, keys decoded, in event order.
    pub fn objects(&self) -> Result<Vec<ObjectRef>, CollaboratorFailure> {
        self.records
            .iter()
            .map(|record| {
                ObjectRef::from_encoded_key(record.s3.bucket.name.clone(), &record.s3.object.key)
                    .map_err(|e| CollaboratorFailure::Event {
                        reason: e.to_string(),
                    })
            })
            .collect()
    }
}

/// Inverse of the notification encoding: spaces become `+`, everything
/// outside the unreserved set and `/` is percent-escaped.
fn urlencode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| {
            segment
                .split(' ')
                .map(urlencoding::encode)
                .collect::<Vec<_>>()
                .join("+")
        })
        .collect::<Vec<_>>()
        .join("/")
}

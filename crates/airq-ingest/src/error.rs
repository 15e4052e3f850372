//! Ingestion error types
//!
//! Rejected records (non-positive value, unsupported parameter or unit) are not
//! errors: they are counted as skipped. What remains falls in two classes that
//! callers retry differently:
//!
//! - [`MalformedRecord`]: the data itself is defective. Retrying will not help.
//! - [`CollaboratorFailure`]: object storage, the record store, or the trigger
//!   event failed. Plausibly transient.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Boxed error from an I/O collaborator (AWS SDK, filesystem).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias for ingestion operations
pub type IngestResult<T> = std::result::Result<T, IngestError>;

/// A structural defect in a raw record or in the batch that carries it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedRecord {
    #[error("Missing required field '{field}'")]
    MissingField { field: &'static str },

    #[error("Field '{field}' must be {expected}, got {found}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
        found: String,
    },

    #[error("Field '{field}' is not a decimal number: {value}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("Field '{field}' does not fit a stored number ({digits} significant digits, exponent {exponent})")]
    OutOfRange {
        field: &'static str,
        digits: u64,
        exponent: i64,
    },

    #[error("Unparseable lastUpdated timestamp '{value}': {reason}")]
    InvalidTimestamp { value: String, reason: String },

    #[error("lastUpdated '{value}' does not exist in the host time zone")]
    NonexistentLocalTime { value: String },

    #[error("Field '{field}' value '{value}' reached normalization without passing validation")]
    Unvalidated { field: &'static str, value: String },

    #[error("Batch payload must be a JSON array: {reason}")]
    NotAnArray { reason: String },

    #[error("Batch element {index} is not a JSON object")]
    NotAnObject { index: usize },
}

/// A failure of something the ingestion core talks to.
#[derive(Error, Debug)]
pub enum CollaboratorFailure {
    #[error("Failed to fetch {location}: {source}")]
    Fetch {
        location: String,
        #[source]
        source: BoxError,
    },

    #[error("Failed to store record {key}: {source}")]
    Store {
        key: String,
        #[source]
        source: BoxError,
    },

    #[error("Invalid trigger event: {reason}")]
    Event { reason: String },
}

/// Fatal error for an ingestion call.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Malformed record: {0}")]
    Malformed(#[from] MalformedRecord),

    #[error("Collaborator failure: {0}")]
    Collaborator(#[from] CollaboratorFailure),
}

/// Cause classification reported to the invoker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The input data is defective; do not retry.
    Data,
    /// An external service failed; retrying may succeed.
    Infrastructure,
}

impl FailureKind {
    pub fn is_retriable(&self) -> bool {
        matches!(self, FailureKind::Infrastructure)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Data => f.write_str("data"),
            FailureKind::Infrastructure => f.write_str("infrastructure"),
        }
    }
}

impl IngestError {
    pub fn kind(&self) -> FailureKind {
        match self {
            IngestError::Malformed(_) => FailureKind::Data,
            IngestError::Collaborator(_) => FailureKind::Infrastructure,
        }
    }
}

impl MalformedRecord {
    /// Describe a JSON value's type for `WrongType` messages.
    pub(crate) fn json_type(value: &serde_json::Value) -> String {
        match value {
            serde_json::Value::Null => "null",
            serde_json::Value::Bool(_) => "a boolean",
            serde_json::Value::Number(_) => "a number",
            serde_json::Value::String(_) => "a string",
            serde_json::Value::Array(_) => "an array",
            serde_json::Value::Object(_) => "an object",
        }
        .to_string()
    }
}

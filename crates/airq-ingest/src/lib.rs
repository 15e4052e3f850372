//! AirQ Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! The "clean" stage of the air-quality pipeline: raw OpenAQ measurements
//! land in object storage as JSON arrays, and this crate turns each element
//! into a validated, canonical record in the measurement table.
//!
//! # Flow
//!
//! ```text
//! SourceFetcher ──bytes──▶ decode_batch ──raw──▶ BatchIngestor
//!                                                  ├─ RecordValidator   (skip or continue)
//!                                                  ├─ RecordNormalizer  (canonical record)
//!                                                  └─ RecordStore::put  (upsert, TTL on expireAt)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use airq_ingest::{
//!     BatchIngestor, CleanHandler, LocalFileFetcher, MemoryRecordStore, RecordNormalizer,
//! };
//! use airq_common::types::ObjectRef;
//!
//! #[tokio::main]
//! async fn main() {
//!     let ingestor = BatchIngestor::new(MemoryRecordStore::new(), RecordNormalizer::default());
//!     let handler = CleanHandler::new(LocalFileFetcher::new(), ingestor);
//!
//!     let outcome = handler
//!         .handle_objects(&[ObjectRef::new("local", "data/latest.json")])
//!         .await;
//!     println!("{}", serde_json::to_string(&outcome).unwrap());
//! }
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod handler;
pub mod ingestor;
pub mod normalizer;
pub mod record;
pub mod source;
pub mod store;
pub mod validator;

// Re-export commonly used types
pub use config::IngestConfig;
pub use error::{CollaboratorFailure, FailureKind, IngestError, IngestResult, MalformedRecord};
pub use handler::{CleanHandler, InvocationOutcome, InvocationStatus};
pub use ingestor::{BatchIngestor, BatchMode, IngestSummary};
pub use normalizer::{ExpiryBasis, RecordNormalizer};
pub use record::{CanonicalMeasurementRecord, RawMeasurementRecord, RecordKey};
pub use source::{decode_batch, LocalFileFetcher, S3SourceFetcher, SourceFetcher};
pub use store::{DynamoDbRecordStore, MemoryRecordStore, RecordStore};
pub use validator::RecordValidator;

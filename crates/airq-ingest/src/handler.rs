//! Invocation entry point for the clean stage
//!
//! One invocation = one trigger event = one or more raw batches. Each batch is
//! fetched, decoded and ingested in event order; the first fatal error ends the
//! invocation. Retrying is left to whoever invoked us, so the outcome says
//! whether the failure was in the data or in the infrastructure.

use airq_common::types::ObjectRef;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::error::{FailureKind, IngestError, IngestResult};
use crate::event::S3Event;
use crate::ingestor::{BatchIngestor, IngestSummary};
use crate::source::{decode_batch, SourceFetcher};
use crate::store::RecordStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureDetail {
    pub kind: FailureKind,
    pub message: String,
}

/// What the invoker gets back.
///
/// Counts cover the batches that completed; a batch aborted midway is not
/// included even though its earlier records were written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationOutcome {
    pub status: InvocationStatus,
    pub accepted: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Batches fully processed.
    pub objects: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureDetail>,
}

impl InvocationOutcome {
    fn success(summary: IngestSummary, objects: usize) -> Self {
        Self {
            status: InvocationStatus::Success,
            accepted: summary.accepted,
            skipped: summary.skipped,
            failed: summary.failed,
            objects,
            error: None,
        }
    }

    fn failure(summary: IngestSummary, objects: usize, err: &IngestError) -> Self {
        Self {
            status: InvocationStatus::Failure,
            error: Some(FailureDetail {
                kind: err.kind(),
                message: err.to_string(),
            }),
            ..Self::success(summary, objects)
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == InvocationStatus::Success
    }

    /// HTTP-style status for function runtimes that expect one.
    pub fn status_code(&self) -> u16 {
        match self.status {
            InvocationStatus::Success => 200,
            InvocationStatus::Failure => 500,
        }
    }
}

pub struct CleanHandler<F, S> {
    fetcher: F,
    ingestor: BatchIngestor<S>,
}

impl<F: SourceFetcher, S: RecordStore> CleanHandler<F, S> {
    pub fn new(fetcher: F, ingestor: BatchIngestor<S>) -> Self {
        Self { fetcher, ingestor }
    }

    pub fn ingestor(&self) -> &BatchIngestor<S> {
        &self.ingestor
    }

    /// Handle a raw trigger event.
    pub async fn handle_json(&self, event: serde_json::Value) -> InvocationOutcome {
        match S3Event::from_json(event) {
            Ok(event) => self.handle(&event).await,
            Err(err) => {
                let err = IngestError::from(err);
                error!(kind = %err.kind(), "Rejected trigger event: {}", err);
                InvocationOutcome::failure(IngestSummary::default(), 0, &err)
            },
        }
    }

    pub async fn handle(&self, event: &S3Event) -> InvocationOutcome {
        match event.objects() {
            Ok(objects) => self.handle_objects(&objects).await,
            Err(err) => {
                let err = IngestError::from(err);
                error!(kind = %err.kind(), "Rejected trigger event: {}", err);
                InvocationOutcome::failure(IngestSummary::default(), 0, &err)
            },
        }
    }

    pub async fn handle_objects(&self, objects: &[ObjectRef]) -> InvocationOutcome {
        let mut total = IngestSummary::default();

        for (done, object) in objects.iter().enumerate() {
            match self.process_object(object).await {
                Ok(summary) => total += summary,
                Err(err) => {
                    error!(object = %object, kind = %err.kind(), "Error processing items: {}", err);
                    return InvocationOutcome::failure(total, done, &err);
                },
            }
        }

        info!(
            objects = objects.len(),
            accepted = total.accepted,
            skipped = total.skipped,
            failed = total.failed,
            "Invocation complete"
        );
        InvocationOutcome::success(total, objects.len())
    }

    /// Fetch, decode and ingest a single batch.
    #[instrument(skip(self), fields(object = %object))]
    pub async fn process_object(&self, object: &ObjectRef) -> IngestResult<IngestSummary> {
        let bytes = self.fetcher.fetch(object).await?;
        let records = decode_batch(&bytes)?;
        info!(records = records.len(), "Decoded batch");

        self.ingestor.ingest(&records).await
    }
}

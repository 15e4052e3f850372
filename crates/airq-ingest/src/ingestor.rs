//! Validate → normalize → persist over one batch
//!
//! Records are processed strictly in input order, one at a time. What happens
//! on a fatal per-record error depends on [`BatchMode`]:
//!
//! - `AllOrNothing` (default): the call fails at the first malformed record or
//!   store failure. Records before it have already been written and stay written.
//! - `IsolateRecords`: the failure is logged, counted in
//!   [`IngestSummary::failed`], and the batch continues.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign};
use std::str::FromStr;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{IngestError, IngestResult};
use crate::normalizer::RecordNormalizer;
use crate::record::RawMeasurementRecord;
use crate::store::RecordStore;
use crate::validator::{Rejection, RecordValidator};

/// How a batch reacts to a record that cannot be normalized or stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BatchMode {
    #[default]
    AllOrNothing,
    IsolateRecords,
}

impl FromStr for BatchMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all-or-nothing" | "abort" => Ok(BatchMode::AllOrNothing),
            "isolate-records" | "isolate" => Ok(BatchMode::IsolateRecords),
            _ => Err(anyhow::anyhow!("Invalid batch mode: {}", s)),
        }
    }
}

impl fmt::Display for BatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchMode::AllOrNothing => f.write_str("all-or-nothing"),
            BatchMode::IsolateRecords => f.write_str("isolate-records"),
        }
    }
}

/// Counts for one or more ingested batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IngestSummary {
    pub accepted: usize,
    pub skipped: usize,
    /// Always zero in `AllOrNothing` mode.
    pub failed: usize,
}

impl IngestSummary {
    pub fn total(&self) -> usize {
        self.accepted + self.skipped + self.failed
    }
}

impl Add for IngestSummary {
    type Output = IngestSummary;

    fn add(self, other: IngestSummary) -> IngestSummary {
        IngestSummary {
            accepted: self.accepted + other.accepted,
            skipped: self.skipped + other.skipped,
            failed: self.failed + other.failed,
        }
    }
}

impl AddAssign for IngestSummary {
    fn add_assign(&mut self, other: IngestSummary) {
        *self = *self + other;
    }
}

enum RecordOutcome {
    Stored,
    Skipped(Rejection),
}

pub struct BatchIngestor<S> {
    validator: RecordValidator,
    normalizer: RecordNormalizer,
    store: S,
    mode: BatchMode,
}

impl<S: RecordStore> BatchIngestor<S> {
    pub fn new(store: S, normalizer: RecordNormalizer) -> Self {
        Self {
            validator: RecordValidator::new(),
            normalizer,
            store,
            mode: BatchMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: BatchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> BatchMode {
        self.mode
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    #[instrument(skip(self, records), fields(records = records.len(), mode = %self.mode))]
    pub async fn ingest(&self, records: &[RawMeasurementRecord]) -> IngestResult<IngestSummary> {
        let mut summary = IngestSummary::default();

        for (index, record) in records.iter().enumerate() {
            match self.ingest_one(record).await {
                Ok(RecordOutcome::Stored) => summary.accepted += 1,
                Ok(RecordOutcome::Skipped(reason)) => {
                    info!(index, %reason, "Record skipped");
                    debug!(index, record = ?record.fields(), "Skipped record content");
                    summary.skipped += 1;
                },
                Err(err) => match self.mode {
                    BatchMode::AllOrNothing => {
                        warn!(
                            index,
                            accepted = summary.accepted,
                            skipped = summary.skipped,
                            kind = %err.kind(),
                            "Aborting batch: {}",
                            err
                        );
                        return Err(err);
                    },
                    BatchMode::IsolateRecords => {
                        error!(index, kind = %err.kind(), "Record failed: {}", err);
                        summary.failed += 1;
                    },
                },
            }
        }

        info!(
            accepted = summary.accepted,
            skipped = summary.skipped,
            failed = summary.failed,
            "Batch ingested"
        );

        Ok(summary)
    }

    async fn ingest_one(&self, record: &RawMeasurementRecord) -> Result<RecordOutcome, IngestError> {
        if let Some(reason) = self.validator.check(record)? {
            return Ok(RecordOutcome::Skipped(reason));
        }

        let canonical = self.normalizer.normalize(record)?;
        self.store.put(&canonical).await?;

        Ok(RecordOutcome::Stored)
    }
}

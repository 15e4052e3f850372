//! Acceptance rules for raw measurements
//!
//! A record is accepted when its value is strictly positive, its parameter is
//! one of the supported pollutants, and its unit is µg/m³ or mg/m³. Checks run
//! in that order and stop at the first rejection, so a record is only required
//! to be well-formed in the fields that were actually consulted.

use airq_common::types::{Parameter, Unit};
use bigdecimal::{BigDecimal, Zero};

use crate::error::MalformedRecord;
use crate::record::RawMeasurementRecord;

/// Why a record was rejected. Rejection is expected traffic, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    NonPositiveValue(String),
    UnsupportedParameter(String),
    UnsupportedUnit(String),
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::NonPositiveValue(v) => write!(f, "value {} is not positive", v),
            Rejection::UnsupportedParameter(p) => write!(f, "parameter '{}' is not supported", p),
            Rejection::UnsupportedUnit(u) => write!(f, "unit '{}' is not supported", u),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RecordValidator;

impl RecordValidator {
    pub fn new() -> Self {
        Self
    }

    /// `Ok(true)` if the record may be stored, `Ok(false)` if it should be
    /// skipped, `Err` if a consulted field is missing or has the wrong type.
    pub fn validate(&self, record: &RawMeasurementRecord) -> Result<bool, MalformedRecord> {
        Ok(self.check(record)?.is_none())
    }

    /// Like [`validate`](Self::validate), but says why a record was rejected.
    pub fn check(&self, record: &RawMeasurementRecord) -> Result<Option<Rejection>, MalformedRecord> {
        let value = record.decimal("value")?;
        if value <= BigDecimal::zero() {
            return Ok(Some(Rejection::NonPositiveValue(value.to_string())));
        }

        let parameter = record.string("parameter")?;
        if parameter.parse::<Parameter>().is_err() {
            return Ok(Some(Rejection::UnsupportedParameter(parameter.to_string())));
        }

        let unit = record.string("unit")?;
        if unit.parse::<Unit>().is_err() {
            return Ok(Some(Rejection::UnsupportedUnit(unit.to_string())));
        }

        Ok(None)
    }
}

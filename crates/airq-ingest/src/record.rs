//! Measurement records before and after cleaning

use airq_common::types::{Parameter, Unit};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::MalformedRecord;

/// One measurement as delivered by the upstream API, untyped.
///
/// Besides the fields the cleaner reads (`value`, `parameter`, `unit`,
/// `location`, `city`, `coordinates`, `lastUpdated`) it may carry any number
/// of passthrough fields (`country`, `sourceName`, ...).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawMeasurementRecord(Map<String, Value>);

impl RawMeasurementRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub(crate) fn field(&self, field: &'static str) -> Result<&Value, MalformedRecord> {
        self.0
            .get(field)
            .ok_or(MalformedRecord::MissingField { field })
    }

    pub(crate) fn decimal(&self, field: &'static str) -> Result<BigDecimal, MalformedRecord> {
        decimal_value(field, self.field(field)?)
    }

    pub(crate) fn string(&self, field: &'static str) -> Result<&str, MalformedRecord> {
        match self.field(field)? {
            Value::String(s) => Ok(s),
            other => Err(wrong_type(field, "a string", other)),
        }
    }

    /// A string field that must be present but may be `null`.
    pub(crate) fn nullable_string(
        &self,
        field: &'static str,
    ) -> Result<Option<&str>, MalformedRecord> {
        match self.field(field)? {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s)),
            other => Err(wrong_type(field, "a string or null", other)),
        }
    }

    pub(crate) fn object(
        &self,
        field: &'static str,
    ) -> Result<&Map<String, Value>, MalformedRecord> {
        match self.field(field)? {
            Value::Object(map) => Ok(map),
            other => Err(wrong_type(field, "an object", other)),
        }
    }
}

impl From<Map<String, Value>> for RawMeasurementRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// Read a JSON number as an exact decimal.
pub(crate) fn decimal_value(field: &'static str, value: &Value) -> Result<BigDecimal, MalformedRecord> {
    match value {
        // With arbitrary_precision the number keeps its source text.
        Value::Number(n) => {
            let text = n.to_string();
            BigDecimal::from_str(&text).map_err(|_| MalformedRecord::InvalidNumber { field, value: text })
        },
        other => Err(wrong_type(field, "a number", other)),
    }
}

fn wrong_type(field: &'static str, expected: &'static str, found: &Value) -> MalformedRecord {
    MalformedRecord::WrongType {
        field,
        expected,
        found: MalformedRecord::json_type(found),
    }
}

/// Identity of a measurement in the store: re-ingesting the same reading
/// overwrites instead of duplicating.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    pub location: String,
    pub parameter: Parameter,
    pub last_updated: String,
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.location, self.parameter, self.last_updated)
    }
}

/// A validated, unit-normalized, coordinate-flattened measurement.
///
/// Only [`RecordNormalizer`](crate::normalizer::RecordNormalizer) builds these,
/// so every instance satisfies `value > 0` and `unit == µg/m³`, and
/// `expire_at` lies after the `last_updated` instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalMeasurementRecord {
    #[serde(serialize_with = "serialize_decimal")]
    pub(crate) value: BigDecimal,
    pub(crate) parameter: Parameter,
    pub(crate) unit: Unit,
    pub(crate) location: String,
    pub(crate) city: Option<String>,
    #[serde(serialize_with = "serialize_decimal")]
    pub(crate) latitude: BigDecimal,
    #[serde(serialize_with = "serialize_decimal")]
    pub(crate) longitude: BigDecimal,
    pub(crate) last_updated: String,
    pub(crate) expire_at: i64,
    pub(crate) ingested_at: String,
    #[serde(flatten)]
    pub(crate) passthrough: Map<String, Value>,
}

impl CanonicalMeasurementRecord {
    /// Concentration in µg/m³.
    pub fn value(&self) -> &BigDecimal {
        &self.value
    }

    pub fn parameter(&self) -> Parameter {
        self.parameter
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn city(&self) -> Option<&str> {
        self.city.as_deref()
    }

    pub fn latitude(&self) -> &BigDecimal {
        &self.latitude
    }

    pub fn longitude(&self) -> &BigDecimal {
        &self.longitude
    }

    pub fn last_updated(&self) -> &str {
        &self.last_updated
    }

    /// Epoch seconds after which the store may drop this record.
    pub fn expire_at(&self) -> i64 {
        self.expire_at
    }

    pub fn ingested_at(&self) -> &str {
        &self.ingested_at
    }

    /// Fields carried over from the raw record untouched.
    pub fn passthrough(&self) -> &Map<String, Value> {
        &self.passthrough
    }

    pub fn key(&self) -> RecordKey {
        RecordKey {
            location: self.location.clone(),
            parameter: self.parameter,
            last_updated: self.last_updated.clone(),
        }
    }

    /// The record as a JSON object, in its stored attribute layout.
    pub fn to_json(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

/// Serialize a decimal as a JSON number, not a string.
pub(crate) fn serialize_decimal<S: Serializer>(value: &BigDecimal, serializer: S) -> Result<S::Ok, S::Error> {
    let number = serde_json::Number::from_str(&value.to_string()).map_err(serde::ser::Error::custom)?;
    number.serialize(serializer)
}

//! Common types used across AirQ

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CommonError;

/// `strftime` pattern shared by `lastUpdated` and `ingestedAt`
/// (e.g. `2024-01-01T10:00:00+0000`).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// Seconds a stored measurement stays live after its `lastUpdated` time (48 hours).
pub const TTL_SECONDS: i64 = 86_400 * 2;

/// Pollutants the pipeline accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parameter {
    No,
    No2,
    So2,
    Pm1,
    Pm10,
    Pm25,
    O3,
    Co,
}

impl Parameter {
    pub const ALL: [Parameter; 8] = [
        Parameter::No,
        Parameter::No2,
        Parameter::So2,
        Parameter::Pm1,
        Parameter::Pm10,
        Parameter::Pm25,
        Parameter::O3,
        Parameter::Co,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Parameter::No => "no",
            Parameter::No2 => "no2",
            Parameter::So2 => "so2",
            Parameter::Pm1 => "pm1",
            Parameter::Pm10 => "pm10",
            Parameter::Pm25 => "pm25",
            Parameter::O3 => "o3",
            Parameter::Co => "co",
        }
    }
}

impl FromStr for Parameter {
    type Err = CommonError;

    /// Matching is exact: upstream sends lowercase codes and anything else is unsupported.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Parameter::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| CommonError::UnknownParameter(s.to_string()))
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Concentration units the pipeline understands.
///
/// Everything is stored in micrograms per cubic meter; milligrams are
/// converted on the way in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    #[serde(rename = "\u{00b5}g/m\u{00b3}")]
    MicrogramsPerCubicMeter,
    #[serde(rename = "mg/m\u{00b3}")]
    MilligramsPerCubicMeter,
}

impl Unit {
    /// The canonical unit of every stored record.
    pub const CANONICAL: Unit = Unit::MicrogramsPerCubicMeter;

    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::MicrogramsPerCubicMeter => "\u{00b5}g/m\u{00b3}",
            Unit::MilligramsPerCubicMeter => "mg/m\u{00b3}",
        }
    }

    /// Factor that converts a value in this unit into the canonical unit.
    pub fn to_canonical_factor(&self) -> u32 {
        match self {
            Unit::MicrogramsPerCubicMeter => 1,
            Unit::MilligramsPerCubicMeter => 1000,
        }
    }
}

impl FromStr for Unit {
    type Err = CommonError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "\u{00b5}g/m\u{00b3}" => Ok(Unit::MicrogramsPerCubicMeter),
            "mg/m\u{00b3}" => Ok(Unit::MilligramsPerCubicMeter),
            _ => Err(CommonError::UnknownUnit(s.to_string())),
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Location of an object in object storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub bucket: String,
    pub key: String,
}

impl ObjectRef {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Build a reference from an S3 notification, whose keys are
    /// form-encoded (`+` is a space, `%XX` an escaped byte).
    pub fn from_encoded_key(bucket: impl Into<String>, encoded_key: &str) -> crate::Result<Self> {
        let spaced = encoded_key.replace('+', " ");
        let key = urlencoding::decode(&spaced)
            .map_err(|e| CommonError::KeyDecode(format!("{}: {}", encoded_key, e)))?;
        Ok(Self::new(bucket, key.into_owned()))
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

//! Rewrites accepted measurements into canonical form
//!
//! Steps, in order:
//!
//! 1. `location`: `null` (or blank) becomes `"Unknown"`, otherwise trimmed.
//! 2. `city`: trimmed when present, `null` kept as `null`.
//! 3. `value`/`unit`: mg/m³ is multiplied by 1000 and relabelled µg/m³.
//! 4. `coordinates` is flattened into `latitude` and `longitude`.
//! 5. `expireAt` = `lastUpdated` in epoch seconds + 48 hours.
//! 6. `ingestedAt` = now (UTC), in the `lastUpdated` format.
//!
//! The raw record is never modified.

use airq_common::types::{Parameter, Unit, TIMESTAMP_FORMAT, TTL_SECONDS};
use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::MalformedRecord;
use crate::record::{decimal_value, CanonicalMeasurementRecord, RawMeasurementRecord};

/// Location used when the source does not name one.
pub const UNKNOWN_LOCATION: &str = "Unknown";

/// Numeric limits of a stored attribute: 38 significant digits,
/// magnitude between 1E-130 and 9.99..E+125.
const MAX_STORED_DIGITS: u64 = 38;
const MAX_STORED_EXPONENT: i64 = 125;
const MIN_STORED_EXPONENT: i64 = -130;

/// Raw fields consumed (or replaced) by normalization; everything else passes through.
const NORMALIZED_FIELDS: [&str; 11] = [
    "value",
    "parameter",
    "unit",
    "location",
    "city",
    "coordinates",
    "lastUpdated",
    "latitude",
    "longitude",
    "expireAt",
    "ingestedAt",
];

/// How `lastUpdated` is turned into epoch seconds for `expireAt`.
///
/// Timestamps carry an explicit offset (`2024-01-01T10:00:00+0200`). The
/// legacy cleaner dropped that offset and read the wall-clock time in the
/// host's zone, so its `expireAt` depended on where it ran. On a UTC host
/// (the function runtime) that is `UtcWallClock`.
///
/// The default differs from the legacy cleaner by the timestamp's offset.
/// Set `AIRQ_EXPIRY_BASIS=utc-wall-clock` (or `--expiry-basis`) to reproduce
/// its `expireAt` values exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExpiryBasis {
    /// Honour the embedded offset: the true instant.
    #[default]
    Offset,
    /// Ignore the offset and read the wall-clock time as UTC.
    UtcWallClock,
    /// Ignore the offset and read the wall-clock time in the host time zone.
    LocalWallClock,
}

impl FromStr for ExpiryBasis {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "offset" => Ok(ExpiryBasis::Offset),
            "utc-wall-clock" | "utc" => Ok(ExpiryBasis::UtcWallClock),
            "local-wall-clock" | "local" => Ok(ExpiryBasis::LocalWallClock),
            _ => Err(anyhow::anyhow!("Invalid expiry basis: {}", s)),
        }
    }
}

impl fmt::Display for ExpiryBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpiryBasis::Offset => f.write_str("offset"),
            ExpiryBasis::UtcWallClock => f.write_str("utc-wall-clock"),
            ExpiryBasis::LocalWallClock => f.write_str("local-wall-clock"),
        }
    }
}

/// Parse a `lastUpdated` string.
///
/// The canonical shape is `%Y-%m-%dT%H:%M:%S%z`; a colon in the offset and a
/// bare `Z` are accepted as well since the upstream API emits both.
pub fn parse_last_updated(value: &str) -> Result<DateTime<FixedOffset>, MalformedRecord> {
    DateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .or_else(|_| DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%:z"))
        .or_else(|err| match value.strip_suffix('Z') {
            Some(naive) => NaiveDateTime::parse_from_str(naive, "%Y-%m-%dT%H:%M:%S")
                .map(|n| n.and_utc().fixed_offset()),
            None => Err(err),
        })
        .map_err(|err| MalformedRecord::InvalidTimestamp {
            value: value.to_string(),
            reason: err.to_string(),
        })
}

impl ExpiryBasis {
    /// Epoch seconds of `last_updated` under this interpretation.
    pub fn epoch_seconds(&self, last_updated: &str) -> Result<i64, MalformedRecord> {
        let parsed = parse_last_updated(last_updated)?;

        match self {
            ExpiryBasis::Offset => Ok(parsed.timestamp()),
            ExpiryBasis::UtcWallClock => Ok(parsed.naive_local().and_utc().timestamp()),
            ExpiryBasis::LocalWallClock => Local
                .from_local_datetime(&parsed.naive_local())
                .earliest()
                .map(|local| local.timestamp())
                .ok_or_else(|| MalformedRecord::NonexistentLocalTime {
                    value: last_updated.to_string(),
                }),
        }
    }

    pub fn expire_at(&self, last_updated: &str) -> Result<i64, MalformedRecord> {
        Ok(self.epoch_seconds(last_updated)? + TTL_SECONDS)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RecordNormalizer {
    expiry_basis: ExpiryBasis,
}

impl RecordNormalizer {
    pub fn new(expiry_basis: ExpiryBasis) -> Self {
        Self { expiry_basis }
    }

    pub fn expiry_basis(&self) -> ExpiryBasis {
        self.expiry_basis
    }

    /// Normalize a record that passed [`RecordValidator`](crate::validator::RecordValidator).
    pub fn normalize(
        &self,
        record: &RawMeasurementRecord,
    ) -> Result<CanonicalMeasurementRecord, MalformedRecord> {
        self.normalize_at(record, Utc::now())
    }

    /// [`normalize`](Self::normalize) with an explicit ingestion instant.
    pub fn normalize_at(
        &self,
        record: &RawMeasurementRecord,
        ingested_at: DateTime<Utc>,
    ) -> Result<CanonicalMeasurementRecord, MalformedRecord> {
        let location = match record.nullable_string("location")?.map(str::trim) {
            Some(location) if !location.is_empty() => location.to_string(),
            _ => UNKNOWN_LOCATION.to_string(),
        };

        // An absent city is treated like an explicit null.
        let city = if record.contains("city") {
            record.nullable_string("city")?.map(|c| c.trim().to_string())
        } else {
            None
        };

        let unit_text = record.string("unit")?;
        let unit: Unit = unit_text.parse().map_err(|_| MalformedRecord::Unvalidated {
            field: "unit",
            value: unit_text.to_string(),
        })?;
        let value = record.decimal("value")? * BigDecimal::from(unit.to_canonical_factor());
        if value <= BigDecimal::zero() {
            return Err(MalformedRecord::Unvalidated {
                field: "value",
                value: value.to_string(),
            });
        }

        let parameter_text = record.string("parameter")?;
        let parameter: Parameter =
            parameter_text
                .parse()
                .map_err(|_| MalformedRecord::Unvalidated {
                    field: "parameter",
                    value: parameter_text.to_string(),
                })?;

        let coordinates = record.object("coordinates")?;
        let latitude = decimal_value(
            "coordinates.latitude",
            coordinates
                .get("latitude")
                .ok_or(MalformedRecord::MissingField {
                    field: "coordinates.latitude",
                })?,
        )?;
        let longitude = decimal_value(
            "coordinates.longitude",
            coordinates
                .get("longitude")
                .ok_or(MalformedRecord::MissingField {
                    field: "coordinates.longitude",
                })?,
        )?;

        check_storable("value", &value)?;
        check_storable("coordinates.latitude", &latitude)?;
        check_storable("coordinates.longitude", &longitude)?;

        let last_updated = record.string("lastUpdated")?;
        let expire_at = self.expiry_basis.expire_at(last_updated)?;

        let mut passthrough = record.fields().clone();
        for field in NORMALIZED_FIELDS {
            passthrough.remove(field);
        }

        Ok(CanonicalMeasurementRecord {
            value,
            parameter,
            unit: Unit::CANONICAL,
            location,
            city,
            latitude,
            longitude,
            last_updated: last_updated.to_string(),
            expire_at,
            ingested_at: ingested_at.format(TIMESTAMP_FORMAT).to_string(),
            passthrough,
        })
    }
}

/// Reject numbers the record store cannot hold; they would otherwise fail at
/// write time and look like a store outage.
fn check_storable(field: &'static str, value: &BigDecimal) -> Result<(), MalformedRecord> {
    let value = value.normalized();
    if value.is_zero() {
        return Ok(());
    }

    let (_, scale) = value.as_bigint_and_exponent();
    let digits = value.digits();
    // Exponent of the leading digit, as in 1.23E+5.
    let exponent = i64::try_from(digits)
        .unwrap_or(i64::MAX)
        .saturating_sub(1)
        .saturating_sub(scale);

    if digits > MAX_STORED_DIGITS
        || !(MIN_STORED_EXPONENT..=MAX_STORED_EXPONENT).contains(&exponent)
    {
        return Err(MalformedRecord::OutOfRange {
            field,
            digits,
            exponent,
        });
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use serde_json::{json, Value};

    const BRUSSELS_TEN_AM: i64 = 1_704_103_200; // 2024-01-01T10:00:00Z

    fn raw(value: Value) -> RawMeasurementRecord {
        serde_json::from_value(value).unwrap()
    }

    /// A JSON number with exactly this source text.
    fn number(text: &str) -> Value {
        Value::Number(serde_json::Number::from_str(text).unwrap())
    }

    fn scenario_a() -> RawMeasurementRecord {
        raw(json!({
            "value": 5,
            "parameter": "pm10",
            "unit": "µg/m³",
            "location": null,
            "city": " Brussels ",
            "coordinates": { "latitude": 50.8, "longitude": 4.3 },
            "lastUpdated": "2024-01-01T10:00:00+0000",
            "country": "BE",
        }))
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 10, 5, 0).unwrap()
    }

    #[test]
    fn test_scenario_a_fills_unknown_location_and_flattens() {
        let record = RecordNormalizer::default()
            .normalize_at(&scenario_a(), fixed_now())
            .unwrap();

        assert_eq!(record.location(), "Unknown");
        assert_eq!(record.city(), Some("Brussels"));
        assert_eq!(*record.value(), BigDecimal::from(5));
        assert_eq!(record.unit(), Unit::MicrogramsPerCubicMeter);
        assert_eq!(*record.latitude(), BigDecimal::from_str("50.8").unwrap());
        assert_eq!(*record.longitude(), BigDecimal::from_str("4.3").unwrap());
        assert_eq!(record.expire_at(), BRUSSELS_TEN_AM + 172_800);
        assert_eq!(record.ingested_at(), "2024-01-01T10:05:00+0000");
        assert_eq!(record.passthrough().get("country"), Some(&json!("BE")));

        let json = record.to_json().unwrap();
        assert!(json.get("coordinates").is_none());
        assert_eq!(json["unit"], json!("µg/m³"));
        assert_eq!(json["lastUpdated"], json!("2024-01-01T10:00:00+0000"));
        assert_eq!(json["city"], json!("Brussels"));
        assert_eq!(json["expireAt"], json!(BRUSSELS_TEN_AM + 172_800));
    }

    #[test]
    fn test_scenario_b_converts_milligrams() {
        let mut fields = scenario_a().fields().clone();
        fields.insert("unit".to_string(), json!("mg/m³"));
        fields.insert("value".to_string(), json!(2));

        let record = RecordNormalizer::default()
            .normalize(&RawMeasurementRecord::new(fields))
            .unwrap();

        assert_eq!(*record.value(), BigDecimal::from(2000));
        assert_eq!(record.unit().as_str(), "µg/m³");
    }

    #[test]
    fn test_milligram_conversion_is_exact() {
        let mut fields = scenario_a().fields().clone();
        fields.insert("unit".to_string(), json!("mg/m³"));
        fields.insert("value".to_string(), json!(0.123));

        let record = RecordNormalizer::default()
            .normalize(&RawMeasurementRecord::new(fields))
            .unwrap();

        assert_eq!(*record.value(), BigDecimal::from(123));
    }

    #[test]
    fn test_input_is_left_untouched() {
        let input = scenario_a();
        let before = input.clone();
        RecordNormalizer::default().normalize(&input).unwrap();
        assert_eq!(input, before);
        assert!(input.contains("coordinates"));
    }

    #[test]
    fn test_normalizing_twice_differs_only_in_ingested_at() {
        let normalizer = RecordNormalizer::default();
        let first = normalizer.normalize_at(&scenario_a(), fixed_now()).unwrap();
        let later = fixed_now() + chrono::Duration::minutes(30);
        let mut second = normalizer.normalize_at(&scenario_a(), later).unwrap();

        assert_ne!(first.ingested_at(), second.ingested_at());
        second.ingested_at = first.ingested_at.clone();
        assert_eq!(first, second);
    }

    #[test]
    fn test_location_and_blank_location_are_trimmed() {
        let mut fields = scenario_a().fields().clone();
        fields.insert("location".to_string(), json!("  Brussels-Arts "));
        fields.insert("city".to_string(), Value::Null);
        let record = RecordNormalizer::default()
            .normalize(&RawMeasurementRecord::new(fields.clone()))
            .unwrap();
        assert_eq!(record.location(), "Brussels-Arts");
        assert_eq!(record.city(), None);
        assert_eq!(record.to_json().unwrap()["city"], Value::Null);

        fields.insert("location".to_string(), json!("   "));
        let record = RecordNormalizer::default()
            .normalize(&RawMeasurementRecord::new(fields))
            .unwrap();
        assert_eq!(record.location(), UNKNOWN_LOCATION);
    }

    #[test]
    fn test_missing_city_is_null() {
        let mut fields = scenario_a().fields().clone();
        fields.remove("city");
        let record = RecordNormalizer::default()
            .normalize(&RawMeasurementRecord::new(fields))
            .unwrap();
        assert_eq!(record.city(), None);
    }

    #[test]
    fn test_derived_fields_override_raw_collisions() {
        let mut fields = scenario_a().fields().clone();
        fields.insert("latitude".to_string(), json!("stale"));
        fields.insert("expireAt".to_string(), json!(1));
        let record = RecordNormalizer::default()
            .normalize(&RawMeasurementRecord::new(fields))
            .unwrap();

        let json = record.to_json().unwrap();
        assert_eq!(json["latitude"], json!(50.8));
        assert_eq!(json["expireAt"], json!(BRUSSELS_TEN_AM + 172_800));
    }

    #[test]
    fn test_unparseable_timestamp_is_malformed() {
        let mut fields = scenario_a().fields().clone();
        fields.insert("lastUpdated".to_string(), json!("yesterday"));
        let err = RecordNormalizer::default()
            .normalize(&RawMeasurementRecord::new(fields))
            .unwrap_err();
        assert!(matches!(err, MalformedRecord::InvalidTimestamp { .. }));
    }

    #[test]
    fn test_unvalidated_unit_is_fatal() {
        let mut fields = scenario_a().fields().clone();
        fields.insert("unit".to_string(), json!("ppm"));
        let err = RecordNormalizer::default()
            .normalize(&RawMeasurementRecord::new(fields))
            .unwrap_err();
        assert_eq!(
            err,
            MalformedRecord::Unvalidated {
                field: "unit",
                value: "ppm".to_string()
            }
        );
    }

    #[test]
    fn test_missing_coordinates_are_malformed() {
        let mut fields = scenario_a().fields().clone();
        fields.insert("coordinates".to_string(), json!({ "latitude": 50.8 }));
        let err = RecordNormalizer::default()
            .normalize(&RawMeasurementRecord::new(fields))
            .unwrap_err();
        assert_eq!(
            err,
            MalformedRecord::MissingField {
                field: "coordinates.longitude"
            }
        );
    }

    #[test]
    fn test_parse_accepts_offset_variants() {
        let compact = parse_last_updated("2024-01-01T12:00:00+0200").unwrap();
        let colon = parse_last_updated("2024-01-01T12:00:00+02:00").unwrap();
        let zulu = parse_last_updated("2024-01-01T10:00:00Z").unwrap();

        assert_eq!(compact.timestamp(), BRUSSELS_TEN_AM);
        assert_eq!(colon.timestamp(), BRUSSELS_TEN_AM);
        assert_eq!(zulu.timestamp(), BRUSSELS_TEN_AM);
        assert!(parse_last_updated("2024-01-01 10:00:00").is_err());
    }

    #[test]
    fn test_expiry_bases_differ_only_for_non_utc_offsets() {
        let utc = "2024-01-01T10:00:00+0000";
        assert_eq!(
            ExpiryBasis::Offset.expire_at(utc).unwrap(),
            ExpiryBasis::UtcWallClock.expire_at(utc).unwrap()
        );

        let plus_two = "2024-01-01T12:00:00+0200";
        assert_eq!(ExpiryBasis::Offset.epoch_seconds(plus_two).unwrap(), BRUSSELS_TEN_AM);
        assert_eq!(
            ExpiryBasis::UtcWallClock.epoch_seconds(plus_two).unwrap(),
            BRUSSELS_TEN_AM + 7_200
        );
    }

    #[test]
    fn test_local_wall_clock_follows_host_zone() {
        let expected = Local
            .with_ymd_and_hms(2024, 1, 1, 10, 0, 0)
            .earliest()
            .unwrap()
            .timestamp();
        assert_eq!(
            ExpiryBasis::LocalWallClock
                .epoch_seconds("2024-01-01T10:00:00+0500")
                .unwrap(),
            expected
        );
    }

    #[test]
    fn test_value_beyond_store_range_is_malformed() {
        let mut fields = scenario_a().fields().clone();
        fields.insert("unit".to_string(), json!("mg/m³"));
        fields.insert("value".to_string(), number("1e999999"));
        let err = RecordNormalizer::default()
            .normalize(&RawMeasurementRecord::new(fields))
            .unwrap_err();
        assert!(matches!(
            err,
            MalformedRecord::OutOfRange {
                field: "value",
                exponent: 1_000_002,
                ..
            }
        ));
    }

    #[test]
    fn test_store_range_limits() {
        assert!(check_storable("value", &BigDecimal::from_str("9.9e125").unwrap()).is_ok());
        assert!(check_storable("value", &BigDecimal::from_str("1e126").unwrap()).is_err());
        assert!(check_storable("value", &BigDecimal::from_str("1e-130").unwrap()).is_ok());
        assert!(check_storable("value", &BigDecimal::from_str("1e-131").unwrap()).is_err());
        // Trailing zeros are not significant.
        assert!(check_storable("value", &BigDecimal::from_str("2.000").unwrap()).is_ok());
        let too_precise = format!("1.{}", "1".repeat(38));
        assert!(matches!(
            check_storable("value", &BigDecimal::from_str(&too_precise).unwrap()),
            Err(MalformedRecord::OutOfRange { digits: 39, .. })
        ));
    }

    #[test]
    fn test_out_of_range_coordinate_is_malformed() {
        let mut fields = scenario_a().fields().clone();
        fields.insert(
            "coordinates".to_string(),
            json!({ "latitude": number("1e-200"), "longitude": 4.3 }),
        );
        let err = RecordNormalizer::default()
            .normalize(&RawMeasurementRecord::new(fields))
            .unwrap_err();
        assert!(matches!(
            err,
            MalformedRecord::OutOfRange {
                field: "coordinates.latitude",
                ..
            }
        ));
    }

    /// Shift the decimal point three places right, on the text.
    fn times_thousand(integer: u64, fraction: &str) -> String {
        let padded = format!("{:0<3}", fraction);
        let (moved, rest) = padded.split_at(3);
        if rest.is_empty() {
            format!("{}{}", integer, moved)
        } else {
            format!("{}{}.{}", integer, moved, rest)
        }
    }

    proptest! {
        #[test]
        fn prop_milligrams_are_multiplied_exactly(
            integer in 0u64..1_000_000,
            fraction in "[0-9]{0,8}[1-9]",
        ) {
            let text = format!("{}.{}", integer, fraction);
            let mut fields = scenario_a().fields().clone();
            fields.insert("unit".to_string(), json!("mg/m³"));
            fields.insert("value".to_string(), number(&text));

            let record = RecordNormalizer::default()
                .normalize_at(&RawMeasurementRecord::new(fields), fixed_now())
                .unwrap();

            let expected = BigDecimal::from_str(&times_thousand(integer, &fraction)).unwrap();
            prop_assert_eq!(record.value(), &expected);
            prop_assert_eq!(record.unit(), Unit::MicrogramsPerCubicMeter);
        }

        #[test]
        fn prop_expire_at_is_two_days_after_last_updated(
            year in 1971i32..2100,
            month in 1u32..=12,
            day in 1u32..=28,
            hour in 0u32..24,
            minute in 0u32..60,
            second in 0u32..60,
            offset_minutes in -720i32..=840,
        ) {
            let sign = if offset_minutes < 0 { '-' } else { '+' };
            let last_updated = format!(
                "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}{}{:02}{:02}",
                year, month, day, hour, minute, second,
                sign, offset_minutes.abs() / 60, offset_minutes.abs() % 60,
            );
            let wall_clock = chrono::NaiveDate::from_ymd_opt(year, month, day)
                .unwrap()
                .and_hms_opt(hour, minute, second)
                .unwrap()
                .and_utc()
                .timestamp();
            let instant = wall_clock - i64::from(offset_minutes) * 60;

            prop_assert_eq!(ExpiryBasis::Offset.expire_at(&last_updated).unwrap(), instant + 172_800);
            prop_assert_eq!(
                ExpiryBasis::UtcWallClock.expire_at(&last_updated).unwrap(),
                wall_clock + 172_800
            );

            let mut fields = scenario_a().fields().clone();
            fields.insert("lastUpdated".to_string(), json!(last_updated));
            let record = RecordNormalizer::default()
                .normalize_at(&RawMeasurementRecord::new(fields), fixed_now())
                .unwrap();
            prop_assert_eq!(record.expire_at(), instant + TTL_SECONDS);
        }
    }

    #[test]
    fn test_expiry_basis_from_str() {
        assert_eq!("offset".parse::<ExpiryBasis>().unwrap(), ExpiryBasis::Offset);
        assert_eq!("UTC".parse::<ExpiryBasis>().unwrap(), ExpiryBasis::UtcWallClock);
        assert_eq!(
            "local-wall-clock".parse::<ExpiryBasis>().unwrap(),
            ExpiryBasis::LocalWallClock
        );
        assert!("naive".parse::<ExpiryBasis>().is_err());
    }
}

//! Data models for the quake feed.
//!
//! The feed returns a bare JSON array of rows:
//! `[{"quakeDateTime": "...", "latitude": 0.0, "longitude": 0.0,
//!    "depth": 0.0, "magnitude": 0.0, "place": "..."}]`

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::FeedError;

/// Naive layouts accepted for `quakeDateTime`, read as UTC.
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

/// Fallback label when the feed omits a place.
pub const UNKNOWN_PLACE: &str = "Unknown location";

/// A single seismic event row. Immutable once decoded.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SeismicRecord {
    /// When the event occurred
    #[serde(rename = "quakeDateTime", deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,

    /// Degrees, [-90, 90]
    pub latitude: f64,

    /// Degrees, [-180, 180]
    pub longitude: f64,

    /// Kilometers
    pub depth: f64,

    pub magnitude: f64,

    /// Human-readable place description
    #[serde(default)]
    pub place: Option<String>,
}

impl SeismicRecord {
    /// Validate coordinate ranges and numeric sanity.
    pub fn validate(&self, index: usize) -> Result<(), FeedError> {
        let invalid = |reason: String| FeedError::InvalidRecord { index, reason };

        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(invalid(format!(
                "latitude {} out of range [-90, 90]",
                self.latitude
            )));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(invalid(format!(
                "longitude {} out of range [-180, 180]",
                self.longitude
            )));
        }
        if !self.depth.is_finite() {
            return Err(invalid(format!("depth {} is not finite", self.depth)));
        }
        if !self.magnitude.is_finite() {
            return Err(invalid(format!(
                "magnitude {} is not finite",
                self.magnitude
            )));
        }
        Ok(())
    }

    /// Place label, or a placeholder if the feed had none.
    #[must_use]
    pub fn place(&self) -> &str {
        self.place.as_deref().unwrap_or(UNKNOWN_PLACE)
    }

    /// Depth as a plain magnitude in kilometers.
    #[must_use]
    pub fn depth_km(&self) -> f64 {
        self.depth.abs()
    }

    /// Event time in the viewer's local zone.
    #[must_use]
    pub fn local_time(&self) -> DateTime<Local> {
        self.timestamp.with_timezone(&Local)
    }
}

/// Parse a feed timestamp.
///
/// Accepts RFC 3339, naive date-times (taken as UTC) and bare dates.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();

    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Ok(t.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(t) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(t.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| t.and_utc())
        .ok_or_else(|| format!("unrecognized timestamp: {raw:?}"))
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}

/// Normalized record for JSON/NDJSON output and the dashboard API.
#[derive(Debug, Clone, Serialize)]
pub struct OutputRecord {
    pub index: usize,
    pub time: String,
    pub local_time: String,
    pub latitude: f64,
    pub longitude: f64,
    pub depth_km: f64,
    pub magnitude: f64,
    pub place: String,
    pub highlighted: bool,
}

impl OutputRecord {
    #[must_use]
    pub fn new(index: usize, record: &SeismicRecord, highlighted: bool) -> Self {
        Self {
            index,
            time: record.timestamp.to_rfc3339(),
            local_time: record.local_time().format("%Y-%m-%d %H:%M:%S").to_string(),
            latitude: record.latitude,
            longitude: record.longitude,
            depth_km: record.depth_km(),
            magnitude: record.magnitude,
            place: record.place().to_string(),
            highlighted,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::TimeZone;

    use super::*;

    /// Build a record whose coordinates encode `seed` so tests can tell rows apart.
    pub fn record(seed: u32) -> SeismicRecord {
        let seed = f64::from(seed);
        SeismicRecord {
            timestamp: Utc
                .with_ymd_and_hms(2024, 12, 28, 10, 0, 0)
                .single()
                .unwrap(),
            latitude: (seed % 90.0) - 45.0,
            longitude: (seed % 180.0) - 90.0,
            depth: 10.0 + seed,
            magnitude: 2.5,
            place: Some(format!("place {seed}")),
        }
    }

    pub fn records(range: std::ops::Range<u32>) -> Vec<SeismicRecord> {
        range.map(record).collect()
    }
}

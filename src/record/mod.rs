//! Seismic event record model
//!
//! A [`Record`] is one row of the catalogue after coercion. It is obtained
//! through [`Record::from_raw`] for scraped rows or [`Record::from_stored`]
//! for persisted ones; both share the single place where field values are
//! validated and differ only in the accepted timestamp layout.

use chrono::NaiveDateTime;
use std::fmt;
use std::hash::{Hash, Hasher};
use thiserror::Error;
use url::Url;

/// Timestamp layout used by the result table (`DD/MM/YYYY HH:MM:SS`)
pub const SOURCE_TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Timestamp layout used by persisted output
pub const STORED_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Where a raw timestamp comes from, which fixes the only layout it may use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampLayout {
    /// Scraped from the result table, [`SOURCE_TIMESTAMP_FORMAT`]
    Source,
    /// Read back from persisted output, [`STORED_TIMESTAMP_FORMAT`]
    Stored,
}

impl TimestampLayout {
    pub fn format(self) -> &'static str {
        match self {
            Self::Source => SOURCE_TIMESTAMP_FORMAT,
            Self::Stored => STORED_TIMESTAMP_FORMAT,
        }
    }
}

/// Unit of [`Record::depth_km`]
pub const DEPTH_UNIT: &str = "Km";

/// Unit of [`Record::magnitude`]
pub const MAGNITUDE_UNIT: &str = "Richter";

/// Description of one record field, shared by every output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    /// Table-schema type name (`integer`, `number`, `boolean`, `datetime`, `string`)
    pub kind: &'static str,
    pub unit: Option<&'static str>,
}

/// Field layout of a record, in output column order
pub const FIELDS: [FieldSpec; 10] = [
    FieldSpec { name: "id", kind: "integer", unit: None },
    FieldSpec { name: "timestamp", kind: "datetime", unit: None },
    FieldSpec { name: "latitude", kind: "number", unit: None },
    FieldSpec { name: "longitude", kind: "number", unit: None },
    FieldSpec { name: "felt", kind: "boolean", unit: None },
    FieldSpec { name: "depth_km", kind: "integer", unit: Some(DEPTH_UNIT) },
    FieldSpec { name: "magnitude", kind: "number", unit: Some(MAGNITUDE_UNIT) },
    FieldSpec { name: "intensity", kind: "string", unit: None },
    FieldSpec { name: "province", kind: "string", unit: None },
    FieldSpec { name: "detail_url", kind: "string", unit: None },
];

/// Errors raised while constructing a [`Record`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing field `{field}`")]
    Missing { field: &'static str },

    #[error("invalid value {raw:?} for field `{field}`")]
    Invalid { field: &'static str, raw: String },
}

impl ValidationError {
    /// Name of the offending field
    pub fn field(&self) -> &'static str {
        match self {
            Self::Missing { field } | Self::Invalid { field, .. } => field,
        }
    }

    /// Raw value that failed coercion, if there was one
    pub fn raw(&self) -> Option<&str> {
        match self {
            Self::Missing { .. } => None,
            Self::Invalid { raw, .. } => Some(raw),
        }
    }
}

/// Uncoerced field values, as extracted from a table row or a stored line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    pub id: Option<String>,
    pub timestamp: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub felt: Option<String>,
    pub depth_km: Option<String>,
    pub magnitude: Option<String>,
    pub intensity: Option<String>,
    pub province: Option<String>,
    pub detail_url: Option<String>,
}

impl RawRecord {
    /// Builds a raw record by looking each field up by its column name
    pub fn from_columns<F>(mut column: F) -> Self
    where
        F: FnMut(&str) -> Option<String>,
    {
        Self {
            id: column("id"),
            timestamp: column("timestamp"),
            latitude: column("latitude"),
            longitude: column("longitude"),
            felt: column("felt"),
            depth_km: column("depth_km"),
            magnitude: column("magnitude"),
            intensity: column("intensity"),
            province: column("province"),
            detail_url: column("detail_url"),
        }
    }
}

/// One seismic event
///
/// Records are immutable; identity and equality are defined by [`Record::id`].
#[derive(Debug, Clone)]
pub struct Record {
    id: i64,
    timestamp: NaiveDateTime,
    latitude: f64,
    longitude: f64,
    felt: bool,
    depth_km: i32,
    magnitude: f64,
    intensity: String,
    province: String,
    detail_url: Url,
}

impl Record {
    /// Validates and coerces raw field values scraped from the result table
    ///
    /// The timestamp must use [`SOURCE_TIMESTAMP_FORMAT`]; any other layout is
    /// an invalid `timestamp`.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] naming the first field that is absent or
    /// cannot be coerced.
    pub fn from_raw(raw: RawRecord) -> Result<Self, ValidationError> {
        Self::with_layout(raw, TimestampLayout::Source)
    }

    /// Rebuilds a record from persisted columns written by [`Record::to_columns`]
    pub fn from_stored(raw: RawRecord) -> Result<Self, ValidationError> {
        Self::with_layout(raw, TimestampLayout::Stored)
    }

    fn with_layout(raw: RawRecord, layout: TimestampLayout) -> Result<Self, ValidationError> {
        let id = required("id", raw.id)?;
        let id = match id.trim().parse::<i64>() {
            Ok(value) if value > 0 => value,
            _ => return Err(invalid("id", id)),
        };

        let timestamp = parse_timestamp(&required("timestamp", raw.timestamp)?, layout)?;

        let latitude = parse_coordinate("latitude", raw.latitude, 90.0)?;
        let longitude = parse_coordinate("longitude", raw.longitude, 180.0)?;

        let felt = required("felt", raw.felt)?;
        let felt = match felt.trim() {
            "true" | "1" => true,
            "false" | "0" => false,
            _ => return Err(invalid("felt", felt)),
        };

        let depth = required("depth_km", raw.depth_km)?;
        let depth_km = depth
            .trim()
            .parse::<i32>()
            .map_err(|_| invalid("depth_km", depth.clone()))?;

        let magnitude = parse_number("magnitude", raw.magnitude)?;

        let intensity = raw.intensity.unwrap_or_default().trim().to_string();
        let province = required("province", raw.province)?.trim().to_string();

        let url = required("detail_url", raw.detail_url)?;
        let detail_url = Url::parse(url.trim()).map_err(|_| invalid("detail_url", url.clone()))?;

        Ok(Self {
            id,
            timestamp,
            latitude,
            longitude,
            felt,
            depth_km,
            magnitude,
            intensity,
            province,
            detail_url,
        })
    }

    /// Identifier taken from the event's detail link
    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Whether the event was marked as felt by the public
    pub fn felt(&self) -> bool {
        self.felt
    }

    /// Depth in kilometers
    pub fn depth_km(&self) -> i32 {
        self.depth_km
    }

    /// Magnitude on the Richter scale
    pub fn magnitude(&self) -> f64 {
        self.magnitude
    }

    pub fn intensity(&self) -> &str {
        &self.intensity
    }

    pub fn province(&self) -> &str {
        &self.province
    }

    pub fn detail_url(&self) -> &Url {
        &self.detail_url
    }

    /// Renders the record as output columns, in [`FIELDS`] order
    pub fn to_columns(&self) -> [String; 10] {
        [
            self.id.to_string(),
            self.timestamp.format(STORED_TIMESTAMP_FORMAT).to_string(),
            self.latitude.to_string(),
            self.longitude.to_string(),
            self.felt.to_string(),
            self.depth_km.to_string(),
            self.magnitude.to_string(),
            self.intensity.clone(),
            self.province.clone(),
            self.detail_url.to_string(),
        ]
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Record {}

impl Hash for Record {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} M{} {} ({}, {})",
            self.id,
            self.timestamp.format(STORED_TIMESTAMP_FORMAT),
            self.magnitude,
            self.province,
            self.latitude,
            self.longitude
        )
    }
}

fn required(field: &'static str, value: Option<String>) -> Result<String, ValidationError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ValidationError::Missing { field }),
    }
}

fn invalid(field: &'static str, raw: String) -> ValidationError {
    ValidationError::Invalid { field, raw }
}

fn parse_timestamp(raw: &str, layout: TimestampLayout) -> Result<NaiveDateTime, ValidationError> {
    NaiveDateTime::parse_from_str(raw.trim(), layout.format())
        .map_err(|_| invalid("timestamp", raw.to_string()))
}

fn parse_number(field: &'static str, value: Option<String>) -> Result<f64, ValidationError> {
    let raw = required(field, value)?;
    match raw.trim().parse::<f64>() {
        Ok(number) if number.is_finite() => Ok(number),
        _ => Err(invalid(field, raw)),
    }
}

fn parse_coordinate(
    field: &'static str,
    value: Option<String>,
    limit: f64,
) -> Result<f64, ValidationError> {
    let raw = value.clone();
    let number = parse_number(field, value)?;
    if number.abs() > limit {
        return Err(invalid(field, raw.unwrap_or_default()));
    }
    Ok(number)
}

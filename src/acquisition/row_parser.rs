//! Row Parser - flat logger rows into structured `Reading`s
//!
//! A row is a map of column name to raw value, as produced by a CSV export,
//! a JSON row dump or a database query. Column names are matched after
//! normalization (lowercase, alphanumerics only) so `Active Power (kW)`,
//! `active_power_kw` and `ActivePowerKW` all resolve to the same field.
//!
//! Numeric policy: a missing or unparseable numeric field becomes `0.0`
//! through [`parse_numeric_or_default`]. The timestamp is the only field
//! that can fail a row.

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;
use thiserror::Error;

use crate::types::{
    EnergyBlock, EquipmentStatus, OperationalBlock, Reading, ZoneId, ZoneReading,
};

// ============================================================================
// Raw Row
// ============================================================================

/// One raw cell value.
///
/// Untagged so JSON rows deserialize directly; CSV cells arrive as `Text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl RawValue {
    /// Textual form of the value, `None` for null or blank text.
    pub fn to_text(&self) -> Option<String> {
        match self {
            RawValue::Null => None,
            RawValue::Bool(b) => Some(b.to_string()),
            RawValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                Some(format!("{}", *n as i64))
            }
            RawValue::Number(n) => Some(n.to_string()),
            RawValue::Text(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Text(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

/// Column name to raw value
pub type RawRow = HashMap<String, RawValue>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    /// Missing, blank or unrecognized timestamp. Rows without a valid
    /// instant cannot be ordered and are never defaulted.
    #[error("invalid timestamp '{raw}'")]
    InvalidTimestamp { raw: String },
}

// ============================================================================
// Numeric Parsing
// ============================================================================

/// Parse a raw value as `f64`, falling back to `default`.
///
/// Missing keys, nulls, booleans, unparseable text and non-finite numbers
/// all yield `default`. Callers spell out the default at each call site.
pub fn parse_numeric_or_default(raw: Option<&RawValue>, default: f64) -> f64 {
    let parsed = match raw {
        Some(RawValue::Number(n)) => Some(*n),
        Some(RawValue::Text(s)) => s.trim().parse::<f64>().ok(),
        Some(RawValue::Bool(_)) | Some(RawValue::Null) | None => None,
    };
    parsed.filter(|v| v.is_finite()).unwrap_or(default)
}

/// Counter fields: truncated toward zero, negatives clamp to 0.
fn parse_count(raw: Option<&RawValue>) -> u64 {
    let value = parse_numeric_or_default(raw, 0.0);
    if value <= 0.0 {
        0
    } else {
        value.trunc() as u64
    }
}

// ============================================================================
// Timestamp Parsing
// ============================================================================

/// Naive formats, interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
    "%d.%m.%Y %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Epoch values at or above this magnitude are milliseconds.
const EPOCH_MILLIS_CUTOFF: f64 = 1e11;

fn epoch_to_datetime(value: f64) -> Option<DateTime<Utc>> {
    if !value.is_finite() {
        return None;
    }
    let millis = if value.abs() >= EPOCH_MILLIS_CUTOFF {
        value.round()
    } else {
        (value * 1000.0).round()
    };
    DateTime::from_timestamp_millis(millis as i64)
}

/// Parse a logger timestamp.
///
/// Accepts RFC 3339, common naive date-time layouts (UTC assumed), and
/// epoch seconds or milliseconds as number or digit string.
pub fn parse_timestamp(raw: Option<&RawValue>) -> Result<DateTime<Utc>, ParseError> {
    let invalid = |raw: &str| ParseError::InvalidTimestamp { raw: raw.to_string() };

    match raw {
        None | Some(RawValue::Null) => Err(invalid("<missing>")),
        Some(RawValue::Bool(b)) => Err(invalid(&b.to_string())),
        Some(RawValue::Number(n)) => epoch_to_datetime(*n).ok_or_else(|| invalid(&n.to_string())),
        Some(RawValue::Text(s)) => {
            let text = s.trim();
            if text.is_empty() {
                return Err(invalid(s));
            }
            if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
                return Ok(dt.with_timezone(&Utc));
            }
            if let Ok(dt) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%:z") {
                return Ok(dt.with_timezone(&Utc));
            }
            for fmt in NAIVE_FORMATS {
                if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
                    return Ok(naive.and_utc());
                }
            }
            if text.chars().all(|c| c.is_ascii_digit() || c == '.') {
                if let Some(dt) = text.parse::<f64>().ok().and_then(epoch_to_datetime) {
                    return Ok(dt);
                }
            }
            Err(invalid(text))
        }
    }
}

// ============================================================================
// Column Recognition
// ============================================================================

/// Scalar fields a logger column can map to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Field {
    Timestamp,
    Date,
    Time,
    CumulativeEnergy,
    Current,
    Voltage,
    ActivePower,
    ReactivePower,
    ApparentPower,
    PowerFactor,
    Frequency,
    Status,
    BoardsInside,
    BoardsProduced,
    ProductNumber,
    ConveyorSpeed,
    AlarmCount,
    FlowRate,
    O2,
}

/// Normalized aliases per field. First alias present in a row wins.
const FIELD_ALIASES: &[(Field, &[&str])] = &[
    (Field::Timestamp, &["timestamp", "loggingtime", "logtime", "datetime"]),
    (Field::Date, &["date", "loggingdate", "logdate"]),
    (Field::Time, &["time"]),
    (
        Field::CumulativeEnergy,
        &["cumulativeenergykwh", "cumulativeenergy", "totalenergykwh", "energykwh", "energy"],
    ),
    (Field::Current, &["currenta", "current"]),
    (Field::Voltage, &["voltagev", "voltage"]),
    (Field::ActivePower, &["activepowerkw", "activepower", "powerkw", "power"]),
    (Field::ReactivePower, &["reactivepowerkvar", "reactivepower", "kvar"]),
    (Field::ApparentPower, &["apparentpowerkva", "apparentpower", "kva"]),
    (Field::PowerFactor, &["powerfactor", "pf", "cosphi"]),
    (Field::Frequency, &["frequencyhz", "frequency", "acfrequency"]),
    (Field::Status, &["status", "equipmentstatus", "machinestatus", "state"]),
    (Field::BoardsInside, &["boardsinside", "boardsinoven", "pcbinside"]),
    (
        Field::BoardsProduced,
        &["boardsproduced", "producedboards", "totalboards", "boardcount"],
    ),
    (Field::ProductNumber, &["productnumber", "productno", "product", "recipe"]),
    (Field::ConveyorSpeed, &["conveyorspeed", "conveyorspeedcmmin", "conveyor"]),
    (Field::AlarmCount, &["alarmcount", "alarms"]),
    (Field::FlowRate, &["flowrate", "n2flowrate", "nitrogenflow"]),
    (Field::O2, &["o2concentration", "o2ppm", "o2", "oxygenppm"]),
];

/// The four temperature probes of a zone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ZoneChannel {
    Upper,
    Lower,
    BlowerUpper,
    BlowerLower,
}

/// Lowercase, alphanumerics only.
fn normalize_column(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn zone_pattern() -> Option<&'static Regex> {
    static ZONE_COLUMN: OnceLock<Option<Regex>> = OnceLock::new();
    ZONE_COLUMN
        .get_or_init(|| {
            Regex::new(r"^zone(\d{1,2})(blowerupper|blowerlower|upper|lower)(?:temp)?(?:c)?$").ok()
        })
        .as_ref()
}

/// Match a normalized column name such as `zone3blowerlowertempc`.
fn match_zone_column(normalized: &str) -> Option<(ZoneId, ZoneChannel)> {
    let caps = zone_pattern()?.captures(normalized)?;
    let zone = caps.get(1)?.as_str().parse::<u8>().ok().filter(|n| *n > 0)?;
    let channel = match caps.get(2)?.as_str() {
        "upper" => ZoneChannel::Upper,
        "lower" => ZoneChannel::Lower,
        "blowerupper" => ZoneChannel::BlowerUpper,
        "blowerlower" => ZoneChannel::BlowerLower,
        _ => return None,
    };
    Some((ZoneId(zone), channel))
}

/// Whether a header name would be read as (part of) the timestamp.
pub fn is_timestamp_column(name: &str) -> bool {
    let normalized = normalize_column(name);
    FIELD_ALIASES
        .iter()
        .filter(|(field, _)| matches!(field, Field::Timestamp | Field::Date | Field::Time))
        .any(|(_, aliases)| aliases.contains(&normalized.as_str()))
}

/// Row view keyed by normalized column name.
///
/// Original keys are visited in sorted order so normalization collisions
/// resolve the same way on every run.
struct NormalizedRow<'a> {
    cells: HashMap<String, &'a RawValue>,
}

impl<'a> NormalizedRow<'a> {
    fn new(row: &'a RawRow) -> Self {
        let mut keys: Vec<&String> = row.keys().collect();
        keys.sort();
        let mut cells = HashMap::with_capacity(row.len());
        for key in keys {
            cells.entry(normalize_column(key)).or_insert(&row[key]);
        }
        Self { cells }
    }

    fn field(&self, field: Field) -> Option<&'a RawValue> {
        FIELD_ALIASES
            .iter()
            .find(|(f, _)| *f == field)
            .and_then(|(_, aliases)| aliases.iter().find_map(|a| self.cells.get(*a).copied()))
    }

    /// Combined date-time column, else a separate date and time pair joined
    /// with a space, else whichever of the two is present.
    fn timestamp(&self) -> Result<DateTime<Utc>, ParseError> {
        if let Some(raw) = self.field(Field::Timestamp) {
            return parse_timestamp(Some(raw));
        }
        match (self.field(Field::Date), self.field(Field::Time)) {
            (Some(date), Some(time)) => {
                let joined = match (date.to_text(), time.to_text()) {
                    (Some(d), Some(t)) => RawValue::Text(format!("{d} {t}")),
                    _ => RawValue::Null,
                };
                parse_timestamp(Some(&joined))
            }
            (date, time) => parse_timestamp(date.or(time)),
        }
    }

    fn number(&self, field: Field) -> f64 {
        parse_numeric_or_default(self.field(field), 0.0)
    }

    fn zones(&self) -> BTreeMap<ZoneId, ZoneReading> {
        let mut probes: BTreeMap<ZoneId, [f64; 4]> = BTreeMap::new();
        for (key, value) in &self.cells {
            if let Some((zone, channel)) = match_zone_column(key) {
                let slot = match channel {
                    ZoneChannel::Upper => 0,
                    ZoneChannel::Lower => 1,
                    ZoneChannel::BlowerUpper => 2,
                    ZoneChannel::BlowerLower => 3,
                };
                probes.entry(zone).or_insert([0.0; 4])[slot] =
                    parse_numeric_or_default(Some(value), 0.0);
            }
        }
        probes
            .into_iter()
            .map(|(zone, [upper, lower, blower_upper, blower_lower])| {
                (zone, ZoneReading::new(upper, lower, blower_upper, blower_lower))
            })
            .collect()
    }
}

// ============================================================================
// Row Parsing (entry point)
// ============================================================================

/// Convert one raw row into a `Reading`.
///
/// Unknown columns are ignored. Zones are discovered from column names, so
/// the zone count follows whatever the logger exported.
pub fn parse_row(raw: &RawRow) -> Result<Reading, ParseError> {
    let row = NormalizedRow::new(raw);
    let timestamp = row.timestamp()?;

    let energy = EnergyBlock {
        cumulative_energy_kwh: row.number(Field::CumulativeEnergy),
        current_a: row.number(Field::Current),
        voltage_v: row.number(Field::Voltage),
        active_power_kw: row.number(Field::ActivePower),
        reactive_power_kvar: row.number(Field::ReactivePower),
        apparent_power_kva: row.number(Field::ApparentPower),
        power_factor: row.number(Field::PowerFactor),
        frequency_hz: row.number(Field::Frequency),
    };

    let operational = OperationalBlock {
        status: row
            .field(Field::Status)
            .and_then(RawValue::to_text)
            .map(|s| EquipmentStatus::from_raw(&s))
            .unwrap_or_default(),
        boards_inside: u32::try_from(parse_count(row.field(Field::BoardsInside))).unwrap_or(u32::MAX),
        boards_produced: parse_count(row.field(Field::BoardsProduced)),
        product_number: row
            .field(Field::ProductNumber)
            .and_then(RawValue::to_text)
            .unwrap_or_default(),
        conveyor_speed: row.number(Field::ConveyorSpeed),
        alarm_count: u32::try_from(parse_count(row.field(Field::AlarmCount))).unwrap_or(u32::MAX),
        flow_rate: row.number(Field::FlowRate),
        o2_concentration: row.number(Field::O2),
    };

    Ok(Reading {
        timestamp,
        energy,
        operational,
        zones: row.zones(),
    })
}

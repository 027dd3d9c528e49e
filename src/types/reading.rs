//! Reading types: one parsed sensor sample from the reflow oven data logger

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

// ============================================================================
// Equipment Status
// ============================================================================

/// Operational status reported by the oven controller
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
pub enum EquipmentStatus {
    Operating,
    Idle,
    Standby,
    Warmup,
    Cooldown,
    Alarm,
    #[default]
    Unknown,
}

impl EquipmentStatus {
    /// Map a raw controller status string. Unrecognized strings become `Unknown`.
    ///
    /// Only "Operating" (any case) counts as running; other vocabularies
    /// such as "Running" stay `Unknown` and classify as not operating.
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "operating" => Self::Operating,
            "idle" => Self::Idle,
            "standby" | "stand-by" | "stand by" => Self::Standby,
            "warmup" | "warm-up" | "warm up" | "heating" => Self::Warmup,
            "cooldown" | "cool-down" | "cool down" | "cooling" => Self::Cooldown,
            "alarm" | "fault" | "error" => Self::Alarm,
            _ => Self::Unknown,
        }
    }

    pub fn is_operating(self) -> bool {
        self == Self::Operating
    }
}

impl std::fmt::Display for EquipmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Operating => write!(f, "Operating"),
            Self::Idle => write!(f, "Idle"),
            Self::Standby => write!(f, "Standby"),
            Self::Warmup => write!(f, "Warmup"),
            Self::Cooldown => write!(f, "Cooldown"),
            Self::Alarm => write!(f, "Alarm"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

// ============================================================================
// Zone Identifier
// ============================================================================

/// Heating zone identifier (`zone1`..`zoneN`).
///
/// Ordered by zone number so zone maps iterate front-of-oven to exit.
/// Serialized as the string `"zoneN"` so it can key TOML and JSON maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ZoneId(pub u8);

impl ZoneId {
    pub fn number(self) -> u8 {
        self.0
    }

    /// Parse `"zone3"`, `"Zone 3"` or `"3"`.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let digits = trimmed
            .strip_prefix("zone")
            .or_else(|| trimmed.strip_prefix("Zone"))
            .or_else(|| trimmed.strip_prefix("ZONE"))
            .unwrap_or(trimmed)
            .trim_start_matches(['_', ' ']);
        digits.parse::<u8>().ok().filter(|n| *n > 0).map(Self)
    }
}

impl std::fmt::Display for ZoneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "zone{}", self.0)
    }
}

impl Serialize for ZoneId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ZoneId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid zone identifier '{raw}'")))
    }
}

// ============================================================================
// Zone Reading
// ============================================================================

/// Temperatures of one heating zone.
///
/// `avg_temp` and `delta` are derived from the upper/lower heater pair inside
/// the constructor and cannot be set independently.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ZoneReading {
    upper_temp_c: f64,
    lower_temp_c: f64,
    blower_upper_temp_c: f64,
    blower_lower_temp_c: f64,
    avg_temp: f64,
    delta: f64,
}

impl ZoneReading {
    pub fn new(
        upper_temp_c: f64,
        lower_temp_c: f64,
        blower_upper_temp_c: f64,
        blower_lower_temp_c: f64,
    ) -> Self {
        Self {
            upper_temp_c,
            lower_temp_c,
            blower_upper_temp_c,
            blower_lower_temp_c,
            avg_temp: (upper_temp_c + lower_temp_c) / 2.0,
            delta: (upper_temp_c - lower_temp_c).abs(),
        }
    }

    pub fn upper_temp_c(&self) -> f64 {
        self.upper_temp_c
    }

    pub fn lower_temp_c(&self) -> f64 {
        self.lower_temp_c
    }

    pub fn blower_upper_temp_c(&self) -> f64 {
        self.blower_upper_temp_c
    }

    pub fn blower_lower_temp_c(&self) -> f64 {
        self.blower_lower_temp_c
    }

    /// Mean of upper and lower heater temperatures (°C)
    pub fn avg_temp(&self) -> f64 {
        self.avg_temp
    }

    /// Absolute upper/lower heater difference (°C)
    pub fn delta(&self) -> f64 {
        self.delta
    }
}

// ============================================================================
// Reading
// ============================================================================

/// Electrical measurements from the oven's power meter
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EnergyBlock {
    /// Meter counter (kWh), expected to be non-decreasing
    pub cumulative_energy_kwh: f64,
    pub current_a: f64,
    pub voltage_v: f64,
    pub active_power_kw: f64,
    pub reactive_power_kvar: f64,
    pub apparent_power_kva: f64,
    /// 0.0 - 1.0
    pub power_factor: f64,
    pub frequency_hz: f64,
}

/// Conveyor and production state
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OperationalBlock {
    pub status: EquipmentStatus,
    pub boards_inside: u32,
    /// Production counter, expected to be non-decreasing
    pub boards_produced: u64,
    pub product_number: String,
    pub conveyor_speed: f64,
    pub alarm_count: u32,
    pub flow_rate: f64,
    /// Nitrogen atmosphere residual oxygen (ppm)
    pub o2_concentration: f64,
}

/// One sensor sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub energy: EnergyBlock,
    pub operational: OperationalBlock,
    pub zones: BTreeMap<ZoneId, ZoneReading>,
}

impl Reading {
    /// Boards are in the oven or the controller reports `Operating`.
    pub fn is_producing(&self) -> bool {
        self.operational.boards_inside > 0 || self.operational.status.is_operating()
    }

    /// Controller is not `Operating` or no boards are inside.
    ///
    /// Not the complement of [`Reading::is_producing`]: an `Operating` oven
    /// with an empty conveyor is both.
    pub fn is_idle(&self) -> bool {
        !self.operational.status.is_operating() || self.operational.boards_inside == 0
    }

    pub fn zone(&self, id: ZoneId) -> Option<&ZoneReading> {
        self.zones.get(&id)
    }

    /// Mean zone temperature across all zones, `None` without zone data.
    pub fn mean_zone_temp(&self) -> Option<f64> {
        if self.zones.is_empty() {
            return None;
        }
        Some(self.zones.values().map(ZoneReading::avg_temp).sum::<f64>() / self.zones.len() as f64)
    }
}

/// Minutes elapsed between two instants (may be fractional or negative).
pub fn minutes_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / 60_000.0
}

//! Derived analysis types: interval statistics, production phases, idle
//! periods and production efficiency

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Reading, Severity, ZoneId};

// ============================================================================
// Interval Statistics
// ============================================================================

/// Power meter summary for one time bucket
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergyStats {
    /// `last.cumulative - first.cumulative`, clamped at zero on counter reset
    pub total_consumed_kwh: f64,
    pub avg_power_kw: f64,
    pub max_power_kw: f64,
    pub min_power_kw: f64,
    pub avg_power_factor: f64,
}

/// Temperature summary for one zone within a time bucket
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneStats {
    pub avg_temp: f64,
    pub max_temp: f64,
    pub min_temp: f64,
    pub avg_delta: f64,
    /// Spread of zone average temperature, `max - min`
    pub temp_variance: f64,
}

/// Production summary for one time bucket
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OperationalStats {
    pub avg_boards_inside: f64,
    /// Boards-produced counter delta across the bucket
    pub total_boards_produced: u64,
    pub avg_o2: f64,
    pub total_alarms: u64,
}

/// Summary statistics for one time bucket. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalStats {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub record_count: usize,
    pub energy: EnergyStats,
    pub zones: BTreeMap<ZoneId, ZoneStats>,
    pub operational: OperationalStats,
}

// ============================================================================
// Production Phases
// ============================================================================

/// Phase classification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PhaseKind {
    Production,
    Idle,
}

impl std::fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PhaseKind::Production => write!(f, "production"),
            PhaseKind::Idle => write!(f, "idle"),
        }
    }
}

/// Contiguous run of readings sharing one classification.
///
/// Borrows its readings from the input slice; `start_index..=end_index`
/// indexes that slice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Phase<'a> {
    pub kind: PhaseKind,
    pub start_index: usize,
    pub end_index: usize,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: f64,
    pub readings: &'a [Reading],
}

impl Phase<'_> {
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

/// Idle run of at least the configured minimum duration with its waste estimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdlePeriod {
    pub start_index: usize,
    pub end_index: usize,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: f64,
    pub avg_power_kw: f64,
    /// `avg_power_kw * duration_minutes / 60`
    pub energy_wasted_kwh: f64,
    pub severity: Severity,
    /// Recoverable share of `energy_wasted_kwh`
    pub potential_savings_kwh: f64,
}

// ============================================================================
// Production Efficiency
// ============================================================================

/// Efficiency classification of a production window
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EfficiencyStatus {
    /// Counter did not advance; efficiency reported as zero
    NoProduction,
    Optimal,
    Acceptable,
    Poor,
}

/// Energy-per-board result over a production window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyResult {
    pub status: EfficiencyStatus,
    pub window_minutes: f64,
    pub energy_consumed_kwh: f64,
    pub boards_produced: u64,
    /// `None` when no boards were produced
    pub kwh_per_board: Option<f64>,
    pub target_kwh_per_board: f64,
    /// Percent of target, capped at 100
    pub efficiency: f64,
}

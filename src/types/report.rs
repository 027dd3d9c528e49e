//! Summary report types: accumulated waste metrics, recommendations and the
//! per-period report

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EfficiencyResult, SeverityCounts, WasteCategory};

/// Reporting period. Selects the efficiency window of a summary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReportPeriod {
    Hour,
    /// Eight-hour production shift
    Shift,
    #[default]
    Day,
    Week,
    Custom { minutes: u32 },
}

impl ReportPeriod {
    pub fn window_minutes(self) -> f64 {
        match self {
            ReportPeriod::Hour => 60.0,
            ReportPeriod::Shift => 480.0,
            ReportPeriod::Day => 1_440.0,
            ReportPeriod::Week => 10_080.0,
            ReportPeriod::Custom { minutes } => f64::from(minutes),
        }
    }

    /// Parse `hour`, `shift`, `day`, `week` or a number of minutes.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "hour" | "hourly" | "1h" => Some(ReportPeriod::Hour),
            "shift" | "8h" => Some(ReportPeriod::Shift),
            "day" | "daily" | "24h" => Some(ReportPeriod::Day),
            "week" | "weekly" | "7d" => Some(ReportPeriod::Week),
            other => other
                .parse::<u32>()
                .ok()
                .filter(|m| *m > 0)
                .map(|minutes| ReportPeriod::Custom { minutes }),
        }
    }
}

impl std::fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportPeriod::Hour => write!(f, "hour"),
            ReportPeriod::Shift => write!(f, "shift"),
            ReportPeriod::Day => write!(f, "day"),
            ReportPeriod::Week => write!(f, "week"),
            ReportPeriod::Custom { minutes } => write!(f, "{minutes} min"),
        }
    }
}

/// Waste accumulated across a whole reading sequence
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WasteMetrics {
    pub total_energy_kwh: f64,
    /// Energy drawn above the standby ceiling while idle
    pub idle_energy_waste_kwh: f64,
    /// Excess apparent energy caused by low power factor
    pub power_factor_waste_kwh: f64,
    /// Heater energy spent above zone targets
    pub temperature_waste_kwh: f64,
    pub total_waste_kwh: f64,
    /// `total_waste / total_energy * 100`, zero without energy
    pub waste_percentage: f64,
    pub total_readings: usize,
    pub idle_readings: usize,
    pub low_pf_readings: usize,
    pub overshoot_readings: usize,
}

impl WasteMetrics {
    /// Share of readings with power factor below the warning threshold (0-1)
    pub fn low_pf_fraction(&self) -> f64 {
        if self.total_readings == 0 {
            0.0
        } else {
            self.low_pf_readings as f64 / self.total_readings as f64
        }
    }
}

/// Idle-time roll-up for a report
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct IdleStatistics {
    pub period_count: usize,
    pub total_idle_minutes: f64,
    pub longest_idle_minutes: f64,
    pub energy_wasted_kwh: f64,
    pub potential_savings_kwh: f64,
    pub critical_periods: usize,
    /// Idle minutes as a share of the report span (0-100)
    pub idle_time_percentage: f64,
}

/// Recommendation priority, `High` first when sorted
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::High => write!(f, "HIGH"),
            Priority::Medium => write!(f, "MEDIUM"),
            Priority::Low => write!(f, "LOW"),
        }
    }
}

/// Actionable recommendation attached to a summary report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub priority: Priority,
    pub category: WasteCategory,
    pub title: String,
    pub description: String,
    /// Estimated saving over the report span, in the configured currency
    pub potential_savings: f64,
    pub implementation: String,
}

/// Read-only report for one reporting period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WasteSummaryReport {
    pub line: String,
    pub period: ReportPeriod,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub reading_count: usize,
    pub currency: String,
    pub total_energy_kwh: f64,
    pub total_waste_kwh: f64,
    pub waste_percentage: f64,
    pub waste_cost: f64,
    pub metrics: WasteMetrics,
    pub idle: IdleStatistics,
    pub production_efficiency: Option<EfficiencyResult>,
    pub finding_counts: SeverityCounts,
    pub recommendations: Vec<Recommendation>,
}

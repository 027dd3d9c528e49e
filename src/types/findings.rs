//! Waste finding types: category, severity tier and the finding record itself

use serde::{Deserialize, Serialize};

use super::ZoneId;

/// Severity tiers, ordered `Info < Warning < Critical`
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Kind of energy waste a finding reports
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WasteCategory {
    /// Oven draws more than the idle ceiling with nothing to solder
    IdlePower,
    /// Reactive load pushes the power factor below the utility target
    PowerFactor,
    /// Zone runs hotter than its profile target
    TempOvershoot,
    /// Zone runs colder than its profile target during production
    TempUndershoot,
    /// Long idle stretch that could have been spent in standby
    StandbyDuration,
    /// Zone heated faster than the allowed ramp rate
    RampInefficiency,
    /// Upper and lower heaters of one zone disagree
    ZoneImbalance,
    /// Energy per board worse than target
    ProductionInefficiency,
    /// Blower air temperature drifts away from its heater
    ThermalLoss,
}

impl WasteCategory {
    pub fn display_name(&self) -> &'static str {
        match self {
            WasteCategory::IdlePower => "Idle Power",
            WasteCategory::PowerFactor => "Power Factor",
            WasteCategory::TempOvershoot => "Temperature Overshoot",
            WasteCategory::TempUndershoot => "Temperature Undershoot",
            WasteCategory::StandbyDuration => "Standby Duration",
            WasteCategory::RampInefficiency => "Ramp Inefficiency",
            WasteCategory::ZoneImbalance => "Zone Imbalance",
            WasteCategory::ProductionInefficiency => "Production Inefficiency",
            WasteCategory::ThermalLoss => "Thermal Loss",
        }
    }
}

impl std::fmt::Display for WasteCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// One waste observation. Generated fresh per analysis call, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WasteFinding {
    pub category: WasteCategory,
    pub severity: Severity,
    pub message: String,
    /// Observed value (kW, PF, °C, kWh/board ... depending on category)
    pub value: f64,
    /// Threshold or target the value was compared with
    pub threshold: f64,
    /// `value - threshold`, sign preserved
    pub deviation: f64,
    /// Estimated recoverable cost in the configured currency
    pub potential_savings: f64,
    /// Zone the finding refers to, for per-zone rules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<ZoneId>,
}

/// Finding counts per severity tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub info: usize,
    pub warning: usize,
    pub critical: usize,
}

impl SeverityCounts {
    pub fn from_findings(findings: &[WasteFinding]) -> Self {
        findings.iter().fold(Self::default(), |mut acc, f| {
            match f.severity {
                Severity::Info => acc.info += 1,
                Severity::Warning => acc.warning += 1,
                Severity::Critical => acc.critical += 1,
            }
            acc
        })
    }

    pub fn total(&self) -> usize {
        self.info + self.warning + self.critical
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Critical);
    }

    #[test]
    fn test_category_serializes_snake_case() {
        let json = serde_json::to_string(&WasteCategory::TempOvershoot).unwrap();
        assert_eq!(json, "\"temp_overshoot\"");
        let json = serde_json::to_string(&Severity::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
    }
}

//! Reflow Configuration - every waste-detection policy value as operator-tunable TOML
//!
//! Each struct implements `Default` with values from [`super::defaults`], so an
//! absent config file yields the stock policy. The config is passed explicitly
//! into each analysis call; nothing reads it from global state.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use super::defaults;
use crate::types::ZoneId;

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "REFLOW_CONFIG";

/// Config file looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "reflow_config.toml";

// ============================================================================
// Config Provenance
// ============================================================================

/// Dotted key paths explicitly present in the user's TOML file.
///
/// After deserialization every `#[serde(default)]` field has a value; this
/// keeps the distinction for `config show` and for logging.
#[derive(Debug, Clone, Default)]
pub struct ConfigProvenance {
    pub explicit_keys: HashSet<String>,
}

impl ConfigProvenance {
    /// Example: `provenance.is_user_set("thresholds.power.idle_power_max_kw")`
    pub fn is_user_set(&self, dotted_key: &str) -> bool {
        self.explicit_keys.contains(dotted_key)
    }
}

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one reflow line.
///
/// Load with `ReflowConfig::load()` which searches:
/// 1. `$REFLOW_CONFIG`
/// 2. `./reflow_config.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflowConfig {
    /// Line / oven identification
    #[serde(default)]
    pub line: LineInfo,

    /// Waste classification thresholds
    #[serde(default)]
    pub thresholds: ThresholdConfig,

    /// Tariff and savings-estimate constants
    #[serde(default)]
    pub cost: CostConfig,

    /// Gates for report recommendations
    #[serde(default)]
    pub recommendations: RecommendationConfig,

    /// Bucket and window sizes
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Zone temperature targets (°C), keyed `zone1`..`zoneN`
    #[serde(default = "defaults::default_zone_profile")]
    pub zone_targets: BTreeMap<ZoneId, f64>,
}

impl Default for ReflowConfig {
    fn default() -> Self {
        Self {
            line: LineInfo::default(),
            thresholds: ThresholdConfig::default(),
            cost: CostConfig::default(),
            recommendations: RecommendationConfig::default(),
            analysis: AnalysisConfig::default(),
            zone_targets: defaults::default_zone_profile(),
        }
    }
}

impl ReflowConfig {
    /// Load configuration using the standard search order.
    ///
    /// A broken file is logged and skipped, never fatal.
    pub fn load() -> Self {
        Self::load_with_provenance().0
    }

    /// Same search order as `load()`, also returning which keys the user set.
    pub fn load_with_provenance() -> (Self, ConfigProvenance) {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file_with_provenance(&p) {
                    Ok((config, provenance)) => {
                        info!(path = %p.display(), line = %config.line.name, "Loaded reflow config from {}", CONFIG_ENV_VAR);
                        return (config, provenance);
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_ENV_VAR);
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file_with_provenance(&local) {
                Ok((config, provenance)) => {
                    info!(line = %config.line.name, "Loaded reflow config from ./{}", LOCAL_CONFIG_FILE);
                    return (config, provenance);
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", LOCAL_CONFIG_FILE);
                }
            }
        }

        info!("No {} found, using built-in defaults", LOCAL_CONFIG_FILE);
        (Self::default(), ConfigProvenance::default())
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let (config, _provenance) = Self::load_from_file_with_provenance(path)?;
        Ok(config)
    }

    /// Load from a specific TOML file path, also returning provenance.
    pub fn load_from_file_with_provenance(
        path: &Path,
    ) -> Result<(Self, ConfigProvenance), ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str_with_provenance(&contents)
            .map_err(|e| e.with_path(path))
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Self::from_toml_str_with_provenance(contents).map(|(config, _)| config)
    }

    fn from_toml_str_with_provenance(
        contents: &str,
    ) -> Result<(Self, ConfigProvenance), ConfigError> {
        // Two-pass: unknown keys first (warnings only)
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let provenance = ConfigProvenance {
            explicit_keys: contents
                .parse::<toml::Value>()
                .map(|value| super::validation::walk_toml_keys(&value, ""))
                .unwrap_or_default()
                .into_iter()
                .collect(),
        };

        let config: Self = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        Ok((config, provenance))
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Save config to a file.
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        std::fs::write(path, contents).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        info!(path = %path.display(), "Reflow config saved");
        Ok(())
    }

    /// Profile target for a zone, falling back to the flat default.
    pub fn zone_target(&self, zone: ZoneId) -> f64 {
        self.zone_targets
            .get(&zone)
            .copied()
            .unwrap_or(self.thresholds.temperature.default_target_c)
    }

    /// Validate all thresholds for internal consistency.
    ///
    /// Rules:
    /// - Critical tiers must be at least as severe as warning tiers
    /// - Fractions lie in (0, 1]
    /// - Divisors and window sizes are positive
    /// - Every value is finite
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.thresholds;
        let mut errors: Vec<String> = Vec::new();

        if t.power.critical_multiplier < 1.0 {
            errors.push(format!(
                "power.critical_multiplier ({:.2}) must be >= 1.0",
                t.power.critical_multiplier
            ));
        }
        if t.power.standby_power_max_kw > t.power.idle_power_max_kw {
            errors.push(format!(
                "power.standby_power_max_kw ({:.1}) must be <= idle_power_max_kw ({:.1})",
                t.power.standby_power_max_kw, t.power.idle_power_max_kw
            ));
        }

        // Power factor: lower is worse, so critical sits below warning
        let pf = &t.power_factor;
        if pf.critical_min > pf.warning_min {
            errors.push(format!(
                "power_factor.critical_min ({:.2}) must be <= warning_min ({:.2})",
                pf.critical_min, pf.warning_min
            ));
        }
        for (name, value) in [
            ("power_factor.warning_min", pf.warning_min),
            ("power_factor.critical_min", pf.critical_min),
            ("power_factor.target", pf.target),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                errors.push(format!("{name} ({value}) must be in (0, 1]"));
            }
        }

        let temp = &t.temperature;
        Self::check_escalation(
            temp.overshoot_warning_c,
            temp.overshoot_critical_c,
            "temperature.overshoot",
            &mut errors,
        );
        Self::check_escalation(
            temp.undershoot_warning_c,
            temp.undershoot_critical_c,
            "temperature.undershoot",
            &mut errors,
        );
        if temp.ramp_rate_max_c_per_min <= 0.0 {
            errors.push("temperature.ramp_rate_max_c_per_min must be > 0".to_string());
        }

        let idle = &t.idle;
        Self::check_escalation(
            idle.warning_minutes,
            idle.critical_minutes,
            "idle.duration",
            &mut errors,
        );
        if idle.min_duration_minutes < 0.0 {
            errors.push("idle.min_duration_minutes cannot be negative".to_string());
        }
        if !(idle.recoverable_fraction > 0.0 && idle.recoverable_fraction <= 1.0) {
            errors.push(format!(
                "idle.recoverable_fraction ({}) must be in (0, 1]",
                idle.recoverable_fraction
            ));
        }

        let prod = &t.production;
        if prod.target_kwh_per_board <= 0.0 {
            errors.push("production.target_kwh_per_board must be > 0 (used as ratio)".to_string());
        }
        if prod.acceptable_percent > prod.optimal_percent {
            errors.push(format!(
                "production.acceptable_percent ({:.0}) must be <= optimal_percent ({:.0})",
                prod.acceptable_percent, prod.optimal_percent
            ));
        }

        if self.cost.energy_cost_per_kwh < 0.0 {
            errors.push("cost.energy_cost_per_kwh cannot be negative".to_string());
        }
        if self.analysis.interval_minutes == 0 {
            errors.push("analysis.interval_minutes must be > 0".to_string());
        }
        if self.analysis.efficiency_window_minutes <= 0.0 {
            errors.push("analysis.efficiency_window_minutes must be > 0".to_string());
        }

        let (range_errors, range_warnings) = super::validation::validate_physical_ranges(self);
        errors.extend(range_errors);
        for w in &range_warnings {
            warn!("{}", w);
        }

        // NaN/Inf comparisons silently pass above; sweep every float via serialization
        if toml::Value::try_from(self).is_ok_and(|value| has_non_finite(&value)) {
            errors.push(
                "Config contains NaN or Inf values, all thresholds must be finite numbers"
                    .to_string(),
            );
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    fn check_escalation(warning: f64, critical: f64, name: &str, errors: &mut Vec<String>) {
        if !warning.is_finite() || !critical.is_finite() {
            errors.push(format!(
                "{name}: values must be finite (got warning={warning}, critical={critical})"
            ));
            return;
        }
        if critical < warning {
            errors.push(format!(
                "{name}: critical ({critical:.3}) must be >= warning ({warning:.3})"
            ));
        }
    }
}

fn has_non_finite(value: &toml::Value) -> bool {
    match value {
        toml::Value::Float(f) => !f.is_finite(),
        toml::Value::Table(table) => table.values().any(has_non_finite),
        toml::Value::Array(items) => items.iter().any(has_non_finite),
        _ => false,
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {1}", .0.display())]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Config parse error ({}): {1}", .0.display())]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("Config serialization error: {0}")]
    Serialize(#[source] toml::ser::Error),

    #[error("Config validation failed:\n  - {}", .0.join("\n  - "))]
    Validation(Vec<String>),
}

impl ConfigError {
    fn with_path(self, path: &Path) -> Self {
        match self {
            ConfigError::Parse(_, e) => ConfigError::Parse(path.to_path_buf(), e),
            other => other,
        }
    }
}

// ============================================================================
// Line Info
// ============================================================================

/// Identification metadata, not used for logic but carried into reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineInfo {
    /// Line / oven identifier
    #[serde(default = "default_line_name")]
    pub name: String,

    #[serde(default)]
    pub site: String,

    #[serde(default)]
    pub oven_model: String,

    /// Currency label for cost figures
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_line_name() -> String {
    "DEFAULT".to_string()
}
fn default_currency() -> String {
    defaults::CURRENCY.to_string()
}

impl Default for LineInfo {
    fn default() -> Self {
        Self {
            name: default_line_name(),
            site: String::new(),
            oven_model: String::new(),
            currency: default_currency(),
        }
    }
}

// ============================================================================
// Threshold Config (master container)
// ============================================================================

/// All classification thresholds, grouped by rule family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ThresholdConfig {
    #[serde(default)]
    pub power: PowerThresholds,

    #[serde(default)]
    pub power_factor: PowerFactorThresholds,

    #[serde(default)]
    pub temperature: TemperatureThresholds,

    #[serde(default)]
    pub idle: IdleThresholds,

    #[serde(default)]
    pub production: ProductionThresholds,
}

// ============================================================================
// Power Thresholds
// ============================================================================

/// Idle power draw limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerThresholds {
    /// Active power above this while idle is waste (kW).
    #[serde(default = "default_idle_power_max")]
    pub idle_power_max_kw: f64,

    /// Strictly above `idle_power_max_kw * critical_multiplier` is critical.
    #[serde(default = "default_idle_critical_multiplier")]
    pub critical_multiplier: f64,

    /// Expected draw in standby, the floor for savings estimates (kW).
    #[serde(default = "default_standby_power_max")]
    pub standby_power_max_kw: f64,
}

fn default_idle_power_max() -> f64 { defaults::IDLE_POWER_MAX_KW }
fn default_idle_critical_multiplier() -> f64 { defaults::IDLE_POWER_CRITICAL_MULTIPLIER }
fn default_standby_power_max() -> f64 { defaults::STANDBY_POWER_MAX_KW }

impl Default for PowerThresholds {
    fn default() -> Self {
        Self {
            idle_power_max_kw: default_idle_power_max(),
            critical_multiplier: default_idle_critical_multiplier(),
            standby_power_max_kw: default_standby_power_max(),
        }
    }
}

// ============================================================================
// Power Factor Thresholds
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerFactorThresholds {
    #[serde(default = "default_pf_warning")]
    pub warning_min: f64,

    #[serde(default = "default_pf_critical")]
    pub critical_min: f64,

    /// Power factor after correction, baseline of the reactive-power estimate.
    #[serde(default = "default_pf_target")]
    pub target: f64,
}

fn default_pf_warning() -> f64 { defaults::POWER_FACTOR_WARNING }
fn default_pf_critical() -> f64 { defaults::POWER_FACTOR_CRITICAL }
fn default_pf_target() -> f64 { defaults::POWER_FACTOR_TARGET }

impl Default for PowerFactorThresholds {
    fn default() -> Self {
        Self {
            warning_min: default_pf_warning(),
            critical_min: default_pf_critical(),
            target: default_pf_target(),
        }
    }
}

// ============================================================================
// Temperature Thresholds
// ============================================================================

/// Zone temperature rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureThresholds {
    #[serde(default = "default_overshoot_warning")]
    pub overshoot_warning_c: f64,

    #[serde(default = "default_overshoot_critical")]
    pub overshoot_critical_c: f64,

    #[serde(default = "default_undershoot_warning")]
    pub undershoot_warning_c: f64,

    #[serde(default = "default_undershoot_critical")]
    pub undershoot_critical_c: f64,

    /// |upper - lower| above this is an imbalance (warning only).
    #[serde(default = "default_zone_imbalance")]
    pub zone_imbalance_c: f64,

    /// Target for zones without a profile entry.
    #[serde(default = "default_target")]
    pub default_target_c: f64,

    #[serde(default = "default_ramp_rate")]
    pub ramp_rate_max_c_per_min: f64,

    #[serde(default = "default_blower_deviation")]
    pub blower_deviation_max_c: f64,
}

fn default_overshoot_warning() -> f64 { defaults::OVERSHOOT_WARNING_C }
fn default_overshoot_critical() -> f64 { defaults::OVERSHOOT_CRITICAL_C }
fn default_undershoot_warning() -> f64 { defaults::UNDERSHOOT_WARNING_C }
fn default_undershoot_critical() -> f64 { defaults::UNDERSHOOT_CRITICAL_C }
fn default_zone_imbalance() -> f64 { defaults::ZONE_IMBALANCE_C }
fn default_target() -> f64 { defaults::DEFAULT_ZONE_TARGET_C }
fn default_ramp_rate() -> f64 { defaults::RAMP_RATE_MAX_C_PER_MIN }
fn default_blower_deviation() -> f64 { defaults::BLOWER_DEVIATION_MAX_C }

impl Default for TemperatureThresholds {
    fn default() -> Self {
        Self {
            overshoot_warning_c: default_overshoot_warning(),
            overshoot_critical_c: default_overshoot_critical(),
            undershoot_warning_c: default_undershoot_warning(),
            undershoot_critical_c: default_undershoot_critical(),
            zone_imbalance_c: default_zone_imbalance(),
            default_target_c: default_target(),
            ramp_rate_max_c_per_min: default_ramp_rate(),
            blower_deviation_max_c: default_blower_deviation(),
        }
    }
}

// ============================================================================
// Idle Period Thresholds
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdleThresholds {
    /// Idle runs shorter than this are not reported (minutes).
    #[serde(default = "default_idle_min_duration")]
    pub min_duration_minutes: f64,

    #[serde(default = "default_idle_warning")]
    pub warning_minutes: f64,

    #[serde(default = "default_idle_critical")]
    pub critical_minutes: f64,

    /// Share of idle energy recoverable through standby.
    #[serde(default = "default_recoverable_fraction")]
    pub recoverable_fraction: f64,
}

fn default_idle_min_duration() -> f64 { defaults::IDLE_MIN_DURATION_MINUTES }
fn default_idle_warning() -> f64 { defaults::IDLE_WARNING_MINUTES }
fn default_idle_critical() -> f64 { defaults::IDLE_CRITICAL_MINUTES }
fn default_recoverable_fraction() -> f64 { defaults::IDLE_RECOVERABLE_FRACTION }

impl Default for IdleThresholds {
    fn default() -> Self {
        Self {
            min_duration_minutes: default_idle_min_duration(),
            warning_minutes: default_idle_warning(),
            critical_minutes: default_idle_critical(),
            recoverable_fraction: default_recoverable_fraction(),
        }
    }
}

// ============================================================================
// Production Thresholds
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionThresholds {
    #[serde(default = "default_target_kwh_per_board")]
    pub target_kwh_per_board: f64,

    #[serde(default = "default_optimal_percent")]
    pub optimal_percent: f64,

    #[serde(default = "default_acceptable_percent")]
    pub acceptable_percent: f64,
}

fn default_target_kwh_per_board() -> f64 { defaults::TARGET_KWH_PER_BOARD }
fn default_optimal_percent() -> f64 { defaults::EFFICIENCY_OPTIMAL_PERCENT }
fn default_acceptable_percent() -> f64 { defaults::EFFICIENCY_ACCEPTABLE_PERCENT }

impl Default for ProductionThresholds {
    fn default() -> Self {
        Self {
            target_kwh_per_board: default_target_kwh_per_board(),
            optimal_percent: default_optimal_percent(),
            acceptable_percent: default_acceptable_percent(),
        }
    }
}

// ============================================================================
// Cost
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostConfig {
    #[serde(default = "default_energy_cost")]
    pub energy_cost_per_kwh: f64,

    /// Hours a single-reading finding is assumed to last.
    #[serde(default = "default_assumed_hours")]
    pub assumed_finding_hours: f64,

    /// Heater load per degree of overshoot (kW/°C).
    #[serde(default = "default_kw_per_degree")]
    pub kw_per_degree_overshoot: f64,
}

fn default_energy_cost() -> f64 { defaults::ENERGY_COST_PER_KWH }
fn default_assumed_hours() -> f64 { defaults::ASSUMED_FINDING_HOURS }
fn default_kw_per_degree() -> f64 { defaults::KW_PER_DEGREE_OVERSHOOT }

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            energy_cost_per_kwh: default_energy_cost(),
            assumed_finding_hours: default_assumed_hours(),
            kw_per_degree_overshoot: default_kw_per_degree(),
        }
    }
}

// ============================================================================
// Recommendation Gates
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationConfig {
    #[serde(default = "default_idle_waste_gate")]
    pub idle_waste_min_kwh: f64,

    /// Share of readings (0-1) with low power factor before recommending correction.
    #[serde(default = "default_low_pf_gate")]
    pub low_pf_reading_fraction: f64,

    #[serde(default = "default_temperature_waste_gate")]
    pub temperature_waste_min_kwh: f64,
}

fn default_idle_waste_gate() -> f64 { defaults::RECOMMEND_IDLE_WASTE_MIN_KWH }
fn default_low_pf_gate() -> f64 { defaults::RECOMMEND_LOW_PF_FRACTION }
fn default_temperature_waste_gate() -> f64 { defaults::RECOMMEND_TEMPERATURE_WASTE_MIN_KWH }

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            idle_waste_min_kwh: default_idle_waste_gate(),
            low_pf_reading_fraction: default_low_pf_gate(),
            temperature_waste_min_kwh: default_temperature_waste_gate(),
        }
    }
}

// ============================================================================
// Analysis
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Bucket size for interval statistics (minutes).
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u32,

    /// Window for standalone efficiency queries (minutes).
    #[serde(default = "default_efficiency_window")]
    pub efficiency_window_minutes: f64,
}

fn default_interval_minutes() -> u32 { defaults::INTERVAL_MINUTES }
fn default_efficiency_window() -> f64 { defaults::EFFICIENCY_WINDOW_MINUTES }

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
            efficiency_window_minutes: default_efficiency_window(),
        }
    }
}

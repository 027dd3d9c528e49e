//! System-wide default constants.
//!
//! Policy values behind every `ReflowConfig` default. Grouped by rule family
//! for easy discovery; operators override them in `reflow_config.toml`.

use crate::types::ZoneId;

// ============================================================================
// Power
// ============================================================================

/// Highest acceptable active power while idle (kW).
pub const IDLE_POWER_MAX_KW: f64 = 15.0;

/// Idle power above `IDLE_POWER_MAX_KW * this` is critical.
pub const IDLE_POWER_CRITICAL_MULTIPLIER: f64 = 1.5;

/// Power an oven in proper standby should draw (kW). Idle savings are
/// estimated against this floor.
pub const STANDBY_POWER_MAX_KW: f64 = 5.0;

// ============================================================================
// Power Factor
// ============================================================================

/// Power factor below this raises a warning.
pub const POWER_FACTOR_WARNING: f64 = 0.90;

/// Power factor below this is critical.
pub const POWER_FACTOR_CRITICAL: f64 = 0.85;

/// Power factor a correction bank is expected to reach.
pub const POWER_FACTOR_TARGET: f64 = 0.95;

// ============================================================================
// Temperature
// ============================================================================

/// Zone average above `target + this` is an overshoot (°C).
pub const OVERSHOOT_WARNING_C: f64 = 10.0;

/// Overshoot beyond this is critical (°C).
pub const OVERSHOOT_CRITICAL_C: f64 = 20.0;

/// Zone average below `target - this` during production is an undershoot (°C).
pub const UNDERSHOOT_WARNING_C: f64 = 10.0;

/// Undershoot beyond this is critical (°C).
pub const UNDERSHOOT_CRITICAL_C: f64 = 20.0;

/// Upper/lower heater difference above this is an imbalance (°C). One tier only.
pub const ZONE_IMBALANCE_C: f64 = 15.0;

/// Target for zones missing from both the profile and per-call overrides (°C).
pub const DEFAULT_ZONE_TARGET_C: f64 = 180.0;

/// Fastest acceptable zone heating rate between consecutive readings (°C/min).
pub const RAMP_RATE_MAX_C_PER_MIN: f64 = 5.0;

/// Largest acceptable blower-to-heater temperature gap (°C).
pub const BLOWER_DEVIATION_MAX_C: f64 = 30.0;

/// Default lead-free reflow profile: preheat, soak, reflow peak, cooling entry.
pub const DEFAULT_ZONE_PROFILE: [(u8, f64); 10] = [
    (1, 150.0),
    (2, 160.0),
    (3, 170.0),
    (4, 180.0),
    (5, 190.0),
    (6, 200.0),
    (7, 220.0),
    (8, 240.0),
    (9, 245.0),
    (10, 230.0),
];

/// Default profile as a zone map.
pub fn default_zone_profile() -> std::collections::BTreeMap<ZoneId, f64> {
    DEFAULT_ZONE_PROFILE
        .iter()
        .map(|&(zone, temp)| (ZoneId(zone), temp))
        .collect()
}

// ============================================================================
// Idle Periods
// ============================================================================

/// Idle runs shorter than this are dropped (minutes).
pub const IDLE_MIN_DURATION_MINUTES: f64 = 1.0;

/// Idle runs longer than this are warnings (minutes).
pub const IDLE_WARNING_MINUTES: f64 = 15.0;

/// Idle runs longer than this are critical (minutes).
pub const IDLE_CRITICAL_MINUTES: f64 = 30.0;

/// Share of idle energy assumed recoverable by standby automation.
pub const IDLE_RECOVERABLE_FRACTION: f64 = 0.7;

// ============================================================================
// Production
// ============================================================================

/// Energy budget per soldered board (kWh).
pub const TARGET_KWH_PER_BOARD: f64 = 0.5;

/// Efficiency at or above this is optimal (%).
pub const EFFICIENCY_OPTIMAL_PERCENT: f64 = 90.0;

/// Efficiency at or above this is acceptable (%). Below is poor.
pub const EFFICIENCY_ACCEPTABLE_PERCENT: f64 = 70.0;

// ============================================================================
// Cost
// ============================================================================

/// Electricity tariff (currency per kWh).
pub const ENERGY_COST_PER_KWH: f64 = 0.12;

/// Duration a single-reading finding is assumed to persist (hours).
pub const ASSUMED_FINDING_HOURS: f64 = 1.0;

/// Extra heater load per degree of overshoot (kW/°C).
pub const KW_PER_DEGREE_OVERSHOOT: f64 = 0.05;

/// Currency label used in reports.
pub const CURRENCY: &str = "USD";

// ============================================================================
// Recommendation Gates
// ============================================================================

/// Idle waste must exceed this before the idle recommendation is emitted (kWh).
pub const RECOMMEND_IDLE_WASTE_MIN_KWH: f64 = 0.5;

/// Share of low-PF readings above which power-factor correction is recommended.
pub const RECOMMEND_LOW_PF_FRACTION: f64 = 0.10;

/// Temperature waste must exceed this before the setpoint recommendation (kWh).
pub const RECOMMEND_TEMPERATURE_WASTE_MIN_KWH: f64 = 0.5;

// ============================================================================
// Analysis
// ============================================================================

/// Default time bucket for interval statistics (minutes).
pub const INTERVAL_MINUTES: u32 = 15;

/// Default production-efficiency window (minutes).
pub const EFFICIENCY_WINDOW_MINUTES: f64 = 60.0;

//! Per-reading waste classification
//!
//! Every rule is evaluated independently; one reading can yield several
//! findings. Rules:
//!
//! | Category            | Fires when                                        |
//! |---------------------|---------------------------------------------------|
//! | `idle_power`        | idle and active power above the idle ceiling      |
//! | `power_factor`      | measured power factor below the warning floor     |
//! | `temp_overshoot`    | zone average above target + overshoot band        |
//! | `temp_undershoot`   | producing, zone average below target - band       |
//! | `zone_imbalance`    | upper/lower heater gap above limit (warning only) |
//! | `thermal_loss`      | blower air far from its heater (warning only)     |
//! | `ramp_inefficiency` | zone heating faster than allowed since previous   |
//!
//! `standby_duration` and `production_inefficiency` findings come from
//! [`idle_period_findings`] and [`efficiency_finding`], which render
//! segmenter and efficiency results in the same finding shape.

use std::collections::BTreeMap;

use crate::config::ReflowConfig;
use crate::types::{
    minutes_between, EfficiencyResult, EfficiencyStatus, IdlePeriod, Reading, Severity,
    WasteCategory, WasteFinding, ZoneId, ZoneReading,
};

// ============================================================================
// Analysis Context
// ============================================================================

/// Per-call overrides layered on top of the config.
#[derive(Debug, Clone, Default)]
pub struct AnalysisContext {
    /// Zone targets (°C) that win over `[zone_targets]`
    pub target_temps: BTreeMap<ZoneId, f64>,
}

impl AnalysisContext {
    pub fn with_target_temps(target_temps: BTreeMap<ZoneId, f64>) -> Self {
        Self { target_temps }
    }

    /// Target for a zone: call override, then configured profile, then the
    /// flat default.
    pub fn target_for(&self, zone: ZoneId, config: &ReflowConfig) -> f64 {
        self.target_temps
            .get(&zone)
            .copied()
            .unwrap_or_else(|| config.zone_target(zone))
    }
}

fn finding(
    category: WasteCategory,
    severity: Severity,
    message: String,
    value: f64,
    threshold: f64,
    potential_savings: f64,
) -> WasteFinding {
    WasteFinding {
        category,
        severity,
        message,
        value,
        threshold,
        deviation: value - threshold,
        potential_savings,
        zone: None,
    }
}

/// Cost of `kw` sustained for the assumed finding duration.
fn assumed_cost(kw: f64, config: &ReflowConfig) -> f64 {
    kw.max(0.0) * config.cost.assumed_finding_hours * config.cost.energy_cost_per_kwh
}

// ============================================================================
// Reading-Level Rules
// ============================================================================

fn check_idle_power(current: &Reading, config: &ReflowConfig) -> Option<WasteFinding> {
    let power = &config.thresholds.power;
    let active = current.energy.active_power_kw;
    if !current.is_idle() || active <= power.idle_power_max_kw {
        return None;
    }

    let severity = if active > power.idle_power_max_kw * power.critical_multiplier {
        Severity::Critical
    } else {
        Severity::Warning
    };
    Some(finding(
        WasteCategory::IdlePower,
        severity,
        format!(
            "Idle power {:.1} kW exceeds {:.1} kW while no boards are being processed",
            active, power.idle_power_max_kw
        ),
        active,
        power.idle_power_max_kw,
        assumed_cost(active - power.standby_power_max_kw, config),
    ))
}

/// Reactive leg of the power triangle (kvar).
fn reactive_at(active: f64, apparent: f64) -> f64 {
    (apparent.powi(2) - active.powi(2)).max(0.0).sqrt()
}

fn check_power_factor(current: &Reading, config: &ReflowConfig) -> Option<WasteFinding> {
    let pf_limits = &config.thresholds.power_factor;
    let pf = current.energy.power_factor;
    // Zero means the meter did not report a power factor
    if pf <= 0.0 || pf >= pf_limits.warning_min {
        return None;
    }

    let severity = if pf < pf_limits.critical_min {
        Severity::Critical
    } else {
        Severity::Warning
    };

    let active = current.energy.active_power_kw.max(0.0);
    let apparent = if current.energy.apparent_power_kva > 0.0 {
        current.energy.apparent_power_kva
    } else {
        active / pf
    };
    let excess_kvar = reactive_at(active, apparent) - reactive_at(active, active / pf_limits.target);

    Some(finding(
        WasteCategory::PowerFactor,
        severity,
        format!(
            "Power factor {:.2} below {:.2}, {:.1} kvar above corrected level",
            pf,
            pf_limits.warning_min,
            excess_kvar.max(0.0)
        ),
        pf,
        pf_limits.warning_min,
        assumed_cost(excess_kvar, config),
    ))
}

// ============================================================================
// Zone-Level Rules
// ============================================================================

fn check_zone(
    current: &Reading,
    previous: Option<&Reading>,
    zone_id: ZoneId,
    zone: &ZoneReading,
    target: f64,
    config: &ReflowConfig,
) -> Vec<WasteFinding> {
    let temp = &config.thresholds.temperature;
    let mut findings = Vec::new();
    let avg = zone.avg_temp();

    let overshoot = avg - target;
    if overshoot > temp.overshoot_warning_c {
        let severity = if overshoot > temp.overshoot_critical_c {
            Severity::Critical
        } else {
            Severity::Warning
        };
        findings.push(finding(
            WasteCategory::TempOvershoot,
            severity,
            format!("{zone_id} at {avg:.1} °C, {overshoot:.1} °C above target {target:.0} °C"),
            avg,
            target,
            assumed_cost(overshoot * config.cost.kw_per_degree_overshoot, config),
        ));
    }

    let shortfall = target - avg;
    if current.is_producing() && shortfall > temp.undershoot_warning_c {
        let severity = if shortfall > temp.undershoot_critical_c {
            Severity::Critical
        } else {
            Severity::Warning
        };
        findings.push(finding(
            WasteCategory::TempUndershoot,
            severity,
            format!("{zone_id} at {avg:.1} °C during production, {shortfall:.1} °C below target {target:.0} °C"),
            avg,
            target,
            0.0,
        ));
    }

    if zone.delta() > temp.zone_imbalance_c {
        findings.push(finding(
            WasteCategory::ZoneImbalance,
            Severity::Warning,
            format!(
                "{zone_id} upper/lower heaters differ by {:.1} °C (limit {:.0} °C)",
                zone.delta(),
                temp.zone_imbalance_c
            ),
            zone.delta(),
            temp.zone_imbalance_c,
            0.0,
        ));
    }

    // Blower probes that read zero were not exported
    let blower_gap = [
        (zone.blower_upper_temp_c(), zone.upper_temp_c()),
        (zone.blower_lower_temp_c(), zone.lower_temp_c()),
    ]
    .into_iter()
    .filter(|(blower, _)| *blower > 0.0)
    .map(|(blower, heater)| (blower - heater).abs())
    .fold(None, |acc: Option<f64>, gap| Some(acc.map_or(gap, |a| a.max(gap))));
    if let Some(gap) = blower_gap.filter(|g| *g > temp.blower_deviation_max_c) {
        findings.push(finding(
            WasteCategory::ThermalLoss,
            Severity::Warning,
            format!("{zone_id} blower air deviates {gap:.1} °C from its heater"),
            gap,
            temp.blower_deviation_max_c,
            assumed_cost(
                (gap - temp.blower_deviation_max_c) * config.cost.kw_per_degree_overshoot,
                config,
            ),
        ));
    }

    if let Some((prev_zone, elapsed)) = previous.and_then(|prev| {
        let elapsed = minutes_between(prev.timestamp, current.timestamp);
        prev.zone(zone_id).filter(|_| elapsed > 0.0).map(|z| (z, elapsed))
    }) {
        let rate = (avg - prev_zone.avg_temp()) / elapsed;
        if rate > temp.ramp_rate_max_c_per_min {
            let severity = if rate > 2.0 * temp.ramp_rate_max_c_per_min {
                Severity::Critical
            } else {
                Severity::Warning
            };
            findings.push(finding(
                WasteCategory::RampInefficiency,
                severity,
                format!(
                    "{zone_id} heating at {rate:.1} °C/min (limit {:.1} °C/min)",
                    temp.ramp_rate_max_c_per_min
                ),
                rate,
                temp.ramp_rate_max_c_per_min,
                0.0,
            ));
        }
    }

    for f in &mut findings {
        f.zone = Some(zone_id);
    }
    findings
}

// ============================================================================
// Entry Points
// ============================================================================

/// Classify one reading. Neither reading is modified.
///
/// `previous` enables rate rules; without it they are skipped.
pub fn analyze_data_point(
    current: &Reading,
    previous: Option<&Reading>,
    context: &AnalysisContext,
    config: &ReflowConfig,
) -> Vec<WasteFinding> {
    let mut findings: Vec<WasteFinding> = check_idle_power(current, config)
        .into_iter()
        .chain(check_power_factor(current, config))
        .collect();

    for (&zone_id, zone) in &current.zones {
        let target = context.target_for(zone_id, config);
        findings.extend(check_zone(current, previous, zone_id, zone, target, config));
    }
    findings
}

/// Classify every reading, each paired with its predecessor.
pub fn analyze_readings(
    readings: &[Reading],
    context: &AnalysisContext,
    config: &ReflowConfig,
) -> Vec<WasteFinding> {
    let findings: Vec<WasteFinding> = readings
        .iter()
        .enumerate()
        .flat_map(|(idx, current)| {
            let previous = idx.checked_sub(1).map(|p| &readings[p]);
            analyze_data_point(current, previous, context, config)
        })
        .collect();
    tracing::debug!(readings = readings.len(), findings = findings.len(), "Readings classified");
    findings
}

/// Render idle periods as `standby_duration` findings.
pub fn idle_period_findings(periods: &[IdlePeriod], config: &ReflowConfig) -> Vec<WasteFinding> {
    let warning_minutes = config.thresholds.idle.warning_minutes;
    periods
        .iter()
        .map(|p| {
            finding(
                WasteCategory::StandbyDuration,
                p.severity,
                format!(
                    "Idle for {:.0} min from {} at {:.1} kW average ({:.2} kWh)",
                    p.duration_minutes,
                    p.start_time.format("%Y-%m-%d %H:%M"),
                    p.avg_power_kw,
                    p.energy_wasted_kwh
                ),
                p.duration_minutes,
                warning_minutes,
                p.potential_savings_kwh * config.cost.energy_cost_per_kwh,
            )
        })
        .collect()
}

/// `production_inefficiency` finding for a poor efficiency result.
pub fn efficiency_finding(result: &EfficiencyResult, config: &ReflowConfig) -> Option<WasteFinding> {
    if result.status != EfficiencyStatus::Poor {
        return None;
    }
    let actual = result.kwh_per_board?;
    let excess_kwh = (actual - result.target_kwh_per_board).max(0.0) * result.boards_produced as f64;
    Some(finding(
        WasteCategory::ProductionInefficiency,
        Severity::Warning,
        format!(
            "{:.2} kWh per board against a {:.2} kWh target ({:.0}% efficiency)",
            actual, result.target_kwh_per_board, result.efficiency
        ),
        actual,
        result.target_kwh_per_board,
        excess_kwh * config.cost.energy_cost_per_kwh,
    ))
}

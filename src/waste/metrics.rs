//! Waste accumulation across a reading sequence
//!
//! Each reading's values are held until the next reading (left rectangle
//! rule), so waste is integrated over consecutive-pair time steps. The last
//! reading contributes to counts but not to energy.

use crate::aggregation::counter_delta;
use crate::config::ReflowConfig;
use crate::types::{minutes_between, Reading, WasteMetrics};

use super::classifier::AnalysisContext;

fn has_low_power_factor(reading: &Reading, config: &ReflowConfig) -> bool {
    let pf = reading.energy.power_factor;
    pf > 0.0 && pf < config.thresholds.power_factor.warning_min
}

/// Sum of zone overshoot (°C) over zones past the overshoot warning band.
fn flagged_overshoot(reading: &Reading, context: &AnalysisContext, config: &ReflowConfig) -> f64 {
    let band = config.thresholds.temperature.overshoot_warning_c;
    reading
        .zones
        .iter()
        .map(|(&id, zone)| zone.avg_temp() - context.target_for(id, config))
        .filter(|overshoot| *overshoot > band)
        .sum()
}

/// Idle, power-factor and temperature waste over the whole sequence.
///
/// Total energy is the cumulative counter delta; when the counter did not
/// advance (missing column or reset) it falls back to integrated active
/// power. `waste_percentage` is zero when no energy was consumed.
pub fn calculate_waste_metrics(
    readings: &[Reading],
    context: &AnalysisContext,
    config: &ReflowConfig,
) -> WasteMetrics {
    let standby_kw = config.thresholds.power.standby_power_max_kw;
    let target_pf = config.thresholds.power_factor.target;
    let kw_per_degree = config.cost.kw_per_degree_overshoot;

    let mut metrics = WasteMetrics {
        total_readings: readings.len(),
        idle_readings: readings.iter().filter(|r| r.is_idle()).count(),
        low_pf_readings: readings.iter().filter(|r| has_low_power_factor(r, config)).count(),
        overshoot_readings: readings
            .iter()
            .filter(|r| flagged_overshoot(r, context, config) > 0.0)
            .count(),
        ..Default::default()
    };

    let mut integrated_kwh = 0.0;
    for pair in readings.windows(2) {
        let (reading, next) = (&pair[0], &pair[1]);
        let hours = minutes_between(reading.timestamp, next.timestamp) / 60.0;
        if hours <= 0.0 {
            continue;
        }
        let active = reading.energy.active_power_kw.max(0.0);
        integrated_kwh += active * hours;

        if reading.is_idle() && active > standby_kw {
            metrics.idle_energy_waste_kwh += (active - standby_kw) * hours;
        }
        if has_low_power_factor(reading, config) {
            let pf = reading.energy.power_factor;
            metrics.power_factor_waste_kwh += (active / pf - active / target_pf).max(0.0) * hours;
        }
        metrics.temperature_waste_kwh +=
            flagged_overshoot(reading, context, config) * kw_per_degree * hours;
    }

    metrics.total_energy_kwh = match (readings.first(), readings.last()) {
        (Some(first), Some(last)) => {
            let metered = counter_delta(
                first.energy.cumulative_energy_kwh,
                last.energy.cumulative_energy_kwh,
            );
            if metered > 0.0 {
                metered
            } else {
                integrated_kwh
            }
        }
        _ => 0.0,
    };

    metrics.total_waste_kwh =
        metrics.idle_energy_waste_kwh + metrics.power_factor_waste_kwh + metrics.temperature_waste_kwh;
    metrics.waste_percentage = if metrics.total_energy_kwh > 0.0 {
        metrics.total_waste_kwh / metrics.total_energy_kwh * 100.0
    } else {
        0.0
    };
    metrics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EnergyBlock, EquipmentStatus, OperationalBlock, ZoneId, ZoneReading};
    use chrono::{TimeDelta, TimeZone, Utc};
    use std::collections::BTreeMap;

    fn reading(minute: i64, cumulative: f64, power: f64, pf: f64, idle: bool) -> Reading {
        Reading {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 5, 6, 0, 0).unwrap() + TimeDelta::minutes(minute),
            energy: EnergyBlock {
                cumulative_energy_kwh: cumulative,
                active_power_kw: power,
                power_factor: pf,
                ..Default::default()
            },
            operational: OperationalBlock {
                status: if idle { EquipmentStatus::Idle } else { EquipmentStatus::Operating },
                boards_inside: if idle { 0 } else { 3 },
                ..Default::default()
            },
            zones: BTreeMap::new(),
        }
    }

    #[test]
    fn test_idle_waste_above_standby() {
        let readings = vec![
            reading(0, 100.0, 17.0, 0.95, true),
            reading(30, 108.5, 17.0, 0.95, true),
            reading(60, 117.0, 17.0, 0.95, true),
        ];
        let m = calculate_waste_metrics(&readings, &AnalysisContext::default(), &ReflowConfig::default());
        // (17 - 5) kW for one hour
        assert!((m.idle_energy_waste_kwh - 12.0).abs() < 1e-9);
        assert_eq!(m.total_energy_kwh, 17.0);
        assert!((m.waste_percentage - 12.0 / 17.0 * 100.0).abs() < 1e-9);
        assert_eq!(m.idle_readings, 3);
        assert_eq!(m.power_factor_waste_kwh, 0.0);
    }

    #[test]
    fn test_power_factor_waste() {
        let readings = vec![reading(0, 0.0, 19.0, 0.80, false), reading(60, 19.0, 19.0, 0.80, false)];
        let m = calculate_waste_metrics(&readings, &AnalysisContext::default(), &ReflowConfig::default());
        let expected = 19.0 / 0.80 - 19.0 / 0.95;
        assert!((m.power_factor_waste_kwh - expected).abs() < 1e-9);
        assert_eq!(m.low_pf_readings, 2);
        assert_eq!(m.idle_energy_waste_kwh, 0.0);
    }

    #[test]
    fn test_temperature_waste_only_past_band() {
        let mut readings = vec![reading(0, 0.0, 30.0, 0.95, false), reading(60, 30.0, 30.0, 0.95, false)];
        readings[0].zones.insert(ZoneId(1), ZoneReading::new(175.0, 175.0, 0.0, 0.0));
        readings[0].zones.insert(ZoneId(2), ZoneReading::new(165.0, 165.0, 0.0, 0.0));
        let m = calculate_waste_metrics(&readings, &AnalysisContext::default(), &ReflowConfig::default());
        // zone1 is 25 °C over its 150 °C target; zone2 only 5 °C over
        assert!((m.temperature_waste_kwh - 25.0 * 0.05).abs() < 1e-9);
        assert_eq!(m.overshoot_readings, 1);
    }

    #[test]
    fn test_integrated_energy_fallback_and_empty() {
        let readings = vec![reading(0, 0.0, 12.0, 0.95, false), reading(30, 0.0, 12.0, 0.95, false)];
        let m = calculate_waste_metrics(&readings, &AnalysisContext::default(), &ReflowConfig::default());
        assert!((m.total_energy_kwh - 6.0).abs() < 1e-9);

        let empty = calculate_waste_metrics(&[], &AnalysisContext::default(), &ReflowConfig::default());
        assert_eq!(empty.total_energy_kwh, 0.0);
        assert_eq!(empty.waste_percentage, 0.0);
    }
}

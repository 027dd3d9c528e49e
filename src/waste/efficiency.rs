//! Production efficiency: energy per board over a trailing window

use crate::aggregation::{count_delta, counter_delta};
use crate::config::ReflowConfig;
use crate::types::{EfficiencyResult, EfficiencyStatus, Reading};

/// Readings within `window_minutes` of the last reading.
///
/// A non-positive or non-finite window keeps the whole slice, as does one
/// reaching back past the earliest representable instant.
fn trailing_window(readings: &[Reading], window_minutes: f64) -> &[Reading] {
    let Some(last) = readings.last() else {
        return readings;
    };
    if !(window_minutes.is_finite() && window_minutes > 0.0) {
        return readings;
    }
    let window_ms = (window_minutes * 60_000.0).round() as i64;
    let Some(cutoff) = chrono::TimeDelta::try_milliseconds(window_ms)
        .and_then(|window| last.timestamp.checked_sub_signed(window))
    else {
        return readings;
    };
    let start = readings.partition_point(|r| r.timestamp < cutoff);
    &readings[start..]
}

/// Efficiency tier from percent of target.
pub fn efficiency_status(efficiency: f64, config: &ReflowConfig) -> EfficiencyStatus {
    let prod = &config.thresholds.production;
    if efficiency >= prod.optimal_percent {
        EfficiencyStatus::Optimal
    } else if efficiency >= prod.acceptable_percent {
        EfficiencyStatus::Acceptable
    } else {
        EfficiencyStatus::Poor
    }
}

/// Energy per board over the trailing `window_minutes`.
///
/// `None` when fewer than two readings fall in the window. A window in
/// which the board counter did not advance reports `NoProduction` with
/// zero efficiency instead of dividing by zero. Efficiency is capped at
/// 100 % when actual consumption beats the target.
pub fn analyze_production_efficiency(
    readings: &[Reading],
    window_minutes: f64,
    config: &ReflowConfig,
) -> Option<EfficiencyResult> {
    let window = trailing_window(readings, window_minutes);
    if window.len() < 2 {
        return None;
    }
    let first = window.first()?;
    let last = window.last()?;

    let energy_consumed_kwh = counter_delta(
        first.energy.cumulative_energy_kwh,
        last.energy.cumulative_energy_kwh,
    );
    let boards_produced = count_delta(
        first.operational.boards_produced,
        last.operational.boards_produced,
    );
    let target_kwh_per_board = config.thresholds.production.target_kwh_per_board;

    if boards_produced == 0 {
        return Some(EfficiencyResult {
            status: EfficiencyStatus::NoProduction,
            window_minutes,
            energy_consumed_kwh,
            boards_produced,
            kwh_per_board: None,
            target_kwh_per_board,
            efficiency: 0.0,
        });
    }

    let kwh_per_board = energy_consumed_kwh / boards_produced as f64;
    let efficiency = if kwh_per_board > 0.0 {
        (target_kwh_per_board / kwh_per_board * 100.0).min(100.0)
    } else {
        100.0
    };

    Some(EfficiencyResult {
        status: efficiency_status(efficiency, config),
        window_minutes,
        energy_consumed_kwh,
        boards_produced,
        kwh_per_board: Some(kwh_per_board),
        target_kwh_per_board,
        efficiency,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EnergyBlock, OperationalBlock};
    use chrono::{TimeDelta, TimeZone, Utc};
    use std::collections::BTreeMap;

    fn reading(minute: i64, cumulative: f64, produced: u64) -> Reading {
        Reading {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 5, 9, 0, 0).unwrap() + TimeDelta::minutes(minute),
            energy: EnergyBlock {
                cumulative_energy_kwh: cumulative,
                ..Default::default()
            },
            operational: OperationalBlock {
                boards_produced: produced,
                ..Default::default()
            },
            zones: BTreeMap::new(),
        }
    }

    #[test]
    fn test_energy_per_board_pair() {
        let readings = vec![reading(0, 100.0, 10), reading(30, 150.0, 20)];
        let result = analyze_production_efficiency(&readings, 60.0, &ReflowConfig::default()).unwrap();
        assert_eq!(result.kwh_per_board, Some(5.0));
        assert_eq!(result.energy_consumed_kwh, 50.0);
        assert_eq!(result.boards_produced, 10);
        assert!((result.efficiency - 10.0).abs() < 1e-9);
        assert_eq!(result.status, EfficiencyStatus::Poor);
    }

    #[test]
    fn test_under_two_readings_is_none() {
        let config = ReflowConfig::default();
        assert!(analyze_production_efficiency(&[], 60.0, &config).is_none());
        assert!(analyze_production_efficiency(&[reading(0, 1.0, 1)], 60.0, &config).is_none());
    }

    #[test]
    fn test_no_production() {
        let readings = vec![reading(0, 100.0, 10), reading(10, 104.0, 10)];
        let result = analyze_production_efficiency(&readings, 60.0, &ReflowConfig::default()).unwrap();
        assert_eq!(result.status, EfficiencyStatus::NoProduction);
        assert_eq!(result.efficiency, 0.0);
        assert_eq!(result.kwh_per_board, None);
    }

    #[test]
    fn test_efficiency_capped_at_100() {
        let readings = vec![reading(0, 100.0, 0), reading(10, 101.0, 100)];
        let result = analyze_production_efficiency(&readings, 60.0, &ReflowConfig::default()).unwrap();
        assert_eq!(result.efficiency, 100.0);
        assert_eq!(result.status, EfficiencyStatus::Optimal);
    }

    #[test]
    fn test_window_drops_old_readings() {
        let readings = vec![
            reading(0, 0.0, 0),
            reading(100, 50.0, 50),
            reading(120, 60.0, 80),
        ];
        let result = analyze_production_efficiency(&readings, 60.0, &ReflowConfig::default()).unwrap();
        assert_eq!(result.boards_produced, 30);
        assert_eq!(result.energy_consumed_kwh, 10.0);

        // Only the last reading lies inside a 5 minute window
        assert!(analyze_production_efficiency(&readings, 5.0, &ReflowConfig::default()).is_none());
    }

    #[test]
    fn test_window_beyond_calendar_range_keeps_all_readings() {
        let readings = vec![reading(0, 100.0, 10), reading(30, 150.0, 20)];
        let config = ReflowConfig::default();
        for window in [1e12, 1e300] {
            let result = analyze_production_efficiency(&readings, window, &config).unwrap();
            assert_eq!(result.boards_produced, 10);
            assert_eq!(result.kwh_per_board, Some(5.0));
        }
    }

    #[test]
    fn test_status_tiers() {
        let config = ReflowConfig::default();
        assert_eq!(efficiency_status(90.0, &config), EfficiencyStatus::Optimal);
        assert_eq!(efficiency_status(70.0, &config), EfficiencyStatus::Acceptable);
        assert_eq!(efficiency_status(69.9, &config), EfficiencyStatus::Poor);
    }
}

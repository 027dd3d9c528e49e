//! Phase segmentation: production/idle phases and idle periods
//!
//! Two single forward passes over a time-ordered reading slice:
//!
//! - [`identify_production_phases`] partitions the whole slice into
//!   alternating production and idle phases. Classification is
//!   [`Reading::is_producing`].
//! - [`detect_idle_periods`] finds runs of [`Reading::is_idle`] readings
//!   lasting at least the configured minimum and estimates their waste.
//!
//! The two predicates overlap (an `Operating` oven with an empty conveyor
//! is producing for phases and idle for idle periods), so idle periods are
//! not a subset of idle phases.

use statrs::statistics::Statistics;

use crate::config::ReflowConfig;
use crate::types::{minutes_between, IdlePeriod, Phase, PhaseKind, Reading, Severity};

// ============================================================================
// Production Phases
// ============================================================================

fn phase_kind(reading: &Reading) -> PhaseKind {
    if reading.is_producing() {
        PhaseKind::Production
    } else {
        PhaseKind::Idle
    }
}

fn close_phase(readings: &[Reading], kind: PhaseKind, start: usize, end: usize) -> Phase<'_> {
    let start_time = readings[start].timestamp;
    let end_time = readings[end].timestamp;
    Phase {
        kind,
        start_index: start,
        end_index: end,
        start_time,
        end_time,
        duration_minutes: minutes_between(start_time, end_time),
        readings: &readings[start..=end],
    }
}

/// Partition readings into contiguous phases of alternating kind.
///
/// A phase ends at its last member reading; the next phase starts at the
/// following index. An empty input yields no phases.
pub fn identify_production_phases(readings: &[Reading]) -> Vec<Phase<'_>> {
    let Some(first) = readings.first() else {
        return Vec::new();
    };

    let mut phases = Vec::new();
    let mut kind = phase_kind(first);
    let mut start = 0usize;

    for (idx, reading) in readings.iter().enumerate().skip(1) {
        let next = phase_kind(reading);
        if next != kind {
            phases.push(close_phase(readings, kind, start, idx - 1));
            kind = next;
            start = idx;
        }
    }
    phases.push(close_phase(readings, kind, start, readings.len() - 1));

    tracing::debug!(readings = readings.len(), phases = phases.len(), "Production phases identified");
    phases
}

// ============================================================================
// Idle Periods
// ============================================================================

/// Severity from idle duration. Strict `>` on both tiers.
pub fn idle_severity(duration_minutes: f64, config: &ReflowConfig) -> Severity {
    let idle = &config.thresholds.idle;
    if duration_minutes > idle.critical_minutes {
        Severity::Critical
    } else if duration_minutes > idle.warning_minutes {
        Severity::Warning
    } else {
        Severity::Info
    }
}

fn build_idle_period(
    readings: &[Reading],
    start: usize,
    last_member: usize,
    end_time: chrono::DateTime<chrono::Utc>,
    config: &ReflowConfig,
) -> Option<IdlePeriod> {
    let start_time = readings[start].timestamp;
    let duration_minutes = minutes_between(start_time, end_time);
    if duration_minutes < config.thresholds.idle.min_duration_minutes {
        return None;
    }

    let avg_power_kw = Statistics::mean(
        readings[start..=last_member]
            .iter()
            .map(|r| r.energy.active_power_kw),
    );
    let energy_wasted_kwh = avg_power_kw * duration_minutes / 60.0;

    Some(IdlePeriod {
        start_index: start,
        end_index: last_member,
        start_time,
        end_time,
        duration_minutes,
        avg_power_kw,
        energy_wasted_kwh,
        severity: idle_severity(duration_minutes, config),
        potential_savings_kwh: energy_wasted_kwh * config.thresholds.idle.recoverable_fraction,
    })
}

/// Find idle runs of at least `thresholds.idle.min_duration_minutes`.
///
/// A run is timed from its first idle reading to the first reading that
/// ends it; a run still open at the end of input is timed to the last
/// reading. Shorter runs are dropped.
pub fn detect_idle_periods(readings: &[Reading], config: &ReflowConfig) -> Vec<IdlePeriod> {
    let mut periods = Vec::new();
    let mut run_start: Option<usize> = None;

    for (idx, reading) in readings.iter().enumerate() {
        match (reading.is_idle(), run_start) {
            (true, None) => run_start = Some(idx),
            (false, Some(start)) => {
                periods.extend(build_idle_period(
                    readings,
                    start,
                    idx - 1,
                    reading.timestamp,
                    config,
                ));
                run_start = None;
            }
            _ => {}
        }
    }
    if let (Some(start), Some(last)) = (run_start, readings.last()) {
        periods.extend(build_idle_period(
            readings,
            start,
            readings.len() - 1,
            last.timestamp,
            config,
        ));
    }

    tracing::debug!(
        readings = readings.len(),
        idle_periods = periods.len(),
        "Idle periods detected"
    );
    periods
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EnergyBlock, EquipmentStatus, OperationalBlock};
    use chrono::{TimeDelta, TimeZone, Utc};
    use std::collections::BTreeMap;

    /// One reading per minute: `(status, boards_inside, power_kw)`
    fn series(steps: &[(EquipmentStatus, u32, f64)]) -> Vec<Reading> {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 5, 8, 0, 0).unwrap();
        steps.iter()
            .enumerate()
            .map(|(i, &(status, boards_inside, power))| Reading {
                timestamp: t0 + TimeDelta::minutes(i as i64),
                energy: EnergyBlock {
                    active_power_kw: power,
                    ..Default::default()
                },
                operational: OperationalBlock {
                    status,
                    boards_inside,
                    ..Default::default()
                },
                zones: BTreeMap::new(),
            })
            .collect()
    }

    use EquipmentStatus::{Idle, Operating};

    #[test]
    fn test_running_status_with_empty_oven_is_idle() {
        let running = EquipmentStatus::from_raw("Running");
        let readings = series(&[
            (Operating, 4, 30.0),
            (running, 0, 20.0),
            (running, 0, 20.0),
            (running, 0, 20.0),
        ]);
        let phases = identify_production_phases(&readings);
        let kinds: Vec<PhaseKind> = phases.iter().map(|p| p.kind).collect();
        assert_eq!(kinds, vec![PhaseKind::Production, PhaseKind::Idle]);
        assert_eq!(phases[1].len(), 3);
        assert!(readings[1..].iter().all(Reading::is_idle));
    }

    #[test]
    fn test_phases_partition_input() {
        let readings = series(&[
            (Operating, 3, 30.0),
            (Operating, 2, 30.0),
            (Idle, 0, 12.0),
            (Idle, 0, 12.0),
            (Idle, 1, 12.0),
            (Idle, 0, 12.0),
        ]);
        let phases = identify_production_phases(&readings);
        let kinds: Vec<PhaseKind> = phases.iter().map(|p| p.kind).collect();
        assert_eq!(
            kinds,
            vec![PhaseKind::Production, PhaseKind::Idle, PhaseKind::Production, PhaseKind::Idle]
        );

        // Contiguous, non-overlapping, and rebuilding the input in order
        assert_eq!(phases[0].start_index, 0);
        for pair in phases.windows(2) {
            assert_eq!(pair[1].start_index, pair[0].end_index + 1);
            assert_ne!(pair[0].kind, pair[1].kind);
        }
        assert_eq!(phases.last().unwrap().end_index, readings.len() - 1);
        let rebuilt: Vec<&Reading> = phases.iter().flat_map(|p| p.readings.iter()).collect();
        assert_eq!(rebuilt.len(), readings.len());
        assert!(rebuilt.iter().zip(&readings).all(|(a, b)| std::ptr::eq(*a, b)));

        assert_eq!(phases[1].duration_minutes, 1.0);
        assert_eq!(phases[2].duration_minutes, 0.0);
    }

    #[test]
    fn test_phases_empty_and_single() {
        assert!(identify_production_phases(&[]).is_empty());
        let readings = series(&[(Idle, 0, 5.0)]);
        let phases = identify_production_phases(&readings);
        assert_eq!(phases.len(), 1);
        assert_eq!(phases[0].len(), 1);
    }

    #[test]
    fn test_idle_period_timed_to_next_reading() {
        let readings = series(&[
            (Operating, 2, 30.0),
            (Idle, 0, 10.0),
            (Idle, 0, 20.0),
            (Operating, 2, 30.0),
        ]);
        let periods = detect_idle_periods(&readings, &ReflowConfig::default());
        assert_eq!(periods.len(), 1);
        let p = &periods[0];
        assert_eq!((p.start_index, p.end_index), (1, 2));
        assert_eq!(p.duration_minutes, 2.0);
        assert_eq!(p.avg_power_kw, 15.0);
        assert!((p.energy_wasted_kwh - 0.5).abs() < 1e-9);
        assert!((p.potential_savings_kwh - 0.35).abs() < 1e-9);
        assert_eq!(p.severity, Severity::Info);
    }

    #[test]
    fn test_operating_with_empty_conveyor_counts_as_idle() {
        let readings = series(&[(Operating, 0, 14.0), (Operating, 0, 14.0), (Operating, 3, 30.0)]);
        let periods = detect_idle_periods(&readings, &ReflowConfig::default());
        assert_eq!(periods.len(), 1);
        assert_eq!(identify_production_phases(&readings).len(), 1);
    }

    #[test]
    fn test_short_idle_runs_dropped() {
        let mut readings = series(&[(Operating, 2, 30.0), (Idle, 0, 10.0), (Operating, 2, 30.0)]);
        // Idle reading lasts 30 s before production resumes
        readings[2].timestamp = readings[1].timestamp + TimeDelta::seconds(30);
        let periods = detect_idle_periods(&readings, &ReflowConfig::default());
        assert!(periods.is_empty());

        // Trailing single idle reading has zero duration
        let trailing = series(&[(Operating, 2, 30.0), (Idle, 0, 10.0)]);
        assert!(detect_idle_periods(&trailing, &ReflowConfig::default()).is_empty());
    }

    #[test]
    fn test_no_period_under_minimum() {
        let pattern = [Idle, Operating, Idle, Idle, Operating, Idle, Idle, Idle];
        let steps: Vec<_> = pattern
            .iter()
            .map(|&s| (s, if s == Operating { 2 } else { 0 }, 8.0))
            .collect();
        let periods = detect_idle_periods(&series(&steps), &ReflowConfig::default());
        assert!(!periods.is_empty());
        assert!(periods.iter().all(|p| p.duration_minutes >= 1.0));
    }

    #[test]
    fn test_idle_severity_tiers() {
        let config = ReflowConfig::default();
        assert_eq!(idle_severity(15.0, &config), Severity::Info);
        assert_eq!(idle_severity(15.5, &config), Severity::Warning);
        assert_eq!(idle_severity(30.0, &config), Severity::Warning);
        assert_eq!(idle_severity(31.0, &config), Severity::Critical);
    }

    #[test]
    fn test_trailing_idle_run_closed_at_last_reading() {
        let steps: Vec<_> = std::iter::once((Operating, 2, 30.0))
            .chain(std::iter::repeat((Idle, 0, 12.0)).take(41))
            .collect();
        let periods = detect_idle_periods(&series(&steps), &ReflowConfig::default());
        assert_eq!(periods.len(), 1);
        assert_eq!(periods[0].duration_minutes, 40.0);
        assert_eq!(periods[0].severity, Severity::Critical);
        assert_eq!(periods[0].end_index, 41);
    }
}

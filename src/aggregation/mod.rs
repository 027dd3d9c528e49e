//! Interval aggregation: fixed time buckets with per-bucket statistics
//!
//! Buckets are aligned within the hour: a reading at `hh:mm:ss` belongs to
//! the bucket starting at `hh:floor(mm / interval) * interval:00`. Intervals
//! longer than 60 minutes therefore collapse to hourly buckets.
//!
//! Input must already be ordered by timestamp; nothing here sorts.

use chrono::{DateTime, SecondsFormat, TimeDelta, Timelike, Utc};
use statrs::statistics::Statistics;
use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::types::{
    EnergyStats, IntervalStats, OperationalStats, Reading, ZoneId, ZoneStats,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("interval must be at least one minute (got {0})")]
    InvalidInterval(u32),
}

// ============================================================================
// Counter Deltas
// ============================================================================

/// Delta of a monotonic meter counter.
///
/// A decrease means the meter rolled over or was reset; the delta is
/// clamped to zero and logged instead of going negative.
pub fn counter_delta(first: f64, last: f64) -> f64 {
    let delta = last - first;
    if delta < 0.0 {
        tracing::warn!(first, last, "Energy counter decreased, treating delta as zero");
        0.0
    } else {
        delta
    }
}

/// Delta of the boards-produced counter, clamped like [`counter_delta`].
pub fn count_delta(first: u64, last: u64) -> u64 {
    last.checked_sub(first).unwrap_or_else(|| {
        tracing::warn!(first, last, "Board counter decreased, treating delta as zero");
        0
    })
}

// ============================================================================
// Bucketing
// ============================================================================

/// Start of the bucket containing `ts`.
pub fn bucket_start(ts: DateTime<Utc>, interval_minutes: u32) -> Result<DateTime<Utc>, AnalysisError> {
    if interval_minutes == 0 {
        return Err(AnalysisError::InvalidInterval(interval_minutes));
    }
    let into_bucket = TimeDelta::minutes(i64::from(ts.minute() % interval_minutes.min(60)))
        + TimeDelta::seconds(i64::from(ts.second()))
        + TimeDelta::nanoseconds(i64::from(ts.nanosecond()));
    Ok(ts - into_bucket)
}

/// ISO-8601 bucket key with millisecond precision, e.g. `2024-03-05T10:00:00.000Z`.
pub fn bucket_key(start: DateTime<Utc>) -> String {
    start.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Group readings into time buckets keyed by bucket start.
///
/// Each reading lands in exactly one bucket; within a bucket readings keep
/// their input order.
pub fn group_by_interval(
    readings: &[Reading],
    interval_minutes: u32,
) -> Result<BTreeMap<DateTime<Utc>, Vec<&Reading>>, AnalysisError> {
    let mut groups: BTreeMap<DateTime<Utc>, Vec<&Reading>> = BTreeMap::new();
    for reading in readings {
        let start = bucket_start(reading.timestamp, interval_minutes)?;
        groups.entry(start).or_default().push(reading);
    }
    Ok(groups)
}

// ============================================================================
// Group Statistics
// ============================================================================

/// Summary statistics for one group of readings, `None` for an empty group.
pub fn calculate_group_stats<R: Borrow<Reading>>(readings: &[R]) -> Option<IntervalStats> {
    let first = readings.first()?.borrow();
    let last = readings.last()?.borrow();

    let powers: Vec<f64> = readings.iter().map(|r| r.borrow().energy.active_power_kw).collect();
    let pfs: Vec<f64> = readings.iter().map(|r| r.borrow().energy.power_factor).collect();

    let energy = EnergyStats {
        total_consumed_kwh: counter_delta(
            first.energy.cumulative_energy_kwh,
            last.energy.cumulative_energy_kwh,
        ),
        avg_power_kw: Statistics::mean(&powers),
        max_power_kw: Statistics::max(&powers),
        min_power_kw: Statistics::min(&powers),
        avg_power_factor: Statistics::mean(&pfs),
    };

    let zone_ids: BTreeSet<ZoneId> = readings
        .iter()
        .flat_map(|r| r.borrow().zones.keys().copied())
        .collect();
    let zones = zone_ids
        .into_iter()
        .filter_map(|id| {
            let (temps, deltas): (Vec<f64>, Vec<f64>) = readings
                .iter()
                .filter_map(|r| r.borrow().zone(id))
                .map(|z| (z.avg_temp(), z.delta()))
                .unzip();
            if temps.is_empty() {
                return None;
            }
            let max_temp = Statistics::max(&temps);
            let min_temp = Statistics::min(&temps);
            Some((
                id,
                ZoneStats {
                    avg_temp: Statistics::mean(&temps),
                    max_temp,
                    min_temp,
                    avg_delta: Statistics::mean(&deltas),
                    temp_variance: max_temp - min_temp,
                },
            ))
        })
        .collect();

    let boards_inside: Vec<f64> = readings
        .iter()
        .map(|r| f64::from(r.borrow().operational.boards_inside))
        .collect();
    let o2: Vec<f64> = readings
        .iter()
        .map(|r| r.borrow().operational.o2_concentration)
        .collect();

    let operational = OperationalStats {
        avg_boards_inside: Statistics::mean(&boards_inside),
        total_boards_produced: count_delta(
            first.operational.boards_produced,
            last.operational.boards_produced,
        ),
        avg_o2: Statistics::mean(&o2),
        total_alarms: readings
            .iter()
            .map(|r| u64::from(r.borrow().operational.alarm_count))
            .sum(),
    };

    Some(IntervalStats {
        start: first.timestamp,
        end: last.timestamp,
        record_count: readings.len(),
        energy,
        zones,
        operational,
    })
}

/// Group and summarize in one call, keyed by bucket start.
pub fn aggregate_intervals(
    readings: &[Reading],
    interval_minutes: u32,
) -> Result<BTreeMap<DateTime<Utc>, IntervalStats>, AnalysisError> {
    let groups = group_by_interval(readings, interval_minutes)?;
    let stats: BTreeMap<_, _> = groups
        .into_iter()
        .filter_map(|(start, group)| calculate_group_stats(&group).map(|s| (start, s)))
        .collect();
    tracing::debug!(
        readings = readings.len(),
        buckets = stats.len(),
        interval_minutes,
        "Intervals aggregated"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EnergyBlock, OperationalBlock, ZoneReading};
    use chrono::TimeZone;

    fn reading_at(h: u32, m: u32, s: u32, cumulative: f64, power: f64) -> Reading {
        Reading {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 5, h, m, s).unwrap(),
            energy: EnergyBlock {
                cumulative_energy_kwh: cumulative,
                active_power_kw: power,
                power_factor: 0.9,
                ..Default::default()
            },
            operational: OperationalBlock::default(),
            zones: BTreeMap::new(),
        }
    }

    #[test]
    fn test_hour_bucket_truncates_minutes_and_seconds() {
        let readings = vec![reading_at(10, 45, 30, 0.0, 0.0)];
        let groups = group_by_interval(&readings, 60).unwrap();
        let key = *groups.keys().next().unwrap();
        assert_eq!(key, Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap());
        assert_eq!(bucket_key(key), "2024-03-05T10:00:00.000Z");
    }

    #[test]
    fn test_fifteen_minute_buckets_keep_input_order() {
        let readings = vec![
            reading_at(10, 0, 0, 0.0, 1.0),
            reading_at(10, 14, 59, 0.0, 2.0),
            reading_at(10, 15, 0, 0.0, 3.0),
            reading_at(10, 44, 0, 0.0, 4.0),
        ];
        let groups = group_by_interval(&readings, 15).unwrap();
        assert_eq!(groups.len(), 3);
        let first: Vec<f64> = groups.values().next().unwrap().iter().map(|r| r.energy.active_power_kw).collect();
        assert_eq!(first, vec![1.0, 2.0]);
        let total: usize = groups.values().map(Vec::len).sum();
        assert_eq!(total, readings.len(), "every reading lands in exactly one bucket");
    }

    #[test]
    fn test_sub_second_precision_zeroed() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 5, 10, 7, 12).unwrap() + TimeDelta::milliseconds(345);
        assert_eq!(
            bucket_start(ts, 5).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 5, 10, 5, 0).unwrap()
        );
    }

    #[test]
    fn test_zero_interval_rejected() {
        let readings = vec![reading_at(10, 0, 0, 0.0, 0.0)];
        assert_eq!(
            group_by_interval(&readings, 0).unwrap_err(),
            AnalysisError::InvalidInterval(0)
        );
    }

    #[test]
    fn test_empty_group_has_no_stats() {
        let empty: Vec<Reading> = Vec::new();
        assert!(calculate_group_stats(&empty).is_none());
    }

    #[test]
    fn test_group_stats() {
        let mut readings = vec![
            reading_at(10, 0, 0, 100.0, 10.0),
            reading_at(10, 1, 0, 101.0, 20.0),
            reading_at(10, 2, 0, 103.0, 30.0),
        ];
        for (r, (temp, alarms, produced)) in readings.iter_mut().zip([(180.0, 1, 5), (190.0, 0, 7), (200.0, 2, 9)]) {
            r.zones.insert(ZoneId(1), ZoneReading::new(temp + 2.0, temp - 2.0, 0.0, 0.0));
            r.operational.alarm_count = alarms;
            r.operational.boards_produced = produced;
        }
        let stats = calculate_group_stats(&readings).unwrap();
        assert_eq!(stats.record_count, 3);
        assert_eq!(stats.energy.total_consumed_kwh, 3.0);
        assert!((stats.energy.avg_power_kw - 20.0).abs() < 1e-9);
        assert_eq!(stats.energy.max_power_kw, 30.0);
        assert_eq!(stats.energy.min_power_kw, 10.0);
        let z1 = stats.zones[&ZoneId(1)];
        assert!((z1.avg_temp - 190.0).abs() < 1e-9);
        assert_eq!(z1.temp_variance, 20.0);
        assert_eq!(z1.avg_delta, 4.0);
        assert_eq!(stats.operational.total_alarms, 3);
        assert_eq!(stats.operational.total_boards_produced, 4);
        assert_eq!(stats.start, readings[0].timestamp);
        assert_eq!(stats.end, readings[2].timestamp);
    }

    #[test]
    fn test_counter_reset_clamps_to_zero() {
        let readings = vec![reading_at(10, 0, 0, 9_999.0, 10.0), reading_at(10, 1, 0, 2.0, 10.0)];
        let stats = calculate_group_stats(&readings).unwrap();
        assert_eq!(stats.energy.total_consumed_kwh, 0.0);
        assert_eq!(count_delta(10, 3), 0);
    }

    #[test]
    fn test_aggregate_intervals() {
        let readings = vec![
            reading_at(10, 0, 0, 0.0, 1.0),
            reading_at(10, 20, 0, 1.0, 1.0),
            reading_at(11, 5, 0, 2.0, 1.0),
        ];
        let stats = aggregate_intervals(&readings, 60).unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats.values().next().unwrap().record_count, 2);
    }
}

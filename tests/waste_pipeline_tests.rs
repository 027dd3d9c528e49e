//! End-to-end pipeline tests: logger export on disk through to the
//! summary report.

use std::fmt::Write as _;
use std::path::PathBuf;

use reflow_sentinel::acquisition::{load_readings, SourceOptions};
use reflow_sentinel::types::{EfficiencyStatus, PhaseKind, ReportPeriod, Severity, WasteCategory};
use reflow_sentinel::{
    aggregate_intervals, analyze_readings, detect_idle_periods, generate_waste_summary,
    identify_production_phases, AnalysisContext, ReflowConfig, ZoneId,
};

/// Two-hour shift, one row per minute:
/// - 08:00-08:59 production, 4 boards per minute, 30 kW
/// - 09:00-09:44 idle at 20 kW, PF 0.82, zone 3 overshooting
/// - 09:45-10:00 production again
fn shift_csv() -> String {
    let mut csv = String::from(
        "Timestamp,Cumulative Energy (kWh),Active Power (kW),Power Factor,Status,\
         Boards Inside,Boards Produced,zone1_upper_temp_c,zone1_lower_temp_c,\
         zone3_upper_temp_c,zone3_lower_temp_c\n",
    );
    let mut energy = 500.0;
    let mut produced = 1_000u64;
    for minute in 0..=120u32 {
        let idle = (60..105).contains(&minute);
        let (power, pf, status, inside, zone3) = if idle {
            (20.0, 0.82, "Idle", 0, 195.0)
        } else {
            (30.0, 0.96, "Operating", 6, 171.0)
        };
        let _ = writeln!(
            csv,
            "2024-03-05 {:02}:{:02}:00,{energy:.3},{power},{pf},{status},{inside},{produced},151,149,{zone3},{zone3}",
            8 + minute / 60,
            minute % 60,
        );
        energy += power / 60.0;
        if !idle {
            produced += 4;
        }
    }
    csv
}

fn write_export(contents: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("line3.csv");
    std::fs::write(&path, contents).unwrap();
    (dir, path)
}

#[test]
fn export_loads_with_zones_and_range() {
    let (_dir, path) = write_export(&shift_csv());
    let loaded = load_readings(&path, &SourceOptions::default()).unwrap();
    assert_eq!(loaded.readings.len(), 121);
    assert_eq!(loaded.info.skipped_records, 0);
    assert_eq!(loaded.info.zones, vec![ZoneId(1), ZoneId(3)]);
    assert!(loaded.readings[0].zone(ZoneId(1)).is_some_and(|z| z.avg_temp() == 150.0));
}

#[test]
fn phases_and_idle_periods_line_up() {
    let (_dir, path) = write_export(&shift_csv());
    let readings = load_readings(&path, &SourceOptions::default()).unwrap().readings;
    let config = ReflowConfig::default();

    let phases = identify_production_phases(&readings);
    let kinds: Vec<PhaseKind> = phases.iter().map(|p| p.kind).collect();
    assert_eq!(kinds, vec![PhaseKind::Production, PhaseKind::Idle, PhaseKind::Production]);
    assert_eq!(phases.iter().map(|p| p.len()).sum::<usize>(), readings.len());

    let periods = detect_idle_periods(&readings, &config);
    assert_eq!(periods.len(), 1);
    assert_eq!(periods[0].duration_minutes, 45.0);
    assert_eq!(periods[0].severity, Severity::Critical);
    assert_eq!(periods[0].start_index, phases[1].start_index);
}

#[test]
fn hourly_intervals_cover_every_reading() {
    let (_dir, path) = write_export(&shift_csv());
    let readings = load_readings(&path, &SourceOptions::default()).unwrap().readings;
    let stats = aggregate_intervals(&readings, 60).unwrap();
    assert_eq!(stats.len(), 3);
    assert_eq!(stats.values().map(|s| s.record_count).sum::<usize>(), readings.len());
    let first = stats.values().next().unwrap();
    assert_eq!(first.operational.total_boards_produced, 236);
}

#[test]
fn idle_stretch_produces_expected_findings() {
    let (_dir, path) = write_export(&shift_csv());
    let readings = load_readings(&path, &SourceOptions::default()).unwrap().readings;
    let findings = analyze_readings(&readings, &AnalysisContext::default(), &ReflowConfig::default());

    let count = |cat: WasteCategory| findings.iter().filter(|f| f.category == cat).count();
    assert_eq!(count(WasteCategory::IdlePower), 45);
    assert_eq!(count(WasteCategory::PowerFactor), 45);
    // zone3 target 170 °C, 25 °C over while idle
    assert_eq!(count(WasteCategory::TempOvershoot), 45);
    assert!(findings
        .iter()
        .filter(|f| f.category == WasteCategory::TempOvershoot)
        .all(|f| f.zone == Some(ZoneId(3)) && f.severity == Severity::Critical));
}

#[test]
fn shift_summary_report() {
    let (_dir, path) = write_export(&shift_csv());
    let readings = load_readings(&path, &SourceOptions::default()).unwrap().readings;
    let report = generate_waste_summary(&readings, ReportPeriod::Shift, &ReflowConfig::default());

    assert_eq!(report.reading_count, 121);
    assert!((report.total_energy_kwh - (75.0 * 0.5 + 45.0 * 20.0 / 60.0)).abs() < 0.01);
    assert!(report.total_waste_kwh > 0.0);
    assert!(report.waste_percentage > 0.0 && report.waste_percentage < 100.0);
    assert_eq!(report.idle.period_count, 1);
    assert!((report.idle.idle_time_percentage - 37.5).abs() < 1e-9);

    let efficiency = report.production_efficiency.unwrap();
    assert_eq!(efficiency.boards_produced, 76 * 4 - 4);
    assert_ne!(efficiency.status, EfficiencyStatus::NoProduction);

    let cats: Vec<WasteCategory> = report.recommendations.iter().map(|r| r.category).collect();
    assert!(cats.contains(&WasteCategory::IdlePower));
    assert!(cats.contains(&WasteCategory::PowerFactor));
    assert!(cats.contains(&WasteCategory::TempOvershoot));

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["period"], "shift");
    assert!(json["recommendations"][0]["priority"].is_string());
}

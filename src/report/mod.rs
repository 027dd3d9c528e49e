//! Summary Reporter - one read-only waste report per reporting period
//!
//! Runs segmentation, classification, efficiency and metrics over the same
//! reading slice, rolls them up, and derives gated recommendations. The
//! gates live in `[recommendations]` of the config.

use crate::config::ReflowConfig;
use crate::segmentation::detect_idle_periods;
use crate::types::{
    minutes_between, EfficiencyResult, EfficiencyStatus, IdlePeriod, IdleStatistics, Priority,
    Reading, Recommendation, ReportPeriod, Severity, SeverityCounts, WasteCategory, WasteMetrics,
    WasteSummaryReport,
};
use crate::waste::{
    analyze_production_efficiency, analyze_readings, calculate_waste_metrics, efficiency_finding,
    idle_period_findings, AnalysisContext,
};

// ============================================================================
// Idle Statistics
// ============================================================================

/// Roll idle periods up against the span they were found in.
pub fn idle_statistics(periods: &[IdlePeriod], span_minutes: f64) -> IdleStatistics {
    let total_idle_minutes: f64 = periods.iter().map(|p| p.duration_minutes).sum();
    IdleStatistics {
        period_count: periods.len(),
        total_idle_minutes,
        longest_idle_minutes: periods
            .iter()
            .map(|p| p.duration_minutes)
            .fold(0.0, f64::max),
        energy_wasted_kwh: periods.iter().map(|p| p.energy_wasted_kwh).sum(),
        potential_savings_kwh: periods.iter().map(|p| p.potential_savings_kwh).sum(),
        critical_periods: periods
            .iter()
            .filter(|p| p.severity == Severity::Critical)
            .count(),
        idle_time_percentage: if span_minutes > 0.0 {
            (total_idle_minutes / span_minutes * 100.0).min(100.0)
        } else {
            0.0
        },
    }
}

// ============================================================================
// Recommendations
// ============================================================================

/// Gated recommendations, highest priority first, then largest saving.
pub fn generate_recommendations(
    metrics: &WasteMetrics,
    idle: &IdleStatistics,
    efficiency: Option<&EfficiencyResult>,
    config: &ReflowConfig,
) -> Vec<Recommendation> {
    let gates = &config.recommendations;
    let tariff = config.cost.energy_cost_per_kwh;
    let mut recommendations = Vec::new();

    if metrics.idle_energy_waste_kwh > gates.idle_waste_min_kwh {
        let standby_after = config.thresholds.idle.warning_minutes;
        recommendations.push(Recommendation {
            priority: if idle.critical_periods > 0 {
                Priority::High
            } else {
                Priority::Medium
            },
            category: WasteCategory::IdlePower,
            title: "Reduce idle power consumption".to_string(),
            description: format!(
                "{:.1} kWh drawn above standby level while idle; {} idle period(s), longest {:.0} min",
                metrics.idle_energy_waste_kwh, idle.period_count, idle.longest_idle_minutes
            ),
            potential_savings: metrics.idle_energy_waste_kwh
                * config.thresholds.idle.recoverable_fraction
                * tariff,
            implementation: format!(
                "Switch the oven to standby after {standby_after:.0} min without boards and \
                 lower zone setpoints during planned changeovers"
            ),
        });
    }

    let low_pf_fraction = metrics.low_pf_fraction();
    if low_pf_fraction > gates.low_pf_reading_fraction {
        recommendations.push(Recommendation {
            priority: Priority::Medium,
            category: WasteCategory::PowerFactor,
            title: "Install power factor correction".to_string(),
            description: format!(
                "{:.0}% of readings below power factor {:.2}",
                low_pf_fraction * 100.0,
                config.thresholds.power_factor.warning_min
            ),
            potential_savings: metrics.power_factor_waste_kwh * tariff,
            implementation: format!(
                "Size a capacitor bank to bring the oven feed to power factor {:.2}",
                config.thresholds.power_factor.target
            ),
        });
    }

    if metrics.temperature_waste_kwh > gates.temperature_waste_min_kwh {
        recommendations.push(Recommendation {
            priority: Priority::Medium,
            category: WasteCategory::TempOvershoot,
            title: "Tune zone temperature setpoints".to_string(),
            description: format!(
                "{:.1} kWh spent holding zones above their profile targets ({} readings)",
                metrics.temperature_waste_kwh, metrics.overshoot_readings
            ),
            potential_savings: metrics.temperature_waste_kwh * tariff,
            implementation: "Verify thermocouples and lower overshooting zone setpoints to the \
                             validated reflow profile"
                .to_string(),
        });
    }

    if let Some(result) = efficiency.filter(|r| r.status == EfficiencyStatus::Poor) {
        let excess_kwh = result
            .kwh_per_board
            .map(|actual| (actual - result.target_kwh_per_board).max(0.0) * result.boards_produced as f64)
            .unwrap_or(0.0);
        recommendations.push(Recommendation {
            priority: Priority::High,
            category: WasteCategory::ProductionInefficiency,
            title: "Improve energy per board".to_string(),
            description: format!(
                "{:.2} kWh per board against a {:.2} kWh target",
                result.kwh_per_board.unwrap_or(0.0),
                result.target_kwh_per_board
            ),
            potential_savings: excess_kwh * tariff,
            implementation: "Increase conveyor loading and reduce gaps between boards".to_string(),
        });
    }

    recommendations.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then(b.potential_savings.total_cmp(&a.potential_savings))
    });
    recommendations
}

// ============================================================================
// Summary (entry point)
// ============================================================================

/// Waste summary with zone targets from the config only.
pub fn generate_waste_summary(
    readings: &[Reading],
    period: ReportPeriod,
    config: &ReflowConfig,
) -> WasteSummaryReport {
    generate_waste_summary_with_context(readings, period, config, &AnalysisContext::default())
}

/// Build the report for one period of time-ordered readings.
///
/// The period selects the production-efficiency window; metrics and idle
/// statistics cover the whole slice.
pub fn generate_waste_summary_with_context(
    readings: &[Reading],
    period: ReportPeriod,
    config: &ReflowConfig,
    context: &AnalysisContext,
) -> WasteSummaryReport {
    let start = readings.first().map(|r| r.timestamp);
    let end = readings.last().map(|r| r.timestamp);
    let span_minutes = match (start, end) {
        (Some(s), Some(e)) => minutes_between(s, e),
        _ => 0.0,
    };

    let metrics = calculate_waste_metrics(readings, context, config);
    let periods = detect_idle_periods(readings, config);
    let idle = idle_statistics(&periods, span_minutes);
    let production_efficiency =
        analyze_production_efficiency(readings, period.window_minutes(), config);

    let mut findings = analyze_readings(readings, context, config);
    findings.extend(idle_period_findings(&periods, config));
    findings.extend(
        production_efficiency
            .as_ref()
            .and_then(|r| efficiency_finding(r, config)),
    );
    let finding_counts = SeverityCounts::from_findings(&findings);

    let recommendations =
        generate_recommendations(&metrics, &idle, production_efficiency.as_ref(), config);

    tracing::info!(
        line = %config.line.name,
        period = %period,
        readings = readings.len(),
        waste_kwh = %format!("{:.2}", metrics.total_waste_kwh),
        waste_pct = %format!("{:.1}", metrics.waste_percentage),
        findings = finding_counts.total(),
        recommendations = recommendations.len(),
        "Waste summary generated"
    );

    WasteSummaryReport {
        line: config.line.name.clone(),
        period,
        start,
        end,
        reading_count: readings.len(),
        currency: config.line.currency.clone(),
        total_energy_kwh: metrics.total_energy_kwh,
        total_waste_kwh: metrics.total_waste_kwh,
        waste_percentage: metrics.waste_percentage,
        waste_cost: metrics.total_waste_kwh * config.cost.energy_cost_per_kwh,
        metrics,
        idle,
        production_efficiency,
        finding_counts,
        recommendations,
    }
}

//! Reflow Sentinel: SMT reflow oven energy waste detection
//!
//! Scans time-ordered data-logger readings from a reflow oven, separates
//! production from idle time, flags threshold violations, and rolls the
//! results up into a costed waste report.
//!
//! ## Architecture
//!
//! Data flows one way: raw rows, readings, analysis, report.
//!
//! - **Acquisition**: logger rows (CSV / JSON / DB) into `Reading`s
//! - **Aggregation**: fixed time buckets with energy, zone and production statistics
//! - **Segmentation**: production/idle phases and costed idle periods
//! - **Waste**: per-reading rule findings, energy per board, accumulated waste
//! - **Report**: per-period summary with gated, ranked recommendations
//!
//! Every analysis function is pure over an immutable slice and takes its
//! thresholds from an explicit [`ReflowConfig`].

pub mod config;
pub mod types;
pub mod acquisition;
pub mod aggregation;
pub mod segmentation;
pub mod waste;
pub mod report;

// Re-export line configuration
pub use config::{ConfigError, ReflowConfig};

// Re-export commonly used types
pub use types::{
    EfficiencyResult, EfficiencyStatus, EquipmentStatus, IdlePeriod, IntervalStats, Phase,
    PhaseKind, Reading, Recommendation, ReportPeriod, Severity, WasteCategory, WasteFinding,
    WasteMetrics, WasteSummaryReport, ZoneId, ZoneReading,
};

// Re-export the analysis entry points
pub use acquisition::{load_readings, parse_numeric_or_default, parse_row, ParseError, RawRow, RawValue};
pub use aggregation::{aggregate_intervals, calculate_group_stats, group_by_interval, AnalysisError};
pub use segmentation::{detect_idle_periods, identify_production_phases};
pub use waste::{
    analyze_data_point, analyze_production_efficiency, analyze_readings, calculate_waste_metrics,
    AnalysisContext,
};
pub use report::{generate_waste_summary, generate_waste_summary_with_context};

//! Waste classification: per-reading rules, production efficiency and
//! accumulated waste metrics
//!
//! All functions are pure over an immutable reading slice and an explicit
//! `ReflowConfig`; none of them keeps state between calls.

pub mod classifier;
pub mod efficiency;
pub mod metrics;

pub use classifier::{
    analyze_data_point, analyze_readings, efficiency_finding, idle_period_findings,
    AnalysisContext,
};
pub use efficiency::{analyze_production_efficiency, efficiency_status};
pub use metrics::calculate_waste_metrics;

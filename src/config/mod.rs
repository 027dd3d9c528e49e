//! Reflow Configuration Module
//!
//! Per-line configuration loaded from TOML, replacing hardcoded waste
//! thresholds with operator-tunable values.
//!
//! ## Loading Order
//!
//! 1. `REFLOW_CONFIG` environment variable (path to TOML file)
//! 2. `reflow_config.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! The config is an ordinary value handed to each analysis call:
//!
//! ```ignore
//! let config = ReflowConfig::load();
//! let report = report::generate_waste_summary(&readings, ReportPeriod::Day, &config);
//! ```

mod reflow_config;
pub mod defaults;
pub mod validation;

pub use reflow_config::*;

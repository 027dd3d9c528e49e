//! Shared data structures for reflow oven waste analysis
//!
//! This module defines the core types flowing through the analysis engine:
//! - Reading (one parsed data-logger sample, with per-zone temperatures)
//! - IntervalStats (time-bucket summaries)
//! - Phase / IdlePeriod (production and idle segmentation)
//! - WasteFinding (classifier output)
//! - WasteSummaryReport (per-period roll-up with recommendations)

mod reading;
mod findings;
mod analysis;
mod report;

pub use reading::*;
pub use findings::*;
pub use analysis::*;
pub use report::*;

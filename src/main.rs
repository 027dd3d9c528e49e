//! Reflow Sentinel - SMT reflow oven waste analysis CLI
//!
//! Loads data-logger exports and prints analysis results as pretty JSON on
//! stdout. Logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Daily waste report for one export
//! reflow-sentinel summary line3_2024-03-05.csv
//!
//! # Shift reports for a batch of exports, analyzed in parallel
//! reflow-sentinel summary --period shift exports/*.csv
//!
//! # 15-minute interval statistics
//! reflow-sentinel intervals line3.csv --minutes 15
//!
//! # Effective configuration
//! reflow-sentinel --config plant.toml config show
//! ```
//!
//! # Environment Variables
//!
//! - `REFLOW_CONFIG`: Path to the config TOML, same as `--config`. A file
//!   that fails to load is an error, not a silent fallback.
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use reflow_sentinel::acquisition::{InvalidRecordPolicy, LoadedReadings, SourceInfo, SourceOptions};
use reflow_sentinel::config::ReflowConfig;
use reflow_sentinel::types::{PhaseKind, ReportPeriod, SeverityCounts, WasteFinding, WasteSummaryReport};
use reflow_sentinel::{aggregation, segmentation, waste, report};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "reflow-sentinel")]
#[command(about = "SMT reflow oven energy waste detection")]
#[command(version)]
struct CliArgs {
    /// Config TOML (default: ./reflow_config.toml, then built-in defaults)
    #[arg(long, global = true, value_name = "PATH", env = "REFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Fail the load on the first record with an unparseable timestamp
    /// instead of skipping it
    #[arg(long, global = true)]
    abort_on_invalid: bool,

    /// Keep records in file order (input must already be time-ordered)
    #[arg(long, global = true)]
    no_sort: bool,

    #[command(subcommand)]
    command: SubCommand,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Waste summary report, one per export file
    Summary {
        /// Logger exports (CSV or JSON)
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// hour, shift, day, week or a number of minutes
        #[arg(long, default_value = "day", value_parser = parse_period)]
        period: ReportPeriod,
    },

    /// Time-bucket statistics
    Intervals {
        file: PathBuf,
        /// Bucket size in minutes (default: analysis.interval_minutes)
        #[arg(long)]
        minutes: Option<u32>,
    },

    /// Production / idle phase partition
    Phases { file: PathBuf },

    /// Idle periods with waste estimates
    Idle { file: PathBuf },

    /// Every waste finding with severity counts
    Findings { file: PathBuf },

    /// Energy per board over the trailing window
    Efficiency {
        file: PathBuf,
        /// Window in minutes (default: analysis.efficiency_window_minutes)
        #[arg(long)]
        window: Option<f64>,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Validate a config file
    Check { path: PathBuf },
}

fn parse_period(raw: &str) -> Result<ReportPeriod, String> {
    ReportPeriod::parse(raw)
        .ok_or_else(|| format!("unknown period '{raw}' (hour, shift, day, week or minutes)"))
}

// ============================================================================
// Output Views
// ============================================================================

/// Phase without its reading slice
#[derive(Serialize)]
struct PhaseView {
    kind: PhaseKind,
    start_index: usize,
    end_index: usize,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    duration_minutes: f64,
    reading_count: usize,
}

#[derive(Serialize)]
struct FindingsView {
    counts: SeverityCounts,
    findings: Vec<WasteFinding>,
}

#[derive(Serialize)]
struct FileReport {
    source: SourceInfo,
    report: WasteSummaryReport,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("Failed to serialize output")?);
    Ok(())
}

// ============================================================================
// Commands
// ============================================================================

fn load(path: &Path, options: &SourceOptions) -> Result<LoadedReadings> {
    reflow_sentinel::load_readings(path, options)
        .with_context(|| format!("Failed to load {}", path.display()))
}

fn run_summary(
    files: &[PathBuf],
    period: ReportPeriod,
    config: &ReflowConfig,
    options: &SourceOptions,
) -> Result<()> {
    let results: Vec<(PathBuf, Result<FileReport>)> = files
        .par_iter()
        .map(|path| {
            let result = load(path, options).map(|loaded| FileReport {
                report: report::generate_waste_summary(&loaded.readings, period, config),
                source: loaded.info,
            });
            (path.clone(), result)
        })
        .collect();

    let mut reports = Vec::with_capacity(results.len());
    for (path, result) in results {
        match result {
            Ok(r) => reports.push(r),
            Err(e) => error!(file = %path.display(), "{:#}", e),
        }
    }
    if reports.is_empty() {
        anyhow::bail!("No export could be analyzed ({} file(s) failed)", files.len());
    }
    if reports.len() < files.len() {
        warn!(ok = reports.len(), failed = files.len() - reports.len(), "Some exports failed");
    }

    match reports.as_slice() {
        [single] => print_json(single),
        _ => print_json(&reports),
    }
}

fn run_findings(path: &Path, config: &ReflowConfig, options: &SourceOptions) -> Result<()> {
    let loaded = load(path, options)?;
    let readings = &loaded.readings;
    let context = waste::AnalysisContext::default();

    let mut findings = waste::analyze_readings(readings, &context, config);
    let periods = segmentation::detect_idle_periods(readings, config);
    findings.extend(waste::idle_period_findings(&periods, config));
    findings.extend(
        waste::analyze_production_efficiency(readings, config.analysis.efficiency_window_minutes, config)
            .and_then(|r| waste::efficiency_finding(&r, config)),
    );

    print_json(&FindingsView {
        counts: SeverityCounts::from_findings(&findings),
        findings,
    })
}

fn run_config(action: &ConfigAction, config: &ReflowConfig) -> Result<()> {
    match action {
        ConfigAction::Show => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
        ConfigAction::Check { path } => {
            let checked = ReflowConfig::load_from_file(path)?;
            println!(
                "{} is valid (line '{}', {} zone targets)",
                path.display(),
                checked.line.name,
                checked.zone_targets.len()
            );
            Ok(())
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<()> {
    // stdout carries JSON; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();

    let config = match &args.config {
        Some(path) => ReflowConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ReflowConfig::load(),
    };
    info!(
        "Line: {} | Site: {} | Tariff: {:.3} {}/kWh",
        config.line.name,
        if config.line.site.is_empty() { "unset" } else { &config.line.site },
        config.cost.energy_cost_per_kwh,
        config.line.currency
    );

    let options = SourceOptions {
        invalid_records: if args.abort_on_invalid {
            InvalidRecordPolicy::Abort
        } else {
            InvalidRecordPolicy::Skip
        },
        sort_by_timestamp: !args.no_sort,
    };

    match &args.command {
        SubCommand::Summary { files, period } => run_summary(files, *period, &config, &options),
        SubCommand::Intervals { file, minutes } => {
            let loaded = load(file, &options)?;
            let minutes = minutes.unwrap_or(config.analysis.interval_minutes);
            let stats = aggregation::aggregate_intervals(&loaded.readings, minutes)?;
            print_json(&stats)
        }
        SubCommand::Phases { file } => {
            let loaded = load(file, &options)?;
            let phases: Vec<PhaseView> = segmentation::identify_production_phases(&loaded.readings)
                .into_iter()
                .map(|p| PhaseView {
                    kind: p.kind,
                    start_index: p.start_index,
                    end_index: p.end_index,
                    start_time: p.start_time,
                    end_time: p.end_time,
                    duration_minutes: p.duration_minutes,
                    reading_count: p.len(),
                })
                .collect();
            print_json(&phases)
        }
        SubCommand::Idle { file } => {
            let loaded = load(file, &options)?;
            print_json(&segmentation::detect_idle_periods(&loaded.readings, &config))
        }
        SubCommand::Findings { file } => run_findings(file, &config, &options),
        SubCommand::Efficiency { file, window } => {
            let loaded = load(file, &options)?;
            let window = window.unwrap_or(config.analysis.efficiency_window_minutes);
            let result = waste::analyze_production_efficiency(&loaded.readings, window, &config);
            if result.is_none() {
                warn!(window, "Fewer than two readings in the efficiency window");
            }
            print_json(&result)
        }
        SubCommand::Config { action } => run_config(action, &config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn test_config_path_reads_env_var() {
        let command = CliArgs::command();
        let config = command
            .get_arguments()
            .find(|arg| arg.get_id() == "config")
            .unwrap();
        assert_eq!(
            config.get_env(),
            Some(std::ffi::OsStr::new(reflow_sentinel::config::CONFIG_ENV_VAR))
        );
    }

    #[test]
    fn test_summary_period_parses() {
        let args = CliArgs::try_parse_from([
            "reflow-sentinel",
            "summary",
            "--period",
            "shift",
            "line3.csv",
        ])
        .unwrap();
        match args.command {
            SubCommand::Summary { files, period } => {
                assert_eq!(period, ReportPeriod::Shift);
                assert_eq!(files, vec![PathBuf::from("line3.csv")]);
            }
            other => panic!("expected summary, got {other:?}"),
        }
    }
}

//! Logger export loader
//!
//! Reads a CSV export or a JSON array of row objects from disk and turns
//! each record into a `Reading` through [`parse_row`]. The analysis core
//! assumes readings ordered by timestamp; the loader sorts by default so
//! callers do not have to.
//!
//! # Usage
//!
//! ```ignore
//! use reflow_sentinel::acquisition::{load_readings, SourceOptions};
//!
//! let loaded = load_readings("line3_2024-03-05.csv", &SourceOptions::default())?;
//! println!("{} readings, {} skipped", loaded.info.reading_count, loaded.info.skipped_records);
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::row_parser::{is_timestamp_column, parse_row, ParseError, RawRow, RawValue};
use crate::types::{Reading, ZoneId};

// ============================================================================
// CSV Quote-Aware Parsing
// ============================================================================

/// Split a CSV line respecting quoted fields (commas inside quotes, `""`
/// escapes). Returns owned strings because quoted fields need unquoting.
pub fn csv_split(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    fields.push(current);
    fields
}

// ============================================================================
// Options / Results
// ============================================================================

/// What to do with a record whose timestamp cannot be parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvalidRecordPolicy {
    /// Log and drop the record
    #[default]
    Skip,
    /// Fail the whole load
    Abort,
}

#[derive(Debug, Clone)]
pub struct SourceOptions {
    pub invalid_records: InvalidRecordPolicy,
    /// Stable sort by timestamp after parsing
    pub sort_by_timestamp: bool,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            invalid_records: InvalidRecordPolicy::Skip,
            sort_by_timestamp: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Csv,
    Json,
}

/// Load summary for one source
#[derive(Debug, Clone, Serialize)]
pub struct SourceInfo {
    pub source_path: String,
    pub format: SourceFormat,
    /// Data records seen (CSV lines after the header, or JSON array items)
    pub record_count: usize,
    pub reading_count: usize,
    pub skipped_records: usize,
    /// Readings found out of timestamp order before sorting
    pub out_of_order: usize,
    pub first_timestamp: Option<DateTime<Utc>>,
    pub last_timestamp: Option<DateTime<Utc>>,
    pub zones: Vec<ZoneId>,
}

/// Parsed readings plus their load summary
#[derive(Debug, Clone)]
pub struct LoadedReadings {
    pub readings: Vec<Reading>,
    pub info: SourceInfo,
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is empty", .0.display())]
    Empty(PathBuf),

    #[error("{} has no timestamp column", .0.display())]
    MissingTimestampColumn(PathBuf),

    #[error("{} is not a JSON array of row objects: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{} record {record}: {source}", .path.display())]
    InvalidRecord {
        path: PathBuf,
        record: usize,
        #[source]
        source: ParseError,
    },

    #[error("no valid readings in {} ({skipped} records skipped)", .path.display())]
    NoReadings { path: PathBuf, skipped: usize },
}

// ============================================================================
// Raw Row Readers
// ============================================================================

/// Read CSV rows: header line, then one record per non-blank line.
///
/// Cells beyond the header width are ignored; short rows leave the trailing
/// columns absent.
pub fn read_csv_rows<R: BufRead>(reader: R) -> std::io::Result<(Vec<String>, Vec<RawRow>)> {
    let mut lines = reader.lines();

    let header = loop {
        match lines.next() {
            Some(line) => {
                let line = line?;
                if !line.trim().is_empty() {
                    break line;
                }
            }
            None => return Ok((Vec::new(), Vec::new())),
        }
    };
    let columns: Vec<String> = csv_split(header.trim_start_matches('\u{feff}'))
        .into_iter()
        .map(|c| c.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for line in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let row: RawRow = columns
            .iter()
            .zip(csv_split(line.trim_end_matches('\r')))
            .map(|(name, value)| (name.clone(), RawValue::Text(value)))
            .collect();
        rows.push(row);
    }
    Ok((columns, rows))
}

/// Parse raw rows into readings, applying the invalid-record policy.
///
/// Returns the readings (input order) and the number of skipped records.
/// `record` numbers in errors are 1-based.
pub fn parse_rows(
    rows: &[RawRow],
    policy: InvalidRecordPolicy,
) -> Result<(Vec<Reading>, usize), (usize, ParseError)> {
    let mut readings = Vec::with_capacity(rows.len());
    let mut skipped = 0usize;

    for (idx, raw) in rows.iter().enumerate() {
        match parse_row(raw) {
            Ok(reading) => readings.push(reading),
            Err(e) => match policy {
                InvalidRecordPolicy::Abort => return Err((idx + 1, e)),
                InvalidRecordPolicy::Skip => {
                    if skipped < 10 {
                        tracing::warn!(record = idx + 1, error = %e, "Skipping record");
                    }
                    skipped += 1;
                }
            },
        }
    }
    Ok((readings, skipped))
}

fn detect_format(path: &Path, contents: &str) -> SourceFormat {
    let by_extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match by_extension.as_deref() {
        Some("json") => SourceFormat::Json,
        Some("csv") => SourceFormat::Csv,
        _ if contents.trim_start().starts_with('[') => SourceFormat::Json,
        _ => SourceFormat::Csv,
    }
}

// ============================================================================
// Loader (entry point)
// ============================================================================

/// Load a logger export from disk.
pub fn load_readings(
    path: impl AsRef<Path>,
    options: &SourceOptions,
) -> Result<LoadedReadings, SourceError> {
    let path = path.as_ref();
    let io_err = |source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut contents = String::new();
    File::open(path)
        .and_then(|f| BufReader::new(f).read_to_string(&mut contents))
        .map_err(io_err)?;
    if contents.trim().is_empty() {
        return Err(SourceError::Empty(path.to_path_buf()));
    }

    let format = detect_format(path, &contents);
    let rows: Vec<RawRow> = match format {
        SourceFormat::Json => serde_json::from_str(&contents).map_err(|source| SourceError::Json {
            path: path.to_path_buf(),
            source,
        })?,
        SourceFormat::Csv => {
            let (columns, rows) = read_csv_rows(contents.as_bytes()).map_err(io_err)?;
            if !columns.iter().any(|c| is_timestamp_column(c)) {
                return Err(SourceError::MissingTimestampColumn(path.to_path_buf()));
            }
            tracing::debug!(file = %path.display(), columns = columns.len(), "CSV header read");
            rows
        }
    };

    let (mut readings, skipped) =
        parse_rows(&rows, options.invalid_records).map_err(|(record, source)| {
            SourceError::InvalidRecord {
                path: path.to_path_buf(),
                record,
                source,
            }
        })?;

    if readings.is_empty() {
        return Err(SourceError::NoReadings {
            path: path.to_path_buf(),
            skipped,
        });
    }

    let out_of_order = readings
        .windows(2)
        .filter(|w| w[1].timestamp < w[0].timestamp)
        .count();
    if out_of_order > 0 {
        if options.sort_by_timestamp {
            readings.sort_by_key(|r| r.timestamp);
        } else {
            tracing::warn!(
                file = %path.display(),
                out_of_order,
                "Readings are not in timestamp order and sorting is disabled"
            );
        }
    }

    let zones: BTreeSet<ZoneId> = readings.iter().flat_map(|r| r.zones.keys().copied()).collect();
    let info = SourceInfo {
        source_path: path.display().to_string(),
        format,
        record_count: rows.len(),
        reading_count: readings.len(),
        skipped_records: skipped,
        out_of_order,
        first_timestamp: readings.iter().map(|r| r.timestamp).min(),
        last_timestamp: readings.iter().map(|r| r.timestamp).max(),
        zones: zones.into_iter().collect(),
    };

    tracing::info!(
        file = %info.source_path,
        format = ?info.format,
        readings = info.reading_count,
        skipped = info.skipped_records,
        zones = info.zones.len(),
        "Logger export loaded"
    );

    Ok(LoadedReadings { readings, info })
}

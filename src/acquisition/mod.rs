//! Data acquisition module
//!
//! Turns logger exports (CSV, JSON rows, DB rows) into `Reading`s.

pub mod row_parser;
pub mod source;

pub use row_parser::{parse_numeric_or_default, parse_row, parse_timestamp, ParseError, RawRow, RawValue};
pub use source::{
    load_readings, InvalidRecordPolicy, LoadedReadings, SourceError, SourceFormat, SourceInfo,
    SourceOptions,
};

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Library for turning county measurement uploads into ranked datasets.
//!
//! Rows are read from CSV, resolved to counties with [`resolve`], and
//! partitioned into samples and mismatches by [`ingest_rows`]. The
//! [`upload`] module ranks the samples into a percentile table and stores
//! everything in `DuckDB`.

pub mod config;
pub mod resolve;
pub mod synthetic;
pub mod upload;

use std::io::Read;
use std::str::FromStr as _;
use std::sync::Arc;

use health_map_database::DbError;
use health_map_geography::GeoError;
use health_map_geography::directory::GeoDirectory;
use health_map_ingest_models::progress::ProgressCallback;
use health_map_ingest_models::{
    DataSetId, IngestOutcome, Mismatch, Sample, UploadFormat, VALUE_COLUMN,
};
use health_map_percentile::PercentileError;
use thiserror::Error;

use crate::resolve::{Resolution, Row, resolve_row};

/// Errors that can occur while ingesting or uploading data.
#[derive(Debug, Error)]
pub enum IngestError {
    /// An upload format or setting was not recognised.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of what went wrong.
        message: String,
    },

    /// The CSV header lacks columns the chosen format needs.
    #[error("Upload format {format} requires columns missing from the file: {}", .missing.join(", "))]
    MissingColumns {
        /// Chosen format.
        format: UploadFormat,
        /// Required columns that were not present.
        missing: Vec<String>,
    },

    /// No resolved row carried a value, so no percentile table exists.
    #[error("No resolved row has a value; cannot compute percentiles")]
    NoValues,

    /// Reading the CSV failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The geography directory failed.
    #[error("Geography error: {0}")]
    Geo(#[from] GeoError),

    /// Percentile computation failed.
    #[error("Percentile error: {0}")]
    Percentile(#[from] PercentileError),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Db(#[from] DbError),

    /// Config file could not be parsed.
    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Report serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parses an upload format from its wire name (`NAME`, `1FIPS`, `2FIPS`)
/// or descriptive name (`by_name`, ...), ignoring case.
///
/// # Errors
///
/// Returns [`IngestError::Configuration`] for any other text.
pub fn parse_format(text: &str) -> Result<UploadFormat, IngestError> {
    UploadFormat::from_str(text.trim()).map_err(|_| IngestError::Configuration {
        message: format!(
            "unknown upload format {text:?}, expected one of: {}",
            UploadFormat::ALL
                .iter()
                .map(|format| format!("{format} ({})", format.description()))
                .collect::<Vec<_>>()
                .join("; ")
        ),
    })
}

/// The contents of a row's `Value` cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueCell {
    /// Missing or blank.
    Blank,
    /// A finite number.
    Number(f64),
    /// Present but not a finite number.
    Unparsable,
}

impl ValueCell {
    /// Classifies cell text.
    #[must_use]
    pub fn parse(text: Option<&str>) -> Self {
        let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) else {
            return Self::Blank;
        };
        match text.parse::<f64>() {
            Ok(value) if value.is_finite() => Self::Number(value),
            _ => Self::Unparsable,
        }
    }

    /// The numeric value, if any.
    #[must_use]
    pub const fn value(self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(value),
            Self::Blank | Self::Unparsable => None,
        }
    }
}

/// Reads CSV rows keyed by header name.
///
/// Cells are trimmed. Rows shorter than the header are kept; their missing
/// cells are simply absent from the row. Invalid UTF-8 in a cell is
/// replaced with U+FFFD, so such a row still reaches resolution.
///
/// # Errors
///
/// * [`IngestError::MissingColumns`] if the header lacks a column that
///   `format` identifies counties by
/// * [`IngestError::Csv`] if the input is not valid CSV
pub fn read_rows<R: Read>(reader: R, format: UploadFormat) -> Result<Vec<Row>, IngestError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let missing: Vec<String> = format
        .identifying_columns()
        .iter()
        .filter(|column| !headers.iter().any(|h| h == **column))
        .map(|column| (*column).to_string())
        .collect();
    if !missing.is_empty() {
        return Err(IngestError::MissingColumns { format, missing });
    }
    if !headers.iter().any(|h| h == VALUE_COLUMN) {
        log::warn!("No {VALUE_COLUMN:?} column; every sample will have no value");
    }

    let mut rows = Vec::new();
    for (index, record) in rdr.byte_records().enumerate() {
        let record = record?;
        if std::str::from_utf8(record.as_slice()).is_err() {
            log::warn!("Row {index}: invalid UTF-8, undecodable bytes replaced");
        }
        rows.push(
            headers
                .iter()
                .zip(record.iter())
                .map(|(h, v)| (h.to_string(), String::from_utf8_lossy(v).into_owned()))
                .collect(),
        );
    }

    Ok(rows)
}

/// Resolves every row and partitions the results.
///
/// Each row ends up either as a [`Sample`] bound to `data_set` or as a
/// [`Mismatch`]; both keep input order. Samples are not persisted.
///
/// # Errors
///
/// Returns [`IngestError::Geo`] only if the directory itself fails.
pub fn ingest_rows<D: GeoDirectory + ?Sized>(
    directory: &D,
    format: UploadFormat,
    rows: &[Row],
    data_set: DataSetId,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<IngestOutcome, IngestError> {
    progress.set_total(rows.len() as u64);

    let mut outcome = IngestOutcome::default();
    for (index, row) in rows.iter().enumerate() {
        match resolve_row(directory, format, row)? {
            Resolution::Resolved(county) => {
                let cell = ValueCell::parse(row.get(VALUE_COLUMN).map(String::as_str));
                if cell == ValueCell::Unparsable {
                    log::warn!(
                        "Row {index}: value {:?} for {} is not a number",
                        row.get(VALUE_COLUMN),
                        county.search_label()
                    );
                    outcome.unparsable_values.push(index);
                }
                outcome
                    .resolved
                    .push(Sample::new(county, cell.value(), data_set));
            }
            Resolution::Unresolved {
                unresolved,
                context,
            } => {
                log::warn!("Row {index}: no county {unresolved:?} in {context:?}");
                outcome.unresolved.push(Mismatch {
                    row: index,
                    unresolved,
                    context,
                });
            }
        }
        progress.inc(1);
    }

    log::info!(
        "Resolved {} of {} rows ({} unresolved)",
        outcome.resolved.len(),
        rows.len(),
        outcome.unresolved.len()
    );
    progress.finish(format!(
        "{} resolved, {} unresolved",
        outcome.resolved.len(),
        outcome.unresolved.len()
    ));

    Ok(outcome)
}

/// Reads CSV from `reader` and ingests it.
///
/// # Errors
///
/// Returns [`IngestError`] if the CSV is unreadable or lacks required
/// columns, or the directory fails.
pub fn ingest_reader<D: GeoDirectory + ?Sized, R: Read>(
    directory: &D,
    format: UploadFormat,
    reader: R,
    data_set: DataSetId,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<IngestOutcome, IngestError> {
    let rows = read_rows(reader, format)?;
    ingest_rows(directory, format, &rows, data_set, progress)
}

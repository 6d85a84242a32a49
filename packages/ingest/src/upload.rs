//! Full upload runs: resolve rows, rank them, and store the dataset.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use duckdb::Connection;
use health_map_database::datasets;
use health_map_database::with_transaction;
use health_map_database_models::NewDataSet;
use health_map_geography::directory::GeoDirectory;
use health_map_ingest_models::progress::ProgressCallback;
use health_map_ingest_models::{DataSetId, Mismatches, Sample, UploadFormat};
use health_map_percentile::{assign_percentiles_to_points, percentiles_for_points};
use health_map_percentile_models::{PercentileEntry, PercentilePoint as _, PercentileResolution};
use serde::Serialize;

use crate::resolve::Row;
use crate::{IngestError, ingest_rows};

/// What to store an upload as.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Indicator name; created on first use.
    pub indicator: String,
    /// Year the data covers.
    pub year: i32,
    /// Where the data came from.
    pub source: Option<String>,
    /// How rows identify counties.
    pub format: UploadFormat,
    /// Percentile table resolution.
    pub resolution: PercentileResolution,
}

/// Summary of a stored upload, printed as JSON by the CLI.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReport {
    /// The new dataset.
    pub data_set: DataSetId,
    /// Indicator name.
    pub indicator: String,
    /// Dataset year.
    pub year: i32,
    /// Rows resolved to a county.
    pub resolved: usize,
    /// Resolved rows that carried a value and were ranked.
    pub ranked: usize,
    /// Ranked rows above the highest computed percentile.
    pub above_range: usize,
    /// Entries in the stored percentile table.
    pub percentiles: usize,
    /// `unresolved -> context`, later rows overwriting earlier ones.
    pub unresolved: BTreeMap<String, String>,
    /// Every unresolved row, in input order.
    pub mismatches: Mismatches,
    /// Rows whose value text was not a finite number.
    pub unparsable_values: Vec<usize>,
}

/// Computes a percentile table from the samples that carry a value and
/// ranks them against it. Samples are reordered ascending by value.
///
/// # Errors
///
/// Returns [`IngestError::NoValues`] if no sample carries a value.
pub fn rank_samples(
    samples: &mut [Sample],
    resolution: PercentileResolution,
) -> Result<Vec<PercentileEntry>, IngestError> {
    if !samples.iter().any(|s| s.value().is_some()) {
        return Err(IngestError::NoValues);
    }

    let table = percentiles_for_points(samples, resolution)?;
    assign_percentiles_to_points(samples, &table);

    Ok(table)
}

/// Ingests `rows` into a new dataset and stores its points and percentile
/// table, all in one transaction.
///
/// # Errors
///
/// Returns [`IngestError`] if the dataset cannot be created (duplicate or
/// invalid year), no resolved row has a value, or the database fails.
/// Nothing is stored in that case.
pub fn upload<D: GeoDirectory + ?Sized>(
    conn: &Connection,
    directory: &D,
    rows: &[Row],
    request: &UploadRequest,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<UploadReport, IngestError> {
    with_transaction(conn, |conn| {
        let data_set = datasets::create_data_set(
            conn,
            &NewDataSet {
                indicator: request.indicator.clone(),
                year: request.year,
                source: request.source.clone(),
            },
            Utc::now(),
        )?;

        let mut outcome = ingest_rows(directory, request.format, rows, data_set.id, progress)?;
        let table = rank_samples(&mut outcome.resolved, request.resolution)?;

        datasets::insert_samples(conn, &outcome.resolved)?;
        datasets::insert_percentiles(conn, data_set.id, &table)?;

        let ranked = outcome.resolved.iter().filter(|s| s.rank.is_some()).count();
        let above_range = outcome
            .resolved
            .iter()
            .filter(|s| s.rank.is_some_and(|r| r.is_above_range()))
            .count();

        log::info!(
            "Stored data set {} ({} {}): {ranked} ranked points, {} percentiles",
            data_set.id,
            request.indicator,
            request.year,
            table.len()
        );

        Ok(UploadReport {
            data_set: data_set.id,
            indicator: request.indicator.clone(),
            year: request.year,
            resolved: outcome.resolved.len(),
            ranked,
            above_range,
            percentiles: table.len(),
            unresolved: outcome.unresolved.to_map(),
            mismatches: outcome.unresolved,
            unparsable_values: outcome.unparsable_values,
        })
    })
}

//! Random datasets for demos and load testing.
//!
//! Values are drawn from a normal distribution (Box-Muller transform over
//! `rand`'s uniform samples) for every county in the directory.

use std::f64::consts::TAU;
use std::sync::Arc;

use chrono::Utc;
use duckdb::Connection;
use health_map_database::{datasets, with_transaction};
use health_map_database_models::NewDataSet;
use health_map_geography::directory::GeoDirectory;
use health_map_geography_models::County;
use health_map_ingest_models::progress::ProgressCallback;
use health_map_ingest_models::{DataSetId, Sample};
use health_map_percentile_models::PercentileResolution;
use rand::Rng;
use serde::Serialize;

use crate::IngestError;
use crate::upload::rank_samples;

/// Indicator used when none is given.
pub const DEFAULT_INDICATOR: &str = "Test Indicator";
/// Year used when none is given.
pub const DEFAULT_YEAR: i32 = 2018;
/// Mean used when none is given.
pub const DEFAULT_MEAN: f64 = 0.5;

/// Parameters of a synthetic dataset.
#[derive(Debug, Clone)]
pub struct SyntheticSpec {
    /// Indicator name; created on first use.
    pub indicator: String,
    /// Dataset year.
    pub year: i32,
    /// Mean of the generated values.
    pub mean: f64,
    /// Standard deviation; `mean / 5` when `None`.
    pub sigma: Option<f64>,
    /// Use at most this many counties, in directory order.
    pub count: Option<usize>,
    /// Percentile table resolution.
    pub resolution: PercentileResolution,
}

impl Default for SyntheticSpec {
    fn default() -> Self {
        Self {
            indicator: DEFAULT_INDICATOR.to_string(),
            year: DEFAULT_YEAR,
            mean: DEFAULT_MEAN,
            sigma: None,
            count: None,
            resolution: PercentileResolution::default(),
        }
    }
}

impl SyntheticSpec {
    /// The standard deviation to draw with.
    #[must_use]
    pub fn sigma(&self) -> f64 {
        self.sigma.unwrap_or(self.mean / 5.0)
    }

    fn validate(&self) -> Result<(), IngestError> {
        if !self.mean.is_finite() {
            return Err(IngestError::Configuration {
                message: format!("mean must be a finite number, got {}", self.mean),
            });
        }
        let sigma = self.sigma();
        if !sigma.is_finite() || sigma < 0.0 {
            return Err(IngestError::Configuration {
                message: format!("sigma must be a non-negative number, got {sigma}"),
            });
        }
        Ok(())
    }
}

/// Summary of a stored synthetic dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyntheticReport {
    /// The new dataset.
    pub data_set: DataSetId,
    /// Indicator name.
    pub indicator: String,
    /// Dataset year.
    pub year: i32,
    /// Points generated.
    pub points: usize,
    /// Entries in the stored percentile table.
    pub percentiles: usize,
}

/// Draws one value from a normal distribution.
pub fn gaussian<R: Rng + ?Sized>(rng: &mut R, mean: f64, sigma: f64) -> f64 {
    // gen() is in [0, 1); flip it so ln never sees 0.
    let u1 = 1.0 - rng.r#gen::<f64>();
    let u2 = rng.r#gen::<f64>();
    let z = (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos();
    z.mul_add(sigma, mean)
}

/// Generates one sample per county (up to `spec.count`).
pub fn generate_samples<R: Rng + ?Sized>(
    rng: &mut R,
    counties: &[County],
    spec: &SyntheticSpec,
    data_set: DataSetId,
) -> Vec<Sample> {
    let sigma = spec.sigma();
    counties
        .iter()
        .take(spec.count.unwrap_or(usize::MAX))
        .map(|county| {
            Sample::new(
                county.clone(),
                Some(gaussian(rng, spec.mean, sigma)),
                data_set,
            )
        })
        .collect()
}

/// Creates, ranks, and stores a synthetic dataset in one transaction.
///
/// # Errors
///
/// Returns [`IngestError`] if the parameters are invalid, the dataset
/// already exists, the directory has no counties, or the database fails.
pub fn store_synthetic<D: GeoDirectory + ?Sized, R: Rng + ?Sized>(
    conn: &Connection,
    directory: &D,
    spec: &SyntheticSpec,
    rng: &mut R,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<SyntheticReport, IngestError> {
    spec.validate()?;
    log::info!(
        "Creating random data for {} {} (mean {}, sigma {})",
        spec.indicator,
        spec.year,
        spec.mean,
        spec.sigma()
    );

    let counties = directory.all_counties()?;

    with_transaction(conn, |conn| {
        let data_set = datasets::create_data_set(
            conn,
            &NewDataSet {
                indicator: spec.indicator.clone(),
                year: spec.year,
                source: Some("synthetic".to_string()),
            },
            Utc::now(),
        )?;

        let mut samples = generate_samples(rng, &counties, spec, data_set.id);
        progress.set_total(samples.len() as u64);
        log::info!("Created {} new data points", samples.len());

        let table = rank_samples(&mut samples, spec.resolution)?;
        for chunk in samples.chunks(500) {
            datasets::insert_samples(conn, chunk)?;
            progress.inc(chunk.len() as u64);
        }
        datasets::insert_percentiles(conn, data_set.id, &table)?;
        progress.finish(format!("{} points stored", samples.len()));

        Ok(SyntheticReport {
            data_set: data_set.id,
            indicator: spec.indicator.clone(),
            year: spec.year,
            points: samples.len(),
            percentiles: table.len(),
        })
    })
}

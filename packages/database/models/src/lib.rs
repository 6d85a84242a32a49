#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Stored row types for health indicators and datasets.
//!
//! These types represent the shapes of data as stored in and retrieved from
//! the `DuckDB` database. Measurements themselves are read back as
//! `health_map_ingest_models::Sample` values.

use chrono::{DateTime, Utc};
use health_map_ingest_models::DataSetId;
use serde::{Deserialize, Serialize};

/// Earliest accepted dataset year.
pub const MIN_YEAR: i32 = 1000;
/// Latest accepted dataset year.
pub const MAX_YEAR: i32 = 9999;

/// A health metric that datasets are collected for (e.g. obesity,
/// mortality).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthIndicator {
    /// Primary key.
    pub id: i64,
    /// Unique display name.
    pub name: String,
    /// URL-safe slug derived from the name.
    pub slug: String,
    /// Whether overview pages should chart this indicator.
    pub important: bool,
}

/// A collection of measurements for one indicator and year, produced by a
/// single upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSet {
    /// Primary key.
    pub id: DataSetId,
    /// Indicator this dataset measures.
    pub indicator_id: i64,
    /// Year covered by the dataset.
    pub year: i32,
    /// Where the data came from.
    pub source: Option<String>,
    /// When the dataset was stored.
    pub uploaded_at: DateTime<Utc>,
}

/// Parameters for creating a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDataSet {
    /// Indicator name; the indicator is created if it does not exist.
    pub indicator: String,
    /// Year covered by the dataset.
    pub year: i32,
    /// Where the data came from.
    pub source: Option<String>,
}

/// A dataset together with its indicator name and point count, for
/// listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSetSummary {
    /// The dataset.
    pub data_set: DataSet,
    /// Name of the dataset's indicator.
    pub indicator: String,
    /// Number of stored points.
    pub point_count: u64,
}

/// Whether `year` is within the accepted range.
#[must_use]
pub const fn is_valid_year(year: i32) -> bool {
    year >= MIN_YEAR && year <= MAX_YEAR
}

/// Lowercases `name` and joins its alphanumeric runs with `-`.
#[must_use]
pub fn slugify(name: &str) -> String {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_names() {
        assert_eq!(slugify("Adult Obesity"), "adult-obesity");
        assert_eq!(slugify("  Premature death (YPLL) "), "premature-death-ypll");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn year_range() {
        assert!(is_valid_year(2018));
        assert!(is_valid_year(MIN_YEAR));
        assert!(is_valid_year(MAX_YEAR));
        assert!(!is_valid_year(999));
        assert!(!is_valid_year(10_000));
    }

    #[test]
    fn data_set_id_serializes_transparently() {
        let new = NewDataSet {
            indicator: "Obesity".to_string(),
            year: 2018,
            source: None,
        };
        let json = serde_json::to_value(&new).unwrap();
        assert_eq!(json["year"], 2018);
        assert_eq!(serde_json::to_value(DataSetId(3)).unwrap(), 3);
    }
}

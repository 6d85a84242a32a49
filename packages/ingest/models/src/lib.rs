#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Upload formats, samples, and ingestion result types.

pub mod progress;

use std::collections::BTreeMap;

use health_map_geography_models::County;
use health_map_percentile_models::{AssignedRank, PercentilePoint};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Column holding the state name or state code.
pub const STATE_COLUMN: &str = "State";
/// Column holding the county name or county code.
pub const COUNTY_COLUMN: &str = "County";
/// Column holding the five-digit composite county code.
pub const FIPS_COLUMN: &str = "FIPS";
/// Column holding the measured value.
pub const VALUE_COLUMN: &str = "Value";

/// How an uploaded file identifies the county on each row.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum UploadFormat {
    /// `State` and `County` columns hold full names.
    #[serde(rename = "NAME", alias = "by_name")]
    #[strum(to_string = "NAME", serialize = "by_name")]
    ByName,
    /// A single `FIPS` column holds the five-digit composite code.
    #[serde(rename = "1FIPS", alias = "by_single_code")]
    #[strum(to_string = "1FIPS", serialize = "by_single_code")]
    BySingleCode,
    /// `State` and `County` columns hold the two- and three-digit codes.
    #[serde(rename = "2FIPS", alias = "by_split_code")]
    #[strum(to_string = "2FIPS", serialize = "by_split_code")]
    BySplitCode,
}

impl UploadFormat {
    /// Every format, in menu order.
    pub const ALL: &[Self] = &[Self::ByName, Self::BySingleCode, Self::BySplitCode];

    /// Columns a file in this format must have to identify counties.
    #[must_use]
    pub const fn identifying_columns(self) -> &'static [&'static str] {
        match self {
            Self::ByName | Self::BySplitCode => &[STATE_COLUMN, COUNTY_COLUMN],
            Self::BySingleCode => &[FIPS_COLUMN],
        }
    }

    /// What the identifying columns hold, for error messages.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::ByName => "state name in 'State', county name in 'County'",
            Self::BySingleCode => "5-digit FIPS code in 'FIPS'",
            Self::BySplitCode => "2-digit state code in 'State', 3-digit county code in 'County'",
        }
    }
}

/// Identifier of the dataset a sample belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DataSetId(pub i64);

impl std::fmt::Display for DataSetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One measurement for a county within a dataset.
///
/// Samples are produced unsaved by ingestion; the caller decides whether
/// to persist them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    /// The county this measurement belongs to.
    pub county: County,
    /// The measured value, or `None` when the row had no usable number.
    pub value: Option<f64>,
    /// The dataset this sample belongs to.
    pub data_set: DataSetId,
    /// Percentile bucket, once assigned.
    pub rank: Option<AssignedRank>,
}

impl Sample {
    /// Creates an unranked sample.
    #[must_use]
    pub const fn new(county: County, value: Option<f64>, data_set: DataSetId) -> Self {
        Self {
            county,
            value,
            data_set,
            rank: None,
        }
    }
}

impl PercentilePoint for Sample {
    fn value(&self) -> Option<f64> {
        self.value
    }

    fn set_rank(&mut self, rank: AssignedRank) {
        self.rank = Some(rank);
    }
}

/// A row whose identifying fields matched no county.
///
/// `unresolved` is the county-level text (name or code) and `context` the
/// state-level text it was looked up under, e.g. `"Withevill"` in
/// `"Virginia"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mismatch {
    /// Zero-based data row index (header excluded).
    pub row: usize,
    /// County name or code that failed to resolve.
    pub unresolved: String,
    /// State name or code it was looked up in.
    pub context: String,
}

/// Every mismatch from one ingestion run, in row order.
///
/// Each failing row is kept, even when two rows fail with the same text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mismatches(Vec<Mismatch>);

impl Mismatches {
    /// Creates an empty collection.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Records a mismatch.
    pub fn push(&mut self, mismatch: Mismatch) {
        self.0.push(mismatch);
    }

    /// Number of failing rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether every row resolved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates mismatches in row order.
    pub fn iter(&self) -> std::slice::Iter<'_, Mismatch> {
        self.0.iter()
    }

    /// Collapses mismatches into an `unresolved -> context` mapping.
    ///
    /// When several rows share the same unresolved text the later row
    /// wins, so the mapping can have fewer entries than [`Self::len`].
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.0
            .iter()
            .map(|m| (m.unresolved.clone(), m.context.clone()))
            .collect()
    }
}

impl<'a> IntoIterator for &'a Mismatches {
    type Item = &'a Mismatch;
    type IntoIter = std::slice::Iter<'a, Mismatch>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<Mismatch> for Mismatches {
    fn from_iter<I: IntoIterator<Item = Mismatch>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Result of ingesting one tabular input.
///
/// Every row lands in exactly one of `resolved` or `unresolved`, and both
/// keep input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestOutcome {
    /// Rows that resolved to a county.
    pub resolved: Vec<Sample>,
    /// Rows that did not.
    pub unresolved: Mismatches,
    /// Indices of resolved rows whose value text was present but not a
    /// finite number. Those samples carry no value.
    pub unparsable_values: Vec<usize>,
}

impl IngestOutcome {
    /// Total rows seen.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.resolved.len() + self.unresolved.len()
    }
}

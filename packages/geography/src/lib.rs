#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! State and county directory lookups.
//!
//! The [`directory::GeoDirectory`] trait is the catalog that row resolution
//! queries. An in-memory implementation is provided here, loaded from the
//! reference CSV files by [`reference`]; a `DuckDB`-backed implementation
//! lives in `health_map_database`. [`search`] builds autocomplete
//! suggestions on top of any directory.

pub mod directory;
pub mod reference;
pub mod search;

use thiserror::Error;

/// Errors that can occur during geography operations.
///
/// A lookup that finds nothing is *not* an error: directory lookups return
/// `Ok(None)` or an empty list for that. These variants describe failures
/// of the underlying data source.
#[derive(Debug, Error)]
pub enum GeoError {
    /// Reading a reference file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing a reference CSV failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A county referenced a state that is not in the directory.
    #[error("Unknown state FIPS code: {state_fips}")]
    UnknownState {
        /// The state code that could not be found.
        state_fips: String,
    },

    /// The backing store failed to answer a query.
    #[error("Directory backend error: {message}")]
    Backend {
        /// Description of what went wrong.
        message: String,
    },
}

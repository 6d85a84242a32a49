#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! `DuckDB` storage for the health map.
//!
//! Holds the reference geography (states and counties) and every stored
//! dataset with its points and percentile table. Geography lookups are
//! exposed through [`geography_db::DuckDbDirectory`], which implements
//! `health_map_geography::directory::GeoDirectory`.

pub mod datasets;
pub mod geography_db;
pub mod paths;

use std::path::Path;

use duckdb::Connection;

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// `DuckDB` query error.
    #[error("Database error: {0}")]
    Database(#[from] duckdb::Error),

    /// Filesystem error while preparing the database location.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Reading the reference geography failed.
    #[error("Geography error: {0}")]
    Geo(#[from] health_map_geography::GeoError),

    /// A dataset already exists for this indicator and year.
    #[error("Indicator {indicator} already has a data set for year {year}")]
    DuplicateDataSet {
        /// Indicator name.
        indicator: String,
        /// Dataset year.
        year: i32,
    },

    /// The dataset year is outside the accepted range.
    #[error("Invalid year {year}: expected 1000-9999")]
    InvalidYear {
        /// The rejected year.
        year: i32,
    },

    /// A requested row does not exist.
    #[error("Not found: {message}")]
    NotFound {
        /// Description of what was missing.
        message: String,
    },

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

/// Opens (or creates) the database at `path` and ensures the schema exists.
///
/// # Errors
///
/// Returns [`DbError`] if the directory, connection, or schema creation
/// fails.
pub fn open(path: &Path) -> Result<Connection, DbError> {
    if let Some(parent) = path.parent() {
        paths::ensure_dir(parent)?;
    }

    let conn = Connection::open(path)?;
    create_schema(&conn)?;
    log::debug!("Opened database at {}", path.display());

    Ok(conn)
}

/// Opens a fresh in-memory database with the schema applied.
///
/// # Errors
///
/// Returns [`DbError`] if the connection or schema creation fails.
pub fn open_in_memory() -> Result<Connection, DbError> {
    let conn = Connection::open_in_memory()?;
    create_schema(&conn)?;
    Ok(conn)
}

fn create_schema(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS us_states (
            fips TEXT PRIMARY KEY,
            abbr TEXT NOT NULL,
            name TEXT NOT NULL,
            ord INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS us_counties (
            state_fips TEXT NOT NULL,
            fips TEXT NOT NULL,
            name TEXT NOT NULL,
            ord INTEGER NOT NULL,
            PRIMARY KEY (state_fips, fips)
        );

        CREATE SEQUENCE IF NOT EXISTS health_indicators_id_seq START 1;

        CREATE TABLE IF NOT EXISTS health_indicators (
            id BIGINT PRIMARY KEY DEFAULT nextval('health_indicators_id_seq'),
            name TEXT NOT NULL UNIQUE,
            slug TEXT NOT NULL,
            important BOOLEAN NOT NULL DEFAULT false
        );

        CREATE SEQUENCE IF NOT EXISTS data_sets_id_seq START 1;

        CREATE TABLE IF NOT EXISTS data_sets (
            id BIGINT PRIMARY KEY DEFAULT nextval('data_sets_id_seq'),
            indicator_id BIGINT NOT NULL,
            year INTEGER NOT NULL,
            source TEXT,
            uploaded_at_ms BIGINT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS data_points (
            data_set_id BIGINT NOT NULL,
            ord INTEGER NOT NULL,
            state_fips TEXT NOT NULL,
            county_fips TEXT NOT NULL,
            value DOUBLE,
            rank DOUBLE,
            above_range BOOLEAN NOT NULL DEFAULT false
        );

        CREATE TABLE IF NOT EXISTS percentiles (
            data_set_id BIGINT NOT NULL,
            rank DOUBLE NOT NULL,
            value DOUBLE NOT NULL
        );",
    )?;

    Ok(())
}

/// Runs `f` inside a transaction, committing on success and rolling back
/// on error.
///
/// # Errors
///
/// Returns the error produced by `f`, or [`DbError`] (converted into `E`)
/// if the transaction cannot be started or committed.
pub fn with_transaction<T, E, F>(conn: &Connection, f: F) -> Result<T, E>
where
    E: From<DbError>,
    F: FnOnce(&Connection) -> Result<T, E>,
{
    conn.execute_batch("BEGIN TRANSACTION;")
        .map_err(|e| E::from(DbError::from(e)))?;

    match f(conn) {
        Ok(value) => {
            conn.execute_batch("COMMIT;")
                .map_err(|e| E::from(DbError::from(e)))?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = conn.execute_batch("ROLLBACK;") {
                log::error!("Failed to roll back transaction: {rollback_err}");
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_idempotent() {
        let conn = open_in_memory().unwrap();
        create_schema(&conn).unwrap();
    }

    #[test]
    fn failed_transaction_rolls_back() {
        let conn = open_in_memory().unwrap();
        let result: Result<(), DbError> = with_transaction(&conn, |conn| {
            conn.execute(
                "INSERT INTO us_states (fips, abbr, name, ord) VALUES ('51', 'VA', 'Virginia', 0)",
                [],
            )?;
            Err(DbError::Conversion {
                message: "boom".to_string(),
            })
        });
        assert!(result.is_err());

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM us_states", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}

//! Reference geography tables and the `DuckDB`-backed directory.

use duckdb::{Connection, Row, ToSql};
use health_map_geography::GeoError;
use health_map_geography::directory::{GeoDirectory, InMemoryDirectory};
use health_map_geography_models::{County, State};

use crate::{DbError, with_transaction};

const COUNTY_SELECT: &str = "SELECT c.state_fips, s.abbr, c.fips, c.name
     FROM us_counties c
     JOIN us_states s ON s.fips = c.state_fips";

/// Replaces the stored states and counties with the contents of
/// `directory`, preserving catalog order.
///
/// Returns `(states, counties)` written.
///
/// # Errors
///
/// Returns [`DbError`] if any write fails; nothing is replaced in that
/// case.
pub fn store_directory(
    conn: &Connection,
    directory: &InMemoryDirectory,
) -> Result<(usize, usize), DbError> {
    let counties = directory.all_counties()?;

    with_transaction(conn, |conn| {
        conn.execute_batch("DELETE FROM us_counties; DELETE FROM us_states;")?;

        let mut stmt =
            conn.prepare("INSERT INTO us_states (fips, abbr, name, ord) VALUES (?, ?, ?, ?)")?;
        for (ord, state) in directory.states().iter().enumerate() {
            let ord = i64::try_from(ord).map_err(|e| DbError::Conversion {
                message: e.to_string(),
            })?;
            stmt.execute(duckdb::params![state.fips, state.abbr, state.name, ord])?;
        }

        let mut stmt = conn
            .prepare("INSERT INTO us_counties (state_fips, fips, name, ord) VALUES (?, ?, ?, ?)")?;
        for (ord, county) in counties.iter().enumerate() {
            let ord = i64::try_from(ord).map_err(|e| DbError::Conversion {
                message: e.to_string(),
            })?;
            stmt.execute(duckdb::params![
                county.state_fips,
                county.fips,
                county.name,
                ord
            ])?;
        }

        Ok::<_, DbError>(())
    })?;

    log::info!(
        "Stored {} states and {} counties",
        directory.states().len(),
        counties.len()
    );

    Ok((directory.states().len(), counties.len()))
}

/// Number of stored states.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn state_count(conn: &Connection) -> Result<u64, DbError> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM us_states", [], |row| row.get(0))?;
    u64::try_from(count).map_err(|e| DbError::Conversion {
        message: e.to_string(),
    })
}

/// Reads the stored geography back into memory.
///
/// # Errors
///
/// Returns [`DbError`] if a query fails.
pub fn load_directory(conn: &Connection) -> Result<InMemoryDirectory, DbError> {
    let dir = DuckDbDirectory::new(conn);
    let mut memory = InMemoryDirectory::with_states(dir.states()?);
    for county in dir.all_counties()? {
        memory.insert_county(county)?;
    }
    Ok(memory)
}

/// A [`GeoDirectory`] that queries the `us_states` and `us_counties`
/// tables directly.
pub struct DuckDbDirectory<'a> {
    conn: &'a Connection,
}

impl<'a> DuckDbDirectory<'a> {
    /// Wraps an open connection.
    #[must_use]
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// All states in catalog order.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::Backend`] if the query fails.
    pub fn states(&self) -> Result<Vec<State>, GeoError> {
        self.query_states("SELECT fips, abbr, name FROM us_states ORDER BY ord", &[])
    }

    fn query_states(&self, sql: &str, params: &[&dyn ToSql]) -> Result<Vec<State>, GeoError> {
        let mut stmt = self.conn.prepare(sql).map_err(backend)?;
        let rows = stmt
            .query_map(params, |row| {
                Ok(State {
                    fips: row.get(0)?,
                    abbr: row.get(1)?,
                    name: row.get(2)?,
                })
            })
            .map_err(backend)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(backend)
    }

    fn query_counties(&self, sql: &str, params: &[&dyn ToSql]) -> Result<Vec<County>, GeoError> {
        let mut stmt = self.conn.prepare(sql).map_err(backend)?;
        let rows = stmt.query_map(params, county_from_row).map_err(backend)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(backend)
    }
}

fn county_from_row(row: &Row<'_>) -> duckdb::Result<County> {
    Ok(County {
        state_fips: row.get(0)?,
        state_abbr: row.get(1)?,
        fips: row.get(2)?,
        name: row.get(3)?,
    })
}

#[allow(clippy::needless_pass_by_value)]
fn backend(e: duckdb::Error) -> GeoError {
    GeoError::Backend {
        message: e.to_string(),
    }
}

impl GeoDirectory for DuckDbDirectory<'_> {
    fn find_state_by_code(&self, code: &str) -> Result<Option<State>, GeoError> {
        let states =
            self.query_states("SELECT fips, abbr, name FROM us_states WHERE fips = ?", &[&code])?;
        Ok(states.into_iter().next())
    }

    fn find_state_by_name(&self, name: &str) -> Result<Option<State>, GeoError> {
        let states = self.query_states(
            "SELECT fips, abbr, name FROM us_states
             WHERE lower(name) = lower(?)
             ORDER BY ord
             LIMIT 1",
            &[&name],
        )?;
        Ok(states.into_iter().next())
    }

    fn find_county_by_code(&self, state: &State, code: &str) -> Result<Option<County>, GeoError> {
        let counties = self.query_counties(
            &format!("{COUNTY_SELECT} WHERE c.state_fips = ? AND c.fips = ?"),
            &[&state.fips, &code],
        )?;
        Ok(counties.into_iter().next())
    }

    fn find_counties_by_name_prefix(
        &self,
        state: &State,
        prefix: &str,
    ) -> Result<Vec<County>, GeoError> {
        self.query_counties(
            &format!(
                "{COUNTY_SELECT} WHERE c.state_fips = ? AND starts_with(c.name, ?) ORDER BY c.ord"
            ),
            &[&state.fips, &prefix],
        )
    }

    fn counties_in_state(&self, state: &State) -> Result<Vec<County>, GeoError> {
        self.query_counties(
            &format!("{COUNTY_SELECT} WHERE c.state_fips = ? ORDER BY c.ord"),
            &[&state.fips],
        )
    }

    fn all_states(&self) -> Result<Vec<State>, GeoError> {
        self.states()
    }

    fn all_counties(&self) -> Result<Vec<County>, GeoError> {
        self.query_counties(&format!("{COUNTY_SELECT} ORDER BY c.ord"), &[])
    }
}

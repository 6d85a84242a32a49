//! Health indicators, datasets, their points, and percentile tables.
//!
//! `DuckDB` has no `ON DELETE CASCADE`, so deleting a dataset removes its
//! points and percentile rows explicitly inside one transaction.

use chrono::{DateTime, Utc};
use duckdb::{Connection, Row};
use health_map_database_models::{
    DataSet, DataSetSummary, HealthIndicator, NewDataSet, is_valid_year, slugify,
};
use health_map_geography_models::County;
use health_map_ingest_models::{DataSetId, Sample};
use health_map_percentile_models::{AssignedRank, PercentileEntry};

use crate::{DbError, with_transaction};

/// Rank comparisons tolerate this much floating-point drift.
const RANK_TOLERANCE: f64 = 1e-9;

const DATA_SET_SELECT: &str = "SELECT d.id, d.indicator_id, d.year, d.source, d.uploaded_at_ms
     FROM data_sets d
     JOIN health_indicators i ON i.id = d.indicator_id";

/// Returns the indicator named `name`, creating it if it does not exist.
///
/// # Errors
///
/// Returns [`DbError`] if a query fails.
pub fn get_or_create_indicator(conn: &Connection, name: &str) -> Result<HealthIndicator, DbError> {
    if let Some(existing) = find_indicator(conn, name)? {
        return Ok(existing);
    }

    let id: i64 = conn.query_row(
        "INSERT INTO health_indicators (name, slug) VALUES (?, ?) RETURNING id",
        duckdb::params![name, slugify(name)],
        |row| row.get(0),
    )?;
    log::info!("Created health indicator {name:?} (id {id})");

    Ok(HealthIndicator {
        id,
        name: name.to_string(),
        slug: slugify(name),
        important: false,
    })
}

/// Finds an indicator by exact name.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn find_indicator(conn: &Connection, name: &str) -> Result<Option<HealthIndicator>, DbError> {
    optional(conn.query_row(
        "SELECT id, name, slug, important FROM health_indicators WHERE name = ?",
        [name],
        indicator_from_row,
    ))
}

/// Lists every indicator, ordered by name.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn list_indicators(conn: &Connection) -> Result<Vec<HealthIndicator>, DbError> {
    let mut stmt =
        conn.prepare("SELECT id, name, slug, important FROM health_indicators ORDER BY name")?;
    let rows = stmt.query_map([], indicator_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Marks an indicator as important (or not).
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no indicator has that name.
pub fn set_indicator_important(
    conn: &Connection,
    name: &str,
    important: bool,
) -> Result<(), DbError> {
    let updated = conn.execute(
        "UPDATE health_indicators SET important = ? WHERE name = ?",
        duckdb::params![important, name],
    )?;
    if updated == 0 {
        return Err(DbError::NotFound {
            message: format!("indicator {name:?}"),
        });
    }
    Ok(())
}

fn indicator_from_row(row: &Row<'_>) -> duckdb::Result<HealthIndicator> {
    Ok(HealthIndicator {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        important: row.get(3)?,
    })
}

/// Creates a dataset, creating its indicator on first use.
///
/// # Errors
///
/// * [`DbError::InvalidYear`] if the year is outside 1000-9999
/// * [`DbError::DuplicateDataSet`] if the indicator already has a dataset
///   for that year
/// * [`DbError::Database`] if a query fails
pub fn create_data_set(
    conn: &Connection,
    new: &NewDataSet,
    uploaded_at: DateTime<Utc>,
) -> Result<DataSet, DbError> {
    if !is_valid_year(new.year) {
        return Err(DbError::InvalidYear { year: new.year });
    }

    let indicator = get_or_create_indicator(conn, &new.indicator)?;

    let existing: i64 = conn.query_row(
        "SELECT COUNT(*) FROM data_sets WHERE indicator_id = ? AND year = ?",
        duckdb::params![indicator.id, new.year],
        |row| row.get(0),
    )?;
    if existing > 0 {
        return Err(DbError::DuplicateDataSet {
            indicator: new.indicator.clone(),
            year: new.year,
        });
    }

    let id: i64 = conn.query_row(
        "INSERT INTO data_sets (indicator_id, year, source, uploaded_at_ms)
         VALUES (?, ?, ?, ?)
         RETURNING id",
        duckdb::params![
            indicator.id,
            new.year,
            new.source.as_deref(),
            uploaded_at.timestamp_millis()
        ],
        |row| row.get(0),
    )?;

    log::info!(
        "Created data set {id} for {:?} ({})",
        new.indicator,
        new.year
    );

    Ok(DataSet {
        id: DataSetId(id),
        indicator_id: indicator.id,
        year: new.year,
        source: new.source.clone(),
        uploaded_at: from_millis(uploaded_at.timestamp_millis())?,
    })
}

/// Stores samples in input order. Each sample is stored under its own
/// `data_set`.
///
/// # Errors
///
/// Returns [`DbError`] if an insert fails.
pub fn insert_samples(conn: &Connection, samples: &[Sample]) -> Result<usize, DbError> {
    let mut stmt = conn.prepare(
        "INSERT INTO data_points
            (data_set_id, ord, state_fips, county_fips, value, rank, above_range)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )?;

    for (ord, sample) in samples.iter().enumerate() {
        let ord = i64::try_from(ord).map_err(|e| DbError::Conversion {
            message: e.to_string(),
        })?;
        let rank = sample.rank.and_then(AssignedRank::rank);
        let above_range = sample.rank.is_some_and(AssignedRank::is_above_range);
        stmt.execute(duckdb::params![
            sample.data_set.0,
            ord,
            sample.county.state_fips,
            sample.county.fips,
            sample.value,
            rank,
            above_range,
        ])?;
    }

    Ok(samples.len())
}

/// Stores a percentile table for a dataset.
///
/// # Errors
///
/// Returns [`DbError`] if an insert fails.
pub fn insert_percentiles(
    conn: &Connection,
    data_set: DataSetId,
    entries: &[PercentileEntry],
) -> Result<usize, DbError> {
    let mut stmt =
        conn.prepare("INSERT INTO percentiles (data_set_id, rank, value) VALUES (?, ?, ?)")?;
    for entry in entries {
        stmt.execute(duckdb::params![data_set.0, entry.rank, entry.value])?;
    }
    Ok(entries.len())
}

/// Deletes a dataset with its points and percentiles.
///
/// Returns `false` if no such dataset existed.
///
/// # Errors
///
/// Returns [`DbError`] if a delete fails; nothing is removed in that case.
pub fn delete_data_set(conn: &Connection, id: DataSetId) -> Result<bool, DbError> {
    let deleted = with_transaction(conn, |conn| {
        conn.execute("DELETE FROM data_points WHERE data_set_id = ?", [id.0])?;
        conn.execute("DELETE FROM percentiles WHERE data_set_id = ?", [id.0])?;
        let deleted = conn.execute("DELETE FROM data_sets WHERE id = ?", [id.0])?;
        Ok::<_, DbError>(deleted)
    })?;

    if deleted > 0 {
        log::info!("Deleted data set {id}");
    }

    Ok(deleted > 0)
}

/// Finds a dataset by id.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn get_data_set(conn: &Connection, id: DataSetId) -> Result<Option<DataSet>, DbError> {
    let raw = optional(conn.query_row(
        &format!("{DATA_SET_SELECT} WHERE d.id = ?"),
        [id.0],
        raw_data_set_from_row,
    ))?;
    raw.map(RawDataSet::into_data_set).transpose()
}

/// Finds the dataset of `indicator` for `year`.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn data_set_for_year(
    conn: &Connection,
    indicator: &str,
    year: i32,
) -> Result<Option<DataSet>, DbError> {
    let raw = optional(conn.query_row(
        &format!("{DATA_SET_SELECT} WHERE i.name = ? AND d.year = ?"),
        duckdb::params![indicator, year],
        raw_data_set_from_row,
    ))?;
    raw.map(RawDataSet::into_data_set).transpose()
}

/// Years that `indicator` has datasets for, ascending.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn years_for_indicator(conn: &Connection, indicator: &str) -> Result<Vec<i32>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT d.year
         FROM data_sets d
         JOIN health_indicators i ON i.id = d.indicator_id
         WHERE i.name = ?
         ORDER BY d.year",
    )?;
    let rows = stmt.query_map([indicator], |row| row.get(0))?;
    Ok(rows.collect::<Result<Vec<i32>, _>>()?)
}

/// The most recently uploaded dataset for `indicator`.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn most_recent_for_indicator(
    conn: &Connection,
    indicator: &str,
) -> Result<Option<DataSet>, DbError> {
    let raw = optional(conn.query_row(
        &format!(
            "{DATA_SET_SELECT} WHERE i.name = ?
             ORDER BY d.uploaded_at_ms DESC, d.id DESC
             LIMIT 1"
        ),
        [indicator],
        raw_data_set_from_row,
    ))?;
    raw.map(RawDataSet::into_data_set).transpose()
}

/// Every dataset with its indicator name and point count, ordered by
/// indicator then year.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn list_data_sets(conn: &Connection) -> Result<Vec<DataSetSummary>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT d.id, d.indicator_id, d.year, d.source, d.uploaded_at_ms,
                i.name,
                (SELECT COUNT(*) FROM data_points p WHERE p.data_set_id = d.id)
         FROM data_sets d
         JOIN health_indicators i ON i.id = d.indicator_id
         ORDER BY i.name, d.year",
    )?;

    let rows = stmt.query_map([], |row| {
        let raw = raw_data_set_from_row(row)?;
        let indicator: String = row.get(5)?;
        let count: i64 = row.get(6)?;
        Ok((raw, indicator, count))
    })?;

    let mut summaries = Vec::new();
    for row in rows {
        let (raw, indicator, count) = row?;
        summaries.push(DataSetSummary {
            data_set: raw.into_data_set()?,
            indicator,
            point_count: u64::try_from(count).map_err(|e| DbError::Conversion {
                message: e.to_string(),
            })?,
        });
    }

    Ok(summaries)
}

/// The stored percentile table of a dataset, ordered by rank.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn percentiles_for(conn: &Connection, id: DataSetId) -> Result<Vec<PercentileEntry>, DbError> {
    let mut stmt =
        conn.prepare("SELECT rank, value FROM percentiles WHERE data_set_id = ? ORDER BY rank")?;
    let rows = stmt.query_map([id.0], |row| {
        Ok(PercentileEntry {
            rank: row.get(0)?,
            value: row.get(1)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// The stored points of a dataset, in the order they were inserted.
///
/// Points whose county is no longer in the reference tables are skipped.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn samples_for(conn: &Connection, id: DataSetId) -> Result<Vec<Sample>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT p.state_fips, s.abbr, p.county_fips, c.name, p.value, p.rank, p.above_range
         FROM data_points p
         JOIN us_counties c ON c.state_fips = p.state_fips AND c.fips = p.county_fips
         JOIN us_states s ON s.fips = p.state_fips
         WHERE p.data_set_id = ?
         ORDER BY p.ord",
    )?;

    let rows = stmt.query_map([id.0], |row| {
        let county = County {
            state_fips: row.get(0)?,
            state_abbr: row.get(1)?,
            fips: row.get(2)?,
            name: row.get(3)?,
        };
        let value: Option<f64> = row.get(4)?;
        let rank: Option<f64> = row.get(5)?;
        let above_range: bool = row.get(6)?;

        let mut sample = Sample::new(county, value, id);
        sample.rank = if above_range {
            Some(AssignedRank::AboveRange)
        } else {
            rank.map(AssignedRank::Ranked)
        };
        Ok(sample)
    })?;

    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Looks up the boundary value a rank stands for in a stored table.
///
/// Returns `None` for [`AssignedRank::AboveRange`], which has no boundary,
/// and for ranks not in the table.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn value_for_rank(
    conn: &Connection,
    id: DataSetId,
    rank: AssignedRank,
) -> Result<Option<f64>, DbError> {
    let Some(rank) = rank.rank() else {
        return Ok(None);
    };

    optional(conn.query_row(
        "SELECT value FROM percentiles
         WHERE data_set_id = ? AND abs(rank - ?) < ?
         ORDER BY abs(rank - ?)
         LIMIT 1",
        duckdb::params![id.0, rank, RANK_TOLERANCE, rank],
        |row| row.get(0),
    ))
}

struct RawDataSet {
    id: i64,
    indicator_id: i64,
    year: i32,
    source: Option<String>,
    uploaded_at_ms: i64,
}

impl RawDataSet {
    fn into_data_set(self) -> Result<DataSet, DbError> {
        Ok(DataSet {
            id: DataSetId(self.id),
            indicator_id: self.indicator_id,
            year: self.year,
            source: self.source,
            uploaded_at: from_millis(self.uploaded_at_ms)?,
        })
    }
}

fn raw_data_set_from_row(row: &Row<'_>) -> duckdb::Result<RawDataSet> {
    Ok(RawDataSet {
        id: row.get(0)?,
        indicator_id: row.get(1)?,
        year: row.get(2)?,
        source: row.get(3)?,
        uploaded_at_ms: row.get(4)?,
    })
}

fn optional<T>(result: duckdb::Result<T>) -> Result<Option<T>, DbError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, DbError> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| DbError::Conversion {
        message: format!("timestamp out of range: {ms}"),
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;
    use health_map_geography::directory::InMemoryDirectory;
    use health_map_geography_models::State;

    use super::*;
    use crate::geography_db::store_directory;
    use crate::open_in_memory;

    fn setup() -> (Connection, Vec<County>) {
        let conn = open_in_memory().unwrap();
        let virginia = State::new("51", "VA", "Virginia");
        let mut dir = InMemoryDirectory::with_states(vec![virginia.clone()]);
        let counties = vec![
            County::new(&virginia, "121", "Montgomery County"),
            County::new(&virginia, "161", "Roanoke County"),
            County::new(&virginia, "197", "Wythe County"),
        ];
        for county in &counties {
            dir.insert_county(county.clone()).unwrap();
        }
        store_directory(&conn, &dir).unwrap();
        (conn, counties)
    }

    fn new_data_set(indicator: &str, year: i32) -> NewDataSet {
        NewDataSet {
            indicator: indicator.to_string(),
            year,
            source: Some("County Health Rankings".to_string()),
        }
    }

    fn at(year: i32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn indicator_is_created_once() {
        let (conn, _) = setup();
        let first = get_or_create_indicator(&conn, "Adult Obesity").unwrap();
        let second = get_or_create_indicator(&conn, "Adult Obesity").unwrap();
        assert_eq!(first, second);
        assert_eq!(first.slug, "adult-obesity");
        assert!(!first.important);

        set_indicator_important(&conn, "Adult Obesity", true).unwrap();
        assert!(list_indicators(&conn).unwrap()[0].important);
        assert!(matches!(
            set_indicator_important(&conn, "Nope", true),
            Err(DbError::NotFound { .. })
        ));
    }

    #[test]
    fn rejects_duplicate_and_out_of_range_years() {
        let (conn, _) = setup();
        create_data_set(&conn, &new_data_set("Obesity", 2018), at(2019)).unwrap();

        assert!(matches!(
            create_data_set(&conn, &new_data_set("Obesity", 2018), at(2020)),
            Err(DbError::DuplicateDataSet { year: 2018, .. })
        ));
        assert!(matches!(
            create_data_set(&conn, &new_data_set("Obesity", 999), at(2020)),
            Err(DbError::InvalidYear { year: 999 })
        ));
        create_data_set(&conn, &new_data_set("Smoking", 2018), at(2020)).unwrap();
    }

    #[test]
    fn year_queries() {
        let (conn, _) = setup();
        create_data_set(&conn, &new_data_set("Obesity", 2017), at(2021)).unwrap();
        create_data_set(&conn, &new_data_set("Obesity", 2015), at(2018)).unwrap();
        create_data_set(&conn, &new_data_set("Obesity", 2016), at(2019)).unwrap();

        assert_eq!(
            years_for_indicator(&conn, "Obesity").unwrap(),
            vec![2015, 2016, 2017]
        );
        let found = data_set_for_year(&conn, "Obesity", 2016).unwrap().unwrap();
        assert_eq!(found.year, 2016);
        assert_eq!(found.uploaded_at, at(2019));
        assert!(data_set_for_year(&conn, "Obesity", 2010).unwrap().is_none());

        let recent = most_recent_for_indicator(&conn, "Obesity").unwrap().unwrap();
        assert_eq!(recent.year, 2017);
        assert!(most_recent_for_indicator(&conn, "Nope").unwrap().is_none());
    }

    #[test]
    fn stores_points_and_percentiles_and_deletes_together() {
        let (conn, counties) = setup();
        let data_set = create_data_set(&conn, &new_data_set("Obesity", 2018), at(2019)).unwrap();

        let mut samples: Vec<Sample> = counties
            .iter()
            .zip([Some(0.2), None, Some(0.4)])
            .map(|(county, value)| Sample::new(county.clone(), value, data_set.id))
            .collect();
        samples[0].rank = Some(AssignedRank::Ranked(0.5));
        samples[2].rank = Some(AssignedRank::AboveRange);

        insert_samples(&conn, &samples).unwrap();
        insert_percentiles(
            &conn,
            data_set.id,
            &[
                PercentileEntry {
                    rank: 0.5,
                    value: 0.3,
                },
                PercentileEntry {
                    rank: 0.25,
                    value: 0.2,
                },
            ],
        )
        .unwrap();

        assert_eq!(samples_for(&conn, data_set.id).unwrap(), samples);

        let table = percentiles_for(&conn, data_set.id).unwrap();
        assert_eq!(table.len(), 2);
        assert!(table[0].rank < table[1].rank);

        assert_eq!(
            value_for_rank(&conn, data_set.id, AssignedRank::Ranked(0.5)).unwrap(),
            Some(0.3)
        );
        assert_eq!(
            value_for_rank(&conn, data_set.id, AssignedRank::AboveRange).unwrap(),
            None
        );
        assert_eq!(
            value_for_rank(&conn, data_set.id, AssignedRank::Ranked(0.9)).unwrap(),
            None
        );

        let listed = list_data_sets(&conn).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].point_count, 3);
        assert_eq!(listed[0].indicator, "Obesity");

        assert!(delete_data_set(&conn, data_set.id).unwrap());
        assert!(samples_for(&conn, data_set.id).unwrap().is_empty());
        assert!(percentiles_for(&conn, data_set.id).unwrap().is_empty());
        assert!(get_data_set(&conn, data_set.id).unwrap().is_none());
        assert!(!delete_data_set(&conn, data_set.id).unwrap());
    }
}

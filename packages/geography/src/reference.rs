//! Reference data loading.
//!
//! Reads the states file (`FIPS,USPS,NAME`) and counties file
//! (`STATE_FIPS,FIPS,STATE_USPS,NAME`) into an [`InMemoryDirectory`].
//! Codes are trimmed and zero-padded on the way in.

use std::io::Read;
use std::path::Path;

use health_map_geography_models::fips::{COUNTY_FIPS_LEN, STATE_FIPS_LEN, builtin_states, pad_code};
use health_map_geography_models::{County, State};
use serde::Deserialize;

use crate::GeoError;
use crate::directory::InMemoryDirectory;

#[derive(Debug, Deserialize)]
struct StateRecord {
    #[serde(rename = "FIPS")]
    fips: String,
    #[serde(rename = "USPS")]
    usps: String,
    #[serde(rename = "NAME")]
    name: String,
}

#[derive(Debug, Deserialize)]
struct CountyRecord {
    #[serde(rename = "STATE_FIPS")]
    state_fips: String,
    #[serde(rename = "FIPS")]
    fips: String,
    #[serde(rename = "NAME")]
    name: String,
}

/// Reads states from a `FIPS,USPS,NAME` CSV.
///
/// # Errors
///
/// Returns [`GeoError::Csv`] if the file is not valid CSV or a required
/// column is missing.
pub fn read_states<R: Read>(reader: R) -> Result<Vec<State>, GeoError> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let mut states = Vec::new();
    for result in csv_reader.deserialize::<StateRecord>() {
        let record = result?;
        states.push(State {
            fips: pad_code(&record.fips, STATE_FIPS_LEN),
            abbr: record.usps.to_uppercase(),
            name: record.name,
        });
    }

    Ok(states)
}

/// Reads counties from a `STATE_FIPS,FIPS,STATE_USPS,NAME` CSV into
/// `directory`, whose states must already be loaded.
///
/// Counties whose state is unknown are skipped with a warning. Returns the
/// number of counties inserted.
///
/// # Errors
///
/// Returns [`GeoError::Csv`] if the file is not valid CSV or a required
/// column is missing.
pub fn read_counties_into<R: Read>(
    reader: R,
    directory: &mut InMemoryDirectory,
) -> Result<usize, GeoError> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let mut inserted = 0;
    let mut skipped = 0;
    for result in csv_reader.deserialize::<CountyRecord>() {
        let record = result?;
        let state_fips = pad_code(&record.state_fips, STATE_FIPS_LEN);
        let Some(state) = directory
            .states()
            .iter()
            .find(|s| s.fips == state_fips)
            .cloned()
        else {
            log::warn!(
                "Skipping county {:?}: unknown state FIPS {state_fips:?}",
                record.name
            );
            skipped += 1;
            continue;
        };

        let county = County::new(
            &state,
            &pad_code(&record.fips, COUNTY_FIPS_LEN),
            &record.name,
        );
        directory.insert_county(county)?;
        inserted += 1;
    }

    if skipped > 0 {
        log::warn!("Skipped {skipped} counties with unknown states");
    }

    Ok(inserted)
}

/// Builds a directory from reference files on disk.
///
/// When `states_path` is `None` the built-in table of the 50 states, DC,
/// and Puerto Rico is used.
///
/// # Errors
///
/// Returns [`GeoError`] if either file cannot be opened or parsed.
pub fn load_directory(
    states_path: Option<&Path>,
    counties_path: &Path,
) -> Result<InMemoryDirectory, GeoError> {
    let states = match states_path {
        Some(path) => read_states(std::fs::File::open(path)?)?,
        None => builtin_states(),
    };
    log::info!("Loaded {} states", states.len());

    let mut directory = InMemoryDirectory::with_states(states);
    let count = read_counties_into(std::fs::File::open(counties_path)?, &mut directory)?;
    log::info!("Loaded {count} counties from {}", counties_path.display());

    Ok(directory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::GeoDirectory as _;

    const STATES_CSV: &str = "FIPS,USPS,NAME\n6,CA,California\n51,va,Virginia\n";
    const COUNTIES_CSV: &str = "STATE_FIPS,FIPS,STATE_USPS,NAME\n\
        06,37,CA,Los Angeles County\n\
        51,121,VA,Montgomery County\n\
        72,001,PR,Adjuntas Municipio\n";

    #[test]
    fn reads_and_pads_states() {
        let states = read_states(STATES_CSV.as_bytes()).unwrap();
        assert_eq!(states.len(), 2);
        assert_eq!(states[0].fips, "06");
        assert_eq!(states[1].abbr, "VA");
    }

    #[test]
    fn reads_counties_skipping_unknown_states() {
        let states = read_states(STATES_CSV.as_bytes()).unwrap();
        let mut dir = InMemoryDirectory::with_states(states);
        let inserted = read_counties_into(COUNTIES_CSV.as_bytes(), &mut dir).unwrap();
        assert_eq!(inserted, 2);

        let la = dir.find_county_by_fips5("06037").unwrap().unwrap();
        assert_eq!(la.name, "Los Angeles County");
        assert_eq!(la.state_abbr, "CA");
    }

    #[test]
    fn missing_column_is_an_error() {
        let bad = "FIPS,NAME\n06,California\n";
        assert!(matches!(
            read_states(bad.as_bytes()),
            Err(GeoError::Csv(_))
        ));
    }

    #[test]
    fn builtin_states_seed_county_loading() {
        let mut dir = InMemoryDirectory::with_states(builtin_states());
        let inserted = read_counties_into(COUNTIES_CSV.as_bytes(), &mut dir).unwrap();
        assert_eq!(inserted, 3);
        assert_eq!(dir.states().len(), 52);

        let adjuntas = dir.find_county_by_fips5("72001").unwrap().unwrap();
        assert_eq!(adjuntas.search_label(), "Adjuntas Municipio PR");
    }
}

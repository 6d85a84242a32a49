//! Row-to-county resolution for each upload format.

use std::collections::BTreeMap;

use health_map_geography::GeoError;
use health_map_geography::directory::GeoDirectory;
use health_map_geography_models::County;
use health_map_geography_models::fips::split_county_fips;
use health_map_ingest_models::{COUNTY_COLUMN, FIPS_COLUMN, STATE_COLUMN, UploadFormat};

/// One input row: column name to cell text.
pub type Row = BTreeMap<String, String>;

/// Outcome of resolving a single row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The row identifies this county.
    Resolved(County),
    /// The row's identifying fields matched nothing.
    Unresolved {
        /// County-level text (name or code).
        unresolved: String,
        /// State-level text it was looked up under.
        context: String,
    },
}

impl Resolution {
    fn unresolved(unresolved: &str, context: &str) -> Self {
        Self::Unresolved {
            unresolved: unresolved.to_string(),
            context: context.to_string(),
        }
    }
}

/// Resolves `row` to a county using `format`.
///
/// A missing column reads as empty text, which then fails to resolve like
/// any other unknown identifier.
///
/// # Errors
///
/// Returns [`GeoError`] only if the directory itself fails; lookups that
/// find nothing produce [`Resolution::Unresolved`].
pub fn resolve_row<D: GeoDirectory + ?Sized>(
    directory: &D,
    format: UploadFormat,
    row: &Row,
) -> Result<Resolution, GeoError> {
    match format {
        UploadFormat::ByName => resolve_by_name(
            directory,
            field(row, STATE_COLUMN),
            field(row, COUNTY_COLUMN),
        ),
        UploadFormat::BySplitCode => resolve_by_codes(
            directory,
            field(row, STATE_COLUMN),
            field(row, COUNTY_COLUMN),
        ),
        UploadFormat::BySingleCode => {
            let (state_code, county_code) = split_county_fips(field(row, FIPS_COLUMN));
            resolve_by_codes(directory, &state_code, &county_code)
        }
    }
}

fn field<'a>(row: &'a Row, column: &str) -> &'a str {
    row.get(column).map_or("", String::as_str)
}

/// Resolves a two-digit state code and three-digit county code.
///
/// # Errors
///
/// Returns [`GeoError`] if the directory fails.
pub fn resolve_by_codes<D: GeoDirectory + ?Sized>(
    directory: &D,
    state_code: &str,
    county_code: &str,
) -> Result<Resolution, GeoError> {
    let Some(state) = directory.find_state_by_code(state_code)? else {
        log::debug!("No state with code {state_code:?}");
        return Ok(Resolution::unresolved(county_code, state_code));
    };

    Ok(directory
        .find_county_by_code(&state, county_code)?
        .map_or_else(
            || Resolution::unresolved(county_code, state_code),
            Resolution::Resolved,
        ))
}

/// Resolves a full state name and a county name (or name prefix).
///
/// When several counties start with `county_name` the shortest name wins,
/// so `"Clay"` picks `"Clay County"` over `"Clayton County"`. Equal lengths
/// keep the directory's order.
///
/// # Errors
///
/// Returns [`GeoError`] if the directory fails.
pub fn resolve_by_name<D: GeoDirectory + ?Sized>(
    directory: &D,
    state_name: &str,
    county_name: &str,
) -> Result<Resolution, GeoError> {
    let Some(state) = directory.find_state_by_name(state_name)? else {
        log::debug!("No state named {state_name:?}");
        return Ok(Resolution::unresolved(county_name, state_name));
    };

    let candidates = directory.find_counties_by_name_prefix(&state, county_name)?;
    if candidates.len() > 1 {
        log::debug!(
            "{} counties in {} start with {county_name:?}, taking the shortest",
            candidates.len(),
            state.name
        );
    }

    // min_by_key keeps the first of equal keys.
    Ok(candidates
        .into_iter()
        .min_by_key(|county| county.name.len())
        .map_or_else(
            || Resolution::unresolved(county_name, state_name),
            Resolution::Resolved,
        ))
}

#[cfg(test)]
mod tests {
    use health_map_geography::directory::InMemoryDirectory;
    use health_map_geography_models::State;

    use super::*;

    fn directory() -> InMemoryDirectory {
        let california = State::new("06", "CA", "California");
        let georgia = State::new("13", "GA", "Georgia");
        let virginia = State::new("51", "VA", "Virginia");
        let mut dir =
            InMemoryDirectory::with_states(vec![california.clone(), georgia.clone(), virginia.clone()]);
        for county in [
            County::new(&california, "037", "Los Angeles County"),
            County::new(&georgia, "063", "Clayton County"),
            County::new(&georgia, "061", "Clay County"),
            County::new(&georgia, "283", "Lex County"),
            County::new(&georgia, "281", "Lee County"),
            County::new(&virginia, "121", "Montgomery County"),
            County::new(&virginia, "161", "Roanoke County"),
            County::new(&virginia, "770", "Roanoke city"),
        ] {
            dir.insert_county(county).unwrap();
        }
        dir
    }

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn resolved_name(resolution: Resolution) -> String {
        match resolution {
            Resolution::Resolved(county) => county.name,
            other @ Resolution::Unresolved { .. } => panic!("expected a county, got {other:?}"),
        }
    }

    #[test]
    fn single_code_splits_into_state_and_county() {
        let resolution =
            resolve_row(&directory(), UploadFormat::BySingleCode, &row(&[("FIPS", "06037")]))
                .unwrap();
        let Resolution::Resolved(county) = resolution else {
            panic!("expected a county");
        };
        assert_eq!(county.state_fips, "06");
        assert_eq!(county.fips, "037");
    }

    #[test]
    fn unknown_single_code_reports_split_parts() {
        let resolution =
            resolve_row(&directory(), UploadFormat::BySingleCode, &row(&[("FIPS", "06999")]))
                .unwrap();
        assert_eq!(resolution, Resolution::unresolved("999", "06"));
    }

    #[test]
    fn split_codes_resolve_and_report_unknown_state() {
        let dir = directory();
        let found = resolve_row(
            &dir,
            UploadFormat::BySplitCode,
            &row(&[("State", "51"), ("County", "121")]),
        )
        .unwrap();
        assert_eq!(resolved_name(found), "Montgomery County");

        let missing = resolve_row(
            &dir,
            UploadFormat::BySplitCode,
            &row(&[("State", "99"), ("County", "121")]),
        )
        .unwrap();
        assert_eq!(missing, Resolution::unresolved("121", "99"));
    }

    #[test]
    fn ambiguous_prefix_takes_shortest_name() {
        let resolution = resolve_by_name(&directory(), "Georgia", "Clay").unwrap();
        assert_eq!(resolved_name(resolution), "Clay County");
    }

    #[test]
    fn shortest_name_wins_over_directory_order() {
        let resolution = resolve_by_name(&directory(), "Virginia", "Roanoke").unwrap();
        assert_eq!(resolved_name(resolution), "Roanoke city");

        let resolution = resolve_by_name(&directory(), "Virginia", "Roanoke C").unwrap();
        assert_eq!(resolved_name(resolution), "Roanoke County");
    }

    #[test]
    fn shortest_name_tie_keeps_directory_order() {
        let resolution = resolve_by_name(&directory(), "Georgia", "Le").unwrap();
        assert_eq!(resolved_name(resolution), "Lex County");
    }

    #[test]
    fn state_name_is_case_insensitive_but_county_prefix_is_not() {
        let dir = directory();
        let resolution = resolve_by_name(&dir, "VIRGINIA", "Montgomery").unwrap();
        assert_eq!(resolved_name(resolution), "Montgomery County");

        let resolution = resolve_by_name(&dir, "Virginia", "montgomery").unwrap();
        assert_eq!(resolution, Resolution::unresolved("montgomery", "Virginia"));
    }

    #[test]
    fn unknown_state_name_reports_county_under_state() {
        let resolution = resolve_by_name(&directory(), "Virginias", "Franklin").unwrap();
        assert_eq!(resolution, Resolution::unresolved("Franklin", "Virginias"));
    }

    #[test]
    fn missing_columns_read_as_empty() {
        let resolution =
            resolve_row(&directory(), UploadFormat::ByName, &row(&[("County", "Clay")])).unwrap();
        assert_eq!(resolution, Resolution::unresolved("Clay", ""));
    }
}

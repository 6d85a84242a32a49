//! Autocomplete suggestions over a [`GeoDirectory`].
//!
//! A state matches when its name contains the query; a county matches when
//! its search label (`"<name> <USPS>"`) does. Both ignore case. Matches are
//! ordered by how much longer their text is than the query, so `"Mont"`
//! puts `"Monty"` ahead of `"Montgomery"`, and ties keep catalog order.

use std::collections::HashMap;

use health_map_geography_models::{CountySuggestion, State};

use crate::GeoError;
use crate::directory::GeoDirectory;

/// Default number of suggestions returned.
pub const SUGGESTION_LIMIT: usize = 5;

fn closest_first<T>(
    query: &str,
    mut matches: Vec<T>,
    text: impl Fn(&T) -> &str,
    limit: usize,
) -> Vec<T> {
    let query_len = query.chars().count();
    matches.sort_by_key(|item| text(item).chars().count().saturating_sub(query_len));
    matches.truncate(limit);
    matches
}

/// States whose name contains `query`, closest first, at most `limit`.
///
/// A blank query matches nothing.
///
/// # Errors
///
/// Returns [`GeoError`] if the directory fails.
pub fn search_states<D: GeoDirectory + ?Sized>(
    directory: &D,
    query: &str,
    limit: usize,
) -> Result<Vec<State>, GeoError> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(Vec::new());
    }

    let needle = query.to_lowercase();
    let matches: Vec<State> = directory
        .all_states()?
        .into_iter()
        .filter(|state| state.name.to_lowercase().contains(&needle))
        .collect();

    Ok(closest_first(query, matches, |state| state.name.as_str(), limit))
}

/// Counties whose search label contains `query`, closest first, at most
/// `limit`.
///
/// A blank query matches nothing.
///
/// # Errors
///
/// Returns [`GeoError`] if the directory fails.
pub fn search_counties<D: GeoDirectory + ?Sized>(
    directory: &D,
    query: &str,
    limit: usize,
) -> Result<Vec<CountySuggestion>, GeoError> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(Vec::new());
    }

    let states: HashMap<String, State> = directory
        .all_states()?
        .into_iter()
        .map(|state| (state.fips.clone(), state))
        .collect();

    let needle = query.to_lowercase();
    let mut matches = Vec::new();
    for county in directory.all_counties()? {
        if !county.search_label().to_lowercase().contains(&needle) {
            continue;
        }
        match states.get(&county.state_fips) {
            Some(state) => matches.push(CountySuggestion::new(&county, state)),
            None => log::debug!("County {} has no state, not suggesting it", county.fips5()),
        }
    }
    log::debug!("{} counties match {query:?}", matches.len());

    Ok(closest_first(query, matches, |s| s.value.as_str(), limit))
}

#[cfg(test)]
mod tests {
    use health_map_geography_models::County;
    use health_map_geography_models::fips::builtin_states;

    use super::*;
    use crate::directory::InMemoryDirectory;

    fn virginia_directory(names: &[&str]) -> InMemoryDirectory {
        let virginia = State::new("51", "VA", "Virginia");
        let mut dir = InMemoryDirectory::with_states(vec![virginia.clone()]);
        for (i, name) in names.iter().enumerate() {
            let fips = format!("{:03}", i * 2 + 1);
            dir.insert_county(County::new(&virginia, &fips, name)).unwrap();
        }
        dir
    }

    #[test]
    fn shorter_county_matches_rank_first() {
        let dir = virginia_directory(&["Montgomery", "Monty", "Roanoke"]);
        let found = search_counties(&dir, "Mont", SUGGESTION_LIMIT).unwrap();

        let values: Vec<_> = found.iter().map(|s| s.value.as_str()).collect();
        assert_eq!(values, vec!["Monty VA", "Montgomery VA"]);
        assert_eq!(found[0].id, "51003");
        assert_eq!(found[0].state, "Virginia");
    }

    #[test]
    fn county_search_ignores_case_and_matches_the_state_code() {
        let dir = virginia_directory(&["Montgomery County", "Roanoke County"]);
        assert_eq!(search_counties(&dir, "mONT", 5).unwrap().len(), 1);
        assert_eq!(search_counties(&dir, "county va", 5).unwrap().len(), 2);
    }

    #[test]
    fn results_are_capped() {
        let names: Vec<String> = (1..=8).map(|i| format!("Lake {i}")).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        let dir = virginia_directory(&names);

        let found = search_counties(&dir, "lake", SUGGESTION_LIMIT).unwrap();
        assert_eq!(found.len(), 5);
        // All labels are the same length, so catalog order is kept.
        assert_eq!(found[0].name, "Lake 1");
        assert_eq!(found[4].name, "Lake 5");
    }

    #[test]
    fn blank_query_matches_nothing() {
        let dir = virginia_directory(&["Montgomery"]);
        assert!(search_counties(&dir, "  ", 5).unwrap().is_empty());
        assert!(search_states(&dir, "", 5).unwrap().is_empty());
    }

    #[test]
    fn states_match_on_name_substring() {
        let dir = InMemoryDirectory::with_states(builtin_states());
        let names: Vec<_> = search_states(&dir, "new", SUGGESTION_LIMIT)
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(
            names,
            vec!["New York", "New Jersey", "New Mexico", "New Hampshire"]
        );

        let names: Vec<_> = search_states(&dir, "ARK", 5)
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["Arkansas"]);
    }
}

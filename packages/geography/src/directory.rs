//! The state/county catalog consumed by row resolution.

use std::collections::BTreeMap;

use health_map_geography_models::fips::split_county_fips;
use health_map_geography_models::{County, State};

use crate::GeoError;

/// Catalog of states and counties keyed by codes and names.
///
/// Codes are matched exactly (case-sensitive). State names are matched
/// case-insensitively. County name prefixes are matched case-sensitively,
/// so `"Clay"` matches `"Clay County"` and `"Clayton County"` but not
/// `"clay county"`.
///
/// "Not found" is never an error: it is `Ok(None)` or an empty list, so
/// callers can tell bad input apart from a failing backend.
pub trait GeoDirectory {
    /// Finds a state by its two-digit FIPS code.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError`] if the backing store fails.
    fn find_state_by_code(&self, code: &str) -> Result<Option<State>, GeoError>;

    /// Finds a state by its full name. If several states share a name the
    /// first one in catalog order wins.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError`] if the backing store fails.
    fn find_state_by_name(&self, name: &str) -> Result<Option<State>, GeoError>;

    /// Finds a county by its three-digit code within `state`.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError`] if the backing store fails.
    fn find_county_by_code(&self, state: &State, code: &str) -> Result<Option<County>, GeoError>;

    /// Returns every county in `state` whose name starts with `prefix`, in
    /// catalog order.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError`] if the backing store fails.
    fn find_counties_by_name_prefix(
        &self,
        state: &State,
        prefix: &str,
    ) -> Result<Vec<County>, GeoError>;

    /// Returns every county in `state`, in catalog order.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError`] if the backing store fails.
    fn counties_in_state(&self, state: &State) -> Result<Vec<County>, GeoError>;

    /// Returns every state, in catalog order.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError`] if the backing store fails.
    fn all_states(&self) -> Result<Vec<State>, GeoError>;

    /// Returns every county in the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError`] if the backing store fails.
    fn all_counties(&self) -> Result<Vec<County>, GeoError>;

    /// Finds a county by its five-digit composite code.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError`] if the backing store fails.
    fn find_county_by_fips5(&self, code: &str) -> Result<Option<County>, GeoError> {
        let (state_fips, county_fips) = split_county_fips(code);
        match self.find_state_by_code(&state_fips)? {
            Some(state) => self.find_county_by_code(&state, &county_fips),
            None => Ok(None),
        }
    }

    /// Resolves a list of five-digit composite codes, silently dropping
    /// codes that match no county.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError`] if the backing store fails.
    fn counties_for_fips5_list(&self, codes: &[&str]) -> Result<Vec<County>, GeoError> {
        let mut counties = Vec::with_capacity(codes.len());
        for code in codes {
            match self.find_county_by_fips5(code.trim())? {
                Some(county) => counties.push(county),
                None => log::debug!("Dropping unknown county code {code:?}"),
            }
        }
        Ok(counties)
    }
}

/// A [`GeoDirectory`] held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    states: Vec<State>,
    /// Counties keyed by owning state FIPS, in insertion order.
    counties: BTreeMap<String, Vec<County>>,
}

impl InMemoryDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a directory containing `states` and no counties.
    #[must_use]
    pub fn with_states(states: Vec<State>) -> Self {
        Self {
            states,
            counties: BTreeMap::new(),
        }
    }

    /// Adds a state. A state whose code is already present is ignored.
    pub fn insert_state(&mut self, state: State) {
        if self.states.iter().any(|s| s.fips == state.fips) {
            log::debug!("State {} already present, ignoring", state.fips);
            return;
        }
        self.states.push(state);
    }

    /// Adds a county under its owning state.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::UnknownState`] if the county's state has not
    /// been inserted.
    pub fn insert_county(&mut self, county: County) -> Result<(), GeoError> {
        if !self.states.iter().any(|s| s.fips == county.state_fips) {
            return Err(GeoError::UnknownState {
                state_fips: county.state_fips,
            });
        }
        self.counties
            .entry(county.state_fips.clone())
            .or_default()
            .push(county);
        Ok(())
    }

    /// All states, in insertion order.
    #[must_use]
    pub fn states(&self) -> &[State] {
        &self.states
    }

    /// Total number of counties across all states.
    #[must_use]
    pub fn county_count(&self) -> usize {
        self.counties.values().map(Vec::len).sum()
    }

    fn state_counties(&self, state: &State) -> &[County] {
        self.counties
            .get(&state.fips)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

impl GeoDirectory for InMemoryDirectory {
    fn find_state_by_code(&self, code: &str) -> Result<Option<State>, GeoError> {
        Ok(self.states.iter().find(|s| s.fips == code).cloned())
    }

    fn find_state_by_name(&self, name: &str) -> Result<Option<State>, GeoError> {
        let wanted = name.to_lowercase();
        Ok(self
            .states
            .iter()
            .find(|s| s.name.to_lowercase() == wanted)
            .cloned())
    }

    fn find_county_by_code(&self, state: &State, code: &str) -> Result<Option<County>, GeoError> {
        Ok(self
            .state_counties(state)
            .iter()
            .find(|c| c.fips == code)
            .cloned())
    }

    fn find_counties_by_name_prefix(
        &self,
        state: &State,
        prefix: &str,
    ) -> Result<Vec<County>, GeoError> {
        Ok(self
            .state_counties(state)
            .iter()
            .filter(|c| c.name.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn counties_in_state(&self, state: &State) -> Result<Vec<County>, GeoError> {
        Ok(self.state_counties(state).to_vec())
    }

    fn all_states(&self) -> Result<Vec<State>, GeoError> {
        Ok(self.states.clone())
    }

    fn all_counties(&self) -> Result<Vec<County>, GeoError> {
        Ok(self.counties.values().flatten().cloned().collect())
    }
}

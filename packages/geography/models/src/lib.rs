#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! US state and county reference types.
//!
//! States and counties are loaded once from a trusted reference source and
//! are read-only to the rest of the system. Every measurement row uploaded
//! to the health map is resolved to exactly one [`County`].

pub mod fips;

use serde::{Deserialize, Serialize};

/// A US state (or state-equivalent such as DC).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct State {
    /// Two-digit state FIPS code (e.g. "51"). Kept as text so leading
    /// zeros survive.
    pub fips: String,
    /// Two-letter USPS abbreviation (e.g. "VA").
    pub abbr: String,
    /// Full display name (e.g. "Virginia").
    pub name: String,
}

impl State {
    /// Creates a new state.
    #[must_use]
    pub fn new(fips: &str, abbr: &str, name: &str) -> Self {
        Self {
            fips: fips.to_string(),
            abbr: abbr.to_string(),
            name: name.to_string(),
        }
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {} - {}", self.fips, self.abbr, self.name)
    }
}

/// A county or county-equivalent, owned by exactly one [`State`].
///
/// Identity is `(state_fips, fips)`; the three-digit county code is only
/// unique within its state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct County {
    /// Two-digit FIPS code of the owning state.
    pub state_fips: String,
    /// USPS abbreviation of the owning state.
    pub state_abbr: String,
    /// Three-digit county FIPS code, local to the state (e.g. "037").
    pub fips: String,
    /// Display name (e.g. "Los Angeles County").
    pub name: String,
}

impl County {
    /// Creates a new county belonging to `state`.
    #[must_use]
    pub fn new(state: &State, fips: &str, name: &str) -> Self {
        Self {
            state_fips: state.fips.clone(),
            state_abbr: state.abbr.clone(),
            fips: fips.to_string(),
            name: name.to_string(),
        }
    }

    /// Full five-digit FIPS code (state + county, e.g. "06037").
    #[must_use]
    pub fn fips5(&self) -> String {
        fips::join_county_fips(&self.state_fips, &self.fips)
    }

    /// Human-readable label that (very nearly) uniquely identifies this
    /// county, e.g. `"Montgomery County VA"`. Used for search tokens.
    #[must_use]
    pub fn search_label(&self) -> String {
        format!("{} {}", self.name, self.state_abbr)
    }
}

impl std::fmt::Display for County {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {} - {}", self.fips, self.name, self.state_abbr)
    }
}

/// A county autocomplete entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountySuggestion {
    /// Five-digit FIPS code.
    pub id: String,
    /// The county's search label, e.g. `"Montgomery County VA"`.
    pub value: String,
    /// `value` split on spaces.
    pub tokens: Vec<String>,
    /// County name.
    pub name: String,
    /// Full name of the owning state.
    pub state: String,
}

impl CountySuggestion {
    /// Builds the suggestion for `county`, which belongs to `state`.
    #[must_use]
    pub fn new(county: &County, state: &State) -> Self {
        let value = county.search_label();
        Self {
            id: county.fips5(),
            tokens: value.split(' ').map(str::to_string).collect(),
            value,
            name: county.name.clone(),
            state: state.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn virginia() -> State {
        State::new("51", "VA", "Virginia")
    }

    #[test]
    fn county_fips5_joins_state_and_county() {
        let county = County::new(&virginia(), "121", "Montgomery County");
        assert_eq!(county.fips5(), "51121");
    }

    #[test]
    fn county_search_label_includes_state_abbr() {
        let county = County::new(&virginia(), "121", "Montgomery County");
        assert_eq!(county.search_label(), "Montgomery County VA");
    }

    #[test]
    fn county_serializes_camel_case() {
        let county = County::new(&virginia(), "161", "Roanoke County");
        let json = serde_json::to_value(&county).unwrap();
        assert_eq!(json["stateFips"], "51");
        assert_eq!(json["stateAbbr"], "VA");
    }

    #[test]
    fn suggestion_tokens_split_the_label() {
        let county = County::new(&virginia(), "121", "Montgomery County");
        let suggestion = CountySuggestion::new(&county, &virginia());
        assert_eq!(suggestion.id, "51121");
        assert_eq!(suggestion.value, "Montgomery County VA");
        assert_eq!(suggestion.tokens, vec!["Montgomery", "County", "VA"]);
        assert_eq!(suggestion.state, "Virginia");
    }

    #[test]
    fn state_display() {
        assert_eq!(virginia().to_string(), "51 - VA - Virginia");
    }
}

//! FIPS code utilities.
//!
//! Splitting and joining composite county codes, normalizing codes read
//! from spreadsheets that dropped their leading zeros, and a built-in
//! table of the 50 US states, DC, and Puerto Rico.

/// Width of a state FIPS code.
pub const STATE_FIPS_LEN: usize = 2;

/// Width of a county FIPS code (local to its state).
pub const COUNTY_FIPS_LEN: usize = 3;

/// Built-in `(fips, abbr, name)` rows for the 50 US states, DC, and Puerto
/// Rico, ordered by FIPS code.
pub const STATES: &[(&str, &str, &str)] = &[
    ("01", "AL", "Alabama"),
    ("02", "AK", "Alaska"),
    ("04", "AZ", "Arizona"),
    ("05", "AR", "Arkansas"),
    ("06", "CA", "California"),
    ("08", "CO", "Colorado"),
    ("09", "CT", "Connecticut"),
    ("10", "DE", "Delaware"),
    ("11", "DC", "District of Columbia"),
    ("12", "FL", "Florida"),
    ("13", "GA", "Georgia"),
    ("15", "HI", "Hawaii"),
    ("16", "ID", "Idaho"),
    ("17", "IL", "Illinois"),
    ("18", "IN", "Indiana"),
    ("19", "IA", "Iowa"),
    ("20", "KS", "Kansas"),
    ("21", "KY", "Kentucky"),
    ("22", "LA", "Louisiana"),
    ("23", "ME", "Maine"),
    ("24", "MD", "Maryland"),
    ("25", "MA", "Massachusetts"),
    ("26", "MI", "Michigan"),
    ("27", "MN", "Minnesota"),
    ("28", "MS", "Mississippi"),
    ("29", "MO", "Missouri"),
    ("30", "MT", "Montana"),
    ("31", "NE", "Nebraska"),
    ("32", "NV", "Nevada"),
    ("33", "NH", "New Hampshire"),
    ("34", "NJ", "New Jersey"),
    ("35", "NM", "New Mexico"),
    ("36", "NY", "New York"),
    ("37", "NC", "North Carolina"),
    ("38", "ND", "North Dakota"),
    ("39", "OH", "Ohio"),
    ("40", "OK", "Oklahoma"),
    ("41", "OR", "Oregon"),
    ("42", "PA", "Pennsylvania"),
    ("44", "RI", "Rhode Island"),
    ("45", "SC", "South Carolina"),
    ("46", "SD", "South Dakota"),
    ("47", "TN", "Tennessee"),
    ("48", "TX", "Texas"),
    ("49", "UT", "Utah"),
    ("50", "VT", "Vermont"),
    ("51", "VA", "Virginia"),
    ("53", "WA", "Washington"),
    ("54", "WV", "West Virginia"),
    ("55", "WI", "Wisconsin"),
    ("56", "WY", "Wyoming"),
    ("72", "PR", "Puerto Rico"),
];

/// Returns the built-in states as owned [`crate::State`] values.
#[must_use]
pub fn builtin_states() -> Vec<crate::State> {
    STATES
        .iter()
        .map(|(fips, abbr, name)| crate::State::new(fips, abbr, name))
        .collect()
}

/// Splits a composite five-character county code into its state and
/// county portions: the first two characters and the following three.
///
/// The split never fails. Short or over-long input yields short or
/// truncated portions that simply won't match anything on lookup.
#[must_use]
pub fn split_county_fips(code: &str) -> (String, String) {
    let state = code.chars().take(STATE_FIPS_LEN).collect();
    let county = code
        .chars()
        .skip(STATE_FIPS_LEN)
        .take(COUNTY_FIPS_LEN)
        .collect();
    (state, county)
}

/// Joins a state code and a county code into a composite code.
#[must_use]
pub fn join_county_fips(state_fips: &str, county_fips: &str) -> String {
    format!("{state_fips}{county_fips}")
}

/// Trims a code and left-pads it with zeros to `width`.
///
/// Blank input stays blank. Spreadsheet exports routinely turn `"06"` into
/// `6`; this restores the canonical text form.
#[must_use]
pub fn pad_code(code: &str, width: usize) -> String {
    let trimmed = code.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    format!("{trimmed:0>width$}")
}

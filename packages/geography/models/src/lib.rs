#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! US state reference types.
//!
//! A [`StateReference`] ties a state's full name to its two-letter
//! abbreviation, FIPS code and land area. The population and station feeds
//! key their rows differently (full name vs. abbreviation), so every join in
//! the pipeline goes through this table.

pub mod states;

use serde::{Deserialize, Serialize};

/// A single US state as used for joins and density computations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateReference {
    /// Full state name (e.g. "California").
    pub name: String,
    /// Two-letter postal abbreviation (e.g. "CA").
    pub abbreviation: String,
    /// Two-digit state FIPS code (e.g. "06").
    pub fips: String,
    /// Area in square miles used as the density denominator.
    pub land_area_sq_mi: f64,
}

impl StateReference {
    /// Creates a reference row from its parts.
    #[must_use]
    pub fn new(name: &str, abbreviation: &str, fips: &str, land_area_sq_mi: f64) -> Self {
        Self {
            name: name.to_owned(),
            abbreviation: abbreviation.to_owned(),
            fips: fips.to_owned(),
            land_area_sq_mi,
        }
    }
}

impl From<&states::StateEntry> for StateReference {
    fn from(entry: &states::StateEntry) -> Self {
        Self::new(entry.name, entry.abbr, entry.fips, entry.area_sq_mi)
    }
}

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! State reference table construction.
//!
//! [`StateReferenceTable`] is the lookup every join in the pipeline goes
//! through: population rows are matched by full state name, station rows by
//! abbreviation. The table is built once and never mutated.

use std::collections::BTreeMap;

use ev_density_geography_models::StateReference;
use ev_density_geography_models::states::US_STATES;
use thiserror::Error;

/// Errors raised while building or querying the reference table.
///
/// All of these indicate a setup problem rather than a data problem: the
/// reference table is assumed complete and static.
#[derive(Debug, Error)]
pub enum ReferenceError {
    /// Two entries share the same name.
    #[error("Duplicate state name in reference table: {name}")]
    DuplicateName {
        /// The repeated name.
        name: String,
    },

    /// Two entries share the same abbreviation.
    #[error("Duplicate state abbreviation in reference table: {abbreviation}")]
    DuplicateAbbreviation {
        /// The repeated abbreviation.
        abbreviation: String,
    },

    /// An abbreviation is not two ASCII letters.
    #[error("Invalid state abbreviation '{abbreviation}' for {name}")]
    InvalidAbbreviation {
        /// State name the abbreviation belongs to.
        name: String,
        /// The offending abbreviation.
        abbreviation: String,
    },

    /// Land area is zero, negative, or not finite.
    #[error("Invalid land area {land_area_sq_mi} for {name}")]
    InvalidLandArea {
        /// State name.
        name: String,
        /// The offending area.
        land_area_sq_mi: f64,
    },

    /// A state key used by the pipeline is absent from the table.
    #[error("State '{key}' is missing from the reference table")]
    MissingState {
        /// The name or abbreviation that failed to resolve.
        key: String,
    },
}

/// Immutable state lookup keyed by name (primary) and abbreviation
/// (secondary).
#[derive(Debug, Clone)]
pub struct StateReferenceTable {
    states: Vec<StateReference>,
    by_name: BTreeMap<String, usize>,
    by_abbreviation: BTreeMap<String, usize>,
}

impl StateReferenceTable {
    /// Builds the table for the 50 US states.
    #[must_use]
    pub fn us_states() -> Self {
        let states: Vec<StateReference> = US_STATES.iter().map(StateReference::from).collect();
        // US_STATES has unique keys and positive areas (checked in the
        // models crate tests).
        Self::index(states)
    }

    /// Builds a table from arbitrary entries.
    ///
    /// Abbreviations are normalized to upper case.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError`] on duplicate names or abbreviations,
    /// malformed abbreviations, or non-positive land areas.
    pub fn from_entries(entries: Vec<StateReference>) -> Result<Self, ReferenceError> {
        let mut seen_names = std::collections::BTreeSet::new();
        let mut seen_abbrs = std::collections::BTreeSet::new();
        let mut states = Vec::with_capacity(entries.len());

        for mut entry in entries {
            entry.name = entry.name.trim().to_owned();
            entry.abbreviation = entry.abbreviation.trim().to_ascii_uppercase();

            if entry.abbreviation.len() != 2
                || !entry.abbreviation.chars().all(|c| c.is_ascii_alphabetic())
            {
                return Err(ReferenceError::InvalidAbbreviation {
                    name: entry.name,
                    abbreviation: entry.abbreviation,
                });
            }
            if !entry.land_area_sq_mi.is_finite() || entry.land_area_sq_mi <= 0.0 {
                return Err(ReferenceError::InvalidLandArea {
                    name: entry.name,
                    land_area_sq_mi: entry.land_area_sq_mi,
                });
            }
            if !seen_names.insert(entry.name.clone()) {
                return Err(ReferenceError::DuplicateName { name: entry.name });
            }
            if !seen_abbrs.insert(entry.abbreviation.clone()) {
                return Err(ReferenceError::DuplicateAbbreviation {
                    abbreviation: entry.abbreviation,
                });
            }

            states.push(entry);
        }

        log::debug!("Built state reference table with {} entries", states.len());

        Ok(Self::index(states))
    }

    fn index(states: Vec<StateReference>) -> Self {
        let by_name = states
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.clone(), i))
            .collect();
        let by_abbreviation = states
            .iter()
            .enumerate()
            .map(|(i, s)| (s.abbreviation.clone(), i))
            .collect();

        Self {
            states,
            by_name,
            by_abbreviation,
        }
    }

    /// Looks up a state by full name (exact after trimming).
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&StateReference> {
        self.by_name.get(name.trim()).map(|&i| &self.states[i])
    }

    /// Looks up a state by abbreviation (case-insensitive).
    #[must_use]
    pub fn by_abbreviation(&self, abbreviation: &str) -> Option<&StateReference> {
        self.by_abbreviation
            .get(&abbreviation.trim().to_ascii_uppercase())
            .map(|&i| &self.states[i])
    }

    /// Looks up a state by abbreviation, treating absence as fatal.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::MissingState`] if the abbreviation is not
    /// in the table.
    pub fn require_abbreviation(&self, abbreviation: &str) -> Result<&StateReference, ReferenceError> {
        self.by_abbreviation(abbreviation)
            .ok_or_else(|| ReferenceError::MissingState {
                key: abbreviation.to_owned(),
            })
    }

    /// Iterates the entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &StateReference> {
        self.states.iter()
    }

    /// Returns the entries as a slice, for export.
    #[must_use]
    pub fn as_slice(&self) -> &[StateReference] {
        &self.states
    }

    /// Number of states in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Returns `true` if the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl Default for StateReferenceTable {
    fn default() -> Self {
        Self::us_states()
    }
}

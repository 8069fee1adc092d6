#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Population density resolution.
//!
//! Merges two population feeds into one yearly density series per state:
//!
//! 1. The wide table (one estimate column per year) is filtered to state
//!    rows and reshaped to one record per (state, year), taking the year
//!    from each matching column header.
//! 2. The single-year table is filtered to state rows of the configured
//!    year.
//! 3. Both are concatenated. Duplicate (state, year) keys keep the first
//!    value seen; disagreeing duplicates are reported as
//!    [`SourceConflict`]s.
//! 4. Records are inner-joined to the reference table by full state name
//!    and divided by land area. Unmatched names are dropped and counted.
//! 5. Every reference state must end up with every year of the window.

use std::collections::{BTreeMap, BTreeSet};

use ev_density_analytics_models::{PopulationDensityRecord, PopulationRecord, SourceConflict};
use ev_density_geography::StateReferenceTable;
use ev_density_source::parsing::{codes_match, field_i32, field_population, field_str};
use ev_density_source_models::{
    JoinLoss, SingleYearPopulationFields, WidePopulationFields, YearRange,
};
use regex::Regex;
use thiserror::Error;

/// Join stage label for population → reference.
pub const POPULATION_REFERENCE_JOIN: &str = "population_reference";

/// Errors that can occur while resolving population density.
#[derive(Debug, Error)]
pub enum PopulationError {
    /// The year-column pattern does not compile.
    #[error("Invalid year column pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// State rows exist but no header matches the year-column pattern.
    #[error("No column of the wide population table matches '{pattern}'")]
    NoYearColumns {
        /// The configured pattern.
        pattern: String,
    },

    /// A reference state lacks population for some years of the window.
    #[error("Population series for {state} is missing years {missing_years:?}")]
    IncompleteSeries {
        /// Full state name.
        state: String,
        /// Years with no record.
        missing_years: Vec<i32>,
    },
}

/// The raw population feeds.
#[derive(Debug, Clone, Copy)]
pub struct PopulationInputs<'a> {
    /// Wide table rows (one estimate column per year).
    pub wide_rows: &'a [serde_json::Value],
    /// Single-year table rows.
    pub single_year_rows: &'a [serde_json::Value],
}

/// Column mappings and window for [`resolve_population`].
#[derive(Debug, Clone, Copy)]
pub struct PopulationOptions<'a> {
    /// Wide table columns.
    pub wide_fields: &'a WidePopulationFields,
    /// Single-year table columns.
    pub single_year_fields: &'a SingleYearPopulationFields,
    /// Years every state must cover.
    pub years: YearRange,
    /// Year read from the single-year table.
    pub single_year: i32,
}

/// Output of [`resolve_population`].
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationResolution {
    /// One record per (state, year), sorted by state name then year.
    pub records: Vec<PopulationDensityRecord>,
    /// Rows dropped by the join to the reference table.
    pub join_loss: JoinLoss,
    /// Disagreeing duplicates between (or within) the two sources.
    pub conflicts: Vec<SourceConflict>,
    /// State cells skipped because the population or name was unusable.
    pub skipped_values: usize,
}

/// Resolves the two population feeds into a density series.
///
/// # Errors
///
/// Returns [`PopulationError`] if the year pattern is invalid or matches no
/// column, or if any reference state ends up missing a year of the window.
pub fn resolve_population(
    inputs: &PopulationInputs<'_>,
    options: &PopulationOptions<'_>,
    reference: &StateReferenceTable,
) -> Result<PopulationResolution, PopulationError> {
    let (wide, wide_skipped) = reshape_wide(inputs.wide_rows, options.wide_fields, options.years)?;
    log::info!("Reshaped wide population table into {} records", wide.len());

    let (single, single_skipped) = extract_single_year(
        inputs.single_year_rows,
        options.single_year_fields,
        options.single_year,
    );
    log::info!(
        "Extracted {} state records for {} from the single-year table",
        single.len(),
        options.single_year
    );

    let (merged, conflicts) = merge_sources(wide, single);
    for conflict in &conflicts {
        log::warn!(
            "Conflicting population for {} in {}: kept {}, discarded {}",
            conflict.state_name,
            conflict.year,
            conflict.kept,
            conflict.discarded
        );
    }

    let (records, join_loss) = attach_density(&merged, reference);
    join_loss.log();

    check_completeness(&records, reference, options.years)?;

    Ok(PopulationResolution {
        records,
        join_loss,
        conflicts,
        skipped_values: wide_skipped + single_skipped,
    })
}

/// Filters the wide table to state rows and reshapes it to one record per
/// (state, year).
///
/// Columns are selected by matching each header against
/// `fields.year_column_pattern`; capture group 1 is parsed as the year.
/// Years outside `years` are ignored. Returns the records and the number of
/// state cells skipped for a missing name or unparsable population.
///
/// # Errors
///
/// Returns [`PopulationError`] if the pattern is invalid, or if state rows
/// exist and none of their headers match it.
pub fn reshape_wide(
    rows: &[serde_json::Value],
    fields: &WidePopulationFields,
    years: YearRange,
) -> Result<(Vec<PopulationRecord>, usize), PopulationError> {
    let pattern = Regex::new(&fields.year_column_pattern)?;

    let mut records = Vec::new();
    let mut skipped = 0;
    let mut state_rows = 0;
    let mut year_columns_seen = false;

    for row in rows {
        let is_state = field_str(row, &fields.level_column)
            .is_some_and(|level| codes_match(&level, &fields.state_level));
        if !is_state {
            continue;
        }
        state_rows += 1;

        let Some(columns) = row.as_object() else {
            continue;
        };
        let Some(name) = field_str(row, &fields.name_column) else {
            log::debug!("Skipping wide population row without a name");
            skipped += 1;
            continue;
        };

        for header in columns.keys() {
            let Some(year) = year_from_header(&pattern, header) else {
                continue;
            };
            year_columns_seen = true;
            if !years.contains(year) {
                continue;
            }
            match field_population(row, header) {
                Some(population) => records.push(PopulationRecord {
                    state_name: name.clone(),
                    year,
                    population,
                }),
                None => {
                    log::debug!("Unparsable population for {name} in column {header}");
                    skipped += 1;
                }
            }
        }
    }

    if state_rows > 0 && !year_columns_seen {
        return Err(PopulationError::NoYearColumns {
            pattern: fields.year_column_pattern.clone(),
        });
    }

    Ok((records, skipped))
}

fn year_from_header(pattern: &Regex, header: &str) -> Option<i32> {
    pattern.captures(header)?.get(1)?.as_str().parse().ok()
}

/// Extracts (state, population) for `year` from the single-year table.
///
/// Rows are kept when the type tag equals `fields.state_type`
/// (case-insensitive) and the year column equals `year`. Returns the records
/// and the number of state rows skipped for a missing name or unparsable
/// population.
#[must_use]
pub fn extract_single_year(
    rows: &[serde_json::Value],
    fields: &SingleYearPopulationFields,
    year: i32,
) -> (Vec<PopulationRecord>, usize) {
    let mut records = Vec::new();
    let mut skipped = 0;

    for row in rows {
        let is_state = field_str(row, &fields.type_column)
            .is_some_and(|t| t.eq_ignore_ascii_case(&fields.state_type));
        if !is_state || field_i32(row, &fields.year_column) != Some(year) {
            continue;
        }

        let name = field_str(row, &fields.name_column);
        let population = field_population(row, &fields.population_column);
        match (name, population) {
            (Some(state_name), Some(population)) => records.push(PopulationRecord {
                state_name,
                year,
                population,
            }),
            (name, _) => {
                log::debug!("Skipping single-year population row {name:?}");
                skipped += 1;
            }
        }
    }

    (records, skipped)
}

/// Concatenates the two sources, keeping the first value per (state, year).
///
/// Identical duplicates collapse silently; disagreeing ones are returned as
/// conflicts. Output is sorted by state name then year.
#[must_use]
pub fn merge_sources(
    wide: Vec<PopulationRecord>,
    single_year: Vec<PopulationRecord>,
) -> (Vec<PopulationRecord>, Vec<SourceConflict>) {
    let mut merged: BTreeMap<(String, i32), u64> = BTreeMap::new();
    let mut conflicts = Vec::new();

    for record in wide.into_iter().chain(single_year) {
        let key = (record.state_name, record.year);
        match merged.get(&key) {
            Some(&kept) if kept != record.population => conflicts.push(SourceConflict {
                state_name: key.0.clone(),
                year: key.1,
                kept,
                discarded: record.population,
            }),
            Some(_) => {}
            None => {
                merged.insert(key, record.population);
            }
        }
    }

    let records = merged
        .into_iter()
        .map(|((state_name, year), population)| PopulationRecord {
            state_name,
            year,
            population,
        })
        .collect();

    (records, conflicts)
}

/// Inner-joins population records to the reference table by full state name
/// and computes density.
#[must_use]
pub fn attach_density(
    records: &[PopulationRecord],
    reference: &StateReferenceTable,
) -> (Vec<PopulationDensityRecord>, JoinLoss) {
    let mut loss = JoinLoss::new(POPULATION_REFERENCE_JOIN);
    let mut out = Vec::with_capacity(records.len());

    for record in records {
        let Some(state) = reference.by_name(&record.state_name) else {
            loss.dropped(record.state_name.clone());
            continue;
        };
        loss.matched();

        #[allow(clippy::cast_precision_loss)]
        let pop_density = record.population as f64 / state.land_area_sq_mi;

        out.push(PopulationDensityRecord {
            state_name: state.name.clone(),
            abbreviation: state.abbreviation.clone(),
            year: record.year,
            population: record.population,
            pop_density,
            land_area_sq_mi: state.land_area_sq_mi,
        });
    }

    (out, loss)
}

/// Verifies that every reference state has a record for every year.
///
/// # Errors
///
/// Returns [`PopulationError::IncompleteSeries`] for the first state (in
/// reference order) with missing years.
pub fn check_completeness(
    records: &[PopulationDensityRecord],
    reference: &StateReferenceTable,
    years: YearRange,
) -> Result<(), PopulationError> {
    let present: BTreeSet<(&str, i32)> = records
        .iter()
        .map(|r| (r.abbreviation.as_str(), r.year))
        .collect();

    for state in reference.iter() {
        let missing_years: Vec<i32> = years
            .years()
            .filter(|&y| !present.contains(&(state.abbreviation.as_str(), y)))
            .collect();
        if !missing_years.is_empty() {
            return Err(PopulationError::IncompleteSeries {
                state: state.name.clone(),
                missing_years,
            });
        }
    }

    Ok(())
}

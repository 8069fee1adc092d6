//! Cumulative station density per state and year.
//!
//! Stations of one fuel type are counted per (state, opening year), summed
//! cumulatively in year order, and divided by land area. The output is the
//! full reference-state × year grid: years without openings carry the
//! previous year's values forward within the same state, and years before a
//! state's first opening are zero.

use std::collections::BTreeMap;

use ev_density_analytics_models::{StationDensityRecord, StationRecord};
use ev_density_geography::{ReferenceError, StateReferenceTable};
use ev_density_source_models::{FuelType, YearRange};
use thiserror::Error;

/// Errors that can occur while aggregating station density.
#[derive(Debug, Error)]
pub enum AggregateError {
    /// A station refers to a state missing from the reference table.
    #[error("Unknown station state: {0}")]
    UnknownState(#[from] ReferenceError),

    /// The year range is inverted.
    #[error("Invalid year range {range}")]
    InvalidRange {
        /// The offending range.
        range: YearRange,
    },
}

/// Openings observed for one (state, year).
#[derive(Debug, Clone, Copy, Default)]
struct YearObservation {
    new_stations: u64,
    pop_density: f64,
}

/// Builds the station-density grid for `fuel_type` over `years`.
///
/// Rows are ordered by state abbreviation, then year, and there are exactly
/// `reference.len() * years.len()` of them. Stations opened outside `years`
/// are ignored. A state with no matching stations yields all-zero rows.
///
/// # Errors
///
/// Returns [`AggregateError::InvalidRange`] if `years` is inverted, or
/// [`AggregateError::UnknownState`] if a matching station's state is not in
/// `reference`.
pub fn aggregate_station_density(
    stations: &[StationRecord],
    reference: &StateReferenceTable,
    fuel_type: FuelType,
    years: YearRange,
) -> Result<Vec<StationDensityRecord>, AggregateError> {
    if !years.is_valid() {
        return Err(AggregateError::InvalidRange { range: years });
    }

    let mut observations: BTreeMap<(&str, i32), YearObservation> = BTreeMap::new();
    let mut counted = 0_usize;

    for station in stations
        .iter()
        .filter(|s| s.fuel_type.is(fuel_type) && years.contains(s.open_year))
    {
        let state = reference.require_abbreviation(&station.state)?;

        let entry = observations
            .entry((state.abbreviation.as_str(), station.open_year))
            .or_default();
        entry.new_stations += 1;
        entry.pop_density = station.pop_density;
        counted += 1;
    }

    log::debug!(
        "Counted {counted} {fuel_type} stations across {} state-years",
        observations.len()
    );

    let mut states: Vec<_> = reference.iter().collect();
    states.sort_by(|a, b| a.abbreviation.cmp(&b.abbreviation));

    let mut grid = Vec::with_capacity(states.len() * years.len());

    for state in states {
        // Carried within this state only; reset for the next one.
        let mut total_stations = 0_u64;
        let mut pop_density = 0.0;

        for year in years.years() {
            let new_stations = match observations.get(&(state.abbreviation.as_str(), year)) {
                Some(observation) => {
                    total_stations += observation.new_stations;
                    pop_density = observation.pop_density;
                    observation.new_stations
                }
                None => 0,
            };

            #[allow(clippy::cast_precision_loss)]
            let station_density = total_stations as f64 / state.land_area_sq_mi;

            grid.push(StationDensityRecord {
                state: state.abbreviation.clone(),
                open_year: year,
                pop_density,
                station_density,
                new_stations,
                total_stations,
            });
        }
    }

    Ok(grid)
}

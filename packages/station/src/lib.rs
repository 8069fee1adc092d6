#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Station normalization.
//!
//! Turns raw station rows into [`StationRecord`]s: the fuel code is typed,
//! the open date parsed, coordinates checked against a bounding box, and
//! each row joined to its state's population density for the opening year.
//! Every exclusion is counted in [`NormalizeStats`].

use std::collections::BTreeMap;

use chrono::Datelike as _;
use ev_density_analytics_models::{PopulationDensityRecord, StationRecord};
use ev_density_geography::StateReferenceTable;
use ev_density_source::parsing::{field_f64, field_str, parse_open_date};
use ev_density_source_models::{BoundingBox, FuelCategory, JoinLoss, StationFields};
use serde::Serialize;
use thiserror::Error;

/// Join stage label for station → population density.
pub const STATION_POPULATION_JOIN: &str = "station_population";

/// Errors that can occur while normalizing stations.
#[derive(Debug, Error)]
pub enum StationError {
    /// The station table lacks a configured column.
    #[error("Station table has no '{column}' column")]
    MissingColumn {
        /// The configured column name.
        column: String,
    },
}

/// Counts of rows dropped or flagged during normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizeStats {
    /// Rows read.
    pub input_rows: usize,
    /// Rows excluded for a missing or unparsable open date.
    pub unparsable_dates: usize,
    /// Rows excluded for coordinates outside the box (or missing).
    pub outside_bounds: usize,
    /// Kept rows whose fuel code is not a known [`ev_density_source_models::FuelType`].
    pub other_fuel_types: usize,
    /// Rows dropped by the population join.
    pub join_loss: JoinLoss,
}

/// Output of [`normalize_stations`].
#[derive(Debug, Clone, PartialEq)]
pub struct StationNormalization {
    /// Cleaned stations, in input order.
    pub records: Vec<StationRecord>,
    /// Exclusion counts.
    pub stats: NormalizeStats,
}

/// Normalizes raw station rows.
///
/// Rows are processed in order: date parsing, bounding box, then the
/// (state, year) join against `population`. A row that fails one step is
/// counted there and not considered by later steps.
///
/// # Errors
///
/// Returns [`StationError::MissingColumn`] if the first row lacks one of the
/// configured columns.
pub fn normalize_stations(
    rows: &[serde_json::Value],
    fields: &StationFields,
    bounds: &BoundingBox,
    population: &[PopulationDensityRecord],
    reference: &StateReferenceTable,
) -> Result<StationNormalization, StationError> {
    if let Some(first) = rows.first() {
        check_columns(first, fields)?;
    }

    let density: BTreeMap<(&str, i32), &PopulationDensityRecord> = population
        .iter()
        .map(|r| ((r.abbreviation.as_str(), r.year), r))
        .collect();

    let mut stats = NormalizeStats {
        input_rows: rows.len(),
        unparsable_dates: 0,
        outside_bounds: 0,
        other_fuel_types: 0,
        join_loss: JoinLoss::new(STATION_POPULATION_JOIN),
    };
    let mut records = Vec::with_capacity(rows.len());

    for row in rows {
        let Some(open_date) =
            field_str(row, &fields.open_date_column).and_then(|s| parse_open_date(&s))
        else {
            stats.unparsable_dates += 1;
            continue;
        };

        let coordinates = field_f64(row, &fields.latitude_column)
            .zip(field_f64(row, &fields.longitude_column));
        let Some((latitude, longitude)) =
            coordinates.filter(|&(lat, lon)| bounds.contains(lat, lon))
        else {
            stats.outside_bounds += 1;
            continue;
        };

        let raw_state = field_str(row, &fields.state_column)
            .unwrap_or_default()
            .to_ascii_uppercase();
        let open_year = open_date.year();

        let matched = reference
            .by_abbreviation(&raw_state)
            .and_then(|state| density.get(&(state.abbreviation.as_str(), open_year)));
        let Some(pop) = matched else {
            stats.join_loss.dropped(format!("{raw_state}/{open_year}"));
            continue;
        };
        stats.join_loss.matched();

        let fuel_type =
            FuelCategory::parse(&field_str(row, &fields.fuel_type_column).unwrap_or_default());
        if fuel_type.fuel_type().is_none() {
            stats.other_fuel_types += 1;
        }

        records.push(StationRecord {
            state: pop.abbreviation.clone(),
            city: field_str(row, &fields.city_column).unwrap_or_default(),
            latitude,
            longitude,
            fuel_type,
            open_date,
            open_year,
            pop_density: pop.pop_density,
            land_area_sq_mi: pop.land_area_sq_mi,
        });
    }

    log::info!(
        "Normalized {} of {} stations ({} unparsable dates, {} out of bounds)",
        records.len(),
        stats.input_rows,
        stats.unparsable_dates,
        stats.outside_bounds
    );
    if stats.other_fuel_types > 0 {
        log::debug!(
            "{} stations carry an unrecognized fuel code",
            stats.other_fuel_types
        );
    }
    stats.join_loss.log();

    Ok(StationNormalization { records, stats })
}

fn check_columns(row: &serde_json::Value, fields: &StationFields) -> Result<(), StationError> {
    let required = [
        &fields.state_column,
        &fields.latitude_column,
        &fields.longitude_column,
        &fields.fuel_type_column,
        &fields.open_date_column,
    ];
    for column in required {
        if row.get(column.as_str()).is_none() {
            return Err(StationError::MissingColumn {
                column: column.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use ev_density_geography_models::StateReference;
    use ev_density_source_models::FuelType;
    use serde_json::json;

    use super::*;

    fn reference() -> StateReferenceTable {
        StateReferenceTable::from_entries(vec![
            StateReference::new("California", "CA", "06", 100.0),
            StateReference::new("Texas", "TX", "48", 200.0),
        ])
        .unwrap()
    }

    fn population() -> Vec<PopulationDensityRecord> {
        let mut records = Vec::new();
        for year in 2010..=2020 {
            for (name, abbr, area, pop) in [
                ("California", "CA", 100.0, 5000_u64),
                ("Texas", "TX", 200.0, 2000_u64),
            ] {
                #[allow(clippy::cast_precision_loss)]
                let pop_density = pop as f64 / area;
                records.push(PopulationDensityRecord {
                    state_name: name.to_owned(),
                    abbreviation: abbr.to_owned(),
                    year,
                    population: pop,
                    pop_density,
                    land_area_sq_mi: area,
                });
            }
        }
        records
    }

    fn station(state: &str, lat: f64, lon: f64, fuel: &str, date: &str) -> serde_json::Value {
        json!({
            "State": state,
            "City": "Somewhere",
            "Latitude": lat.to_string(),
            "Longitude": lon.to_string(),
            "Fuel Type Code": fuel,
            "Open Date": date,
        })
    }

    fn normalize(rows: &[serde_json::Value]) -> StationNormalization {
        normalize_stations(
            rows,
            &StationFields::default(),
            &BoundingBox::CONTINENTAL_US,
            &population(),
            &reference(),
        )
        .unwrap()
    }

    #[test]
    fn joins_population_density_for_opening_year() {
        let result = normalize(&[station("ca", 36.7, -119.4, "ELEC", "2018/03/04 00:00:00+00")]);
        assert_eq!(result.records.len(), 1);
        let record = &result.records[0];
        assert_eq!(record.state, "CA");
        assert_eq!(record.open_year, 2018);
        assert_eq!(
            record.open_date,
            NaiveDate::from_ymd_opt(2018, 3, 4).unwrap()
        );
        assert_eq!(record.fuel_type, FuelCategory::Known(FuelType::Elec));
        assert!((record.pop_density - 50.0).abs() < 1e-12);
        assert!((record.land_area_sq_mi - 100.0).abs() < 1e-12);
        assert_eq!(result.stats.join_loss.dropped_rows, 0);
    }

    #[test]
    fn accepts_each_date_layout() {
        let rows = [
            station("TX", 31.0, -99.0, "ELEC", "2012-05-01"),
            station("TX", 31.0, -99.0, "ELEC", "2013-05-01T10:00:00Z"),
            station("TX", 31.0, -99.0, "ELEC", "2014/05/01 00:00:00+00"),
            station("TX", 31.0, -99.0, "ELEC", "05/01/2015"),
        ];
        let years: Vec<i32> = normalize(&rows).records.iter().map(|r| r.open_year).collect();
        assert_eq!(years, vec![2012, 2013, 2014, 2015]);
    }

    #[test]
    fn excludes_and_counts_unparsable_dates() {
        let rows = [
            station("TX", 31.0, -99.0, "ELEC", ""),
            station("TX", 31.0, -99.0, "ELEC", "someday"),
            station("TX", 31.0, -99.0, "ELEC", "2016-01-01"),
        ];
        let result = normalize(&rows);
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.stats.unparsable_dates, 2);
        assert_eq!(result.stats.input_rows, 3);
    }

    #[test]
    fn bounding_box_is_strict() {
        let rows = [
            station("TX", 23.9, -99.0, "ELEC", "2016-01-01"),
            station("TX", 24.0, -99.0, "ELEC", "2016-01-01"),
            station("TX", 24.1, -99.0, "ELEC", "2016-01-01"),
            station("CA", 40.0, -126.0, "ELEC", "2016-01-01"),
            station("CA", 40.0, -125.9, "ELEC", "2016-01-01"),
        ];
        let result = normalize(&rows);
        assert_eq!(result.records.len(), 2);
        assert_eq!(result.stats.outside_bounds, 3);
    }

    #[test]
    fn missing_coordinates_are_out_of_bounds() {
        let row = json!({
            "State": "TX",
            "City": "",
            "Latitude": "",
            "Longitude": "-99.0",
            "Fuel Type Code": "ELEC",
            "Open Date": "2016-01-01",
        });
        let result = normalize(&[row]);
        assert!(result.records.is_empty());
        assert_eq!(result.stats.outside_bounds, 1);
    }

    #[test]
    fn unknown_fuel_codes_pass_as_other() {
        let result = normalize(&[station("TX", 31.0, -99.0, "RD", "2016-01-01")]);
        assert_eq!(result.records.len(), 1);
        assert_eq!(
            result.records[0].fuel_type,
            FuelCategory::Other("RD".to_owned())
        );
        assert_eq!(result.stats.other_fuel_types, 1);
    }

    #[test]
    fn out_of_range_years_and_unknown_states_are_join_losses() {
        let rows = [
            station("TX", 31.0, -99.0, "ELEC", "2008-01-01"),
            station("TX", 31.0, -99.0, "ELEC", "2021-06-30"),
            station("ON", 45.0, -79.0, "ELEC", "2015-01-01"),
            station("TX", 31.0, -99.0, "ELEC", "2015-01-01"),
        ];
        let result = normalize(&rows);
        assert_eq!(result.records.len(), 1);
        let loss = &result.stats.join_loss;
        assert_eq!(loss.stage, STATION_POPULATION_JOIN);
        assert_eq!(loss.input_rows, 4);
        assert_eq!(loss.dropped_rows, 3);
        assert!(loss.unmatched_keys.contains("TX/2008"));
        assert!(loss.unmatched_keys.contains("ON/2015"));
    }

    #[test]
    fn missing_column_is_an_error() {
        let row = json!({"State": "TX", "Latitude": "31", "Longitude": "-99"});
        let err = normalize_stations(
            &[row],
            &StationFields::default(),
            &BoundingBox::CONTINENTAL_US,
            &population(),
            &reference(),
        )
        .unwrap_err();
        assert!(matches!(err, StationError::MissingColumn { column } if column == "Fuel Type Code"));
    }

    #[test]
    fn empty_input_is_empty_output() {
        let result = normalize(&[]);
        assert!(result.records.is_empty());
        assert_eq!(result.stats.input_rows, 0);
    }
}

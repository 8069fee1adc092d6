#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Table types produced by the station-density pipeline.
//!
//! Each stage emits one of these tables and never mutates its input. Every
//! derived field a downstream consumer needs (densities, cumulative counts,
//! the joined population density on station rows) is materialized here so
//! plotting and reporting layers do not re-derive anything.

use chrono::NaiveDate;
use ev_density_source_models::FuelCategory;
use serde::{Deserialize, Serialize};

/// Resident population of one state in one year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulationRecord {
    /// Full state name as it appears in the reference table.
    pub state_name: String,
    /// Calendar year.
    pub year: i32,
    /// Resident population.
    pub population: u64,
}

/// Population density of one state in one year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulationDensityRecord {
    /// Full state name.
    pub state_name: String,
    /// Two-letter abbreviation.
    pub abbreviation: String,
    /// Calendar year.
    pub year: i32,
    /// Resident population.
    pub population: u64,
    /// Residents per square mile.
    pub pop_density: f64,
    /// Density denominator in square miles.
    pub land_area_sq_mi: f64,
}

/// A cleaned station joined to its state's population density for the
/// opening year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationRecord {
    /// Two-letter state abbreviation, validated against the reference table.
    pub state: String,
    /// City as reported by the feed (may be empty).
    pub city: String,
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Fuel type code.
    pub fuel_type: FuelCategory,
    /// Calendar date the station opened.
    pub open_date: NaiveDate,
    /// Year of `open_date`.
    pub open_year: i32,
    /// Population density of the state in `open_year`.
    pub pop_density: f64,
    /// Land area of the state in square miles.
    pub land_area_sq_mi: f64,
}

/// Cumulative station density of one state in one year.
///
/// For a fixed state, `total_stations` and `station_density` never decrease
/// as `open_year` increases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationDensityRecord {
    /// Two-letter state abbreviation.
    pub state: String,
    /// Calendar year.
    pub open_year: i32,
    /// Population density carried from the latest year with openings
    /// (0 before the first one).
    pub pop_density: f64,
    /// Cumulative stations per square mile.
    pub station_density: f64,
    /// Stations opened in this year.
    pub new_stations: u64,
    /// Stations opened in this year or earlier, within the analysis window.
    pub total_stations: u64,
}

/// Confidence interval bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    /// Lower bound.
    pub low: f64,
    /// Upper bound.
    pub high: f64,
}

impl ConfidenceInterval {
    /// Returns `true` if `value` lies within the closed interval.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.low && value <= self.high
    }
}

/// Ordinary least squares fit of `log10(station density)` on
/// `log10(population density)` for one year.
///
/// Both axes are log-transformed, so `slope` is an elasticity: a 1% increase
/// in population density corresponds to approximately a `slope`% increase in
/// station density. It is not a per-unit slope in stations per resident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegressionResult {
    /// Year of the cross-section.
    pub year: i32,
    /// States that entered the fit.
    pub observations: usize,
    /// States excluded because a density was not positive.
    pub excluded: usize,
    /// Elasticity of station density with respect to population density.
    pub slope: f64,
    /// Intercept on the log10 scale.
    pub intercept: f64,
    /// Coefficient of determination.
    pub r_squared: f64,
    /// Two-sided p-value for `slope = 0`.
    pub p_value: f64,
    /// Standard error of `slope`.
    pub slope_std_error: f64,
    /// Confidence level of `confidence_interval` (e.g. 0.95).
    pub confidence_level: f64,
    /// Confidence interval for `slope`.
    pub confidence_interval: ConfidenceInterval,
}

impl RegressionResult {
    /// Percent change in station density implied by a `pct` percent change
    /// in population density.
    ///
    /// Exact under the fitted model: `((1 + pct/100)^slope - 1) * 100`. For
    /// small `pct` this is close to `slope * pct`.
    #[must_use]
    pub fn station_density_change_pct(&self, pct: f64) -> f64 {
        ((1.0 + pct / 100.0).powf(self.slope) - 1.0) * 100.0
    }

    /// Station density predicted for a given population density.
    #[must_use]
    pub fn predict_station_density(&self, pop_density: f64) -> f64 {
        10f64.powf(self.slope.mul_add(pop_density.log10(), self.intercept))
    }
}

/// A (state, year) present in both population sources with different
/// values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceConflict {
    /// Full state name.
    pub state_name: String,
    /// Calendar year.
    pub year: i32,
    /// Value kept (the first seen; the wide table is read first).
    pub kept: u64,
    /// Value discarded.
    pub discarded: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_with_slope(slope: f64) -> RegressionResult {
        RegressionResult {
            year: 2020,
            observations: 10,
            excluded: 0,
            slope,
            intercept: 0.0,
            r_squared: 1.0,
            p_value: 0.0,
            slope_std_error: 0.0,
            confidence_level: 0.95,
            confidence_interval: ConfidenceInterval {
                low: slope,
                high: slope,
            },
        }
    }

    #[test]
    fn one_percent_change_is_roughly_slope_percent() {
        let result = result_with_slope(1.3);
        let change = result.station_density_change_pct(1.0);
        assert!((change - 1.3).abs() < 0.01, "got {change}");
    }

    #[test]
    fn large_changes_use_the_exact_power_law() {
        let result = result_with_slope(2.0);
        // Doubling population density quadruples station density.
        assert!((result.station_density_change_pct(100.0) - 300.0).abs() < 1e-9);
    }

    #[test]
    fn predicts_on_the_original_scale() {
        let result = result_with_slope(2.0);
        assert!((result.predict_station_density(10.0) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn interval_contains_is_inclusive() {
        let ci = ConfidenceInterval { low: 1.0, high: 2.0 };
        assert!(ci.contains(1.0));
        assert!(ci.contains(2.0));
        assert!(!ci.contains(2.1));
    }
}

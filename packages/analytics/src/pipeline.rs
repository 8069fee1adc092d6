//! End-to-end composition of the pipeline stages.
//!
//! Each stage takes the previous stage's table by reference and returns a
//! new one; nothing is shared between runs.

use ev_density_analytics_models::{
    PopulationDensityRecord, RegressionResult, SourceConflict, StationDensityRecord, StationRecord,
};
use ev_density_geography::StateReferenceTable;
use ev_density_geography_models::StateReference;
use ev_density_population::{PopulationError, PopulationInputs, PopulationOptions};
use ev_density_source::config::AnalysisConfig;
use ev_density_source::progress::ProgressCallback;
use ev_density_source_models::JoinLoss;
use ev_density_station::{NormalizeStats, StationError};
use strum_macros::{Display, EnumIter};
use thiserror::Error;

use crate::aggregate::{AggregateError, aggregate_station_density};
use crate::regression::{RegressionError, fit_log_log};

/// Errors that abort the pipeline.
///
/// Regression failures are not among them: they are reported in
/// [`PipelineOutput::regression`] so the tables are still produced.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Population resolution failed.
    #[error(transparent)]
    Population(#[from] PopulationError),

    /// Station normalization failed.
    #[error(transparent)]
    Station(#[from] StationError),

    /// Aggregation failed.
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
}

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum PipelineStage {
    /// Population feeds → density series.
    #[strum(to_string = "Resolving population density")]
    Population,
    /// Station rows → cleaned stations.
    #[strum(to_string = "Normalizing stations")]
    Stations,
    /// Cleaned stations → station-density grid.
    #[strum(to_string = "Aggregating station density")]
    Aggregate,
    /// Grid → log-log fit.
    #[strum(to_string = "Fitting regression")]
    Regression,
}

/// Raw inputs for one run.
#[derive(Debug, Clone, Copy)]
pub struct PipelineInputs<'a> {
    /// States to analyze.
    pub reference: &'a StateReferenceTable,
    /// Station rows.
    pub stations: &'a [serde_json::Value],
    /// Wide population rows.
    pub population_wide: &'a [serde_json::Value],
    /// Single-year population rows.
    pub population_single_year: &'a [serde_json::Value],
}

/// Every table produced by a run.
#[derive(Debug)]
pub struct PipelineOutput {
    /// The reference table used.
    pub states: Vec<StateReference>,
    /// Population density per (state, year).
    pub population: Vec<PopulationDensityRecord>,
    /// Disagreements between the population sources.
    pub conflicts: Vec<SourceConflict>,
    /// Cleaned stations.
    pub stations: Vec<StationRecord>,
    /// Station exclusion counts.
    pub station_stats: NormalizeStats,
    /// Full state × year station-density grid.
    pub station_density: Vec<StationDensityRecord>,
    /// Fit for the configured year, or why it could not be fitted.
    pub regression: Result<RegressionResult, RegressionError>,
    /// One report per inner join, in pipeline order.
    pub join_losses: Vec<JoinLoss>,
}

/// Runs every stage without progress reporting.
///
/// # Errors
///
/// Returns [`PipelineError`] if population resolution, station
/// normalization or aggregation fails.
pub fn run_pipeline(
    inputs: &PipelineInputs<'_>,
    config: &AnalysisConfig,
) -> Result<PipelineOutput, PipelineError> {
    run_pipeline_with_progress(inputs, config, &ev_density_source::progress::NullProgress)
}

/// Runs every stage, advancing `progress` once per [`PipelineStage`].
///
/// # Errors
///
/// Returns [`PipelineError`] if population resolution, station
/// normalization or aggregation fails.
pub fn run_pipeline_with_progress(
    inputs: &PipelineInputs<'_>,
    config: &AnalysisConfig,
    progress: &dyn ProgressCallback,
) -> Result<PipelineOutput, PipelineError> {
    use strum::IntoEnumIterator as _;

    let years = config.year_range();
    progress.set_total(PipelineStage::iter().count() as u64);

    progress.set_message(PipelineStage::Population.to_string());
    let population = ev_density_population::resolve_population(
        &PopulationInputs {
            wide_rows: inputs.population_wide,
            single_year_rows: inputs.population_single_year,
        },
        &PopulationOptions {
            wide_fields: &config.population_wide,
            single_year_fields: &config.population_single_year,
            years,
            single_year: config.analysis.population_single_year,
        },
        inputs.reference,
    )?;
    if population.skipped_values > 0 {
        log::warn!(
            "Skipped {} unparsable population values",
            population.skipped_values
        );
    }
    progress.inc(1);

    progress.set_message(PipelineStage::Stations.to_string());
    let stations = ev_density_station::normalize_stations(
        inputs.stations,
        &config.stations,
        &config.bounds,
        &population.records,
        inputs.reference,
    )?;
    progress.inc(1);

    progress.set_message(PipelineStage::Aggregate.to_string());
    let station_density = aggregate_station_density(
        &stations.records,
        inputs.reference,
        config.analysis.fuel_type,
        years,
    )?;
    progress.inc(1);

    progress.set_message(PipelineStage::Regression.to_string());
    let regression = fit_log_log(&station_density, config.analysis.regression_year);
    if let Err(e) = &regression {
        log::warn!("Regression not fitted: {e}");
    }
    progress.inc(1);
    progress.finish(format!(
        "Processed {} states over {years}",
        inputs.reference.len()
    ));

    let join_losses = vec![population.join_loss, stations.stats.join_loss.clone()];

    Ok(PipelineOutput {
        states: inputs.reference.as_slice().to_vec(),
        population: population.records,
        conflicts: population.conflicts,
        stations: stations.records,
        station_stats: stations.stats,
        station_density,
        regression,
        join_losses,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use ev_density_source_models::FuelType;
    use serde_json::json;

    use super::*;

    fn reference() -> StateReferenceTable {
        StateReferenceTable::from_entries(vec![
            StateReference::new("California", "CA", "06", 100.0),
            StateReference::new("Texas", "TX", "48", 200.0),
            StateReference::new("Oregon", "OR", "41", 40.0),
        ])
        .unwrap()
    }

    fn wide_rows() -> Vec<serde_json::Value> {
        [
            ("United States", "010", 900_000_u64),
            ("California", "040", 1000),
            ("Texas", "040", 400),
            ("Oregon", "040", 2000),
            ("Puerto Rico", "040", 300),
        ]
        .iter()
        .map(|&(name, level, population)| {
            let mut row = serde_json::Map::new();
            row.insert("SUMLEV".to_owned(), json!(level));
            row.insert("NAME".to_owned(), json!(name));
            for year in 2010..=2019 {
                row.insert(format!("POPESTIMATE{year}"), json!(population.to_string()));
            }
            serde_json::Value::Object(row)
        })
        .collect()
    }

    fn single_year_rows() -> Vec<serde_json::Value> {
        [
            ("California", "1,000"),
            ("Texas", "400"),
            ("Oregon", "2,000"),
        ]
        .iter()
        .map(|&(name, population)| {
            json!({
                "Name": name,
                "Geography Type": "State",
                "Year": "2020",
                "Resident Population": population,
            })
        })
        .collect()
    }

    fn station(state: &str, lat: f64, fuel: &str, date: &str) -> serde_json::Value {
        json!({
            "State": state,
            "City": "",
            "Latitude": lat,
            "Longitude": -100.0,
            "Fuel Type Code": fuel,
            "Open Date": date,
        })
    }

    fn station_rows() -> Vec<serde_json::Value> {
        let mut rows = Vec::new();
        // CA: pop density 10, 5 stations in 2020 -> 0.05
        rows.extend((0..5).map(|_| station("CA", 36.0, "ELEC", "2020-03-01")));
        // TX: pop density 2, one station in 2012 and one in 2018 -> 0.01
        rows.push(station("TX", 31.0, "ELEC", "2012/06/01 00:00:00+00"));
        rows.push(station("TX", 31.0, "ELEC", "2018-06-01"));
        // OR: pop density 50, 10 stations in 2015 -> 0.25
        rows.extend((0..10).map(|_| station("OR", 44.0, "ELEC", "2015-01-01")));
        // Excluded: below the box, wrong fuel, before the window, bad date
        rows.push(station("TX", 23.9, "ELEC", "2015-01-01"));
        rows.push(station("CA", 36.0, "CNG", "2015-01-01"));
        rows.push(station("CA", 36.0, "ELEC", "2005-01-01"));
        rows.push(station("CA", 36.0, "ELEC", "unknown"));
        rows
    }

    fn run(config: &AnalysisConfig) -> PipelineOutput {
        let reference = reference();
        let stations = station_rows();
        let wide = wide_rows();
        let single = single_year_rows();
        run_pipeline(
            &PipelineInputs {
                reference: &reference,
                stations: &stations,
                population_wide: &wide,
                population_single_year: &single,
            },
            config,
        )
        .unwrap()
    }

    #[test]
    fn runs_end_to_end() {
        let output = run(&AnalysisConfig::default());

        assert_eq!(output.states.len(), 3);
        assert_eq!(output.population.len(), 3 * 11);
        assert_eq!(output.station_density.len(), 3 * 11);
        assert!(output.conflicts.is_empty());

        // The CNG station is kept; the aggregator filters by fuel type.
        assert_eq!(output.stations.len(), 18);
        assert_eq!(output.station_stats.outside_bounds, 1);
        assert_eq!(output.station_stats.unparsable_dates, 1);

        assert_eq!(output.join_losses.len(), 2);
        assert_eq!(output.join_losses[0].dropped_rows, 10);
        assert!(output.join_losses[0].unmatched_keys.contains("Puerto Rico"));
        assert_eq!(output.join_losses[1].dropped_rows, 1);

        let ca_2020 = output
            .station_density
            .iter()
            .find(|r| r.state == "CA" && r.open_year == 2020)
            .unwrap();
        assert!((ca_2020.station_density - 0.05).abs() < 1e-12);

        let tx_2017 = output
            .station_density
            .iter()
            .find(|r| r.state == "TX" && r.open_year == 2017)
            .unwrap();
        assert!((tx_2017.station_density - 0.005).abs() < 1e-12);
        assert!((tx_2017.pop_density - 2.0).abs() < 1e-12);
    }

    #[test]
    fn regression_runs_on_configured_year() {
        let output = run(&AnalysisConfig::default());
        let result = output.regression.unwrap();
        assert_eq!(result.year, 2020);
        assert_eq!(result.observations, 3);
        // Station density = pop density / 200 in every state.
        assert!((result.slope - 1.0).abs() < 1e-9);
        assert!((result.intercept + 200f64.log10()).abs() < 1e-9);
    }

    #[test]
    fn insufficient_regression_data_does_not_abort() {
        let mut config = AnalysisConfig::default();
        config.analysis.regression_year = 2013;
        let output = run(&config);
        assert!(matches!(
            output.regression,
            Err(RegressionError::InsufficientData {
                year: 2013,
                usable: 1,
                excluded: 2
            })
        ));
        assert_eq!(output.station_density.len(), 33);
    }

    #[test]
    fn other_fuel_type_changes_the_grid() {
        let mut config = AnalysisConfig::default();
        config.analysis.fuel_type = FuelType::Cng;
        let output = run(&config);
        let total: u64 = output
            .station_density
            .iter()
            .filter(|r| r.open_year == 2020)
            .map(|r| r.total_stations)
            .sum();
        assert_eq!(total, 1);
    }

    struct RecordingProgress(Mutex<Vec<String>>);

    impl ProgressCallback for RecordingProgress {
        fn set_total(&self, _total: u64) {}
        fn inc(&self, _delta: u64) {}
        fn set_message(&self, msg: String) {
            self.0.lock().unwrap().push(msg);
        }
        fn finish(&self, _msg: String) {}
    }

    #[test]
    fn reports_each_stage_in_order() {
        let reference = reference();
        let stations = station_rows();
        let wide = wide_rows();
        let single = single_year_rows();
        let progress = RecordingProgress(Mutex::new(Vec::new()));

        run_pipeline_with_progress(
            &PipelineInputs {
                reference: &reference,
                stations: &stations,
                population_wide: &wide,
                population_single_year: &single,
            },
            &AnalysisConfig::default(),
            &progress,
        )
        .unwrap();

        let messages = progress.0.into_inner().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0], "Resolving population density");
        assert_eq!(messages[3], "Fitting regression");
    }
}

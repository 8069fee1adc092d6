//! The `run` command: load the feeds, run every stage, write every table.

use std::path::Path;

use ev_density_analytics::pipeline::{PipelineInputs, PipelineOutput, run_pipeline_with_progress};
use ev_density_analytics_models::StationDensityRecord;
use ev_density_cli_utils::{IndicatifProgress, MultiProgress};
use ev_density_geography::StateReferenceTable;
use ev_density_source::SourceError;
use ev_density_source::config::AnalysisConfig;
use ev_density_source::tables::{read_csv_path, write_csv, write_json};

/// Paths of the three raw feeds.
pub struct InputPaths<'a> {
    pub stations: &'a Path,
    pub population_wide: &'a Path,
    pub population_single_year: &'a Path,
}

/// Runs the pipeline for the 50 states and writes its tables to
/// `output_dir`.
pub fn run(
    multi: &MultiProgress,
    config: &AnalysisConfig,
    paths: &InputPaths<'_>,
    output_dir: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let stations = read_csv_path(paths.stations)?;
    let population_wide = read_csv_path(paths.population_wide)?;
    let population_single_year = read_csv_path(paths.population_single_year)?;
    log::info!(
        "Loaded {} station rows, {} wide population rows, {} single-year population rows",
        stations.len(),
        population_wide.len(),
        population_single_year.len()
    );

    let reference = StateReferenceTable::us_states();
    let progress = IndicatifProgress::steps_bar(multi, "Pipeline");

    let output = run_pipeline_with_progress(
        &PipelineInputs {
            reference: &reference,
            stations: &stations,
            population_wide: &population_wide,
            population_single_year: &population_single_year,
        },
        config,
        progress.as_ref(),
    )?;

    write_outputs(&output, config, output_dir)?;
    print_summary(&output, config);

    Ok(())
}

/// Writes the tables, the join reports and the regression outcome.
///
/// A regression that could not be fitted is written as an error object.
fn write_outputs(
    output: &PipelineOutput,
    config: &AnalysisConfig,
    output_dir: &Path,
) -> Result<(), SourceError> {
    std::fs::create_dir_all(output_dir)?;

    write_csv(&output_dir.join("states.csv"), &output.states)?;
    write_csv(&output_dir.join("population_density.csv"), &output.population)?;
    write_csv(&output_dir.join("stations.csv"), &output.stations)?;
    write_csv(&output_dir.join("station_density.csv"), &output.station_density)?;
    write_json(&output_dir.join("join_losses.json"), &output.join_losses)?;

    let regression = match &output.regression {
        Ok(result) => serde_json::to_value(result)?,
        Err(e) => serde_json::json!({
            "year": config.analysis.regression_year,
            "error": e.to_string(),
        }),
    };
    write_json(&output_dir.join("regression.json"), &regression)?;

    Ok(())
}

fn print_summary(output: &PipelineOutput, config: &AnalysisConfig) {
    println!();
    println!(
        "{} stations kept; {} station density over {}",
        output.stations.len(),
        config.analysis.fuel_type,
        config.year_range()
    );
    for loss in &output.join_losses {
        println!(
            "  {:<22} dropped {}/{} rows",
            loss.stage, loss.dropped_rows, loss.input_rows
        );
    }
    if !output.conflicts.is_empty() {
        println!(
            "  {} population values disagreed between sources",
            output.conflicts.len()
        );
    }

    match &output.regression {
        Ok(result) => {
            println!();
            println!(
                "log10(station density) = {:.3} * log10(pop density) + {:.3}",
                result.slope, result.intercept
            );
            println!(
                "  R² = {:.3}, p = {:.2e}, {:.0}% CI for slope [{:.3}, {:.3}] (n = {})",
                result.r_squared,
                result.p_value,
                result.confidence_level * 100.0,
                result.confidence_interval.low,
                result.confidence_interval.high,
                result.observations
            );
            println!(
                "  A 1% increase in population density goes with about a {:.2}% increase in station density",
                result.station_density_change_pct(1.0)
            );
            if let Some(median) = median_pop_density(&output.station_density, result.year) {
                println!(
                    "  At the median population density ({median:.1}/sq mi) the fit predicts {:.3e} stations/sq mi",
                    result.predict_station_density(median)
                );
            }
        }
        Err(e) => println!("Regression not fitted: {e}"),
    }
}

/// Median of the positive population densities in the `year` rows of the
/// station-density grid.
fn median_pop_density(records: &[StationDensityRecord], year: i32) -> Option<f64> {
    let mut densities: Vec<f64> = records
        .iter()
        .filter(|r| r.open_year == year && r.pop_density.is_finite() && r.pop_density > 0.0)
        .map(|r| r.pop_density)
        .collect();
    if densities.is_empty() {
        return None;
    }
    densities.sort_by(f64::total_cmp);

    let mid = densities.len() / 2;
    Some(if densities.len() % 2 == 0 {
        f64::midpoint(densities[mid - 1], densities[mid])
    } else {
        densities[mid]
    })
}

#[cfg(test)]
mod tests {
    use ev_density_analytics::run_pipeline;
    use ev_density_geography_models::StateReference;
    use serde_json::json;

    use super::*;

    #[test]
    fn writes_every_table_even_without_a_fit() {
        let reference = StateReferenceTable::from_entries(vec![StateReference::new(
            "California",
            "CA",
            "06",
            100.0,
        )])
        .unwrap();
        let wide: Vec<_> = vec![json!({
            "SUMLEV": "040",
            "NAME": "California",
            "POPESTIMATE2010": "10", "POPESTIMATE2011": "10", "POPESTIMATE2012": "10",
            "POPESTIMATE2013": "10", "POPESTIMATE2014": "10", "POPESTIMATE2015": "10",
            "POPESTIMATE2016": "10", "POPESTIMATE2017": "10", "POPESTIMATE2018": "10",
            "POPESTIMATE2019": "10",
        })];
        let single = vec![json!({
            "Name": "California",
            "Geography Type": "State",
            "Year": 2020,
            "Resident Population": "10",
        })];
        let stations = vec![json!({
            "State": "CA",
            "City": "Fresno",
            "Latitude": "36.7",
            "Longitude": "-119.8",
            "Fuel Type Code": "ELEC",
            "Open Date": "2016-04-01",
        })];
        let config = AnalysisConfig::default();

        let output = run_pipeline(
            &PipelineInputs {
                reference: &reference,
                stations: &stations,
                population_wide: &wide,
                population_single_year: &single,
            },
            &config,
        )
        .unwrap();
        assert!(output.regression.is_err());

        let dir = std::env::temp_dir().join(format!("ev_density_cli_{}", std::process::id()));
        write_outputs(&output, &config, &dir).unwrap();

        for file in [
            "states.csv",
            "population_density.csv",
            "stations.csv",
            "station_density.csv",
            "join_losses.json",
            "regression.json",
        ] {
            assert!(dir.join(file).exists(), "{file}");
        }

        let regression: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.join("regression.json")).unwrap())
                .unwrap();
        assert_eq!(regression["year"], 2020);
        assert!(regression["error"].as_str().unwrap().contains("Not enough data"));

        let density = read_csv_path(&dir.join("station_density.csv")).unwrap();
        assert_eq!(density.len(), 11);
        assert_eq!(density[10]["totalStations"], "1");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn median_skips_other_years_and_zero_densities() {
        let record = |state: &str, open_year, pop_density| StationDensityRecord {
            state: state.to_owned(),
            open_year,
            pop_density,
            station_density: 0.0,
            new_stations: 0,
            total_stations: 0,
        };
        let records = vec![
            record("AK", 2020, 0.0),
            record("CA", 2020, 250.0),
            record("NY", 2020, 400.0),
            record("TX", 2020, 100.0),
            record("WY", 2020, 6.0),
            record("CA", 2019, 9000.0),
        ];

        assert_eq!(median_pop_density(&records, 2020), Some(175.0));
        assert_eq!(median_pop_density(&records[..4], 2020), Some(250.0));
        assert_eq!(median_pop_density(&records, 2015), None);
    }
}

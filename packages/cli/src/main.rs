#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the EV station density analysis.
//!
//! Uses `indicatif-log-bridge` (via [`ev_density_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and progress bars never fight for the terminal.

mod pipeline;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use ev_density_cli_utils::IndicatifProgress;
use ev_density_geography::StateReferenceTable;
use ev_density_source::config::AnalysisConfig;
use ev_density_source_models::FuelType;

#[derive(Parser)]
#[command(
    name = "ev_density",
    about = "Relates alternative-fuel station density to population density across US states"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the station and population feeds
    Fetch {
        /// TOML config overriding the embedded defaults
        #[arg(long)]
        config: Option<PathBuf>,
        /// Directory the feeds are written to
        #[arg(long, default_value = "data/raw")]
        output_dir: PathBuf,
    },
    /// Run the pipeline on downloaded feeds and write every table
    Run {
        /// TOML config overriding the embedded defaults
        #[arg(long)]
        config: Option<PathBuf>,
        /// Station CSV (AFDC export, optionally `.gz`)
        #[arg(long)]
        stations: PathBuf,
        /// Wide population CSV (one estimate column per year)
        #[arg(long)]
        population_wide: PathBuf,
        /// Single-year population CSV
        #[arg(long)]
        population_single_year: PathBuf,
        /// Directory the output tables are written to
        #[arg(long, default_value = "data/output")]
        output_dir: PathBuf,
        /// Fuel type to aggregate (e.g. `ELEC`, `CNG`)
        #[arg(long)]
        fuel_type: Option<FuelType>,
        /// Year of the regression cross-section
        #[arg(long)]
        year: Option<i32>,
    },
    /// Print the state reference table
    States,
}

fn load_config(path: Option<&Path>) -> Result<AnalysisConfig, Box<dyn std::error::Error>> {
    Ok(match path {
        Some(path) => AnalysisConfig::from_path(path)?,
        None => AnalysisConfig::embedded()?,
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = ev_density_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Fetch { config, output_dir } => {
            let config = load_config(config.as_deref())?;
            let progress = IndicatifProgress::steps_bar(&multi, "Downloading");
            let written =
                ev_density_source::download::fetch_sources(&config, &output_dir, progress.as_ref())
                    .await?;
            for path in written {
                println!("{}", path.display());
            }
        }
        Commands::Run {
            config,
            stations,
            population_wide,
            population_single_year,
            output_dir,
            fuel_type,
            year,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(fuel_type) = fuel_type {
                config.analysis.fuel_type = fuel_type;
            }
            if let Some(year) = year {
                config.analysis.regression_year = year;
            }
            config.validate()?;

            let paths = pipeline::InputPaths {
                stations: &stations,
                population_wide: &population_wide,
                population_single_year: &population_single_year,
            };
            pipeline::run(&multi, &config, &paths, &output_dir)?;
        }
        Commands::States => {
            let table = StateReferenceTable::us_states();
            println!("{:<4} {:<6} {:<16} AREA (SQ MI)", "ABBR", "FIPS", "NAME");
            println!("{}", "-".repeat(44));
            for state in table.iter() {
                println!(
                    "{:<4} {:<6} {:<16} {:>12.0}",
                    state.abbreviation, state.fips, state.name, state.land_area_sq_mi
                );
            }
        }
    }

    Ok(())
}

//! Analysis configuration.
//!
//! An [`AnalysisConfig`] names the columns of each raw feed, the analysis
//! window, the fuel type under study and the download locations. The default
//! configuration is baked into the binary at compile time via
//! [`include_str!`]; a TOML file passed on the command line replaces it.

use std::path::Path;

use ev_density_source_models::{
    BoundingBox, FuelType, SingleYearPopulationFields, StationFields, WidePopulationFields,
    YearRange,
};
use serde::{Deserialize, Serialize};

use crate::SourceError;

/// Default configuration embedded at compile time.
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../config/default.toml");

/// Complete configuration for one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Analysis window, fuel type and regression year.
    pub analysis: AnalysisSettings,
    /// Geographic filter applied to station coordinates.
    #[serde(default)]
    pub bounds: BoundingBox,
    /// Columns of the 2010–2019 wide population table.
    #[serde(default)]
    pub population_wide: WidePopulationFields,
    /// Columns of the single-year (2020) population table.
    #[serde(default)]
    pub population_single_year: SingleYearPopulationFields,
    /// Columns of the station table.
    #[serde(default)]
    pub stations: StationFields,
    /// Where `fetch` downloads the feeds from.
    #[serde(default)]
    pub sources: SourceUrls,
}

/// The `[analysis]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisSettings {
    /// Fuel type aggregated into station density.
    pub fuel_type: FuelType,
    /// First year of the state × year grid.
    pub first_year: i32,
    /// Last year of the state × year grid.
    pub last_year: i32,
    /// Year extracted from the single-year population table.
    pub population_single_year: i32,
    /// Year whose cross-section is fed to the regression.
    pub regression_year: i32,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            fuel_type: FuelType::Elec,
            first_year: YearRange::DEFAULT.first,
            last_year: YearRange::DEFAULT.last,
            population_single_year: 2020,
            regression_year: 2020,
        }
    }
}

/// The `[sources]` section.
///
/// URLs may contain an `{api_key}` placeholder, filled from the environment
/// variable named by `api_key_env` at download time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceUrls {
    /// Environment variable holding the AFDC API key.
    pub api_key_env: String,
    /// Station CSV URL.
    pub stations_url: String,
    /// Wide 2010–2019 population CSV URL.
    pub population_wide_url: String,
    /// Single-year population CSV URL.
    pub population_single_year_url: String,
}

impl Default for SourceUrls {
    fn default() -> Self {
        Self {
            api_key_env: "NREL_API_KEY".to_owned(),
            stations_url: "https://developer.nrel.gov/api/alt-fuel-stations/v1.csv?api_key={api_key}&status=all&country=US".to_owned(),
            population_wide_url: "https://www2.census.gov/programs-surveys/popest/datasets/2010-2019/national/totals/nst-est2019-alldata.csv".to_owned(),
            population_single_year_url: "https://www2.census.gov/programs-surveys/decennial/2020/data/apportionment/apportionment.csv".to_owned(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            analysis: AnalysisSettings::default(),
            bounds: BoundingBox::default(),
            population_wide: WidePopulationFields::default(),
            population_single_year: SingleYearPopulationFields::default(),
            stations: StationFields::default(),
            sources: SourceUrls::default(),
        }
    }
}

impl AnalysisConfig {
    /// Parses and validates the embedded default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the embedded TOML is malformed.
    pub fn embedded() -> Result<Self, SourceError> {
        Self::from_toml_str(DEFAULT_CONFIG_TOML)
    }

    /// Loads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the file cannot be read, is not valid TOML,
    /// or fails validation.
    pub fn from_path(path: &Path) -> Result<Self, SourceError> {
        let contents = std::fs::read_to_string(path)?;
        log::debug!("Loaded config from {}", path.display());
        Self::from_toml_str(&contents)
    }

    /// Parses and validates a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the TOML is malformed, missing required
    /// fields, or fails validation.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, SourceError> {
        let config: Self = toml::de::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the cross-field constraints serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] describing the first violation, or
    /// [`SourceError::Regex`] if the year-column pattern does not compile.
    pub fn validate(&self) -> Result<(), SourceError> {
        let range = self.year_range();
        if !range.is_valid() {
            return Err(SourceError::Config {
                message: format!(
                    "first_year ({}) is after last_year ({})",
                    range.first, range.last
                ),
            });
        }
        if !range.contains(self.analysis.population_single_year) {
            return Err(SourceError::Config {
                message: format!(
                    "population_single_year {} is outside {range}",
                    self.analysis.population_single_year
                ),
            });
        }
        if !range.contains(self.analysis.regression_year) {
            return Err(SourceError::Config {
                message: format!(
                    "regression_year {} is outside {range}",
                    self.analysis.regression_year
                ),
            });
        }
        if !self.bounds.is_valid() {
            return Err(SourceError::Config {
                message: format!("invalid bounding box: {:?}", self.bounds),
            });
        }

        let pattern = regex::Regex::new(&self.population_wide.year_column_pattern)?;
        if pattern.captures_len() < 2 {
            return Err(SourceError::Config {
                message: format!(
                    "year_column_pattern '{}' has no capture group for the year",
                    self.population_wide.year_column_pattern
                ),
            });
        }

        Ok(())
    }

    /// The analysis window as a [`YearRange`].
    #[must_use]
    pub const fn year_range(&self) -> YearRange {
        YearRange::new(self.analysis.first_year, self.analysis.last_year)
    }
}

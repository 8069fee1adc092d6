#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Typing for the raw feeds consumed by the pipeline.
//!
//! Raw rows arrive as [`serde_json::Value`]-style objects keyed by column
//! header. The field mapping structs here name the columns each stage reads,
//! so a feed with different headers only needs a config change. The
//! remaining types ([`FuelType`], [`YearRange`], [`BoundingBox`],
//! [`JoinLoss`]) are shared between the normalizing stages.
//!
//! [`serde_json::Value`]: https://docs.rs/serde_json

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

// ── Fuel types ───────────────────────────────────────────────────────────

/// Fuel type codes used by the Alternative Fuels Data Center.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum FuelType {
    /// Biodiesel (B20 and above)
    Bd,
    /// Compressed natural gas
    Cng,
    /// Electric
    Elec,
    /// Ethanol (E85)
    E85,
    /// Hydrogen
    Hy,
    /// Liquefied natural gas
    Lng,
    /// Propane (liquefied petroleum gas)
    Lpg,
}

impl FuelType {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Bd,
            Self::Cng,
            Self::Elec,
            Self::E85,
            Self::Hy,
            Self::Lng,
            Self::Lpg,
        ]
    }
}

/// Fuel type of a station row: one of the known codes, or the raw code when
/// it is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FuelCategory {
    /// A recognized AFDC fuel code.
    Known(FuelType),
    /// Any other code, kept verbatim (trimmed).
    Other(String),
}

impl FuelCategory {
    /// Types a raw fuel code. Never fails: unknown codes become
    /// [`FuelCategory::Other`].
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        raw.parse::<FuelType>()
            .map_or_else(|_| Self::Other(raw.to_owned()), Self::Known)
    }

    /// Returns the known fuel type, if any.
    #[must_use]
    pub const fn fuel_type(&self) -> Option<FuelType> {
        match self {
            Self::Known(t) => Some(*t),
            Self::Other(_) => None,
        }
    }

    /// Returns `true` if this is the given known fuel type.
    #[must_use]
    pub fn is(&self, fuel_type: FuelType) -> bool {
        self.fuel_type() == Some(fuel_type)
    }
}

impl std::fmt::Display for FuelCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Known(t) => write!(f, "{t}"),
            Self::Other(code) => write!(f, "{code}"),
        }
    }
}

// ── Year range ───────────────────────────────────────────────────────────

/// Inclusive range of calendar years the analysis covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearRange {
    /// First year (inclusive).
    pub first: i32,
    /// Last year (inclusive).
    pub last: i32,
}

impl YearRange {
    /// The 2010–2020 window of the published analysis.
    pub const DEFAULT: Self = Self::new(2010, 2020);

    /// Creates a range. Use [`Self::is_valid`] to check ordering.
    #[must_use]
    pub const fn new(first: i32, last: i32) -> Self {
        Self { first, last }
    }

    /// Returns `true` if `first <= last`.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.first <= self.last
    }

    /// Returns `true` if `year` falls inside the range.
    #[must_use]
    pub const fn contains(&self, year: i32) -> bool {
        year >= self.first && year <= self.last
    }

    /// Iterates the years in ascending order.
    #[must_use]
    pub const fn years(&self) -> std::ops::RangeInclusive<i32> {
        self.first..=self.last
    }

    /// Number of years in the range (0 when inverted).
    #[must_use]
    pub fn len(&self) -> usize {
        usize::try_from(self.last - self.first + 1).unwrap_or(0)
    }

    /// Returns `true` if the range holds no years.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for YearRange {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl std::fmt::Display for YearRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.first, self.last)
    }
}

// ── Bounding box ─────────────────────────────────────────────────────────

/// Latitude/longitude box with exclusive edges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Southern edge (exclusive).
    pub min_lat: f64,
    /// Northern edge (exclusive).
    pub max_lat: f64,
    /// Western edge (exclusive).
    pub min_lon: f64,
    /// Eastern edge (exclusive).
    pub max_lon: f64,
}

impl BoundingBox {
    /// The contiguous United States. Excludes Alaska, Hawaii and the
    /// territories.
    pub const CONTINENTAL_US: Self = Self {
        min_lat: 24.0,
        max_lat: 52.0,
        min_lon: -126.0,
        max_lon: -64.0,
    };

    /// Returns `true` if the point lies strictly inside the box.
    #[must_use]
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        latitude > self.min_lat
            && latitude < self.max_lat
            && longitude > self.min_lon
            && longitude < self.max_lon
    }

    /// Returns `true` if both edges are ordered and finite.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        [self.min_lat, self.max_lat, self.min_lon, self.max_lon]
            .iter()
            .all(|v| v.is_finite())
            && self.min_lat < self.max_lat
            && self.min_lon < self.max_lon
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::CONTINENTAL_US
    }
}

// ── Field mappings ───────────────────────────────────────────────────────

/// Columns of the wide population table (one estimate column per year).
///
/// Defaults match the Census `nst-est2019-alldata.csv` layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WidePopulationFields {
    /// Column holding the geography name.
    pub name_column: String,
    /// Column holding the geography level code (`SUMLEV`).
    pub level_column: String,
    /// Level code identifying state rows.
    pub state_level: String,
    /// Regex matched against every header; capture group 1 is the year.
    pub year_column_pattern: String,
}

impl Default for WidePopulationFields {
    fn default() -> Self {
        Self {
            name_column: "NAME".to_owned(),
            level_column: "SUMLEV".to_owned(),
            state_level: "040".to_owned(),
            year_column_pattern: r"^POPESTIMATE(\d{4})$".to_owned(),
        }
    }
}

/// Columns of the long-format population table carrying one value per
/// geography and year.
///
/// Defaults match the Census 2020 apportionment table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SingleYearPopulationFields {
    /// Column holding the geography name.
    pub name_column: String,
    /// Column holding the geography type tag.
    pub type_column: String,
    /// Tag identifying state rows.
    pub state_type: String,
    /// Column holding the year.
    pub year_column: String,
    /// Column holding the resident population.
    pub population_column: String,
}

impl Default for SingleYearPopulationFields {
    fn default() -> Self {
        Self {
            name_column: "Name".to_owned(),
            type_column: "Geography Type".to_owned(),
            state_type: "State".to_owned(),
            year_column: "Year".to_owned(),
            population_column: "Resident Population".to_owned(),
        }
    }
}

/// Columns of the station table.
///
/// Defaults match the AFDC station CSV export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationFields {
    /// Two-letter state abbreviation column.
    pub state_column: String,
    /// City column.
    pub city_column: String,
    /// Latitude column.
    pub latitude_column: String,
    /// Longitude column.
    pub longitude_column: String,
    /// Fuel type code column.
    pub fuel_type_column: String,
    /// Open date (or date-time) column.
    pub open_date_column: String,
}

impl Default for StationFields {
    fn default() -> Self {
        Self {
            state_column: "State".to_owned(),
            city_column: "City".to_owned(),
            latitude_column: "Latitude".to_owned(),
            longitude_column: "Longitude".to_owned(),
            fuel_type_column: "Fuel Type Code".to_owned(),
            open_date_column: "Open Date".to_owned(),
        }
    }
}

// ── Join reporting ───────────────────────────────────────────────────────

/// Row accounting for one inner join.
///
/// Every join in the pipeline drops unmatched rows; this records how many so
/// the loss is visible instead of silent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinLoss {
    /// Join identifier (e.g. `"station_population"`).
    pub stage: String,
    /// Rows entering the join.
    pub input_rows: u64,
    /// Rows that found a match.
    pub matched_rows: u64,
    /// Rows discarded for lack of a match.
    pub dropped_rows: u64,
    /// Distinct keys that failed to match.
    pub unmatched_keys: BTreeSet<String>,
}

impl JoinLoss {
    /// Starts an empty report for the named join.
    #[must_use]
    pub fn new(stage: &str) -> Self {
        Self {
            stage: stage.to_owned(),
            input_rows: 0,
            matched_rows: 0,
            dropped_rows: 0,
            unmatched_keys: BTreeSet::new(),
        }
    }

    /// Records a matched row.
    pub const fn matched(&mut self) {
        self.input_rows += 1;
        self.matched_rows += 1;
    }

    /// Records a dropped row and the key that failed to match.
    pub fn dropped(&mut self, key: impl Into<String>) {
        self.input_rows += 1;
        self.dropped_rows += 1;
        self.unmatched_keys.insert(key.into());
    }

    /// Logs the report at `info` (or `debug` when nothing was dropped).
    pub fn log(&self) {
        if self.dropped_rows == 0 {
            log::debug!("[{}] join kept all {} rows", self.stage, self.input_rows);
        } else {
            log::info!(
                "[{}] join dropped {}/{} rows ({} distinct unmatched keys)",
                self.stage,
                self.dropped_rows,
                self.input_rows,
                self.unmatched_keys.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_fuel_codes() {
        assert_eq!(FuelCategory::parse("ELEC"), FuelCategory::Known(FuelType::Elec));
        assert_eq!(FuelCategory::parse(" e85 "), FuelCategory::Known(FuelType::E85));
        for fuel in FuelType::all() {
            assert_eq!(FuelCategory::parse(fuel.as_ref()).fuel_type(), Some(*fuel));
        }
    }

    #[test]
    fn unknown_fuel_code_passes_through() {
        let category = FuelCategory::parse("RD");
        assert_eq!(category, FuelCategory::Other("RD".to_owned()));
        assert!(!category.is(FuelType::Elec));
        assert_eq!(category.to_string(), "RD");
    }

    #[test]
    fn fuel_category_serializes_as_code() {
        let json = serde_json::to_string(&FuelCategory::Known(FuelType::Elec)).unwrap();
        assert_eq!(json, "\"ELEC\"");
        let other: FuelCategory = serde_json::from_str("\"RD\"").unwrap();
        assert_eq!(other, FuelCategory::Other("RD".to_owned()));
    }

    #[test]
    fn year_range_bounds() {
        let range = YearRange::DEFAULT;
        assert_eq!(range.len(), 11);
        assert!(range.contains(2010));
        assert!(range.contains(2020));
        assert!(!range.contains(2009));
        assert!(!range.contains(2021));
        assert_eq!(range.years().collect::<Vec<_>>().first(), Some(&2010));
        assert!(YearRange::new(2020, 2010).is_empty());
        assert!(!YearRange::new(2020, 2010).is_valid());
    }

    #[test]
    fn bounding_box_edges_are_exclusive() {
        let bbox = BoundingBox::CONTINENTAL_US;
        assert!(bbox.contains(40.0, -100.0));
        assert!(!bbox.contains(23.9, -100.0));
        assert!(!bbox.contains(24.0, -100.0));
        assert!(!bbox.contains(52.0, -100.0));
        assert!(!bbox.contains(40.0, -126.0));
        assert!(!bbox.contains(40.0, -64.0));
        // Anchorage and Honolulu
        assert!(!bbox.contains(61.2, -149.9));
        assert!(!bbox.contains(21.3, -157.8));
    }

    #[test]
    fn join_loss_accounting() {
        let mut loss = JoinLoss::new("test");
        loss.matched();
        loss.dropped("DC");
        loss.dropped("DC");
        loss.dropped("PR");
        assert_eq!(loss.input_rows, 4);
        assert_eq!(loss.matched_rows, 1);
        assert_eq!(loss.dropped_rows, 3);
        assert_eq!(loss.unmatched_keys.len(), 2);
    }
}

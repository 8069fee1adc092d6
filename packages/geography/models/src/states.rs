//! Static table of the 50 US states.
//!
//! Areas are the classic total-area figures in square miles (the values
//! shipped with R's `state.area` dataset), which is what the published
//! station-density analysis divides by. DC and the territories are not
//! part of the table.

/// One row of the static state table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateEntry {
    /// Two-digit FIPS code.
    pub fips: &'static str,
    /// Two-letter postal abbreviation.
    pub abbr: &'static str,
    /// Full state name.
    pub name: &'static str,
    /// Area in square miles.
    pub area_sq_mi: f64,
}

const fn entry(fips: &'static str, abbr: &'static str, name: &'static str, area: f64) -> StateEntry {
    StateEntry {
        fips,
        abbr,
        name,
        area_sq_mi: area,
    }
}

/// The 50 US states, ordered by FIPS code.
pub const US_STATES: &[StateEntry] = &[
    entry("01", "AL", "Alabama", 51_609.0),
    entry("02", "AK", "Alaska", 589_757.0),
    entry("04", "AZ", "Arizona", 113_909.0),
    entry("05", "AR", "Arkansas", 53_104.0),
    entry("06", "CA", "California", 158_693.0),
    entry("08", "CO", "Colorado", 104_247.0),
    entry("09", "CT", "Connecticut", 5_009.0),
    entry("10", "DE", "Delaware", 2_057.0),
    entry("12", "FL", "Florida", 58_560.0),
    entry("13", "GA", "Georgia", 58_876.0),
    entry("15", "HI", "Hawaii", 6_450.0),
    entry("16", "ID", "Idaho", 83_557.0),
    entry("17", "IL", "Illinois", 56_400.0),
    entry("18", "IN", "Indiana", 36_291.0),
    entry("19", "IA", "Iowa", 56_290.0),
    entry("20", "KS", "Kansas", 82_264.0),
    entry("21", "KY", "Kentucky", 40_395.0),
    entry("22", "LA", "Louisiana", 48_523.0),
    entry("23", "ME", "Maine", 33_215.0),
    entry("24", "MD", "Maryland", 10_577.0),
    entry("25", "MA", "Massachusetts", 8_257.0),
    entry("26", "MI", "Michigan", 58_216.0),
    entry("27", "MN", "Minnesota", 84_068.0),
    entry("28", "MS", "Mississippi", 47_716.0),
    entry("29", "MO", "Missouri", 69_686.0),
    entry("30", "MT", "Montana", 147_138.0),
    entry("31", "NE", "Nebraska", 77_227.0),
    entry("32", "NV", "Nevada", 110_540.0),
    entry("33", "NH", "New Hampshire", 9_304.0),
    entry("34", "NJ", "New Jersey", 7_836.0),
    entry("35", "NM", "New Mexico", 121_666.0),
    entry("36", "NY", "New York", 49_576.0),
    entry("37", "NC", "North Carolina", 52_586.0),
    entry("38", "ND", "North Dakota", 70_665.0),
    entry("39", "OH", "Ohio", 41_222.0),
    entry("40", "OK", "Oklahoma", 69_919.0),
    entry("41", "OR", "Oregon", 96_981.0),
    entry("42", "PA", "Pennsylvania", 45_333.0),
    entry("44", "RI", "Rhode Island", 1_214.0),
    entry("45", "SC", "South Carolina", 31_055.0),
    entry("46", "SD", "South Dakota", 77_047.0),
    entry("47", "TN", "Tennessee", 42_244.0),
    entry("48", "TX", "Texas", 267_339.0),
    entry("49", "UT", "Utah", 84_916.0),
    entry("50", "VT", "Vermont", 9_609.0),
    entry("51", "VA", "Virginia", 40_815.0),
    entry("53", "WA", "Washington", 68_192.0),
    entry("54", "WV", "West Virginia", 24_181.0),
    entry("55", "WI", "Wisconsin", 56_154.0),
    entry("56", "WY", "Wyoming", 97_914.0),
];

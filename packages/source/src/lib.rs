#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Raw feed loading and analysis configuration.
//!
//! The pipeline stages operate on in-memory rows; this crate gets them
//! there. [`tables`] turns CSV files into [`serde_json::Value`] rows,
//! [`parsing`] reads typed values out of those rows, [`config`] describes the
//! columns and analysis window, [`download`] fetches the public feeds, and
//! [`progress`] lets long-running callers report steps without depending on
//! a rendering backend.

pub mod config;
pub mod download;
pub mod parsing;
pub mod progress;
pub mod tables;

/// Errors that can occur while loading or fetching source data.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status.
    #[error("HTTP {status} while downloading {label}")]
    HttpStatus {
        /// Feed label.
        label: String,
        /// Status code.
        status: u16,
    },

    /// I/O error (file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing or writing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration TOML is malformed.
    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A configured regex does not compile.
    #[error("Invalid pattern: {0}")]
    Regex(#[from] regex::Error),

    /// Configuration is well-formed but inconsistent.
    #[error("Invalid config: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },

    /// A URL needs an API key and the environment variable is unset.
    #[error("Environment variable {var} must be set to download this source")]
    MissingApiKey {
        /// Name of the variable.
        var: String,
    },

    /// Input data could not be parsed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of what went wrong.
        message: String,
    },
}

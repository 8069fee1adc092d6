#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Station-density analytics.
//!
//! [`aggregate`] turns cleaned stations into a complete state × year grid of
//! cumulative station density, [`regression`] fits the log-log model on one
//! year of that grid, and [`pipeline`] composes every stage from raw rows to
//! the regression result.

pub mod aggregate;
pub mod pipeline;
pub mod regression;

pub use aggregate::{AggregateError, aggregate_station_density};
pub use pipeline::{PipelineError, PipelineInputs, PipelineOutput, run_pipeline};
pub use regression::{RegressionError, fit_log_log};

//! Log-log OLS of station density on population density.
//!
//! The model is `log10(station_density) = slope * log10(pop_density) +
//! intercept`, fitted on one year's cross-section of states. Because both
//! axes are logarithmic the slope is an elasticity: a 1% increase in
//! population density goes with roughly a `slope`% increase in station
//! density.

use ev_density_analytics_models::{ConfidenceInterval, RegressionResult, StationDensityRecord};
use statrs::distribution::{ContinuousCDF, StudentsT, StudentsTError};
use thiserror::Error;

/// Confidence level of the reported slope interval.
pub const CONFIDENCE_LEVEL: f64 = 0.95;

/// Minimum number of usable points (two parameters plus one residual
/// degree of freedom).
pub const MIN_OBSERVATIONS: usize = 3;

/// Errors that can occur while fitting the regression.
#[derive(Debug, Error)]
pub enum RegressionError {
    /// Too few states with positive densities in the year.
    #[error(
        "Not enough data to fit {year}: {usable} usable observations ({excluded} excluded), need at least 3"
    )]
    InsufficientData {
        /// Year of the cross-section.
        year: i32,
        /// Observations with both densities positive.
        usable: usize,
        /// Observations excluded for a non-positive density.
        excluded: usize,
    },

    /// Every usable state has the same population density.
    #[error("Population density does not vary across states in {year}")]
    DegenerateDesign {
        /// Year of the cross-section.
        year: i32,
    },

    /// Every usable state has the same station density, so R² is undefined.
    #[error("Station density does not vary across states in {year}")]
    ConstantResponse {
        /// Year of the cross-section.
        year: i32,
    },

    /// The t distribution could not be constructed.
    #[error("Student's t distribution error: {0}")]
    Distribution(#[from] StudentsTError),
}

/// Fits the log-log model on the `year` rows of `records`.
///
/// Rows with a non-positive or non-finite density on either axis are
/// excluded (and counted in [`RegressionResult::excluded`]).
///
/// # Errors
///
/// * [`RegressionError::InsufficientData`] with fewer than 3 usable rows
/// * [`RegressionError::DegenerateDesign`] when population density is
///   constant
/// * [`RegressionError::ConstantResponse`] when station density is constant
pub fn fit_log_log(
    records: &[StationDensityRecord],
    year: i32,
) -> Result<RegressionResult, RegressionError> {
    let mut points = Vec::new();
    let mut excluded = 0;

    for record in records.iter().filter(|r| r.open_year == year) {
        if is_loggable(record.pop_density) && is_loggable(record.station_density) {
            points.push((record.pop_density.log10(), record.station_density.log10()));
        } else {
            log::debug!(
                "Excluding {} from the {year} fit (popDensity={}, stationDensity={})",
                record.state,
                record.pop_density,
                record.station_density
            );
            excluded += 1;
        }
    }

    if excluded > 0 {
        log::info!("Excluded {excluded} states with zero density from the {year} fit");
    }

    let n = points.len();
    if n < MIN_OBSERVATIONS {
        return Err(RegressionError::InsufficientData {
            year,
            usable: n,
            excluded,
        });
    }

    #[allow(clippy::cast_precision_loss)]
    let n_f = n as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n_f;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n_f;

    let (sxx, sxy, syy) = points.iter().fold((0.0, 0.0, 0.0), |(sxx, sxy, syy), (x, y)| {
        let dx = x - mean_x;
        let dy = y - mean_y;
        (dx.mul_add(dx, sxx), dx.mul_add(dy, sxy), dy.mul_add(dy, syy))
    });

    if is_constant(sxx, mean_x, n_f) {
        return Err(RegressionError::DegenerateDesign { year });
    }
    if is_constant(syy, mean_y, n_f) {
        return Err(RegressionError::ConstantResponse { year });
    }

    let slope = sxy / sxx;
    let intercept = slope.mul_add(-mean_x, mean_y);

    let sse: f64 = points
        .iter()
        .map(|(x, y)| {
            let residual = y - slope.mul_add(*x, intercept);
            residual * residual
        })
        .sum();
    let r_squared = (1.0 - sse / syy).clamp(0.0, 1.0);

    let df = n_f - 2.0;
    let t = StudentsT::new(0.0, 1.0, df)?;
    let t_critical = t.inverse_cdf(f64::midpoint(1.0, CONFIDENCE_LEVEL));

    // A residual sum that is pure rounding noise is treated as an exact fit.
    let (slope_std_error, p_value) = if sse <= f64::EPSILON * syy {
        (0.0, 0.0)
    } else {
        let std_error = (sse / df / sxx).sqrt();
        let t_stat = slope / std_error;
        (std_error, 2.0 * t.cdf(-t_stat.abs()))
    };

    let half_width = t_critical * slope_std_error;
    let result = RegressionResult {
        year,
        observations: n,
        excluded,
        slope,
        intercept,
        r_squared,
        p_value,
        slope_std_error,
        confidence_level: CONFIDENCE_LEVEL,
        confidence_interval: ConfidenceInterval {
            low: slope - half_width,
            high: slope + half_width,
        },
    };

    log::info!(
        "{year}: slope={slope:.4} intercept={intercept:.4} R²={r_squared:.4} p={p_value:.3e} (n={n})"
    );

    Ok(result)
}

fn is_loggable(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Whether a sum of squared deviations is no larger than the rounding
/// error of computing `n` deviations from a mean of this magnitude.
fn is_constant(sum_sq: f64, mean: f64, n: f64) -> bool {
    let ulp = 4.0 * f64::EPSILON * mean.abs().max(1.0);
    sum_sq <= n * ulp * ulp
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(state: &str, year: i32, pop_density: f64, station_density: f64) -> StationDensityRecord {
        StationDensityRecord {
            state: state.to_owned(),
            open_year: year,
            pop_density,
            station_density,
            new_stations: 0,
            total_stations: 0,
        }
    }

    #[test]
    fn recovers_exact_power_law() {
        let records: Vec<_> = [1.0, 2.0, 5.0, 10.0, 40.0, 250.0]
            .iter()
            .enumerate()
            .map(|(i, &x)| record(&format!("S{i}"), 2020, x, x * x))
            .collect();

        let result = fit_log_log(&records, 2020).unwrap();
        assert!((result.slope - 2.0).abs() < 1e-9);
        assert!(result.intercept.abs() < 1e-9);
        assert!((result.r_squared - 1.0).abs() < 1e-9);
        assert_eq!(result.observations, 6);
        assert_eq!(result.excluded, 0);
        assert!(result.p_value < 1e-9);
        let ci = result.confidence_interval;
        assert!(ci.contains(result.slope));
        assert!(ci.high - ci.low < 1e-6);
    }

    #[test]
    fn noisy_fit_reports_interval_around_slope() {
        // log10 y = 1.5 log10 x - 2 with alternating noise.
        let xs = [3.0, 8.0, 20.0, 55.0, 140.0, 400.0, 1000.0, 9.0];
        let records: Vec<_> = xs
            .iter()
            .enumerate()
            .map(|(i, &x): (usize, &f64)| {
                let noise = if i % 2 == 0 { 0.05 } else { -0.05 };
                let log_y = 1.5f64.mul_add(x.log10(), -2.0) + noise;
                record(&format!("S{i}"), 2020, x, 10f64.powf(log_y))
            })
            .collect();

        let result = fit_log_log(&records, 2020).unwrap();
        assert!((result.slope - 1.5).abs() < 0.1, "slope {}", result.slope);
        assert!(result.slope_std_error > 0.0);
        assert!(result.confidence_interval.low < result.slope);
        assert!(result.confidence_interval.high > result.slope);
        assert!(result.confidence_interval.contains(1.5));
        assert!(result.r_squared > 0.95 && result.r_squared < 1.0);
        assert!(result.p_value < 0.001);
        assert!((result.confidence_level - 0.95).abs() < f64::EPSILON);
    }

    #[test]
    fn interval_width_uses_t_quantile() {
        let records = vec![
            record("A", 2020, 10.0, 1.0),
            record("B", 2020, 100.0, 30.0),
            record("C", 2020, 1000.0, 50.0),
            record("D", 2020, 10000.0, 9000.0),
        ];
        let result = fit_log_log(&records, 2020).unwrap();
        // t(0.975, df = 2) = 4.302653
        let half_width = result.confidence_interval.high - result.slope;
        assert!((half_width / result.slope_std_error - 4.302_653).abs() < 1e-3);
    }

    #[test]
    fn excludes_non_positive_densities_and_other_years() {
        let records = vec![
            record("A", 2020, 10.0, 100.0),
            record("B", 2020, 20.0, 400.0),
            record("C", 2020, 30.0, 900.0),
            record("D", 2020, 40.0, 0.0),
            record("E", 2020, 0.0, 5.0),
            record("F", 2019, 50.0, 2500.0),
        ];
        let result = fit_log_log(&records, 2020).unwrap();
        assert_eq!(result.observations, 3);
        assert_eq!(result.excluded, 2);
        assert!((result.slope - 2.0).abs() < 1e-9);
    }

    #[test]
    fn fewer_than_three_points_is_insufficient() {
        let records = vec![
            record("A", 2020, 10.0, 100.0),
            record("B", 2020, 20.0, 400.0),
            record("C", 2020, 30.0, 0.0),
        ];
        let err = fit_log_log(&records, 2020).unwrap_err();
        assert!(matches!(
            err,
            RegressionError::InsufficientData {
                year: 2020,
                usable: 2,
                excluded: 1
            }
        ));
    }

    #[test]
    fn empty_year_is_insufficient() {
        let err = fit_log_log(&[], 2020).unwrap_err();
        assert!(matches!(
            err,
            RegressionError::InsufficientData { usable: 0, .. }
        ));
    }

    #[test]
    fn constant_population_density_is_degenerate() {
        let records = vec![
            record("A", 2020, 10.0, 1.0),
            record("B", 2020, 10.0, 2.0),
            record("C", 2020, 10.0, 3.0),
        ];
        let err = fit_log_log(&records, 2020).unwrap_err();
        assert!(matches!(err, RegressionError::DegenerateDesign { year: 2020 }));
    }

    #[test]
    fn tightly_clustered_densities_still_fit() {
        let records: Vec<_> = (0..5_i32)
            .map(|i| {
                let x = 10f64.powf(f64::from(i).mul_add(1e-9, 1.0));
                record(&format!("S{i}"), 2020, x, x * x)
            })
            .collect();

        let result = fit_log_log(&records, 2020).unwrap();
        assert!((result.slope - 2.0).abs() < 1e-4, "slope {}", result.slope);
        assert_eq!(result.observations, 5);
    }

    #[test]
    fn constant_fractional_density_is_degenerate() {
        let records = vec![
            record("A", 2020, 0.3, 1.0),
            record("B", 2020, 0.3, 2.0),
            record("C", 2020, 0.3, 3.0),
        ];
        let err = fit_log_log(&records, 2020).unwrap_err();
        assert!(matches!(err, RegressionError::DegenerateDesign { year: 2020 }));
    }

    #[test]
    fn constant_station_density_is_reported() {
        let records = vec![
            record("A", 2020, 10.0, 1.0),
            record("B", 2020, 20.0, 1.0),
            record("C", 2020, 30.0, 1.0),
        ];
        let err = fit_log_log(&records, 2020).unwrap_err();
        assert!(matches!(err, RegressionError::ConstantResponse { year: 2020 }));
    }

    #[test]
    fn slope_reads_as_elasticity() {
        let records: Vec<_> = [2.0, 4.0, 8.0, 16.0]
            .iter()
            .enumerate()
            .map(|(i, &x): (usize, &f64)| record(&format!("S{i}"), 2020, x, x.powf(1.3)))
            .collect();
        let result = fit_log_log(&records, 2020).unwrap();
        // A 1% rise in population density: about 1.3% more stations per area.
        let change = result.station_density_change_pct(1.0);
        assert!((change - 1.3).abs() < 0.01, "got {change}");
    }
}

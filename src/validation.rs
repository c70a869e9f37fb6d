//! Input checks run before the first stage.

use chrono::{Datelike, NaiveDate};
use std::collections::BTreeSet;
use tracing::{info, warn};

use crate::errors::{ProjectionError, Result};
use crate::models::{days_of_year, DailyWeatherRecord, RepresentativeLoadShape};

/// Weather coverage for one geography and weather year.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherCoverage {
    pub geography: String,
    pub weather_year: i32,
    pub expected_days: usize,
    pub null_days: usize,
    /// Share of days with a temperature, 0.0 to 1.0.
    pub coverage: f64,
}

/// Rows of `weather` for one geography and calendar year.
pub fn select_weather(
    weather: &[DailyWeatherRecord],
    geography: &str,
    weather_year: i32,
) -> Vec<DailyWeatherRecord> {
    weather
        .iter()
        .filter(|w| w.geography == geography && w.date.year() == weather_year)
        .cloned()
        .collect()
}

/// Every calendar day of the weather year must be present exactly once.
/// Null temperatures are allowed but reported.
pub fn validate_weather(
    weather: &[DailyWeatherRecord],
    geography: &str,
    weather_year: i32,
) -> Result<WeatherCoverage> {
    let mut seen: BTreeSet<NaiveDate> = BTreeSet::new();
    let mut null_days = 0;
    for record in weather
        .iter()
        .filter(|w| w.geography == geography && w.date.year() == weather_year)
    {
        if !seen.insert(record.date) {
            return Err(ProjectionError::invalid_value(
                "weather",
                "date",
                format!("{} appears more than once for {}", record.date, geography),
            ));
        }
        if record.composite_temperature.is_none() {
            null_days += 1;
        }
    }

    let expected = days_of_year(weather_year);
    let missing: Vec<NaiveDate> = expected
        .iter()
        .filter(|d| !seen.contains(d))
        .copied()
        .collect();
    if !missing.is_empty() {
        let preview: Vec<String> = missing.iter().take(5).map(|d| d.to_string()).collect();
        return Err(ProjectionError::input_gap(
            "weather",
            format!(
                "{} of {} days missing for {} in {} (first: {})",
                missing.len(),
                expected.len(),
                geography,
                weather_year,
                preview.join(", ")
            ),
        ));
    }

    let coverage = WeatherCoverage {
        geography: geography.to_string(),
        weather_year,
        expected_days: expected.len(),
        null_days,
        coverage: 1.0 - null_days as f64 / expected.len() as f64,
    };
    if null_days > 0 {
        warn!(
            "Weather for {} in {} has {} null temperatures (coverage {:.1}%)",
            geography,
            weather_year,
            null_days,
            coverage.coverage * 100.0
        );
    } else {
        info!("Weather for {} in {} is complete", geography, weather_year);
    }
    Ok(coverage)
}

/// Each requested model year needs load shapes for the geography.
pub fn validate_load_shapes(
    load_shapes: &[RepresentativeLoadShape],
    geography: &str,
    model_years: &[i32],
) -> Result<()> {
    let available: BTreeSet<i32> = load_shapes
        .iter()
        .filter(|r| r.geography == geography)
        .map(|r| r.model_year)
        .collect();
    let missing: Vec<String> = model_years
        .iter()
        .filter(|y| !available.contains(y))
        .map(|y| y.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ProjectionError::input_gap(
            "load_shapes",
            format!(
                "no load shapes for {} in model years {}",
                geography,
                missing.join(", ")
            ),
        ))
    }
}

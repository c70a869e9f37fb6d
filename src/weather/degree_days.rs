use chrono::Datelike;
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::ModelParameters;
use crate::models::{DailyWeatherRecord, DayType, DegreeDayGroup, DegreeDayRecord};

pub fn heating_degree_days(temperature: f64, heating_threshold: f64) -> f64 {
    (heating_threshold - temperature).max(0.0)
}

pub fn cooling_degree_days(temperature: f64, cooling_threshold: f64) -> f64 {
    (temperature - cooling_threshold).max(0.0)
}

/// Daily HDD/CDD per geography. Output is sorted by (geography, date).
pub fn calculate_degree_days(
    weather: &[DailyWeatherRecord],
    params: &ModelParameters,
) -> Vec<DegreeDayRecord> {
    let mut records: Vec<DegreeDayRecord> = weather
        .iter()
        .map(|w| {
            let t = w.composite_temperature;
            DegreeDayRecord {
                geography: w.geography.clone(),
                date: w.date,
                weather_year: w.date.year(),
                month: w.date.month(),
                day: w.date.day(),
                day_type: DayType::of(w.date),
                composite_temperature: t,
                hdd: t.map(|t| heating_degree_days(t, params.heating_threshold)),
                cdd: t.map(|t| cooling_degree_days(t, params.cooling_threshold)),
            }
        })
        .collect();
    records.sort_by(|a, b| (&a.geography, a.date).cmp(&(&b.geography, b.date)));
    debug!("Computed degree days for {} weather rows", records.len());
    records
}

pub type GroupKey = (String, i32, u32, DayType);

pub fn group_key(geography: &str, weather_year: i32, month: u32, day_type: DayType) -> GroupKey {
    (geography.to_string(), weather_year, month, day_type)
}

/// Sum of a nullable column: null as soon as one member is null.
pub(crate) fn nullable_sum<I: IntoIterator<Item = Option<f64>>>(values: I) -> Option<f64> {
    values
        .into_iter()
        .try_fold(0.0, |acc, v| v.map(|v| acc + v))
}

/// Groups by (geography, weather_year, month, day_type), sorted by key.
pub fn aggregate_degree_days(degree_days: &[DegreeDayRecord]) -> Vec<DegreeDayGroup> {
    let mut groups: BTreeMap<GroupKey, Vec<&DegreeDayRecord>> = BTreeMap::new();
    for record in degree_days {
        groups
            .entry(group_key(
                &record.geography,
                record.weather_year,
                record.month,
                record.day_type,
            ))
            .or_default()
            .push(record);
    }

    groups
        .into_iter()
        .map(|((geography, weather_year, month, day_type), members)| DegreeDayGroup {
            geography,
            weather_year,
            month,
            day_type,
            num_days: members.len() as u32,
            total_hdd: nullable_sum(members.iter().map(|r| r.hdd)),
            total_cdd: nullable_sum(members.iter().map(|r| r.cdd)),
        })
        .collect()
}

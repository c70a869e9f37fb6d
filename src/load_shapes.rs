use chrono::{Datelike, Duration, NaiveDate, NaiveTime};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

use crate::errors::{ProjectionError, Result};
use crate::models::{
    days_of_year, DayType, EndUseCategory, ExpandedLoadShape, RepresentativeLoadShape, Sector,
    TemperatureMultiplier,
};

pub const HOURS_PER_DAY: u32 = 24;

/// (geography, sector, end_use, model_year)
pub type SeriesKey = (String, Sector, String, i32);

type ProfileKey = (u32, DayType, u32);

/// Representative (month, day_type, hour) values per load-shape series.
#[derive(Debug, Default)]
pub struct RepresentativeProfiles {
    series: BTreeMap<SeriesKey, HashMap<ProfileKey, f64>>,
}

impl RepresentativeProfiles {
    /// Index the representative rows, keeping only the requested model years.
    /// Out-of-range months/hours and duplicated slots are rejected.
    pub fn build(rows: &[RepresentativeLoadShape], model_years: &[i32]) -> Result<Self> {
        let mut series: BTreeMap<SeriesKey, HashMap<ProfileKey, f64>> = BTreeMap::new();
        for row in rows {
            if !model_years.is_empty() && !model_years.contains(&row.model_year) {
                continue;
            }
            if row.hour >= HOURS_PER_DAY {
                return Err(ProjectionError::invalid_value(
                    "load_shapes",
                    "hour",
                    format!("hour {} outside 0-23", row.hour),
                ));
            }
            if !(1..=12).contains(&row.month) {
                return Err(ProjectionError::invalid_value(
                    "load_shapes",
                    "month",
                    format!("month {} outside 1-12", row.month),
                ));
            }
            let key = (
                row.geography.clone(),
                row.sector,
                row.end_use.clone(),
                row.model_year,
            );
            let slots = series.entry(key).or_default();
            if slots
                .insert((row.month, row.day_type, row.hour), row.value)
                .is_some()
            {
                return Err(ProjectionError::invalid_value(
                    "load_shapes",
                    "hour",
                    format!(
                        "duplicate representative value for {}/{}/{}/{} month {} {} hour {}",
                        row.geography,
                        row.sector,
                        row.end_use,
                        row.model_year,
                        row.month,
                        row.day_type,
                        row.hour
                    ),
                ));
            }
        }
        Ok(Self { series })
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &SeriesKey> {
        self.series.keys()
    }
}

fn hour_timestamp(date: NaiveDate, hour: u32) -> chrono::NaiveDateTime {
    date.and_time(NaiveTime::MIN) + Duration::hours(hour as i64)
}

/// Materialise every series over all hours of the weather year, applying the
/// day's temperature multiplier for the end use's category.
///
/// Output is ordered by series key, then timestamp.
pub fn expand_load_shapes(
    profiles: &RepresentativeProfiles,
    multipliers: &[TemperatureMultiplier],
    weather_year: i32,
) -> Result<Vec<ExpandedLoadShape>> {
    let days = days_of_year(weather_year);
    let mut by_day: HashMap<(&str, NaiveDate), &TemperatureMultiplier> =
        HashMap::with_capacity(multipliers.len());
    for m in multipliers {
        if by_day.insert((m.geography.as_str(), m.date), m).is_some() {
            return Err(ProjectionError::invalid_value(
                "temperature_multipliers",
                "date",
                format!("{} appears more than once for {}", m.date, m.geography),
            ));
        }
    }

    let mut rows =
        Vec::with_capacity(profiles.len() * days.len() * HOURS_PER_DAY as usize);
    for ((geography, sector, end_use, model_year), slots) in &profiles.series {
        let category = EndUseCategory::classify(end_use);
        for date in &days {
            let day_type = DayType::of(*date);
            let multiplier = by_day
                .get(&(geography.as_str(), *date))
                .ok_or_else(|| {
                    ProjectionError::input_gap(
                        "temperature_multipliers",
                        format!("no multiplier for {} on {}", geography, date),
                    )
                })?
                .for_category(category);

            for hour in 0..HOURS_PER_DAY {
                let raw_value = *slots.get(&(date.month(), day_type, hour)).ok_or_else(|| {
                    ProjectionError::input_gap(
                        "load_shapes",
                        format!(
                            "{}/{}/{}/{} has no value for month {} {} hour {}",
                            geography,
                            sector,
                            end_use,
                            model_year,
                            date.month(),
                            day_type,
                            hour
                        ),
                    )
                })?;
                rows.push(ExpandedLoadShape {
                    geography: geography.clone(),
                    sector: *sector,
                    end_use: end_use.clone(),
                    model_year: *model_year,
                    timestamp: hour_timestamp(*date, hour),
                    weather_year,
                    raw_value,
                    multiplier,
                    adjusted_value: raw_value * multiplier,
                });
            }
        }
        debug!(
            "Expanded {}/{}/{}/{} over {} days",
            geography,
            sector,
            end_use,
            model_year,
            days.len()
        );
    }
    info!(
        "Expanded {} load-shape series into {} hourly rows",
        profiles.len(),
        rows.len()
    );
    Ok(rows)
}

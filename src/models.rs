//! Row types and small vocabularies shared by every pipeline stage.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::{ProjectionError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayType {
    Weekday,
    Weekend,
}

impl DayType {
    pub fn of(date: NaiveDate) -> Self {
        match date.weekday() {
            Weekday::Sat | Weekday::Sun => DayType::Weekend,
            _ => DayType::Weekday,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DayType::Weekday => "weekday",
            DayType::Weekend => "weekend",
        }
    }
}

impl fmt::Display for DayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DayType {
    type Err = ProjectionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weekday" => Ok(DayType::Weekday),
            "weekend" => Ok(DayType::Weekend),
            other => Err(ProjectionError::invalid_value(
                "load_shapes",
                "day_type",
                format!("'{}' is neither weekday nor weekend", other),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Sector {
    Residential,
    Commercial,
    Industrial,
    Transportation,
}

impl Sector {
    pub const ALL: [Sector; 4] = [
        Sector::Residential,
        Sector::Commercial,
        Sector::Industrial,
        Sector::Transportation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Sector::Residential => "Residential",
            Sector::Commercial => "Commercial",
            Sector::Industrial => "Industrial",
            Sector::Transportation => "Transportation",
        }
    }

    /// Non-residential sectors are driven by GDP; residential by HDI and population.
    pub fn is_residential(&self) -> bool {
        matches!(self, Sector::Residential)
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sector {
    type Err = ProjectionError;

    /// Accepts the load-shape spellings (Industry, Transport, Service) as well.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "residential" => Ok(Sector::Residential),
            "commercial" | "service" => Ok(Sector::Commercial),
            "industrial" | "industry" => Ok(Sector::Industrial),
            "transportation" | "transport" => Ok(Sector::Transportation),
            other => Err(ProjectionError::invalid_value(
                "sector",
                "sector",
                format!("unknown sector '{}'", other),
            )),
        }
    }
}

/// Which temperature multiplier an end use follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndUseCategory {
    Heating,
    Cooling,
    Other,
}

impl EndUseCategory {
    pub fn classify(end_use: &str) -> Self {
        match end_use {
            "heating" => EndUseCategory::Heating,
            "cooling" => EndUseCategory::Cooling,
            _ => EndUseCategory::Other,
        }
    }
}

pub const UNSPECIFIED_SUBSECTOR: &str = "unspecified";

pub fn normalize_subsector(subsector: Option<&str>) -> String {
    match subsector.map(str::trim) {
        Some(s) if !s.is_empty() => s.to_ascii_lowercase(),
        _ => UNSPECIFIED_SUBSECTOR.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailyWeatherRecord {
    pub geography: String,
    pub date: NaiveDate,
    /// Composite building-adjusted temperature index in °C.
    pub composite_temperature: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DegreeDayRecord {
    pub geography: String,
    pub date: NaiveDate,
    pub weather_year: i32,
    pub month: u32,
    pub day: u32,
    pub day_type: DayType,
    pub composite_temperature: Option<f64>,
    pub hdd: Option<f64>,
    pub cdd: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DegreeDayGroup {
    pub geography: String,
    pub weather_year: i32,
    pub month: u32,
    pub day_type: DayType,
    pub num_days: u32,
    pub total_hdd: Option<f64>,
    pub total_cdd: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SmoothedDegreeDay {
    pub geography: String,
    pub date: NaiveDate,
    pub weather_year: i32,
    pub month: u32,
    pub day_type: DayType,
    pub hdd: Option<f64>,
    pub cdd: Option<f64>,
    pub adjusted_hdd: Option<f64>,
    pub adjusted_cdd: Option<f64>,
    pub num_days: u32,
    pub total_hdd: Option<f64>,
    pub total_cdd: Option<f64>,
    pub adjusted_total_hdd: Option<f64>,
    pub adjusted_total_cdd: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureMultiplier {
    pub geography: String,
    pub date: NaiveDate,
    pub weather_year: i32,
    pub month: u32,
    pub day_type: DayType,
    pub heating_multiplier: f64,
    pub cooling_multiplier: f64,
    pub other_multiplier: f64,
}

impl TemperatureMultiplier {
    pub fn for_category(&self, category: EndUseCategory) -> f64 {
        match category {
            EndUseCategory::Heating => self.heating_multiplier,
            EndUseCategory::Cooling => self.cooling_multiplier,
            EndUseCategory::Other => self.other_multiplier,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RepresentativeLoadShape {
    pub geography: String,
    pub sector: Sector,
    pub end_use: String,
    pub model_year: i32,
    pub month: u32,
    pub day_type: DayType,
    pub hour: u32,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExpandedLoadShape {
    pub geography: String,
    pub sector: Sector,
    pub end_use: String,
    pub model_year: i32,
    pub timestamp: NaiveDateTime,
    pub weather_year: i32,
    pub raw_value: f64,
    pub multiplier: f64,
    pub adjusted_value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnualDriverProjection {
    pub geography: String,
    pub sector: Sector,
    pub subsector: String,
    pub model_year: i32,
    /// MWh
    pub annual_total: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScalingFactor {
    pub geography: String,
    pub model_year: i32,
    pub sector: Sector,
    pub annual_total: f64,
    pub load_shape_annual_total: f64,
    pub factor: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FinalHourlyProjection {
    pub timestamp: NaiveDateTime,
    pub model_year: i32,
    pub scenario: String,
    pub geography: String,
    pub sector: Sector,
    pub metric: String,
    pub value: f64,
}

/// Driver series row: population, GDP, HDI, EV shares.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverRecord {
    pub geography: String,
    pub model_year: i32,
    pub value: f64,
}

/// Per-km electricity use by vehicle subsector (bev / phev), Wh/km.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleEfficiencyRecord {
    pub geography: String,
    pub subsector: String,
    pub model_year: i32,
    pub value: f64,
}

/// All calendar days of a year, in order.
pub fn days_of_year(year: i32) -> Vec<NaiveDate> {
    let mut days = Vec::with_capacity(366);
    let mut current = NaiveDate::from_ymd_opt(year, 1, 1);
    while let Some(date) = current {
        if date.year() != year {
            break;
        }
        days.push(date);
        current = date.succ_opt();
    }
    days
}

//! DataFrame interchange for every table the pipeline reads or produces,
//! plus the per-scenario resolver that lets a user-supplied frame stand in
//! for any calculated table.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::info;

use crate::drivers::{RegressionMetricRow, RegressionRow};
use crate::errors::{ProjectionError, Result};
use crate::models::{
    AnnualDriverProjection, DailyWeatherRecord, DayType, DegreeDayGroup, DegreeDayRecord,
    DriverRecord, ExpandedLoadShape, FinalHourlyProjection, RepresentativeLoadShape,
    ScalingFactor, Sector, SmoothedDegreeDay, TemperatureMultiplier, VehicleEfficiencyRecord,
};

/// Days between 0001-01-01 (CE day 1) and the Unix epoch.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

fn datetime_dtype() -> DataType {
    DataType::Datetime(TimeUnit::Milliseconds, None)
}

pub type Schema = Vec<(&'static str, DataType)>;

/// A row type with a fixed frame layout.
pub trait TableRow: Sized {
    fn schema() -> Schema;
    fn to_frame(rows: &[Self]) -> Result<DataFrame>;
    fn from_frame(table: &str, df: &DataFrame) -> Result<Vec<Self>>;
}

// ---------------------------------------------------------------------------
// Column builders

pub fn string_series<S: AsRef<str>>(name: &str, values: impl Iterator<Item = S>) -> Series {
    let values: Vec<String> = values.map(|v| v.as_ref().to_string()).collect();
    Series::new(name, values)
}

pub fn date_series(name: &str, dates: impl Iterator<Item = NaiveDate>) -> Result<Series> {
    let days: Vec<i32> = dates
        .map(|d| d.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE)
        .collect();
    Ok(Series::new(name, days).cast(&DataType::Date)?)
}

pub fn datetime_series(
    name: &str,
    timestamps: impl Iterator<Item = NaiveDateTime>,
) -> Result<Series> {
    let millis: Vec<i64> = timestamps
        .map(|t| t.and_utc().timestamp_millis())
        .collect();
    Ok(Series::new(name, millis).cast(&datetime_dtype())?)
}

// ---------------------------------------------------------------------------
// Column readers

/// Typed column access with table-aware errors.
pub struct FrameReader<'a> {
    table: &'a str,
    df: &'a DataFrame,
}

impl<'a> FrameReader<'a> {
    pub fn new(table: &'a str, df: &'a DataFrame) -> Self {
        Self { table, df }
    }

    pub fn has(&self, name: &str) -> bool {
        self.df.column(name).is_ok()
    }

    fn column(&self, name: &str) -> Result<&'a Series> {
        self.df.column(name).map_err(|_| ProjectionError::SchemaMismatch {
            table: self.table.to_string(),
            missing: vec![name.to_string()],
            extra: Vec::new(),
            mistyped: Vec::new(),
        })
    }

    fn null_error(&self, name: &str) -> ProjectionError {
        ProjectionError::invalid_value(self.table, name, "unexpected null")
    }

    pub fn opt_f64s(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let series = self.column(name)?.cast(&DataType::Float64)?;
        Ok(series.f64()?.into_iter().collect())
    }

    pub fn f64s(&self, name: &str) -> Result<Vec<f64>> {
        self.opt_f64s(name)?
            .into_iter()
            .map(|v| v.ok_or_else(|| self.null_error(name)))
            .collect()
    }

    pub fn i32s(&self, name: &str) -> Result<Vec<i32>> {
        let series = self.column(name)?.cast(&DataType::Int32)?;
        let values: Vec<Option<i32>> = series.i32()?.into_iter().collect();
        values
            .into_iter()
            .map(|v| v.ok_or_else(|| self.null_error(name)))
            .collect()
    }

    pub fn u32s(&self, name: &str) -> Result<Vec<u32>> {
        self.i32s(name)?
            .into_iter()
            .map(|v| {
                u32::try_from(v).map_err(|_| {
                    ProjectionError::invalid_value(self.table, name, format!("negative value {}", v))
                })
            })
            .collect()
    }

    pub fn opt_strings(&self, name: &str) -> Result<Vec<Option<String>>> {
        let series = self.column(name)?.cast(&DataType::String)?;
        Ok(series
            .str()?
            .into_iter()
            .map(|v| v.map(str::to_string))
            .collect())
    }

    pub fn strings(&self, name: &str) -> Result<Vec<String>> {
        self.opt_strings(name)?
            .into_iter()
            .map(|v| v.ok_or_else(|| self.null_error(name)))
            .collect()
    }

    /// All-null when the column is absent.
    pub fn optional_strings(&self, name: &str) -> Result<Vec<Option<String>>> {
        if self.has(name) {
            self.opt_strings(name)
        } else {
            Ok(vec![None; self.df.height()])
        }
    }

    /// Parse errors are reported against this reader's table and `name`.
    fn parse_error(&self, name: &str, err: ProjectionError) -> ProjectionError {
        match err {
            ProjectionError::InvalidValue { message, .. } => {
                ProjectionError::invalid_value(self.table, name, message)
            }
            other => other,
        }
    }

    pub fn parsed<T: FromStr<Err = ProjectionError>>(&self, name: &str) -> Result<Vec<T>> {
        self.strings(name)?
            .iter()
            .map(|s| s.parse().map_err(|e| self.parse_error(name, e)))
            .collect()
    }

    pub fn optional_parsed<T: FromStr<Err = ProjectionError>>(
        &self,
        name: &str,
    ) -> Result<Vec<Option<T>>> {
        self.optional_strings(name)?
            .into_iter()
            .map(|s| {
                s.map(|s| s.parse().map_err(|e| self.parse_error(name, e)))
                    .transpose()
            })
            .collect()
    }

    pub fn dates(&self, name: &str) -> Result<Vec<NaiveDate>> {
        let column = self.column(name)?;
        let days = match column.dtype() {
            DataType::Date => column.cast(&DataType::Int32)?,
            DataType::Datetime(_, _) | DataType::String => {
                column.cast(&DataType::Date)?.cast(&DataType::Int32)?
            }
            other => return Err(self.mistyped(name, other)),
        };
        let days: Vec<Option<i32>> = days.i32()?.into_iter().collect();
        days.into_iter()
            .map(|d| {
                d.and_then(|d| NaiveDate::from_num_days_from_ce_opt(d + UNIX_EPOCH_DAYS_FROM_CE))
                    .ok_or_else(|| self.null_error(name))
            })
            .collect()
    }

    pub fn datetimes(&self, name: &str) -> Result<Vec<NaiveDateTime>> {
        let column = self.column(name)?;
        let column = match column.dtype() {
            DataType::Datetime(_, _) => column.clone(),
            DataType::Date | DataType::String => column.cast(&datetime_dtype())?,
            other => return Err(self.mistyped(name, other)),
        };
        let unit = match column.dtype() {
            DataType::Datetime(unit, _) => *unit,
            _ => TimeUnit::Milliseconds,
        };
        let raw = column.cast(&DataType::Int64)?;
        let raw: Vec<Option<i64>> = raw.i64()?.into_iter().collect();
        raw.into_iter()
            .map(|v| {
                v.and_then(|v| match unit {
                    TimeUnit::Milliseconds => DateTime::from_timestamp_millis(v),
                    TimeUnit::Microseconds => DateTime::from_timestamp_micros(v),
                    TimeUnit::Nanoseconds => Some(DateTime::from_timestamp_nanos(v)),
                })
                .map(|dt| dt.naive_utc())
                .ok_or_else(|| self.null_error(name))
            })
            .collect()
    }

    fn mistyped(&self, name: &str, dtype: &DataType) -> ProjectionError {
        ProjectionError::SchemaMismatch {
            table: self.table.to_string(),
            missing: Vec::new(),
            extra: Vec::new(),
            mistyped: vec![format!("{} ({})", name, dtype)],
        }
    }
}

// ---------------------------------------------------------------------------
// Input tables

impl TableRow for DailyWeatherRecord {
    fn schema() -> Schema {
        vec![
            ("geography", DataType::String),
            ("date", DataType::Date),
            ("value", DataType::Float64),
        ]
    }

    fn to_frame(rows: &[Self]) -> Result<DataFrame> {
        Ok(DataFrame::new(vec![
            string_series("geography", rows.iter().map(|r| &r.geography)),
            date_series("date", rows.iter().map(|r| r.date))?,
            Series::new(
                "value",
                rows.iter().map(|r| r.composite_temperature).collect::<Vec<_>>(),
            ),
        ])?)
    }

    fn from_frame(table: &str, df: &DataFrame) -> Result<Vec<Self>> {
        let reader = FrameReader::new(table, df);
        let geography = reader.strings("geography")?;
        let date = reader.dates("date")?;
        let value = reader.opt_f64s("value")?;
        Ok(geography
            .into_iter()
            .zip(date)
            .zip(value)
            .map(|((geography, date), composite_temperature)| DailyWeatherRecord {
                geography,
                date,
                composite_temperature,
            })
            .collect())
    }
}

impl TableRow for RepresentativeLoadShape {
    fn schema() -> Schema {
        vec![
            ("geography", DataType::String),
            ("sector", DataType::String),
            ("end_use", DataType::String),
            ("model_year", DataType::Int32),
            ("month", DataType::Int32),
            ("day_type", DataType::String),
            ("hour", DataType::Int32),
            ("value", DataType::Float64),
        ]
    }

    fn to_frame(rows: &[Self]) -> Result<DataFrame> {
        Ok(DataFrame::new(vec![
            string_series("geography", rows.iter().map(|r| &r.geography)),
            string_series("sector", rows.iter().map(|r| r.sector.as_str())),
            string_series("end_use", rows.iter().map(|r| &r.end_use)),
            Series::new("model_year", rows.iter().map(|r| r.model_year).collect::<Vec<_>>()),
            Series::new("month", rows.iter().map(|r| r.month as i32).collect::<Vec<_>>()),
            string_series("day_type", rows.iter().map(|r| r.day_type.as_str())),
            Series::new("hour", rows.iter().map(|r| r.hour as i32).collect::<Vec<_>>()),
            Series::new("value", rows.iter().map(|r| r.value).collect::<Vec<_>>()),
        ])?)
    }

    fn from_frame(table: &str, df: &DataFrame) -> Result<Vec<Self>> {
        let reader = FrameReader::new(table, df);
        let geography = reader.strings("geography")?;
        let sector: Vec<Sector> = reader.parsed("sector")?;
        let end_use = reader.strings("end_use")?;
        let model_year = reader.i32s("model_year")?;
        let month = reader.u32s("month")?;
        let day_type: Vec<DayType> = reader.parsed("day_type")?;
        let hour = reader.u32s("hour")?;
        let value = reader.f64s("value")?;
        Ok((0..df.height())
            .map(|i| RepresentativeLoadShape {
                geography: geography[i].clone(),
                sector: sector[i],
                end_use: end_use[i].clone(),
                model_year: model_year[i],
                month: month[i],
                day_type: day_type[i],
                hour: hour[i],
                value: value[i],
            })
            .collect())
    }
}

impl TableRow for DriverRecord {
    fn schema() -> Schema {
        vec![
            ("geography", DataType::String),
            ("model_year", DataType::Int32),
            ("value", DataType::Float64),
        ]
    }

    fn to_frame(rows: &[Self]) -> Result<DataFrame> {
        Ok(DataFrame::new(vec![
            string_series("geography", rows.iter().map(|r| &r.geography)),
            Series::new("model_year", rows.iter().map(|r| r.model_year).collect::<Vec<_>>()),
            Series::new("value", rows.iter().map(|r| r.value).collect::<Vec<_>>()),
        ])?)
    }

    fn from_frame(table: &str, df: &DataFrame) -> Result<Vec<Self>> {
        let reader = FrameReader::new(table, df);
        let geography = reader.strings("geography")?;
        let model_year = reader.i32s("model_year")?;
        let value = reader.f64s("value")?;
        Ok(geography
            .into_iter()
            .zip(model_year)
            .zip(value)
            .map(|((geography, model_year), value)| DriverRecord {
                geography,
                model_year,
                value,
            })
            .collect())
    }
}

impl TableRow for VehicleEfficiencyRecord {
    fn schema() -> Schema {
        vec![
            ("geography", DataType::String),
            ("subsector", DataType::String),
            ("model_year", DataType::Int32),
            ("value", DataType::Float64),
        ]
    }

    fn to_frame(rows: &[Self]) -> Result<DataFrame> {
        Ok(DataFrame::new(vec![
            string_series("geography", rows.iter().map(|r| &r.geography)),
            string_series("subsector", rows.iter().map(|r| &r.subsector)),
            Series::new("model_year", rows.iter().map(|r| r.model_year).collect::<Vec<_>>()),
            Series::new("value", rows.iter().map(|r| r.value).collect::<Vec<_>>()),
        ])?)
    }

    fn from_frame(table: &str, df: &DataFrame) -> Result<Vec<Self>> {
        let reader = FrameReader::new(table, df);
        let geography = reader.strings("geography")?;
        let subsector = reader.strings("subsector")?;
        let model_year = reader.i32s("model_year")?;
        let value = reader.f64s("value")?;
        Ok((0..df.height())
            .map(|i| VehicleEfficiencyRecord {
                geography: geography[i].clone(),
                subsector: subsector[i].clone(),
                model_year: model_year[i],
                value: value[i],
            })
            .collect())
    }
}

impl TableRow for RegressionRow {
    fn schema() -> Schema {
        vec![
            ("geography", DataType::String),
            ("sector", DataType::String),
            ("subsector", DataType::String),
            ("regression_type", DataType::String),
            ("a0", DataType::Float64),
            ("a1", DataType::Float64),
            ("t0", DataType::Float64),
        ]
    }

    fn to_frame(rows: &[Self]) -> Result<DataFrame> {
        Ok(DataFrame::new(vec![
            string_series("geography", rows.iter().map(|r| &r.geography)),
            Series::new(
                "sector",
                rows.iter()
                    .map(|r| r.sector.map(|s| s.as_str()))
                    .collect::<Vec<_>>(),
            ),
            Series::new(
                "subsector",
                rows.iter().map(|r| r.subsector.as_deref()).collect::<Vec<_>>(),
            ),
            string_series("regression_type", rows.iter().map(|r| &r.regression_type)),
            Series::new("a0", rows.iter().map(|r| r.a0).collect::<Vec<_>>()),
            Series::new("a1", rows.iter().map(|r| r.a1).collect::<Vec<_>>()),
            Series::new("t0", rows.iter().map(|r| r.t0).collect::<Vec<_>>()),
        ])?)
    }

    /// `sector`, `subsector` and `t0` may be absent.
    fn from_frame(table: &str, df: &DataFrame) -> Result<Vec<Self>> {
        let reader = FrameReader::new(table, df);
        let geography = reader.strings("geography")?;
        let sector: Vec<Option<Sector>> = reader.optional_parsed("sector")?;
        let subsector = reader.optional_strings("subsector")?;
        let regression_type = reader.strings("regression_type")?;
        let a0 = reader.f64s("a0")?;
        let a1 = reader.f64s("a1")?;
        let t0 = if reader.has("t0") {
            reader.opt_f64s("t0")?
        } else {
            vec![None; df.height()]
        };
        Ok((0..df.height())
            .map(|i| RegressionRow {
                geography: geography[i].clone(),
                sector: sector[i],
                subsector: subsector[i].clone(),
                regression_type: regression_type[i].clone(),
                a0: a0[i],
                a1: a1[i],
                t0: t0[i],
            })
            .collect())
    }
}

impl TableRow for RegressionMetricRow {
    fn schema() -> Schema {
        vec![
            ("geography", DataType::String),
            ("sector", DataType::String),
            ("subsector", DataType::String),
            ("metric", DataType::String),
            ("value", DataType::Float64),
        ]
    }

    fn to_frame(rows: &[Self]) -> Result<DataFrame> {
        Ok(DataFrame::new(vec![
            string_series("geography", rows.iter().map(|r| &r.geography)),
            Series::new(
                "sector",
                rows.iter()
                    .map(|r| r.sector.map(|s| s.as_str()))
                    .collect::<Vec<_>>(),
            ),
            Series::new(
                "subsector",
                rows.iter().map(|r| r.subsector.as_deref()).collect::<Vec<_>>(),
            ),
            string_series("metric", rows.iter().map(|r| &r.metric)),
            Series::new("value", rows.iter().map(|r| r.value).collect::<Vec<_>>()),
        ])?)
    }

    fn from_frame(table: &str, df: &DataFrame) -> Result<Vec<Self>> {
        let reader = FrameReader::new(table, df);
        let geography = reader.strings("geography")?;
        let sector: Vec<Option<Sector>> = reader.optional_parsed("sector")?;
        let subsector = reader.optional_strings("subsector")?;
        let metric = reader.strings("metric")?;
        let value = reader.f64s("value")?;
        Ok((0..df.height())
            .map(|i| RegressionMetricRow {
                geography: geography[i].clone(),
                sector: sector[i],
                subsector: subsector[i].clone(),
                metric: metric[i].clone(),
                value: value[i],
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Calculated tables

impl TableRow for DegreeDayRecord {
    fn schema() -> Schema {
        vec![
            ("geography", DataType::String),
            ("date", DataType::Date),
            ("weather_year", DataType::Int32),
            ("month", DataType::Int32),
            ("day", DataType::Int32),
            ("day_type", DataType::String),
            ("composite_temperature", DataType::Float64),
            ("hdd", DataType::Float64),
            ("cdd", DataType::Float64),
        ]
    }

    fn to_frame(rows: &[Self]) -> Result<DataFrame> {
        Ok(DataFrame::new(vec![
            string_series("geography", rows.iter().map(|r| &r.geography)),
            date_series("date", rows.iter().map(|r| r.date))?,
            Series::new("weather_year", rows.iter().map(|r| r.weather_year).collect::<Vec<_>>()),
            Series::new("month", rows.iter().map(|r| r.month as i32).collect::<Vec<_>>()),
            Series::new("day", rows.iter().map(|r| r.day as i32).collect::<Vec<_>>()),
            string_series("day_type", rows.iter().map(|r| r.day_type.as_str())),
            Series::new(
                "composite_temperature",
                rows.iter().map(|r| r.composite_temperature).collect::<Vec<_>>(),
            ),
            Series::new("hdd", rows.iter().map(|r| r.hdd).collect::<Vec<_>>()),
            Series::new("cdd", rows.iter().map(|r| r.cdd).collect::<Vec<_>>()),
        ])?)
    }

    fn from_frame(table: &str, df: &DataFrame) -> Result<Vec<Self>> {
        let reader = FrameReader::new(table, df);
        let geography = reader.strings("geography")?;
        let date = reader.dates("date")?;
        let weather_year = reader.i32s("weather_year")?;
        let month = reader.u32s("month")?;
        let day = reader.u32s("day")?;
        let day_type: Vec<DayType> = reader.parsed("day_type")?;
        let temperature = reader.opt_f64s("composite_temperature")?;
        let hdd = reader.opt_f64s("hdd")?;
        let cdd = reader.opt_f64s("cdd")?;
        Ok((0..df.height())
            .map(|i| DegreeDayRecord {
                geography: geography[i].clone(),
                date: date[i],
                weather_year: weather_year[i],
                month: month[i],
                day: day[i],
                day_type: day_type[i],
                composite_temperature: temperature[i],
                hdd: hdd[i],
                cdd: cdd[i],
            })
            .collect())
    }
}

impl TableRow for DegreeDayGroup {
    fn schema() -> Schema {
        vec![
            ("geography", DataType::String),
            ("weather_year", DataType::Int32),
            ("month", DataType::Int32),
            ("day_type", DataType::String),
            ("num_days", DataType::Int32),
            ("total_hdd", DataType::Float64),
            ("total_cdd", DataType::Float64),
        ]
    }

    fn to_frame(rows: &[Self]) -> Result<DataFrame> {
        Ok(DataFrame::new(vec![
            string_series("geography", rows.iter().map(|r| &r.geography)),
            Series::new("weather_year", rows.iter().map(|r| r.weather_year).collect::<Vec<_>>()),
            Series::new("month", rows.iter().map(|r| r.month as i32).collect::<Vec<_>>()),
            string_series("day_type", rows.iter().map(|r| r.day_type.as_str())),
            Series::new("num_days", rows.iter().map(|r| r.num_days as i32).collect::<Vec<_>>()),
            Series::new("total_hdd", rows.iter().map(|r| r.total_hdd).collect::<Vec<_>>()),
            Series::new("total_cdd", rows.iter().map(|r| r.total_cdd).collect::<Vec<_>>()),
        ])?)
    }

    fn from_frame(table: &str, df: &DataFrame) -> Result<Vec<Self>> {
        let reader = FrameReader::new(table, df);
        let geography = reader.strings("geography")?;
        let weather_year = reader.i32s("weather_year")?;
        let month = reader.u32s("month")?;
        let day_type: Vec<DayType> = reader.parsed("day_type")?;
        let num_days = reader.u32s("num_days")?;
        let total_hdd = reader.opt_f64s("total_hdd")?;
        let total_cdd = reader.opt_f64s("total_cdd")?;
        Ok((0..df.height())
            .map(|i| DegreeDayGroup {
                geography: geography[i].clone(),
                weather_year: weather_year[i],
                month: month[i],
                day_type: day_type[i],
                num_days: num_days[i],
                total_hdd: total_hdd[i],
                total_cdd: total_cdd[i],
            })
            .collect())
    }
}

impl TableRow for SmoothedDegreeDay {
    fn schema() -> Schema {
        vec![
            ("geography", DataType::String),
            ("date", DataType::Date),
            ("weather_year", DataType::Int32),
            ("month", DataType::Int32),
            ("day_type", DataType::String),
            ("hdd", DataType::Float64),
            ("cdd", DataType::Float64),
            ("adjusted_hdd", DataType::Float64),
            ("adjusted_cdd", DataType::Float64),
            ("num_days", DataType::Int32),
            ("total_hdd", DataType::Float64),
            ("total_cdd", DataType::Float64),
            ("adjusted_total_hdd", DataType::Float64),
            ("adjusted_total_cdd", DataType::Float64),
        ]
    }

    fn to_frame(rows: &[Self]) -> Result<DataFrame> {
        Ok(DataFrame::new(vec![
            string_series("geography", rows.iter().map(|r| &r.geography)),
            date_series("date", rows.iter().map(|r| r.date))?,
            Series::new("weather_year", rows.iter().map(|r| r.weather_year).collect::<Vec<_>>()),
            Series::new("month", rows.iter().map(|r| r.month as i32).collect::<Vec<_>>()),
            string_series("day_type", rows.iter().map(|r| r.day_type.as_str())),
            Series::new("hdd", rows.iter().map(|r| r.hdd).collect::<Vec<_>>()),
            Series::new("cdd", rows.iter().map(|r| r.cdd).collect::<Vec<_>>()),
            Series::new("adjusted_hdd", rows.iter().map(|r| r.adjusted_hdd).collect::<Vec<_>>()),
            Series::new("adjusted_cdd", rows.iter().map(|r| r.adjusted_cdd).collect::<Vec<_>>()),
            Series::new("num_days", rows.iter().map(|r| r.num_days as i32).collect::<Vec<_>>()),
            Series::new("total_hdd", rows.iter().map(|r| r.total_hdd).collect::<Vec<_>>()),
            Series::new("total_cdd", rows.iter().map(|r| r.total_cdd).collect::<Vec<_>>()),
            Series::new(
                "adjusted_total_hdd",
                rows.iter().map(|r| r.adjusted_total_hdd).collect::<Vec<_>>(),
            ),
            Series::new(
                "adjusted_total_cdd",
                rows.iter().map(|r| r.adjusted_total_cdd).collect::<Vec<_>>(),
            ),
        ])?)
    }

    fn from_frame(table: &str, df: &DataFrame) -> Result<Vec<Self>> {
        let reader = FrameReader::new(table, df);
        let geography = reader.strings("geography")?;
        let date = reader.dates("date")?;
        let weather_year = reader.i32s("weather_year")?;
        let month = reader.u32s("month")?;
        let day_type: Vec<DayType> = reader.parsed("day_type")?;
        let hdd = reader.opt_f64s("hdd")?;
        let cdd = reader.opt_f64s("cdd")?;
        let adjusted_hdd = reader.opt_f64s("adjusted_hdd")?;
        let adjusted_cdd = reader.opt_f64s("adjusted_cdd")?;
        let num_days = reader.u32s("num_days")?;
        let total_hdd = reader.opt_f64s("total_hdd")?;
        let total_cdd = reader.opt_f64s("total_cdd")?;
        let adjusted_total_hdd = reader.opt_f64s("adjusted_total_hdd")?;
        let adjusted_total_cdd = reader.opt_f64s("adjusted_total_cdd")?;
        Ok((0..df.height())
            .map(|i| SmoothedDegreeDay {
                geography: geography[i].clone(),
                date: date[i],
                weather_year: weather_year[i],
                month: month[i],
                day_type: day_type[i],
                hdd: hdd[i],
                cdd: cdd[i],
                adjusted_hdd: adjusted_hdd[i],
                adjusted_cdd: adjusted_cdd[i],
                num_days: num_days[i],
                total_hdd: total_hdd[i],
                total_cdd: total_cdd[i],
                adjusted_total_hdd: adjusted_total_hdd[i],
                adjusted_total_cdd: adjusted_total_cdd[i],
            })
            .collect())
    }
}

impl TableRow for TemperatureMultiplier {
    fn schema() -> Schema {
        vec![
            ("geography", DataType::String),
            ("date", DataType::Date),
            ("weather_year", DataType::Int32),
            ("month", DataType::Int32),
            ("day_type", DataType::String),
            ("heating_multiplier", DataType::Float64),
            ("cooling_multiplier", DataType::Float64),
            ("other_multiplier", DataType::Float64),
        ]
    }

    fn to_frame(rows: &[Self]) -> Result<DataFrame> {
        Ok(DataFrame::new(vec![
            string_series("geography", rows.iter().map(|r| &r.geography)),
            date_series("date", rows.iter().map(|r| r.date))?,
            Series::new("weather_year", rows.iter().map(|r| r.weather_year).collect::<Vec<_>>()),
            Series::new("month", rows.iter().map(|r| r.month as i32).collect::<Vec<_>>()),
            string_series("day_type", rows.iter().map(|r| r.day_type.as_str())),
            Series::new(
                "heating_multiplier",
                rows.iter().map(|r| r.heating_multiplier).collect::<Vec<_>>(),
            ),
            Series::new(
                "cooling_multiplier",
                rows.iter().map(|r| r.cooling_multiplier).collect::<Vec<_>>(),
            ),
            Series::new(
                "other_multiplier",
                rows.iter().map(|r| r.other_multiplier).collect::<Vec<_>>(),
            ),
        ])?)
    }

    fn from_frame(table: &str, df: &DataFrame) -> Result<Vec<Self>> {
        let reader = FrameReader::new(table, df);
        let geography = reader.strings("geography")?;
        let date = reader.dates("date")?;
        let weather_year = reader.i32s("weather_year")?;
        let month = reader.u32s("month")?;
        let day_type: Vec<DayType> = reader.parsed("day_type")?;
        let heating = reader.f64s("heating_multiplier")?;
        let cooling = reader.f64s("cooling_multiplier")?;
        let other = reader.f64s("other_multiplier")?;
        Ok((0..df.height())
            .map(|i| TemperatureMultiplier {
                geography: geography[i].clone(),
                date: date[i],
                weather_year: weather_year[i],
                month: month[i],
                day_type: day_type[i],
                heating_multiplier: heating[i],
                cooling_multiplier: cooling[i],
                other_multiplier: other[i],
            })
            .collect())
    }
}

impl TableRow for ExpandedLoadShape {
    fn schema() -> Schema {
        vec![
            ("geography", DataType::String),
            ("sector", DataType::String),
            ("end_use", DataType::String),
            ("model_year", DataType::Int32),
            ("timestamp", datetime_dtype()),
            ("weather_year", DataType::Int32),
            ("raw_value", DataType::Float64),
            ("multiplier", DataType::Float64),
            ("adjusted_value", DataType::Float64),
        ]
    }

    fn to_frame(rows: &[Self]) -> Result<DataFrame> {
        Ok(DataFrame::new(vec![
            string_series("geography", rows.iter().map(|r| &r.geography)),
            string_series("sector", rows.iter().map(|r| r.sector.as_str())),
            string_series("end_use", rows.iter().map(|r| &r.end_use)),
            Series::new("model_year", rows.iter().map(|r| r.model_year).collect::<Vec<_>>()),
            datetime_series("timestamp", rows.iter().map(|r| r.timestamp))?,
            Series::new("weather_year", rows.iter().map(|r| r.weather_year).collect::<Vec<_>>()),
            Series::new("raw_value", rows.iter().map(|r| r.raw_value).collect::<Vec<_>>()),
            Series::new("multiplier", rows.iter().map(|r| r.multiplier).collect::<Vec<_>>()),
            Series::new(
                "adjusted_value",
                rows.iter().map(|r| r.adjusted_value).collect::<Vec<_>>(),
            ),
        ])?)
    }

    fn from_frame(table: &str, df: &DataFrame) -> Result<Vec<Self>> {
        let reader = FrameReader::new(table, df);
        let geography = reader.strings("geography")?;
        let sector: Vec<Sector> = reader.parsed("sector")?;
        let end_use = reader.strings("end_use")?;
        let model_year = reader.i32s("model_year")?;
        let timestamp = reader.datetimes("timestamp")?;
        let weather_year = reader.i32s("weather_year")?;
        let raw_value = reader.f64s("raw_value")?;
        let multiplier = reader.f64s("multiplier")?;
        let adjusted_value = reader.f64s("adjusted_value")?;
        Ok((0..df.height())
            .map(|i| ExpandedLoadShape {
                geography: geography[i].clone(),
                sector: sector[i],
                end_use: end_use[i].clone(),
                model_year: model_year[i],
                timestamp: timestamp[i],
                weather_year: weather_year[i],
                raw_value: raw_value[i],
                multiplier: multiplier[i],
                adjusted_value: adjusted_value[i],
            })
            .collect())
    }
}

impl TableRow for AnnualDriverProjection {
    fn schema() -> Schema {
        vec![
            ("geography", DataType::String),
            ("sector", DataType::String),
            ("subsector", DataType::String),
            ("model_year", DataType::Int32),
            ("annual_total", DataType::Float64),
        ]
    }

    fn to_frame(rows: &[Self]) -> Result<DataFrame> {
        Ok(DataFrame::new(vec![
            string_series("geography", rows.iter().map(|r| &r.geography)),
            string_series("sector", rows.iter().map(|r| r.sector.as_str())),
            string_series("subsector", rows.iter().map(|r| &r.subsector)),
            Series::new("model_year", rows.iter().map(|r| r.model_year).collect::<Vec<_>>()),
            Series::new("annual_total", rows.iter().map(|r| r.annual_total).collect::<Vec<_>>()),
        ])?)
    }

    fn from_frame(table: &str, df: &DataFrame) -> Result<Vec<Self>> {
        let reader = FrameReader::new(table, df);
        let geography = reader.strings("geography")?;
        let sector: Vec<Sector> = reader.parsed("sector")?;
        let subsector = reader.strings("subsector")?;
        let model_year = reader.i32s("model_year")?;
        let annual_total = reader.f64s("annual_total")?;
        Ok((0..df.height())
            .map(|i| AnnualDriverProjection {
                geography: geography[i].clone(),
                sector: sector[i],
                subsector: subsector[i].clone(),
                model_year: model_year[i],
                annual_total: annual_total[i],
            })
            .collect())
    }
}

impl TableRow for ScalingFactor {
    fn schema() -> Schema {
        vec![
            ("geography", DataType::String),
            ("model_year", DataType::Int32),
            ("sector", DataType::String),
            ("annual_total", DataType::Float64),
            ("load_shape_annual_total", DataType::Float64),
            ("factor", DataType::Float64),
        ]
    }

    fn to_frame(rows: &[Self]) -> Result<DataFrame> {
        Ok(DataFrame::new(vec![
            string_series("geography", rows.iter().map(|r| &r.geography)),
            Series::new("model_year", rows.iter().map(|r| r.model_year).collect::<Vec<_>>()),
            string_series("sector", rows.iter().map(|r| r.sector.as_str())),
            Series::new("annual_total", rows.iter().map(|r| r.annual_total).collect::<Vec<_>>()),
            Series::new(
                "load_shape_annual_total",
                rows.iter().map(|r| r.load_shape_annual_total).collect::<Vec<_>>(),
            ),
            Series::new("factor", rows.iter().map(|r| r.factor).collect::<Vec<_>>()),
        ])?)
    }

    fn from_frame(table: &str, df: &DataFrame) -> Result<Vec<Self>> {
        let reader = FrameReader::new(table, df);
        let geography = reader.strings("geography")?;
        let model_year = reader.i32s("model_year")?;
        let sector: Vec<Sector> = reader.parsed("sector")?;
        let annual_total = reader.f64s("annual_total")?;
        let load_shape_annual_total = reader.f64s("load_shape_annual_total")?;
        let factor = reader.f64s("factor")?;
        Ok((0..df.height())
            .map(|i| ScalingFactor {
                geography: geography[i].clone(),
                model_year: model_year[i],
                sector: sector[i],
                annual_total: annual_total[i],
                load_shape_annual_total: load_shape_annual_total[i],
                factor: factor[i],
            })
            .collect())
    }
}

impl TableRow for FinalHourlyProjection {
    fn schema() -> Schema {
        vec![
            ("timestamp", datetime_dtype()),
            ("model_year", DataType::Int32),
            ("scenario", DataType::String),
            ("geography", DataType::String),
            ("sector", DataType::String),
            ("metric", DataType::String),
            ("value", DataType::Float64),
        ]
    }

    fn to_frame(rows: &[Self]) -> Result<DataFrame> {
        Ok(DataFrame::new(vec![
            datetime_series("timestamp", rows.iter().map(|r| r.timestamp))?,
            Series::new("model_year", rows.iter().map(|r| r.model_year).collect::<Vec<_>>()),
            string_series("scenario", rows.iter().map(|r| &r.scenario)),
            string_series("geography", rows.iter().map(|r| &r.geography)),
            string_series("sector", rows.iter().map(|r| r.sector.as_str())),
            string_series("metric", rows.iter().map(|r| &r.metric)),
            Series::new("value", rows.iter().map(|r| r.value).collect::<Vec<_>>()),
        ])?)
    }

    fn from_frame(table: &str, df: &DataFrame) -> Result<Vec<Self>> {
        let reader = FrameReader::new(table, df);
        let timestamp = reader.datetimes("timestamp")?;
        let model_year = reader.i32s("model_year")?;
        let scenario = reader.strings("scenario")?;
        let geography = reader.strings("geography")?;
        let sector: Vec<Sector> = reader.parsed("sector")?;
        let metric = reader.strings("metric")?;
        let value = reader.f64s("value")?;
        Ok((0..df.height())
            .map(|i| FinalHourlyProjection {
                timestamp: timestamp[i],
                model_year: model_year[i],
                scenario: scenario[i].clone(),
                geography: geography[i].clone(),
                sector: sector[i],
                metric: metric[i].clone(),
                value: value[i],
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Calculated table names and schema checks

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CalculatedTable {
    DegreeDays,
    DegreeDayGroups,
    SmoothedDegreeDays,
    TemperatureMultipliers,
    LoadShapesExpanded,
    AnnualEnergy,
    ScalingFactors,
    EnergyProjection,
}

impl CalculatedTable {
    pub const ALL: [CalculatedTable; 8] = [
        CalculatedTable::DegreeDays,
        CalculatedTable::DegreeDayGroups,
        CalculatedTable::SmoothedDegreeDays,
        CalculatedTable::TemperatureMultipliers,
        CalculatedTable::LoadShapesExpanded,
        CalculatedTable::AnnualEnergy,
        CalculatedTable::ScalingFactors,
        CalculatedTable::EnergyProjection,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CalculatedTable::DegreeDays => "degree_days",
            CalculatedTable::DegreeDayGroups => "degree_day_groups",
            CalculatedTable::SmoothedDegreeDays => "smoothed_degree_days",
            CalculatedTable::TemperatureMultipliers => "temperature_multipliers",
            CalculatedTable::LoadShapesExpanded => "load_shapes_expanded",
            CalculatedTable::AnnualEnergy => "annual_energy",
            CalculatedTable::ScalingFactors => "scaling_factors",
            CalculatedTable::EnergyProjection => "energy_projection",
        }
    }

    pub fn schema(&self) -> Schema {
        match self {
            CalculatedTable::DegreeDays => DegreeDayRecord::schema(),
            CalculatedTable::DegreeDayGroups => DegreeDayGroup::schema(),
            CalculatedTable::SmoothedDegreeDays => SmoothedDegreeDay::schema(),
            CalculatedTable::TemperatureMultipliers => TemperatureMultiplier::schema(),
            CalculatedTable::LoadShapesExpanded => ExpandedLoadShape::schema(),
            CalculatedTable::AnnualEnergy => AnnualDriverProjection::schema(),
            CalculatedTable::ScalingFactors => ScalingFactor::schema(),
            CalculatedTable::EnergyProjection => FinalHourlyProjection::schema(),
        }
    }
}

impl fmt::Display for CalculatedTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CalculatedTable {
    type Err = ProjectionError;

    fn from_str(s: &str) -> Result<Self> {
        if s.contains("_override") {
            return Err(ProjectionError::InvalidOverride {
                table: s.to_string(),
                message: "override tables cannot themselves be overridden".to_string(),
            });
        }
        CalculatedTable::ALL
            .iter()
            .find(|t| t.name() == s)
            .copied()
            .ok_or_else(|| ProjectionError::UnknownTable(s.to_string()))
    }
}

fn dtype_matches(expected: &DataType, actual: &DataType) -> bool {
    match (expected, actual) {
        (DataType::Datetime(_, _), DataType::Datetime(_, _)) => true,
        _ => expected == actual,
    }
}

/// Exact column-set and dtype comparison, order-insensitive.
pub fn check_schema(table: &str, df: &DataFrame, schema: &Schema) -> Result<()> {
    let mut missing = Vec::new();
    let mut mistyped = Vec::new();
    for (name, dtype) in schema {
        match df.column(name) {
            Ok(series) if dtype_matches(dtype, series.dtype()) => {}
            Ok(series) => mistyped.push(format!("{} (expected {}, got {})", name, dtype, series.dtype())),
            Err(_) => missing.push(name.to_string()),
        }
    }
    let extra: Vec<String> = df
        .get_columns()
        .iter()
        .map(|s| s.name().to_string())
        .filter(|name| !schema.iter().any(|(expected, _)| expected == name))
        .collect();

    if missing.is_empty() && extra.is_empty() && mistyped.is_empty() {
        Ok(())
    } else {
        Err(ProjectionError::SchemaMismatch {
            table: table.to_string(),
            missing,
            extra,
            mistyped,
        })
    }
}

/// Widen/narrow integer columns, parse string dates and retype all-null
/// string columns so that a frame read from CSV can pass [`check_schema`]. Columns that cannot be converted are
/// left alone for the check to report.
pub fn coerce_to_schema(mut df: DataFrame, schema: &Schema) -> Result<DataFrame> {
    for (name, expected) in schema {
        let Ok(series) = df.column(name) else {
            continue;
        };
        let actual = series.dtype().clone();
        if dtype_matches(expected, &actual) {
            continue;
        }
        let all_null = series.null_count() == series.len();
        let convertible = match (expected, &actual) {
            (DataType::Float64 | DataType::Int32, DataType::String) => all_null,
            (DataType::Float64, dt) => dt.is_numeric() || *dt == DataType::Null,
            (DataType::Int32, dt) => dt.is_integer(),
            (DataType::Date, DataType::String | DataType::Datetime(_, _)) => true,
            (DataType::Datetime(_, _), DataType::String | DataType::Date) => true,
            (DataType::String, DataType::Null) => true,
            _ => false,
        };
        if convertible {
            if let Ok(converted) = series.cast(expected) {
                df.with_column(converted)?;
            }
        }
    }
    Ok(df)
}

// ---------------------------------------------------------------------------
// Resolver

/// Serves a registered override frame for a calculated table, or lets the
/// caller compute it.
#[derive(Debug, Default, Clone)]
pub struct TableResolver {
    overrides: BTreeMap<CalculatedTable, DataFrame>,
}

impl TableResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `df` in place of `table_name`. The frame must match the
    /// table's schema exactly.
    pub fn register_override(&mut self, table_name: &str, df: DataFrame) -> Result<CalculatedTable> {
        let table: CalculatedTable = table_name.parse()?;
        check_schema(table.name(), &df, &table.schema())?;
        info!("Registered override for {} ({} rows)", table, df.height());
        self.overrides.insert(table, df);
        Ok(table)
    }

    /// Like [`Self::register_override`], coercing loosely typed columns first.
    pub fn register_coerced_override(&mut self, table_name: &str, df: DataFrame) -> Result<CalculatedTable> {
        let table: CalculatedTable = table_name.parse()?;
        let df = coerce_to_schema(df, &table.schema())?;
        self.register_override(table_name, df)
    }

    pub fn remove_override(&mut self, table: CalculatedTable) -> Option<DataFrame> {
        self.overrides.remove(&table)
    }

    pub fn has_override(&self, table: CalculatedTable) -> bool {
        self.overrides.contains_key(&table)
    }

    pub fn overridden_tables(&self) -> Vec<CalculatedTable> {
        self.overrides.keys().copied().collect()
    }

    pub fn resolve<T, F>(&self, table: CalculatedTable, compute: F) -> Result<Vec<T>>
    where
        T: TableRow,
        F: FnOnce() -> Result<Vec<T>>,
    {
        match self.overrides.get(&table) {
            Some(df) => {
                info!("Using override for {} ({} rows)", table, df.height());
                T::from_frame(table.name(), df)
            }
            None => compute(),
        }
    }
}

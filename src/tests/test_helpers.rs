#[cfg(test)]
pub mod test_helpers {
    use chrono::{Datelike, NaiveDate};

    use crate::drivers::{DriverInputs, RegressionRow};
    use crate::models::{
        days_of_year, DailyWeatherRecord, DayType, DegreeDayRecord, DriverRecord,
        RepresentativeLoadShape, Sector,
    };
    use crate::pipeline::ScenarioInputs;

    pub const COUNTRY: &str = "country_1";
    pub const WEATHER_YEAR: i32 = 2018;
    pub const MODEL_YEARS: [i32; 2] = [2025, 2030];

    pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Cold winters, warm summers: both HDD and CDD show up.
    pub fn seasonal_temperature(day: NaiveDate) -> f64 {
        let phase = (day.ordinal() as f64 - 200.0) / 365.0 * std::f64::consts::TAU;
        17.0 + 12.0 * phase.cos()
    }

    pub fn synthetic_weather(geography: &str, year: i32) -> Vec<DailyWeatherRecord> {
        days_of_year(year)
            .into_iter()
            .map(|d| DailyWeatherRecord {
                geography: geography.to_string(),
                date: d,
                composite_temperature: Some(seasonal_temperature(d)),
            })
            .collect()
    }

    /// One degree-day record per value, all in the same (month, weekday) group.
    pub fn degree_day_group(hdd: &[Option<f64>], cdd: &[Option<f64>]) -> Vec<DegreeDayRecord> {
        // Mondays of January 2018: 1, 8, 15, 22, 29
        hdd.iter()
            .zip(cdd)
            .enumerate()
            .map(|(i, (h, c))| {
                let day = date(2018, 1, 1 + 7 * i as u32);
                DegreeDayRecord {
                    geography: COUNTRY.to_string(),
                    date: day,
                    weather_year: 2018,
                    month: 1,
                    day: day.day(),
                    day_type: DayType::Weekday,
                    composite_temperature: None,
                    hdd: *h,
                    cdd: *c,
                }
            })
            .collect()
    }

    /// Full 12 x 2 x 24 representative profile for one series.
    pub fn profile(
        geography: &str,
        sector: Sector,
        end_use: &str,
        model_year: i32,
    ) -> Vec<RepresentativeLoadShape> {
        let mut rows = Vec::with_capacity(12 * 2 * 24);
        for month in 1..=12u32 {
            for day_type in [DayType::Weekday, DayType::Weekend] {
                for hour in 0..24u32 {
                    rows.push(RepresentativeLoadShape {
                        geography: geography.to_string(),
                        sector,
                        end_use: end_use.to_string(),
                        model_year,
                        month,
                        day_type,
                        hour,
                        value: 1.0 + hour as f64 * 0.1,
                    });
                }
            }
        }
        rows
    }

    pub fn synthetic_load_shapes() -> Vec<RepresentativeLoadShape> {
        let mut rows = Vec::new();
        for year in MODEL_YEARS {
            rows.extend(profile(COUNTRY, Sector::Residential, "heating", year));
            rows.extend(profile(COUNTRY, Sector::Residential, "cooling", year));
            rows.extend(profile(COUNTRY, Sector::Residential, "other", year));
            rows.extend(profile(COUNTRY, Sector::Commercial, "other", year));
            rows.extend(profile(COUNTRY, Sector::Industrial, "other", year));
        }
        rows
    }

    pub fn driver(geography: &str, model_year: i32, value: f64) -> DriverRecord {
        DriverRecord {
            geography: geography.to_string(),
            model_year,
            value,
        }
    }

    pub fn constant_driver(value: f64) -> Vec<DriverRecord> {
        MODEL_YEARS.iter().map(|y| driver(COUNTRY, *y, value)).collect()
    }

    pub fn regression(
        sector: Sector,
        subsector: &str,
        regression_type: &str,
        a0: f64,
        a1: f64,
        t0: f64,
    ) -> RegressionRow {
        RegressionRow {
            geography: COUNTRY.to_string(),
            sector: Some(sector),
            subsector: Some(subsector.to_string()),
            regression_type: regression_type.to_string(),
            a0,
            a1,
            t0: Some(t0),
        }
    }

    pub fn synthetic_drivers() -> DriverInputs {
        DriverInputs {
            energy_intensity: vec![
                regression(Sector::Residential, "unspecified", "lin", 0.001, 0.0001, 2020.0),
                regression(Sector::Commercial, "unspecified", "lin", 0.0002, 0.0, 2020.0),
                regression(Sector::Industrial, "steel", "exp", -8.0, 0.01, 2020.0),
                regression(Sector::Industrial, "chemicals", "exp", -8.5, 0.02, 2020.0),
            ],
            gdp: constant_driver(1.0e6),
            hdi: constant_driver(0.8),
            population: constant_driver(1.0e6),
            ev: None,
        }
    }

    pub fn synthetic_inputs() -> ScenarioInputs {
        ScenarioInputs {
            weather: synthetic_weather(COUNTRY, WEATHER_YEAR),
            load_shapes: synthetic_load_shapes(),
            drivers: synthetic_drivers(),
        }
    }
}

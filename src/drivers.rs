//! Annual energy from socioeconomic drivers and regression coefficients,
//! including the bottom-up electric-vehicle pathway for road transport.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::errors::{ProjectionError, Result};
use crate::models::{
    normalize_subsector, AnnualDriverProjection, DriverRecord, Sector, VehicleEfficiencyRecord,
};

/// 1 TJ = 1000/3.6 MWh
pub const TJ_TO_MWH: f64 = 1000.0 / 3.6;
/// 1 TJ = 277 777 777.778 Wh
pub const WH_PER_TJ: f64 = 277_777_777.778;

pub const ROAD_SUBSECTOR: &str = "road";
pub const BEV_SUBSECTOR: &str = "bev";
pub const PHEV_SUBSECTOR: &str = "phev";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegressionType {
    Exponential,
    Linear,
}

impl RegressionType {
    pub fn parse(value: &str, context: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "exp" => Ok(RegressionType::Exponential),
            "lin" => Ok(RegressionType::Linear),
            other => Err(ProjectionError::UnknownRegressionType {
                regression_type: other.to_string(),
                context: context.to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RegressionType::Exponential => "exp",
            RegressionType::Linear => "lin",
        }
    }
}

impl fmt::Display for RegressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegressionType {
    type Err = ProjectionError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s, "regression")
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegressionCoefficients {
    pub regression_type: RegressionType,
    pub a0: f64,
    pub a1: f64,
    pub t0: f64,
}

impl RegressionCoefficients {
    /// `exp(a0 + a1·(year − t0))` or `a0 + a1·(year − t0)`, times the driver product.
    pub fn evaluate(&self, year: i32, driver_product: f64) -> f64 {
        let trend = self.a0 + self.a1 * (year as f64 - self.t0);
        let base = match self.regression_type {
            RegressionType::Exponential => trend.exp(),
            RegressionType::Linear => trend,
        };
        base * driver_product
    }
}

/// Wide coefficient row. Vehicle regressions carry no sector.
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionRow {
    pub geography: String,
    pub sector: Option<Sector>,
    pub subsector: Option<String>,
    pub regression_type: String,
    pub a0: f64,
    pub a1: f64,
    pub t0: Option<f64>,
}

/// Long coefficient row; `metric` looks like `res_a0_exp` or `a1_lin`.
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionMetricRow {
    pub geography: String,
    pub sector: Option<Sector>,
    pub subsector: Option<String>,
    pub metric: String,
    pub value: f64,
}

type RegressionKey = (String, Option<Sector>, String);

fn split_metric<'a>(metric: &'a str, table: &str) -> Result<(&'a str, &'a str)> {
    let mut parts = metric.rsplitn(3, '_');
    match (parts.next(), parts.next()) {
        (Some(regression_type), Some(parameter)) => Ok((parameter, regression_type)),
        _ => Err(ProjectionError::invalid_value(
            table,
            "metric",
            format!("cannot split '{}' into parameter and regression type", metric),
        )),
    }
}

/// Pivot long rows on parameter (a0, a1, t0) into wide rows. Output is sorted.
pub fn pivot_regression_metrics(
    rows: &[RegressionMetricRow],
    table: &str,
) -> Result<Vec<RegressionRow>> {
    let mut groups: BTreeMap<(RegressionKey, String), BTreeMap<String, f64>> = BTreeMap::new();
    for row in rows {
        let (parameter, regression_type) = split_metric(&row.metric, table)?;
        if !matches!(parameter, "a0" | "a1" | "t0") {
            return Err(ProjectionError::invalid_value(
                table,
                "metric",
                format!("unknown regression parameter '{}' in '{}'", parameter, row.metric),
            ));
        }
        let key = (
            (
                row.geography.clone(),
                row.sector,
                normalize_subsector(row.subsector.as_deref()),
            ),
            regression_type.to_string(),
        );
        let params = groups.entry(key).or_default();
        if params.insert(parameter.to_string(), row.value).is_some() {
            return Err(ProjectionError::invalid_value(
                table,
                "metric",
                format!("'{}' given twice for {}", row.metric, row.geography),
            ));
        }
    }

    groups
        .into_iter()
        .map(|(((geography, sector, subsector), regression_type), params)| {
            let required = |name: &str| {
                params.get(name).copied().ok_or_else(|| {
                    ProjectionError::input_gap(
                        table,
                        format!(
                            "{} missing for {}/{}/{}",
                            name,
                            geography,
                            sector.map(|s| s.as_str()).unwrap_or("-"),
                            subsector
                        ),
                    )
                })
            };
            Ok(RegressionRow {
                a0: required("a0")?,
                a1: required("a1")?,
                t0: params.get("t0").copied(),
                geography: geography.clone(),
                sector,
                subsector: Some(subsector.clone()),
                regression_type,
            })
        })
        .collect()
}

/// Regressions keyed by (geography, sector, subsector).
#[derive(Debug, Clone, Default)]
pub struct RegressionTable {
    name: String,
    entries: BTreeMap<RegressionKey, RegressionCoefficients>,
}

impl RegressionTable {
    pub fn from_rows(name: &str, rows: &[RegressionRow]) -> Result<Self> {
        let mut entries = BTreeMap::new();
        for row in rows {
            let subsector = normalize_subsector(row.subsector.as_deref());
            let context = format!(
                "{} {}/{}/{}",
                name,
                row.geography,
                row.sector.map(|s| s.as_str()).unwrap_or("-"),
                subsector
            );
            let coefficients = RegressionCoefficients {
                regression_type: RegressionType::parse(&row.regression_type, &context)?,
                a0: row.a0,
                a1: row.a1,
                t0: row.t0.unwrap_or(0.0),
            };
            let key = (row.geography.clone(), row.sector, subsector);
            if entries.insert(key, coefficients).is_some() {
                return Err(ProjectionError::invalid_value(
                    name,
                    "regression_type",
                    format!("more than one regression for {}", context),
                ));
            }
        }
        Ok(Self {
            name: name.to_string(),
            entries,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RegressionKey, &RegressionCoefficients)> {
        self.entries.iter()
    }

    /// The single regression of a geography, for tables without sector/subsector.
    pub fn for_geography(&self, geography: &str) -> Result<&RegressionCoefficients> {
        let mut matches = self.entries.iter().filter(|((g, _, _), _)| g == geography);
        match (matches.next(), matches.next()) {
            (Some((_, coefficients)), None) => Ok(coefficients),
            (None, _) => Err(ProjectionError::input_gap(
                &self.name,
                format!("no regression for {}", geography),
            )),
            (Some(_), Some(_)) => Err(ProjectionError::invalid_value(
                &self.name,
                "geography",
                format!("several regressions for {}", geography),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    Gdp,
    Hdi,
    Population,
}

impl Driver {
    pub fn table_name(&self) -> &'static str {
        match self {
            Driver::Gdp => "gdp",
            Driver::Hdi => "hdi",
            Driver::Population => "population",
        }
    }

    /// Residential intensity scales with HDI and population, the others with GDP.
    pub fn for_sector(sector: Sector) -> &'static [Driver] {
        if sector.is_residential() {
            &[Driver::Hdi, Driver::Population]
        } else {
            &[Driver::Gdp]
        }
    }
}

/// A (geography, model_year) -> value lookup.
#[derive(Debug, Clone, Default)]
pub struct DriverSeries {
    name: String,
    values: BTreeMap<(String, i32), f64>,
}

impl DriverSeries {
    pub fn from_records(name: &str, records: &[DriverRecord]) -> Result<Self> {
        let mut values = BTreeMap::new();
        for record in records {
            if values
                .insert((record.geography.clone(), record.model_year), record.value)
                .is_some()
            {
                return Err(ProjectionError::invalid_value(
                    name,
                    "model_year",
                    format!("duplicate value for {} {}", record.geography, record.model_year),
                ));
            }
        }
        Ok(Self {
            name: name.to_string(),
            values,
        })
    }

    pub fn value(&self, geography: &str, model_year: i32) -> Result<f64> {
        self.values
            .get(&(geography.to_string(), model_year))
            .copied()
            .ok_or_else(|| {
                ProjectionError::input_gap(
                    &self.name,
                    format!("no value for {} in {}", geography, model_year),
                )
            })
    }
}

/// Inputs of the bottom-up EV pathway.
#[derive(Debug, Clone, Default)]
pub struct EvInputs {
    pub vehicle_per_capita: Vec<RegressionRow>,
    pub km_per_vehicle_year: Vec<RegressionRow>,
    pub ev_stock_share: Vec<DriverRecord>,
    pub phev_share: Vec<DriverRecord>,
    pub electricity_per_vehicle_km: Vec<VehicleEfficiencyRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct DriverInputs {
    pub energy_intensity: Vec<RegressionRow>,
    pub gdp: Vec<DriverRecord>,
    pub hdi: Vec<DriverRecord>,
    pub population: Vec<DriverRecord>,
    pub ev: Option<EvInputs>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvStock {
    pub bev: f64,
    pub phev: f64,
}

impl EvStock {
    /// Split the EV stock by plug-in hybrid share.
    pub fn split(ev_stock: f64, phev_share: f64) -> Self {
        Self {
            bev: ev_stock * (1.0 - phev_share),
            phev: ev_stock * phev_share,
        }
    }

    pub fn annual_wh(&self, km_per_vehicle_year: f64, bev_wh_per_km: f64, phev_wh_per_km: f64) -> f64 {
        self.bev * km_per_vehicle_year * bev_wh_per_km
            + self.phev * km_per_vehicle_year * phev_wh_per_km
    }
}

pub fn wh_to_mwh(wh: f64) -> f64 {
    wh / WH_PER_TJ * TJ_TO_MWH
}

pub struct AnnualDriverProjector<'a> {
    inputs: &'a DriverInputs,
    country: &'a str,
    model_years: &'a [i32],
}

impl<'a> AnnualDriverProjector<'a> {
    pub fn new(inputs: &'a DriverInputs, country: &'a str, model_years: &'a [i32]) -> Self {
        Self {
            inputs,
            country,
            model_years,
        }
    }

    /// Annual totals (MWh) per (geography, sector, subsector, model_year),
    /// sorted by that key. With `use_ev_projection` the Transportation/road
    /// regression row is replaced by the bottom-up EV estimate.
    pub fn project(&self, use_ev_projection: bool) -> Result<Vec<AnnualDriverProjection>> {
        let mut rows = self.project_energy_intensity()?;
        if use_ev_projection {
            let ev_rows = self.project_ev_energy()?;
            let before = rows.len();
            rows.retain(|r| !(r.sector == Sector::Transportation && r.subsector == ROAD_SUBSECTOR));
            if rows.len() == before {
                warn!(
                    "EV projection enabled but {} has no Transportation/road regression to replace",
                    self.country
                );
            }
            rows.extend(ev_rows);
        }
        rows.sort_by(|a, b| {
            (&a.geography, a.sector, &a.subsector, a.model_year).cmp(&(
                &b.geography,
                b.sector,
                &b.subsector,
                b.model_year,
            ))
        });
        info!(
            "Projected {} annual energy rows for {} ({} model years, EV pathway: {})",
            rows.len(),
            self.country,
            self.model_years.len(),
            use_ev_projection
        );
        Ok(rows)
    }

    fn project_energy_intensity(&self) -> Result<Vec<AnnualDriverProjection>> {
        let table = RegressionTable::from_rows("energy_intensity", &self.inputs.energy_intensity)?;
        let gdp = DriverSeries::from_records("gdp", &self.inputs.gdp)?;
        let hdi = DriverSeries::from_records("hdi", &self.inputs.hdi)?;
        let population = DriverSeries::from_records("population", &self.inputs.population)?;
        let series = |driver: Driver| match driver {
            Driver::Gdp => &gdp,
            Driver::Hdi => &hdi,
            Driver::Population => &population,
        };

        let mut rows = Vec::new();
        for ((geography, sector, subsector), coefficients) in table.iter() {
            if geography != self.country {
                continue;
            }
            let sector = sector.ok_or_else(|| {
                ProjectionError::invalid_value(
                    "energy_intensity",
                    "sector",
                    format!("regression for {}/{} has no sector", geography, subsector),
                )
            })?;
            for &year in self.model_years {
                let mut product = 1.0;
                for driver in Driver::for_sector(sector) {
                    product *= series(*driver).value(geography, year)?;
                }
                let tj = coefficients.evaluate(year, product);
                rows.push(AnnualDriverProjection {
                    geography: geography.clone(),
                    sector,
                    subsector: subsector.clone(),
                    model_year: year,
                    annual_total: tj * TJ_TO_MWH,
                });
            }
        }
        if rows.is_empty() {
            return Err(ProjectionError::input_gap(
                "energy_intensity",
                format!("no regressions for {}", self.country),
            ));
        }
        debug!("Energy-intensity regressions produced {} rows", rows.len());
        Ok(rows)
    }

    fn project_ev_energy(&self) -> Result<Vec<AnnualDriverProjection>> {
        let ev = self.inputs.ev.as_ref().ok_or_else(|| {
            ProjectionError::input_gap(
                "vehicle_per_capita",
                "EV projection requested but no EV inputs were provided",
            )
        })?;
        let vehicle_per_capita = RegressionTable::from_rows("vehicle_per_capita", &ev.vehicle_per_capita)?;
        let km_per_vehicle = RegressionTable::from_rows("km_per_vehicle_year", &ev.km_per_vehicle_year)?;
        let population = DriverSeries::from_records("population", &self.inputs.population)?;
        let ev_share = DriverSeries::from_records("ev_stock_share", &ev.ev_stock_share)?;
        let phev_share = DriverSeries::from_records("phev_share", &ev.phev_share)?;

        let mut wh_per_km: BTreeMap<(String, i32), f64> = BTreeMap::new();
        for record in &ev.electricity_per_vehicle_km {
            if record.geography == self.country {
                wh_per_km.insert(
                    (record.subsector.to_ascii_lowercase(), record.model_year),
                    record.value,
                );
            }
        }
        let efficiency = |subsector: &str, year: i32| {
            wh_per_km
                .get(&(subsector.to_string(), year))
                .copied()
                .ok_or_else(|| {
                    ProjectionError::input_gap(
                        "electricity_per_vehicle_km",
                        format!("no {} value for {} in {}", subsector, self.country, year),
                    )
                })
        };

        let vpc = vehicle_per_capita.for_geography(self.country)?;
        let km = km_per_vehicle.for_geography(self.country)?;
        let mut rows = Vec::with_capacity(self.model_years.len());
        for &year in self.model_years {
            let total_vehicles = vpc.evaluate(year, population.value(self.country, year)?);
            let ev_stock = total_vehicles * ev_share.value(self.country, year)?;
            let stock = EvStock::split(ev_stock, phev_share.value(self.country, year)?);
            let wh = stock.annual_wh(
                km.evaluate(year, 1.0),
                efficiency(BEV_SUBSECTOR, year)?,
                efficiency(PHEV_SUBSECTOR, year)?,
            );
            rows.push(AnnualDriverProjection {
                geography: self.country.to_string(),
                sector: Sector::Transportation,
                subsector: ROAD_SUBSECTOR.to_string(),
                model_year: year,
                annual_total: wh_to_mwh(wh),
            });
        }
        Ok(rows)
    }
}

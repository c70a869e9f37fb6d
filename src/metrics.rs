//! Summary views over the final hourly projection.

use chrono::NaiveDateTime;
use std::collections::{BTreeMap, BTreeSet};

use crate::errors::{ProjectionError, Result};
use crate::models::FinalHourlyProjection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Breakdown {
    Total,
    Sector,
    EndUse,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnualConsumption {
    pub scenario: String,
    pub model_year: i32,
    /// Sector or end use; `None` for the total.
    pub group: Option<String>,
    /// MWh
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PeakDemand {
    pub scenario: String,
    pub model_year: i32,
    pub timestamp: NaiveDateTime,
    /// MW (MWh over one hour)
    pub value: f64,
}

pub struct ProjectionMetrics<'a> {
    rows: &'a [FinalHourlyProjection],
}

impl<'a> ProjectionMetrics<'a> {
    pub fn new(rows: &'a [FinalHourlyProjection]) -> Self {
        Self { rows }
    }

    pub fn scenarios(&self) -> BTreeSet<&'a str> {
        self.rows.iter().map(|r| r.scenario.as_str()).collect()
    }

    pub fn model_years(&self, scenario: &str) -> BTreeSet<i32> {
        self.rows
            .iter()
            .filter(|r| r.scenario == scenario)
            .map(|r| r.model_year)
            .collect()
    }

    fn check_query(&self, scenario: &str, model_year: Option<i32>) -> Result<()> {
        if !self.scenarios().contains(scenario) {
            return Err(ProjectionError::UnknownScenario(scenario.to_string()));
        }
        if let Some(year) = model_year {
            if !self.model_years(scenario).contains(&year) {
                return Err(ProjectionError::InvalidQuery(format!(
                    "model year {} not in scenario '{}'",
                    year, scenario
                )));
            }
        }
        Ok(())
    }

    /// Sorted by (scenario, model_year, group).
    pub fn annual_consumption(&self, breakdown: Breakdown) -> Vec<AnnualConsumption> {
        let mut totals: BTreeMap<(&str, i32, Option<&str>), f64> = BTreeMap::new();
        for row in self.rows {
            let group = match breakdown {
                Breakdown::Total => None,
                Breakdown::Sector => Some(row.sector.as_str()),
                Breakdown::EndUse => Some(row.metric.as_str()),
            };
            *totals
                .entry((row.scenario.as_str(), row.model_year, group))
                .or_insert(0.0) += row.value;
        }
        totals
            .into_iter()
            .map(|((scenario, model_year, group), value)| AnnualConsumption {
                scenario: scenario.to_string(),
                model_year,
                group: group.map(str::to_string),
                value,
            })
            .collect()
    }

    pub fn scenario_consumption(
        &self,
        scenario: &str,
        breakdown: Breakdown,
    ) -> Result<Vec<AnnualConsumption>> {
        self.check_query(scenario, None)?;
        Ok(self
            .annual_consumption(breakdown)
            .into_iter()
            .filter(|c| c.scenario == scenario)
            .collect())
    }

    fn hourly_totals(&self) -> BTreeMap<(&'a str, i32, NaiveDateTime), f64> {
        let mut totals = BTreeMap::new();
        for row in self.rows {
            *totals
                .entry((row.scenario.as_str(), row.model_year, row.timestamp))
                .or_insert(0.0) += row.value;
        }
        totals
    }

    /// Highest hourly total per (scenario, model_year); the earliest hour wins ties.
    pub fn annual_peak_demand(&self) -> Vec<PeakDemand> {
        let mut peaks: BTreeMap<(&str, i32), (NaiveDateTime, f64)> = BTreeMap::new();
        for ((scenario, model_year, timestamp), value) in self.hourly_totals() {
            let entry = peaks.entry((scenario, model_year)).or_insert((timestamp, value));
            if value > entry.1 {
                *entry = (timestamp, value);
            }
        }
        peaks
            .into_iter()
            .map(|((scenario, model_year), (timestamp, value))| PeakDemand {
                scenario: scenario.to_string(),
                model_year,
                timestamp,
                value,
            })
            .collect()
    }

    /// Hourly totals of one scenario and model year, highest first.
    pub fn load_duration_curve(&self, scenario: &str, model_year: i32) -> Result<Vec<f64>> {
        self.check_query(scenario, Some(model_year))?;
        let mut curve: Vec<f64> = self
            .hourly_totals()
            .into_iter()
            .filter(|((s, y, _), _)| *s == scenario && *y == model_year)
            .map(|(_, v)| v)
            .collect();
        curve.sort_by(|a, b| b.total_cmp(a));
        Ok(curve)
    }
}

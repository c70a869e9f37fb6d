use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use super::degree_days::{aggregate_degree_days, group_key, nullable_sum, GroupKey};
use crate::config::ModelParameters;
use crate::errors::ConfigError;
use crate::models::{DegreeDayGroup, DegreeDayRecord, SmoothedDegreeDay};

/// How degenerate shoulder-month days get a share of the group's load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmoothingStrategy {
    /// Zero days are raised to `min_nonzero_in_group / factor`.
    MinimumFill,
    /// Any day below `max_in_group / factor` is raised to that floor.
    ThresholdFloor,
}

impl SmoothingStrategy {
    pub fn default_factor(&self) -> f64 {
        match self {
            SmoothingStrategy::MinimumFill => 5.0,
            SmoothingStrategy::ThresholdFloor => 10.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SmoothingStrategy::MinimumFill => "minimum_fill",
            SmoothingStrategy::ThresholdFloor => "threshold_floor",
        }
    }
}

impl fmt::Display for SmoothingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SmoothingStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minimum_fill" => Ok(SmoothingStrategy::MinimumFill),
            "threshold_floor" => Ok(SmoothingStrategy::ThresholdFloor),
            other => Err(ConfigError::InvalidValue {
                field: "shoulder_month_smoothing_strategy".to_string(),
                message: format!("unknown strategy '{}'", other),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Smoother {
    enabled: bool,
    strategy: SmoothingStrategy,
    factor: f64,
}

impl Smoother {
    pub fn new(enabled: bool, strategy: SmoothingStrategy, factor: f64) -> Self {
        Self {
            enabled,
            strategy,
            factor,
        }
    }

    pub fn from_params(params: &ModelParameters) -> Self {
        Self::new(
            params.enable_shoulder_month_smoothing,
            params.shoulder_month_smoothing_strategy,
            params.smoothing_factor(),
        )
    }

    pub fn strategy(&self) -> SmoothingStrategy {
        self.strategy
    }

    /// Smoothed rows sorted by (geography, date), grouped from the records
    /// themselves.
    pub fn smooth(&self, degree_days: &[DegreeDayRecord]) -> Vec<SmoothedDegreeDay> {
        self.smooth_grouped(degree_days, &aggregate_degree_days(degree_days))
    }

    /// Like [`Self::smooth`], but `num_days` and the group totals come from
    /// `groups`. The adjusted totals are the group totals plus whatever the
    /// smoothing added. Records without a matching group fall back to their
    /// own members.
    pub fn smooth_grouped(
        &self,
        degree_days: &[DegreeDayRecord],
        groups: &[DegreeDayGroup],
    ) -> Vec<SmoothedDegreeDay> {
        let group_rows: BTreeMap<GroupKey, &DegreeDayGroup> = groups
            .iter()
            .map(|g| (group_key(&g.geography, g.weather_year, g.month, g.day_type), g))
            .collect();

        let mut grouped: BTreeMap<GroupKey, Vec<&DegreeDayRecord>> = BTreeMap::new();
        for record in degree_days {
            grouped
                .entry(group_key(
                    &record.geography,
                    record.weather_year,
                    record.month,
                    record.day_type,
                ))
                .or_default()
                .push(record);
        }

        let mut adjusted_groups = 0usize;
        let mut rows = Vec::with_capacity(degree_days.len());
        for (key, members) in &grouped {
            let hdd: Vec<Option<f64>> = members.iter().map(|r| r.hdd).collect();
            let cdd: Vec<Option<f64>> = members.iter().map(|r| r.cdd).collect();
            let (num_days, total_hdd, total_cdd) = match group_rows.get(key) {
                Some(group) => (group.num_days, group.total_hdd, group.total_cdd),
                None => (
                    members.len() as u32,
                    nullable_sum(hdd.iter().copied()),
                    nullable_sum(cdd.iter().copied()),
                ),
            };
            let adjusted_hdd = self.adjust(&hdd, total_hdd);
            let adjusted_cdd = self.adjust(&cdd, total_cdd);
            if adjusted_hdd != hdd || adjusted_cdd != cdd {
                adjusted_groups += 1;
            }
            let adjusted_total_hdd = adjusted_total(total_hdd, &hdd, &adjusted_hdd);
            let adjusted_total_cdd = adjusted_total(total_cdd, &cdd, &adjusted_cdd);

            for (i, record) in members.iter().enumerate() {
                rows.push(SmoothedDegreeDay {
                    geography: record.geography.clone(),
                    date: record.date,
                    weather_year: record.weather_year,
                    month: record.month,
                    day_type: record.day_type,
                    hdd: record.hdd,
                    cdd: record.cdd,
                    adjusted_hdd: adjusted_hdd[i],
                    adjusted_cdd: adjusted_cdd[i],
                    num_days,
                    total_hdd,
                    total_cdd,
                    adjusted_total_hdd,
                    adjusted_total_cdd,
                });
            }
        }
        rows.sort_by(|a, b| (&a.geography, a.date).cmp(&(&b.geography, b.date)));
        debug!(
            "Shoulder-month smoothing ({}, factor {}) adjusted {} of {} groups",
            self.strategy,
            self.factor,
            adjusted_groups,
            grouped.len()
        );
        rows
    }

    fn adjust(&self, values: &[Option<f64>], total: Option<f64>) -> Vec<Option<f64>> {
        let active = self.enabled && matches!(total, Some(t) if t > 0.0);
        if !active {
            return values.to_vec();
        }
        match self.strategy {
            SmoothingStrategy::MinimumFill => {
                let min_nonzero = values
                    .iter()
                    .flatten()
                    .copied()
                    .filter(|v| *v > 0.0)
                    .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.min(v))));
                match min_nonzero {
                    Some(min) => {
                        let fill = min / self.factor;
                        values
                            .iter()
                            .map(|v| v.map(|v| if v == 0.0 { fill } else { v }))
                            .collect()
                    }
                    None => values.to_vec(),
                }
            }
            SmoothingStrategy::ThresholdFloor => {
                let max = values.iter().flatten().copied().fold(0.0_f64, f64::max);
                let floor = max / self.factor;
                values
                    .iter()
                    .map(|v| v.map(|v| if v < floor { floor } else { v }))
                    .collect()
            }
        }
    }
}

/// Group total shifted by the amount smoothing added to its members.
fn adjusted_total(
    total: Option<f64>,
    original: &[Option<f64>],
    adjusted: &[Option<f64>],
) -> Option<f64> {
    let total = total?;
    let original_sum = nullable_sum(original.iter().copied())?;
    let adjusted_sum = nullable_sum(adjusted.iter().copied())?;
    if total == original_sum {
        Some(adjusted_sum)
    } else {
        Some(total + adjusted_sum - original_sum)
    }
}

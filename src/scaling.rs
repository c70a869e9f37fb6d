use std::collections::BTreeMap;
use tracing::warn;

use crate::models::{
    AnnualDriverProjection, ExpandedLoadShape, FinalHourlyProjection, ScalingFactor, Sector,
};

pub const NON_RESIDENTIAL_SECTORS: [Sector; 3] =
    [Sector::Commercial, Sector::Industrial, Sector::Transportation];

/// (geography, model_year, sector)
type ScalingKey = (String, i32, Sector);

/// `annual / load_shape`, neutral when either side is exactly zero.
pub fn scaling_factor(annual_total: f64, load_shape_annual_total: f64) -> f64 {
    if load_shape_annual_total == 0.0 || annual_total == 0.0 {
        1.0
    } else {
        annual_total / load_shape_annual_total
    }
}

/// One factor per (geography, model_year, sector) that has both an expanded
/// load shape and an annual projection. Subsectors and end uses are summed.
pub fn compute_scaling_factors(
    expanded: &[ExpandedLoadShape],
    annual: &[AnnualDriverProjection],
    sectors: &[Sector],
) -> Vec<ScalingFactor> {
    let mut load_shape_totals: BTreeMap<ScalingKey, f64> = BTreeMap::new();
    for row in expanded.iter().filter(|r| sectors.contains(&r.sector)) {
        *load_shape_totals
            .entry((row.geography.clone(), row.model_year, row.sector))
            .or_insert(0.0) += row.adjusted_value;
    }

    let mut annual_totals: BTreeMap<ScalingKey, f64> = BTreeMap::new();
    for row in annual.iter().filter(|r| sectors.contains(&r.sector)) {
        *annual_totals
            .entry((row.geography.clone(), row.model_year, row.sector))
            .or_insert(0.0) += row.annual_total;
    }

    for (geography, model_year, sector) in annual_totals.keys() {
        if !load_shape_totals.contains_key(&(geography.clone(), *model_year, *sector)) {
            warn!(
                "Annual energy for {}/{}/{} has no load shape and is dropped",
                geography, sector, model_year
            );
        }
    }

    load_shape_totals
        .into_iter()
        .filter_map(|((geography, model_year, sector), load_shape_annual_total)| {
            let key = (geography, model_year, sector);
            match annual_totals.get(&key) {
                Some(&annual_total) => Some(ScalingFactor {
                    factor: scaling_factor(annual_total, load_shape_annual_total),
                    geography: key.0,
                    model_year,
                    sector,
                    annual_total,
                    load_shape_annual_total,
                }),
                None => {
                    warn!(
                        "No annual energy projection for {}/{}/{}; excluding its load shape",
                        key.0, sector, model_year
                    );
                    None
                }
            }
        })
        .collect()
}

/// Scale every hourly row by its key's factor. Rows without a factor are
/// excluded. The returned rows are not yet tagged with a scenario.
pub fn apply_scaling_factors(
    expanded: &[ExpandedLoadShape],
    factors: &[ScalingFactor],
) -> Vec<FinalHourlyProjection> {
    let by_key: BTreeMap<(&str, i32, Sector), f64> = factors
        .iter()
        .map(|f| ((f.geography.as_str(), f.model_year, f.sector), f.factor))
        .collect();

    expanded
        .iter()
        .filter_map(|row| {
            by_key
                .get(&(row.geography.as_str(), row.model_year, row.sector))
                .map(|factor| FinalHourlyProjection {
                    timestamp: row.timestamp,
                    model_year: row.model_year,
                    scenario: String::new(),
                    geography: row.geography.clone(),
                    sector: row.sector,
                    metric: row.end_use.clone(),
                    value: row.adjusted_value * factor,
                })
        })
        .collect()
}

pub fn sort_projection(rows: &mut [FinalHourlyProjection]) {
    rows.sort_by(|a, b| {
        (&a.scenario, &a.geography, a.sector, &a.metric, a.model_year, a.timestamp).cmp(&(
            &b.scenario,
            &b.geography,
            b.sector,
            &b.metric,
            b.model_year,
            b.timestamp,
        ))
    });
}

/// Union of the residential and non-residential hourly tables, tagged with
/// the scenario name.
pub fn combine_projections(
    scenario: &str,
    residential: Vec<FinalHourlyProjection>,
    non_residential: Vec<FinalHourlyProjection>,
) -> Vec<FinalHourlyProjection> {
    let mut combined = residential;
    combined.extend(non_residential);
    for row in &mut combined {
        row.scenario = scenario.to_string();
    }
    sort_projection(&mut combined);
    combined
}

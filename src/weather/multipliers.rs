use crate::models::{SmoothedDegreeDay, TemperatureMultiplier};

/// Share of the group's (adjusted) degree days falling on this day, scaled by
/// the group's day count. Neutral when the group has nothing to distribute.
pub fn day_multiplier(adjusted: Option<f64>, adjusted_total: Option<f64>, num_days: u32) -> f64 {
    match (adjusted, adjusted_total) {
        (Some(value), Some(total)) if total > 0.0 => value / total * num_days as f64,
        _ => 1.0,
    }
}

pub fn compute_temperature_multipliers(smoothed: &[SmoothedDegreeDay]) -> Vec<TemperatureMultiplier> {
    let mut multipliers: Vec<TemperatureMultiplier> = smoothed
        .iter()
        .map(|row| TemperatureMultiplier {
            geography: row.geography.clone(),
            date: row.date,
            weather_year: row.weather_year,
            month: row.month,
            day_type: row.day_type,
            heating_multiplier: day_multiplier(
                row.adjusted_hdd,
                row.adjusted_total_hdd,
                row.num_days,
            ),
            cooling_multiplier: day_multiplier(
                row.adjusted_cdd,
                row.adjusted_total_cdd,
                row.num_days,
            ),
            other_multiplier: 1.0,
        })
        .collect();
    multipliers.sort_by(|a, b| (&a.geography, a.date).cmp(&(&b.geography, b.date)));
    multipliers
}

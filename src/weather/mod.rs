//! Weather-adjustment half of the pipeline: degree days, shoulder-month
//! smoothing and per-day temperature multipliers.

pub mod degree_days;
pub mod multipliers;
pub mod smoothing;

pub use degree_days::{aggregate_degree_days, calculate_degree_days};
pub use multipliers::compute_temperature_multipliers;
pub use smoothing::{Smoother, SmoothingStrategy};

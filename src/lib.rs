pub mod config;
pub mod drivers;
pub mod errors;
pub mod io;
pub mod load_shapes;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod scaling;
pub mod tables;
pub mod validation;
pub mod weather;

pub use config::{ModelParameters, ProjectConfig, ScenarioConfig};
pub use errors::{ConfigError, ProjectionError, Result};
pub use pipeline::{ProjectResults, ProjectionRunner, ScenarioInputs, ScenarioOutputs, ScenarioPipeline};

#[cfg(test)]
mod tests;

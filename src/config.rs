use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::errors::ConfigError;
use crate::weather::smoothing::SmoothingStrategy;

/// Every tunable of the weather adjustment and annual projection stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParameters {
    pub heating_threshold: f64,
    pub cooling_threshold: f64,
    pub enable_shoulder_month_smoothing: bool,
    pub shoulder_month_smoothing_strategy: SmoothingStrategy,
    /// Falls back to the strategy's own default when unset.
    pub shoulder_month_smoothing_factor: Option<f64>,
    pub use_ev_projection: bool,
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self {
            heating_threshold: 18.0,
            cooling_threshold: 18.0,
            enable_shoulder_month_smoothing: true,
            shoulder_month_smoothing_strategy: SmoothingStrategy::MinimumFill,
            shoulder_month_smoothing_factor: None,
            use_ev_projection: false,
        }
    }
}

impl ModelParameters {
    pub fn smoothing_factor(&self) -> f64 {
        self.shoulder_month_smoothing_factor
            .unwrap_or_else(|| self.shoulder_month_smoothing_strategy.default_factor())
    }

    /// Apply `DEMAND_*` environment overrides on top of the current values.
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Some(v) = env_value("DEMAND_HEATING_THRESHOLD")? {
            self.heating_threshold = v;
        }
        if let Some(v) = env_value("DEMAND_COOLING_THRESHOLD")? {
            self.cooling_threshold = v;
        }
        if let Some(v) = env_value("DEMAND_ENABLE_SHOULDER_MONTH_SMOOTHING")? {
            self.enable_shoulder_month_smoothing = v;
        }
        if let Some(v) = env_value::<String>("DEMAND_SHOULDER_MONTH_SMOOTHING_STRATEGY")? {
            self.shoulder_month_smoothing_strategy = v.parse()?;
        }
        if let Some(v) = env_value("DEMAND_SHOULDER_MONTH_SMOOTHING_FACTOR")? {
            self.shoulder_month_smoothing_factor = Some(v);
        }
        if let Some(v) = env_value("DEMAND_USE_EV_PROJECTION")? {
            self.use_ev_projection = v;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("heating_threshold", self.heating_threshold),
            ("cooling_threshold", self.cooling_threshold),
        ] {
            if !value.is_finite() {
                return Err(invalid(field, format!("{} is not a finite temperature", value)));
            }
        }
        let factor = self.smoothing_factor();
        if !factor.is_finite() || factor <= 0.0 {
            return Err(invalid(
                "shoulder_month_smoothing_factor",
                format!("{} must be a positive number", factor),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub name: String,
    /// Directory holding the scenario's input tables.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub use_ev_projection: Option<bool>,
    /// Calculated table name -> replacement file.
    #[serde(default)]
    pub table_overrides: BTreeMap<String, PathBuf>,
}

impl ScenarioConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_dir: None,
            use_ev_projection: None,
            table_overrides: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub project_id: String,
    #[serde(default)]
    pub description: String,
    pub country: String,
    #[serde(default)]
    pub start_year: Option<i32>,
    #[serde(default)]
    pub end_year: Option<i32>,
    #[serde(default = "default_step_year")]
    pub step_year: i32,
    /// Explicit model years; takes precedence over the start/end range.
    #[serde(default)]
    pub model_years: Option<Vec<i32>>,
    pub weather_year: i32,
    #[serde(default)]
    pub model_parameters: ModelParameters,
    #[serde(default)]
    pub checkpoint_dir: Option<PathBuf>,
    pub scenarios: Vec<ScenarioConfig>,
}

fn default_step_year() -> i32 {
    5
}

impl ProjectConfig {
    pub fn new(project_id: &str, country: &str, model_years: Vec<i32>, weather_year: i32) -> Self {
        Self {
            project_id: project_id.to_string(),
            description: String::new(),
            country: country.to_string(),
            start_year: None,
            end_year: None,
            step_year: default_step_year(),
            model_years: Some(model_years),
            weather_year,
            model_parameters: ModelParameters::default(),
            checkpoint_dir: None,
            scenarios: vec![ScenarioConfig::new("baseline")],
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let file = File::open(path).map_err(|e| ConfigError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut config: ProjectConfig =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| {
                ConfigError::JsonParseError {
                    path: path.to_path_buf(),
                    source: e,
                }
            })?;

        // Relative data directories are resolved against the config file.
        if let Some(base) = path.parent() {
            for scenario in &mut config.scenarios {
                if let Some(dir) = &scenario.data_dir {
                    if dir.is_relative() {
                        scenario.data_dir = Some(base.join(dir));
                    }
                }
                for file in scenario.table_overrides.values_mut() {
                    if file.is_relative() {
                        *file = base.join(&*file);
                    }
                }
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.country.trim().is_empty() {
            return Err(invalid("country", "must not be empty"));
        }
        if self.scenarios.is_empty() {
            return Err(invalid("scenarios", "at least one scenario is required"));
        }
        let mut seen = std::collections::BTreeSet::new();
        for scenario in &self.scenarios {
            if !seen.insert(scenario.name.as_str()) {
                return Err(invalid(
                    "scenarios",
                    format!("duplicate scenario name '{}'", scenario.name),
                ));
            }
        }
        if self.list_model_years()?.is_empty() {
            return Err(invalid("model_years", "no model years selected"));
        }
        self.model_parameters.validate()
    }

    pub fn list_model_years(&self) -> Result<Vec<i32>, ConfigError> {
        if let Some(years) = &self.model_years {
            let mut years = years.clone();
            years.sort_unstable();
            years.dedup();
            return Ok(years);
        }
        match (self.start_year, self.end_year) {
            (Some(start), Some(end)) => {
                if self.step_year <= 0 {
                    return Err(invalid("step_year", "must be positive"));
                }
                if end < start {
                    return Err(invalid("end_year", "must not precede start_year"));
                }
                Ok((start..=end).step_by(self.step_year as usize).collect())
            }
            _ => Err(invalid(
                "model_years",
                "either model_years or start_year/end_year must be set",
            )),
        }
    }

    /// Parameters with scenario-level switches applied.
    pub fn parameters_for(&self, scenario: &ScenarioConfig) -> ModelParameters {
        let mut params = self.model_parameters.clone();
        if let Some(use_ev) = scenario.use_ev_projection {
            params.use_ev_projection = use_ev;
        }
        params
    }

    pub fn scenario(&self, name: &str) -> Option<&ScenarioConfig> {
        self.scenarios.iter().find(|s| s.name == name)
    }
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.into(),
    }
}

fn env_value<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| invalid(key, format!("cannot parse '{}'", raw))),
        Err(_) => Ok(None),
    }
}

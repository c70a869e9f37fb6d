use polars::prelude::DataFrame;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

use crate::config::{ModelParameters, ProjectConfig, ScenarioConfig};
use crate::drivers::{AnnualDriverProjector, DriverInputs};
use crate::errors::{ProjectionError, Result};
use crate::io::{export_frame, load_scenario_inputs, read_frame, write_checkpoint, FileFormat};
use crate::load_shapes::{expand_load_shapes, RepresentativeProfiles};
use crate::models::{
    AnnualDriverProjection, DailyWeatherRecord, DegreeDayGroup, DegreeDayRecord,
    ExpandedLoadShape, FinalHourlyProjection, RepresentativeLoadShape, ScalingFactor, Sector,
    SmoothedDegreeDay, TemperatureMultiplier,
};
use crate::scaling::{
    apply_scaling_factors, combine_projections, compute_scaling_factors, sort_projection,
    NON_RESIDENTIAL_SECTORS,
};
use crate::tables::{CalculatedTable, TableResolver, TableRow};
use crate::validation::{select_weather, validate_load_shapes, validate_weather, WeatherCoverage};
use crate::weather::{
    aggregate_degree_days, calculate_degree_days, compute_temperature_multipliers, Smoother,
};

/// Raw inputs of one scenario.
#[derive(Debug, Clone, Default)]
pub struct ScenarioInputs {
    pub weather: Vec<DailyWeatherRecord>,
    pub load_shapes: Vec<RepresentativeLoadShape>,
    pub drivers: DriverInputs,
}

/// Every calculated table of a finished scenario.
#[derive(Debug, Clone)]
pub struct ScenarioOutputs {
    pub scenario: String,
    pub weather_coverage: WeatherCoverage,
    pub degree_days: Vec<DegreeDayRecord>,
    pub degree_day_groups: Vec<DegreeDayGroup>,
    pub smoothed_degree_days: Vec<SmoothedDegreeDay>,
    pub temperature_multipliers: Vec<TemperatureMultiplier>,
    pub load_shapes_expanded: Vec<ExpandedLoadShape>,
    pub annual_energy: Vec<AnnualDriverProjection>,
    pub scaling_factors: Vec<ScalingFactor>,
    pub energy_projection: Vec<FinalHourlyProjection>,
}

impl ScenarioOutputs {
    pub fn table_frame(&self, table: CalculatedTable) -> Result<DataFrame> {
        match table {
            CalculatedTable::DegreeDays => DegreeDayRecord::to_frame(&self.degree_days),
            CalculatedTable::DegreeDayGroups => DegreeDayGroup::to_frame(&self.degree_day_groups),
            CalculatedTable::SmoothedDegreeDays => {
                SmoothedDegreeDay::to_frame(&self.smoothed_degree_days)
            }
            CalculatedTable::TemperatureMultipliers => {
                TemperatureMultiplier::to_frame(&self.temperature_multipliers)
            }
            CalculatedTable::LoadShapesExpanded => {
                ExpandedLoadShape::to_frame(&self.load_shapes_expanded)
            }
            CalculatedTable::AnnualEnergy => AnnualDriverProjection::to_frame(&self.annual_energy),
            CalculatedTable::ScalingFactors => ScalingFactor::to_frame(&self.scaling_factors),
            CalculatedTable::EnergyProjection => {
                FinalHourlyProjection::to_frame(&self.energy_projection)
            }
        }
    }

    pub fn export_table(&self, table: CalculatedTable, path: &Path, overwrite: bool) -> Result<()> {
        let mut df = self.table_frame(table)?;
        export_frame(&mut df, path, overwrite)
    }
}

/// Runs stages 1-8 for a single scenario. Every stage input goes through the
/// resolver so overrides replace computed tables.
pub struct ScenarioPipeline<'a> {
    scenario: &'a str,
    country: &'a str,
    weather_year: i32,
    model_years: &'a [i32],
    params: ModelParameters,
    resolver: &'a TableResolver,
    checkpoint_dir: Option<&'a Path>,
}

impl<'a> ScenarioPipeline<'a> {
    pub fn new(
        scenario: &'a str,
        country: &'a str,
        weather_year: i32,
        model_years: &'a [i32],
        params: ModelParameters,
        resolver: &'a TableResolver,
    ) -> Self {
        Self {
            scenario,
            country,
            weather_year,
            model_years,
            params,
            resolver,
            checkpoint_dir: None,
        }
    }

    pub fn with_checkpoint_dir(mut self, dir: Option<&'a Path>) -> Self {
        self.checkpoint_dir = dir;
        self
    }

    fn checkpoint<T: TableRow>(&self, table: CalculatedTable, rows: &[T]) -> Result<()> {
        if let Some(dir) = self.checkpoint_dir {
            write_checkpoint(dir, self.scenario, table, rows)?;
        }
        Ok(())
    }

    pub fn run(&self, inputs: &ScenarioInputs) -> Result<ScenarioOutputs> {
        let start = Instant::now();
        info!(
            "Scenario {}: {} weather year {}, model years {:?}",
            self.scenario, self.country, self.weather_year, self.model_years
        );
        self.params.validate()?;

        let weather_coverage = validate_weather(&inputs.weather, self.country, self.weather_year)?;
        validate_load_shapes(&inputs.load_shapes, self.country, self.model_years)?;

        let degree_days = self.stage1_degree_days(&inputs.weather)?;
        let degree_day_groups = self.stage2_aggregate(&degree_days)?;
        let smoothed_degree_days = self.stage3_smooth(&degree_days, &degree_day_groups)?;
        let temperature_multipliers = self.stage4_multipliers(&smoothed_degree_days)?;
        let load_shapes_expanded =
            self.stage5_expand(&inputs.load_shapes, &temperature_multipliers)?;
        let annual_energy = self.stage6_annual_energy(&inputs.drivers)?;
        let scaling_factors = self.stage7_scaling_factors(&load_shapes_expanded, &annual_energy)?;
        let energy_projection =
            self.stage8_energy_projection(&load_shapes_expanded, &scaling_factors)?;

        info!(
            "Scenario {} completed in {:.2} seconds ({} hourly rows)",
            self.scenario,
            start.elapsed().as_secs_f32(),
            energy_projection.len()
        );
        Ok(ScenarioOutputs {
            scenario: self.scenario.to_string(),
            weather_coverage,
            degree_days,
            degree_day_groups,
            smoothed_degree_days,
            temperature_multipliers,
            load_shapes_expanded,
            annual_energy,
            scaling_factors,
            energy_projection,
        })
    }

    fn stage1_degree_days(&self, weather: &[DailyWeatherRecord]) -> Result<Vec<DegreeDayRecord>> {
        info!("Stage 1: Degree days for {}", self.scenario);
        let rows = self.resolver.resolve(CalculatedTable::DegreeDays, || {
            let selected = select_weather(weather, self.country, self.weather_year);
            Ok(calculate_degree_days(&selected, &self.params))
        })?;
        self.checkpoint(CalculatedTable::DegreeDays, &rows)?;
        Ok(rows)
    }

    fn stage2_aggregate(&self, degree_days: &[DegreeDayRecord]) -> Result<Vec<DegreeDayGroup>> {
        info!("Stage 2: Degree-day groups for {}", self.scenario);
        let rows = self.resolver.resolve(CalculatedTable::DegreeDayGroups, || {
            Ok(aggregate_degree_days(degree_days))
        })?;
        self.checkpoint(CalculatedTable::DegreeDayGroups, &rows)?;
        Ok(rows)
    }

    fn stage3_smooth(
        &self,
        degree_days: &[DegreeDayRecord],
        groups: &[DegreeDayGroup],
    ) -> Result<Vec<SmoothedDegreeDay>> {
        let smoother = Smoother::from_params(&self.params);
        info!(
            "Stage 3: Shoulder-month smoothing for {} (enabled: {}, strategy: {}, factor: {})",
            self.scenario,
            self.params.enable_shoulder_month_smoothing,
            smoother.strategy(),
            self.params.smoothing_factor()
        );
        let rows = self.resolver.resolve(CalculatedTable::SmoothedDegreeDays, || {
            Ok(smoother.smooth_grouped(degree_days, groups))
        })?;
        self.checkpoint(CalculatedTable::SmoothedDegreeDays, &rows)?;
        Ok(rows)
    }

    fn stage4_multipliers(
        &self,
        smoothed: &[SmoothedDegreeDay],
    ) -> Result<Vec<TemperatureMultiplier>> {
        info!("Stage 4: Temperature multipliers for {}", self.scenario);
        let rows = self.resolver.resolve(CalculatedTable::TemperatureMultipliers, || {
            Ok(compute_temperature_multipliers(smoothed))
        })?;
        self.checkpoint(CalculatedTable::TemperatureMultipliers, &rows)?;
        Ok(rows)
    }

    fn stage5_expand(
        &self,
        load_shapes: &[RepresentativeLoadShape],
        multipliers: &[TemperatureMultiplier],
    ) -> Result<Vec<ExpandedLoadShape>> {
        info!("Stage 5: Load-shape expansion for {}", self.scenario);
        let rows = self.resolver.resolve(CalculatedTable::LoadShapesExpanded, || {
            let country_shapes: Vec<RepresentativeLoadShape> = load_shapes
                .iter()
                .filter(|r| r.geography == self.country)
                .cloned()
                .collect();
            let profiles = RepresentativeProfiles::build(&country_shapes, self.model_years)?;
            expand_load_shapes(&profiles, multipliers, self.weather_year)
        })?;
        self.checkpoint(CalculatedTable::LoadShapesExpanded, &rows)?;
        Ok(rows)
    }

    fn stage6_annual_energy(&self, drivers: &DriverInputs) -> Result<Vec<AnnualDriverProjection>> {
        info!("Stage 6: Annual energy projection for {}", self.scenario);
        let rows = self.resolver.resolve(CalculatedTable::AnnualEnergy, || {
            AnnualDriverProjector::new(drivers, self.country, self.model_years)
                .project(self.params.use_ev_projection)
        })?;
        self.checkpoint(CalculatedTable::AnnualEnergy, &rows)?;
        Ok(rows)
    }

    fn stage7_scaling_factors(
        &self,
        expanded: &[ExpandedLoadShape],
        annual: &[AnnualDriverProjection],
    ) -> Result<Vec<ScalingFactor>> {
        info!("Stage 7: Scaling factors for {}", self.scenario);
        let rows = self.resolver.resolve(CalculatedTable::ScalingFactors, || {
            let mut factors = compute_scaling_factors(expanded, annual, &[Sector::Residential]);
            factors.extend(compute_scaling_factors(expanded, annual, &NON_RESIDENTIAL_SECTORS));
            Ok(factors)
        })?;
        self.checkpoint(CalculatedTable::ScalingFactors, &rows)?;
        Ok(rows)
    }

    fn stage8_energy_projection(
        &self,
        expanded: &[ExpandedLoadShape],
        factors: &[ScalingFactor],
    ) -> Result<Vec<FinalHourlyProjection>> {
        info!("Stage 8: Combining sector projections for {}", self.scenario);
        let rows = self.resolver.resolve(CalculatedTable::EnergyProjection, || {
            let (residential, non_residential): (Vec<ScalingFactor>, Vec<ScalingFactor>) =
                factors.iter().cloned().partition(|f| f.sector.is_residential());
            Ok(combine_projections(
                self.scenario,
                apply_scaling_factors(expanded, &residential),
                apply_scaling_factors(expanded, &non_residential),
            ))
        })?;
        self.checkpoint(CalculatedTable::EnergyProjection, &rows)?;
        Ok(rows)
    }
}

/// Outputs of every scenario plus their union.
#[derive(Debug, Clone)]
pub struct ProjectResults {
    pub scenarios: Vec<ScenarioOutputs>,
    /// Union over scenarios, sorted by (scenario, geography, sector, metric,
    /// model_year, timestamp).
    pub energy_projection: Vec<FinalHourlyProjection>,
}

impl ProjectResults {
    pub fn scenario(&self, name: &str) -> Result<&ScenarioOutputs> {
        self.scenarios
            .iter()
            .find(|s| s.scenario == name)
            .ok_or_else(|| ProjectionError::UnknownScenario(name.to_string()))
    }

    /// The project-wide table restricted to one scenario.
    pub fn scenario_projection(&self, name: &str) -> Result<Vec<&FinalHourlyProjection>> {
        self.scenario(name)?;
        Ok(self
            .energy_projection
            .iter()
            .filter(|r| r.scenario == name)
            .collect())
    }

    pub fn energy_projection_frame(&self) -> Result<DataFrame> {
        FinalHourlyProjection::to_frame(&self.energy_projection)
    }
}

/// Runs every configured scenario in parallel and unions the results.
pub struct ProjectionRunner {
    config: ProjectConfig,
    model_years: Vec<i32>,
    shared_inputs: Option<ScenarioInputs>,
    scenario_inputs: BTreeMap<String, ScenarioInputs>,
    resolvers: BTreeMap<String, TableResolver>,
}

impl ProjectionRunner {
    pub fn new(config: ProjectConfig) -> Result<Self> {
        config.validate()?;
        let model_years = config.list_model_years()?;
        let resolvers = config
            .scenarios
            .iter()
            .map(|s| (s.name.clone(), TableResolver::new()))
            .collect();
        Ok(Self {
            config,
            model_years,
            shared_inputs: None,
            scenario_inputs: BTreeMap::new(),
            resolvers,
        })
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub fn model_years(&self) -> &[i32] {
        &self.model_years
    }

    /// Inputs used by every scenario that has none of its own.
    pub fn with_shared_inputs(mut self, inputs: ScenarioInputs) -> Self {
        self.shared_inputs = Some(inputs);
        self
    }

    pub fn set_scenario_inputs(&mut self, scenario: &str, inputs: ScenarioInputs) -> Result<()> {
        self.scenario_config(scenario)?;
        self.scenario_inputs.insert(scenario.to_string(), inputs);
        Ok(())
    }

    /// Load inputs for every scenario with a `data_dir` and register the
    /// overrides listed in the configuration.
    pub fn load_configured_inputs(&mut self) -> Result<()> {
        let scenarios = self.config.scenarios.clone();
        for scenario in &scenarios {
            if let Some(dir) = &scenario.data_dir {
                let inputs = load_scenario_inputs(dir)?;
                self.scenario_inputs.insert(scenario.name.clone(), inputs);
            }
            for (table, path) in &scenario.table_overrides {
                self.register_override_file(&scenario.name, table, path)?;
            }
        }
        Ok(())
    }

    fn scenario_config(&self, scenario: &str) -> Result<&ScenarioConfig> {
        self.config
            .scenario(scenario)
            .ok_or_else(|| ProjectionError::UnknownScenario(scenario.to_string()))
    }

    fn resolver_mut(&mut self, scenario: &str) -> Result<&mut TableResolver> {
        self.resolvers
            .get_mut(scenario)
            .ok_or_else(|| ProjectionError::UnknownScenario(scenario.to_string()))
    }

    pub fn register_override(&mut self, scenario: &str, table: &str, df: DataFrame) -> Result<()> {
        self.resolver_mut(scenario)?.register_override(table, df)?;
        Ok(())
    }

    /// CSV files are coerced to the table schema before the check.
    pub fn register_override_file(&mut self, scenario: &str, table: &str, path: &Path) -> Result<()> {
        let df = read_frame(path)?;
        let resolver = self.resolver_mut(scenario)?;
        match FileFormat::from_path(path)? {
            FileFormat::Csv => resolver.register_coerced_override(table, df)?,
            FileFormat::Parquet => resolver.register_override(table, df)?,
        };
        info!("Scenario {}: {} overridden from {}", scenario, table, path.display());
        Ok(())
    }

    pub fn overridden_tables(&self, scenario: &str) -> Result<Vec<CalculatedTable>> {
        self.resolvers
            .get(scenario)
            .map(|r| r.overridden_tables())
            .ok_or_else(|| ProjectionError::UnknownScenario(scenario.to_string()))
    }

    fn inputs_for(&self, scenario: &str) -> Result<&ScenarioInputs> {
        self.scenario_inputs
            .get(scenario)
            .or(self.shared_inputs.as_ref())
            .ok_or_else(|| {
                ProjectionError::input_gap(
                    "scenario_inputs",
                    format!("no inputs provided for scenario '{}'", scenario),
                )
            })
    }

    fn run_scenario(&self, scenario: &ScenarioConfig) -> Result<ScenarioOutputs> {
        let inputs = self.inputs_for(&scenario.name)?;
        let resolver = self
            .resolvers
            .get(&scenario.name)
            .ok_or_else(|| ProjectionError::UnknownScenario(scenario.name.clone()))?;
        let checkpoint_dir: Option<PathBuf> = self.config.checkpoint_dir.clone();
        ScenarioPipeline::new(
            &scenario.name,
            &self.config.country,
            self.config.weather_year,
            &self.model_years,
            self.config.parameters_for(scenario),
            resolver,
        )
        .with_checkpoint_dir(checkpoint_dir.as_deref())
        .run(inputs)
    }

    /// Any scenario failure fails the whole run.
    pub fn run(&self) -> Result<ProjectResults> {
        let start = Instant::now();
        info!(
            "Running project {} ({} scenarios, model years {:?})",
            self.config.project_id,
            self.config.scenarios.len(),
            self.model_years
        );

        let scenarios: Vec<ScenarioOutputs> = self
            .config
            .scenarios
            .par_iter()
            .map(|scenario| self.run_scenario(scenario))
            .collect::<Result<Vec<_>>>()?;

        let mut energy_projection: Vec<FinalHourlyProjection> = scenarios
            .iter()
            .flat_map(|s| s.energy_projection.iter().cloned())
            .collect();
        sort_projection(&mut energy_projection);
        if energy_projection.is_empty() {
            warn!("Project {} produced an empty energy projection", self.config.project_id);
        }

        info!(
            "Project {} completed in {:.2} seconds ({} rows)",
            self.config.project_id,
            start.elapsed().as_secs_f32(),
            energy_projection.len()
        );
        Ok(ProjectResults {
            scenarios,
            energy_projection,
        })
    }
}

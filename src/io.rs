use polars::prelude::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::drivers::{pivot_regression_metrics, DriverInputs, EvInputs, RegressionMetricRow, RegressionRow};
use crate::errors::{ProjectionError, Result};
use crate::models::{DailyWeatherRecord, DriverRecord, RepresentativeLoadShape, VehicleEfficiencyRecord};
use crate::pipeline::ScenarioInputs;
use crate::tables::{CalculatedTable, TableRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Parquet,
}

impl FileFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("csv") => Ok(FileFormat::Csv),
            Some("parquet") => Ok(FileFormat::Parquet),
            _ => Err(ProjectionError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ProjectionError + '_ {
    move |source| ProjectionError::Io {
        path: path.to_path_buf(),
        source,
    }
}

pub fn read_parquet_to_polars_df(file_path: &Path) -> Result<DataFrame> {
    let file = File::open(file_path).map_err(io_error(file_path))?;
    Ok(ParquetReader::new(file).finish()?)
}

pub fn write_polars_df_to_parquet(df: &mut DataFrame, output_path: &Path) -> Result<()> {
    let file = File::create(output_path).map_err(io_error(output_path))?;
    ParquetWriter::new(file).finish(df)?;
    Ok(())
}

/// CSV with a header row; ISO dates and timestamps are parsed on read.
pub fn read_csv_to_polars_df(file_path: &Path) -> Result<DataFrame> {
    if !file_path.exists() {
        return Err(ProjectionError::Io {
            path: file_path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        });
    }
    Ok(CsvReadOptions::default()
        .with_has_header(true)
        .map_parse_options(|options| options.with_try_parse_dates(true))
        .try_into_reader_with_file_path(Some(file_path.to_path_buf()))?
        .finish()?)
}

pub fn write_polars_df_to_csv(df: &mut DataFrame, output_path: &Path) -> Result<()> {
    let mut file = File::create(output_path).map_err(io_error(output_path))?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    Ok(())
}

pub fn read_frame(path: &Path) -> Result<DataFrame> {
    match FileFormat::from_path(path)? {
        FileFormat::Csv => read_csv_to_polars_df(path),
        FileFormat::Parquet => read_parquet_to_polars_df(path),
    }
}

pub fn write_frame(df: &mut DataFrame, path: &Path) -> Result<()> {
    let format = FileFormat::from_path(path)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
    }
    match format {
        FileFormat::Csv => write_polars_df_to_csv(df, path),
        FileFormat::Parquet => write_polars_df_to_parquet(df, path),
    }
}

/// Write `df` to `path`, refusing to replace an existing file unless
/// `overwrite` is set.
pub fn export_frame(df: &mut DataFrame, path: &Path, overwrite: bool) -> Result<()> {
    FileFormat::from_path(path)?;
    if path.exists() {
        if !overwrite {
            return Err(ProjectionError::AlreadyExists {
                path: path.to_path_buf(),
            });
        }
        fs::remove_file(path).map_err(io_error(path))?;
    }
    write_frame(df, path)?;
    info!("Exported {} rows to {}", df.height(), path.display());
    Ok(())
}

pub fn checkpoint_path(checkpoint_dir: &Path, scenario: &str, table: CalculatedTable) -> PathBuf {
    checkpoint_dir
        .join(scenario)
        .join(format!("{}.parquet", table.name()))
}

pub fn write_checkpoint<T: TableRow>(
    checkpoint_dir: &Path,
    scenario: &str,
    table: CalculatedTable,
    rows: &[T],
) -> Result<PathBuf> {
    let path = checkpoint_path(checkpoint_dir, scenario, table);
    let mut df = T::to_frame(rows)?;
    write_frame(&mut df, &path)?;
    debug!("Checkpointed {} ({} rows) to {}", table, df.height(), path.display());
    Ok(path)
}

/// `<dir>/<name>.parquet`, falling back to `<dir>/<name>.csv`.
pub fn find_table_file(dir: &Path, name: &str) -> Option<PathBuf> {
    ["parquet", "csv"]
        .iter()
        .map(|ext| dir.join(format!("{}.{}", name, ext)))
        .find(|p| p.exists())
}

fn read_required<T: TableRow>(dir: &Path, name: &str) -> Result<Vec<T>> {
    let path = find_table_file(dir, name).ok_or_else(|| {
        ProjectionError::input_gap(name, format!("no {0}.parquet or {0}.csv in {1}", name, dir.display()))
    })?;
    let df = read_frame(&path)?;
    debug!("Loaded {} ({} rows) from {}", name, df.height(), path.display());
    T::from_frame(name, &df)
}

/// Regression coefficients in either the wide layout or the long
/// `metric`/`value` layout.
pub fn regression_rows_from_frame(table: &str, df: &DataFrame) -> Result<Vec<RegressionRow>> {
    if df.column("metric").is_ok() {
        let long = RegressionMetricRow::from_frame(table, df)?;
        pivot_regression_metrics(&long, table)
    } else {
        RegressionRow::from_frame(table, df)
    }
}

fn read_regressions(dir: &Path, name: &str) -> Result<Vec<RegressionRow>> {
    let path = find_table_file(dir, name).ok_or_else(|| {
        ProjectionError::input_gap(name, format!("no {0}.parquet or {0}.csv in {1}", name, dir.display()))
    })?;
    regression_rows_from_frame(name, &read_frame(&path)?)
}

/// Load every input table of a scenario from its data directory. EV inputs
/// are optional as a group, keyed on the presence of `vehicle_per_capita`.
pub fn load_scenario_inputs(dir: &Path) -> Result<ScenarioInputs> {
    let weather: Vec<DailyWeatherRecord> = read_required(dir, "weather")?;
    let load_shapes: Vec<RepresentativeLoadShape> = read_required(dir, "load_shapes")?;
    let gdp: Vec<DriverRecord> = read_required(dir, "gdp")?;
    let hdi: Vec<DriverRecord> = read_required(dir, "hdi")?;
    let population: Vec<DriverRecord> = read_required(dir, "population")?;
    let energy_intensity = read_regressions(dir, "energy_intensity")?;

    let ev = if find_table_file(dir, "vehicle_per_capita").is_some() {
        let electricity_per_vehicle_km: Vec<VehicleEfficiencyRecord> =
            read_required(dir, "electricity_per_vehicle_km")?;
        Some(EvInputs {
            vehicle_per_capita: read_regressions(dir, "vehicle_per_capita")?,
            km_per_vehicle_year: read_regressions(dir, "km_per_vehicle_year")?,
            ev_stock_share: read_required(dir, "ev_stock_share")?,
            phev_share: read_required(dir, "phev_share")?,
            electricity_per_vehicle_km,
        })
    } else {
        None
    };

    info!(
        "Loaded scenario inputs from {}: {} weather days, {} load-shape rows, EV inputs: {}",
        dir.display(),
        weather.len(),
        load_shapes.len(),
        ev.is_some()
    );
    Ok(ScenarioInputs {
        weather,
        load_shapes,
        drivers: DriverInputs {
            energy_intensity,
            gdp,
            hdi,
            population,
            ev,
        },
    })
}

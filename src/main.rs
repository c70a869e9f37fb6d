use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

use demand_projection::config::ProjectConfig;
use demand_projection::io::export_frame;
use demand_projection::metrics::{Breakdown, ProjectionMetrics};
use demand_projection::pipeline::ProjectionRunner;
use demand_projection::tables::CalculatedTable;

#[derive(Parser, Debug)]
#[command(name = "demand_projection")]
#[command(about = "Hourly electricity demand projections from drivers, load shapes and weather", long_about = None)]
struct Args {
    /// Project configuration (JSON)
    #[arg(long, env = "DEMAND_PROJECT_CONFIG")]
    config: PathBuf,

    /// Output file for the combined energy projection (.parquet or .csv)
    #[arg(long, env = "DEMAND_OUTPUT", default_value = "energy_projection.parquet")]
    output: PathBuf,

    /// Directory for per-scenario calculated-table checkpoints
    #[arg(long, env = "DEMAND_CHECKPOINT_DIR")]
    checkpoint_dir: Option<PathBuf>,

    /// Also export every calculated table of every scenario into this directory
    #[arg(long)]
    export_dir: Option<PathBuf>,

    /// File format for --export-dir (csv or parquet)
    #[arg(long, default_value = "parquet")]
    export_format: String,

    /// Replace existing output files
    #[arg(long)]
    overwrite: bool,

    /// Log annual consumption and peak demand per scenario and model year
    #[arg(long)]
    summary: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("demand_projection=info".parse()?),
        )
        .init();

    dotenv::dotenv().ok();

    let args = Args::parse();
    let start = Instant::now();

    let mut config = ProjectConfig::from_file(&args.config)
        .with_context(|| format!("Failed to load project config {:?}", args.config))?;
    config.model_parameters = config
        .model_parameters
        .clone()
        .with_env_overrides()
        .context("Invalid model parameter override in environment")?;
    if args.checkpoint_dir.is_some() {
        config.checkpoint_dir = args.checkpoint_dir.clone();
    }

    let mut runner = ProjectionRunner::new(config).context("Invalid project configuration")?;
    runner
        .load_configured_inputs()
        .context("Failed to load scenario inputs")?;
    let results = runner.run().context("Projection run failed")?;

    let mut df = results.energy_projection_frame()?;
    export_frame(&mut df, &args.output, args.overwrite)
        .with_context(|| format!("Failed to write {:?}", args.output))?;
    info!("Wrote {} rows to {:?}", df.height(), args.output);

    if let Some(dir) = &args.export_dir {
        for scenario in &results.scenarios {
            for table in CalculatedTable::ALL {
                let path = dir
                    .join(&scenario.scenario)
                    .join(format!("{}.{}", table.name(), args.export_format));
                scenario
                    .export_table(table, &path, args.overwrite)
                    .with_context(|| format!("Failed to export {} for {}", table, scenario.scenario))?;
            }
        }
        info!("Exported calculated tables to {:?}", dir);
    }

    if args.summary {
        let metrics = ProjectionMetrics::new(&results.energy_projection);
        for row in metrics.annual_consumption(Breakdown::Total) {
            info!(
                "{} {}: annual consumption {:.1} MWh",
                row.scenario, row.model_year, row.value
            );
        }
        for peak in metrics.annual_peak_demand() {
            info!(
                "{} {}: peak demand {:.1} MW at {}",
                peak.scenario, peak.model_year, peak.value, peak.timestamp
            );
        }
    }

    info!(
        "Projection completed in {:.2} seconds",
        start.elapsed().as_secs_f32()
    );
    Ok(())
}

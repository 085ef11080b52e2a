//! probitstat CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pb_inference::{AnalysisConfig, DEFAULT_LEVELS, ProbitAnalysis, ProbitFit, ProfileConfig};
use pb_viz::{DEFAULT_LINE_POINTS, DoseResponseArtifact, ProfileCurveArtifact};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "probitstat")]
#[command(about = "probitstat - probit dose-response analysis for quantal bioassays")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit the probit model and report LD estimates with Fieller and profile intervals
    Analyze {
        /// Input table (CSV with CONC,TOTAL,DEAD columns, or JSON rows)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file for results (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Confidence level for all intervals
        #[arg(long, default_value = "0.95")]
        confidence_level: f64,

        /// Response levels to report (comma-separated fractions)
        #[arg(long, value_delimiter = ',')]
        levels: Option<Vec<f64>>,

        /// Profile grid points per level
        #[arg(long, default_value = "100")]
        grid_points: usize,

        /// Profile grid half-width around the MLE estimate (log10 units)
        #[arg(long, default_value = "1.0")]
        half_width: f64,
    },

    /// Visualization artifacts (plot-friendly JSON)
    Viz {
        #[command(subcommand)]
        command: VizCommands,
    },

    /// Print version information
    Version,
}

#[derive(Subcommand)]
enum VizCommands {
    /// Observed probits, fitted line and confidence band
    DoseResponse {
        /// Input table (CSV or JSON rows)
        #[arg(short, long)]
        input: PathBuf,

        /// Points on the fitted line
        #[arg(long, default_value_t = DEFAULT_LINE_POINTS)]
        points: usize,

        /// Confidence level of the band
        #[arg(long, default_value = "0.95")]
        confidence_level: f64,

        /// Output file for results (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Profile log-likelihood curve for one response level
    Profile {
        /// Input table (CSV or JSON rows)
        #[arg(short, long)]
        input: PathBuf,

        /// Response level to profile
        #[arg(long, default_value = "0.5")]
        level: f64,

        /// Profile grid points
        #[arg(long, default_value = "100")]
        grid_points: usize,

        /// Profile grid half-width (log10 units)
        #[arg(long, default_value = "1.0")]
        half_width: f64,

        /// Output file for results (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Analyze { input, output, confidence_level, levels, grid_points, half_width } => {
            let config = AnalysisConfig {
                confidence_level,
                levels: levels.unwrap_or_else(|| DEFAULT_LEVELS.to_vec()),
                profile: ProfileConfig { grid_points, half_width, ..Default::default() },
                ..Default::default()
            };
            cmd_analyze(&input, config, output.as_ref())
        }
        Commands::Viz { command } => match command {
            VizCommands::DoseResponse { input, points, confidence_level, output } => {
                cmd_viz_dose_response(&input, points, confidence_level, output.as_ref())
            }
            VizCommands::Profile { input, level, grid_points, half_width, output } => {
                cmd_viz_profile(&input, level, grid_points, half_width, output.as_ref())
            }
        },
        Commands::Version => {
            println!("probitstat {}", pb_core::VERSION);
            Ok(())
        }
    }
}

fn run_analysis(input: &Path, config: AnalysisConfig) -> Result<ProbitFit> {
    let trial = pb_core::table::read_path(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    tracing::info!(rows = trial.groups().len(), "loaded {}", input.display());

    let fit = ProbitAnalysis::new(config).run(&trial)?;
    for note in &fit.notes {
        tracing::info!("{}", note);
    }
    Ok(fit)
}

fn cmd_analyze(input: &Path, config: AnalysisConfig, output: Option<&PathBuf>) -> Result<()> {
    let fit = run_analysis(input, config)?;
    if let Some(ld50) = fit.effective_dose(0.5) {
        tracing::info!(
            estimate = ld50.estimate,
            fieller_lower = ld50.fieller_lower,
            fieller_upper = ld50.fieller_upper,
            "LD50"
        );
    }
    write_json(output, serde_json::to_value(fit.report())?)
}

fn cmd_viz_dose_response(
    input: &Path,
    points: usize,
    confidence_level: f64,
    output: Option<&PathBuf>,
) -> Result<()> {
    // The band only needs the WLS line; a one-level run keeps the profile work small.
    let config = AnalysisConfig { confidence_level, levels: vec![0.5], ..Default::default() };
    let fit = run_analysis(input, config)?;
    let artifact = DoseResponseArtifact::from_fit(&fit, points)?;
    write_json(output, serde_json::to_value(artifact)?)
}

fn cmd_viz_profile(
    input: &Path,
    level: f64,
    grid_points: usize,
    half_width: f64,
    output: Option<&PathBuf>,
) -> Result<()> {
    let config = AnalysisConfig {
        levels: vec![level],
        profile: ProfileConfig { grid_points, half_width, ..Default::default() },
        ..Default::default()
    };
    let fit = run_analysis(input, config)?;
    let scan = fit
        .profiles
        .first()
        .ok_or_else(|| anyhow::anyhow!("no profile scan computed for level {}", level))?;
    write_json(output, serde_json::to_value(ProfileCurveArtifact::from(scan))?)
}

fn write_json(output: Option<&PathBuf>, value: serde_json::Value) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
    } else {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}

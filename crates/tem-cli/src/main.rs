//! tem-wave: TEM transmitter waveform generation and spectral analysis.
//!
//! This is the main entry point for the TEM waveform toolkit.

mod config;
mod orchestrator;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use lib_dsp::{AnalysisConfig, GeneratorConfig};
use lib_sim::PiecewiseLinearSource;
use lib_types::{Amperes, Seconds, WaveformKind};
use orchestrator::Orchestrator;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "tem-wave")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
    Csv,
}

/// Analysis grid shared by the preset commands.
#[derive(clap::Args)]
struct GridArgs {
    /// Analysis window length (s)
    #[arg(long, default_value = "1.0")]
    t_max: f64,

    /// Number of analysis samples
    #[arg(long, default_value = "100000")]
    n_samples: usize,
}

impl GridArgs {
    fn analysis(&self) -> AnalysisConfig {
        AnalysisConfig::default()
            .with_t_max(Seconds(self.t_max))
            .with_n_samples(self.n_samples)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run a batch described by a configuration file
    Run {
        /// Path to the batch configuration file (TOML or JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Output directory for results
        #[arg(short, long, default_value = "output")]
        output: PathBuf,
    },

    /// Generate and analyze one waveform
    Single {
        /// Waveform kind (step, ramp, half_sine, ...)
        kind: String,

        /// Pulse width (ms)
        #[arg(short, long, default_value = "10")]
        width_ms: f64,

        #[command(flatten)]
        grid: GridArgs,

        /// Output directory for results
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compare every width-parameterized kind at one pulse width
    Compare {
        /// Pulse width (ms)
        #[arg(short, long, default_value = "10")]
        width_ms: f64,

        #[command(flatten)]
        grid: GridArgs,

        /// Output directory for results
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Sweep every width-parameterized kind over the survey widths
    Comprehensive {
        /// Pulse widths (ms); defaults to 0.6, 1, 2.5, 5, 10, 20
        #[arg(long, value_delimiter = ',')]
        widths_ms: Vec<f64>,

        #[command(flatten)]
        grid: GridArgs,

        /// Output directory for results
        #[arg(short, long, default_value = "output")]
        output: PathBuf,
    },

    /// Export a waveform as a piecewise-linear simulation source
    Source {
        /// Waveform kind
        kind: String,

        /// Pulse width (ms)
        #[arg(short, long, default_value = "10")]
        width_ms: f64,

        /// Allowed deviation from the waveform, relative to its peak
        #[arg(long, default_value = "0.0")]
        tolerance: f64,

        /// Peak transmitter current (A)
        #[arg(long)]
        peak_current: Option<f64>,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match cli.command {
        Commands::Run { config, output } => {
            run_batch(&config, &output, cli.format)?;
        }
        Commands::Single { kind, width_ms, grid, output } => {
            let kind: WaveformKind = kind.parse()?;
            let orchestrator =
                Orchestrator::sweep(&[kind], &[Seconds::from_ms(width_ms)], grid.analysis())?;
            finish(&orchestrator, output.as_deref(), cli.format)?;
        }
        Commands::Compare { width_ms, grid, output } => {
            let kinds = orchestrator::width_parameterized_kinds();
            let orchestrator =
                Orchestrator::compare(&kinds, Seconds::from_ms(width_ms), grid.analysis())?;
            finish(&orchestrator, output.as_deref(), cli.format)?;
        }
        Commands::Comprehensive { widths_ms, grid, output } => {
            let widths: Vec<Seconds> = if widths_ms.is_empty() {
                orchestrator::SURVEY_WIDTHS_MS.iter().map(|&w| Seconds::from_ms(w)).collect()
            } else {
                widths_ms.iter().map(|&w| Seconds::from_ms(w)).collect()
            };
            let kinds = orchestrator::width_parameterized_kinds();
            let orchestrator = Orchestrator::sweep(&kinds, &widths, grid.analysis())?;
            finish(&orchestrator, Some(output.as_path()), cli.format)?;
        }
        Commands::Source { kind, width_ms, tolerance, peak_current, output } => {
            export_source(&kind, width_ms, tolerance, peak_current, output)?;
        }
    }

    Ok(())
}

fn run_batch(config_path: &Path, output_dir: &Path, format: OutputFormat) -> Result<()> {
    tracing::info!("Loading configuration from {:?}", config_path);

    let config = config::load_config(config_path)?;
    let orchestrator = Orchestrator::new(config)?;
    finish(&orchestrator, Some(output_dir), format)
}

fn finish(
    orchestrator: &Orchestrator,
    output_dir: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let outcome = orchestrator.run()?;

    if let Some(dir) = output_dir {
        output::write_results(&outcome, dir, format, orchestrator.output())?;
        tracing::info!("Batch complete. Results written to {:?}", dir);
    }
    output::print_results(&outcome, format)?;

    if outcome.entries.is_empty() {
        anyhow::bail!("Every waveform in '{}' failed", orchestrator.name());
    }
    Ok(())
}

fn export_source(
    kind: &str,
    width_ms: f64,
    tolerance: f64,
    peak_current: Option<f64>,
    output: Option<PathBuf>,
) -> Result<()> {
    let kind: WaveformKind = kind.parse()?;
    let width = Seconds::from_ms(width_ms);
    let waveform = orchestrator::generate_width(kind, width, GeneratorConfig::default())?;

    let mut source = PiecewiseLinearSource::from_waveform(&waveform, tolerance)?;
    if let Some(peak) = peak_current {
        source = source.scaled_to_peak(Amperes(peak));
    }
    tracing::info!(
        "Source has {} breakpoints, off at {:.6} s",
        source.len(),
        source.off_time().0
    );

    let json = source.to_json()?;
    match output {
        Some(path) => {
            std::fs::write(&path, json)?;
            tracing::info!("Wrote source to {:?}", path);
        }
        None => println!("{}", json),
    }
    Ok(())
}

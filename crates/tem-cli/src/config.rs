//! Batch configuration loading and validation.

use anyhow::{Context, Result};
use lib_dsp::{AnalysisConfig, FrequencyRange, GeneratorConfig, Parameters};
use lib_types::{Seconds, WaveformKind, WindowKind};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Top-level batch configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Batch name/description.
    pub name: String,

    /// Shared analysis settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Generator defaults.
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Output configuration.
    #[serde(default)]
    pub output: OutputConfig,

    /// Run requests in parallel.
    #[serde(default = "default_parallel")]
    pub parallel: bool,

    /// Waveforms to generate and analyze, in report order.
    #[serde(default)]
    pub waveforms: Vec<WaveformEntry>,
}

/// One waveform of the batch.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WaveformEntry {
    /// Unique identifier, used for output file names.
    pub id: String,

    /// Kind tag (`step`, `ramp`, `bipolar_square`, ...).
    pub kind: String,

    /// Generation parameters.
    #[serde(default)]
    pub params: Parameters,

    /// Breakpoint table supplying `t`/`y` for custom waveforms.
    ///
    /// Relative paths are resolved against the config file's directory.
    pub table: Option<PathBuf>,

    /// Multiplier applied to table times (e.g. 1e-3 for milliseconds).
    #[serde(default = "default_time_scale")]
    pub table_time_scale: f64,

    /// Per-waveform analysis overrides.
    pub analysis: Option<AnalysisOverride>,
}

/// Analysis fields overriding the batch settings for one waveform.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AnalysisOverride {
    pub t_max: Option<Seconds>,
    pub n_samples: Option<usize>,
    pub window: Option<WindowKind>,
    pub bandwidth_threshold: Option<f64>,
    pub search_range: Option<FrequencyRange>,
}

impl AnalysisOverride {
    /// `base` with every set field replaced.
    pub fn apply(&self, base: &AnalysisConfig) -> AnalysisConfig {
        AnalysisConfig {
            t_max: self.t_max.unwrap_or(base.t_max),
            n_samples: self.n_samples.unwrap_or(base.n_samples),
            window: self.window.unwrap_or(base.window),
            bandwidth_threshold: self.bandwidth_threshold.unwrap_or(base.bandwidth_threshold),
            search_range: self.search_range.or(base.search_range),
        }
    }
}

/// Output configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Write `<id>_waveform.csv`.
    #[serde(default = "default_true")]
    pub waveforms: bool,

    /// Write `<id>_spectrum.csv`.
    #[serde(default = "default_true")]
    pub spectra: bool,

    /// Write `<id>_report.*`.
    #[serde(default = "default_true")]
    pub reports: bool,

    /// Number of spectral peaks listed per report.
    #[serde(default = "default_max_peaks")]
    pub max_peaks: usize,

    /// Minimum peak height relative to the strongest bin.
    #[serde(default = "default_peak_height")]
    pub peak_height: f64,

    /// Highest frequency written to spectrum files (Hz).
    pub max_frequency: Option<f64>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            waveforms: true,
            spectra: true,
            reports: true,
            max_peaks: default_max_peaks(),
            peak_height: default_peak_height(),
            max_frequency: None,
        }
    }
}

fn default_parallel() -> bool { true }
fn default_true() -> bool { true }
fn default_time_scale() -> f64 { 1.0 }
fn default_max_peaks() -> usize { 3 }
fn default_peak_height() -> f64 { 0.1 }

/// Load configuration from file.
pub fn load_config(path: &Path) -> Result<BatchConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let mut config: BatchConfig = if path.extension().map_or(false, |e| e == "json") {
        serde_json::from_str(&content)
            .with_context(|| "Failed to parse config as JSON")?
    } else {
        // Assume TOML
        toml::from_str(&content)
            .with_context(|| "Failed to parse config as TOML")?
    };

    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    for entry in &mut config.waveforms {
        if let Some(table) = &entry.table {
            if table.is_relative() {
                entry.table = Some(base_dir.join(table));
            }
        }
    }

    validate_config(&config)?;

    Ok(config)
}

/// Validate configuration.
pub fn validate_config(config: &BatchConfig) -> Result<()> {
    if config.waveforms.is_empty() {
        anyhow::bail!("Config '{}' lists no waveforms", config.name);
    }

    config
        .analysis
        .validate()
        .context("Invalid [analysis] section")?;

    if config.generator.n_samples < 2 {
        anyhow::bail!(
            "generator.n_samples must be at least 2, got {}",
            config.generator.n_samples
        );
    }

    if !(config.output.peak_height >= 0.0 && config.output.peak_height <= 1.0) {
        anyhow::bail!(
            "output.peak_height must be in [0, 1], got {}",
            config.output.peak_height
        );
    }

    let mut ids = HashSet::new();
    for entry in &config.waveforms {
        if entry.id.is_empty() {
            anyhow::bail!("Waveform entries need a non-empty id");
        }
        // Ids become output file name prefixes
        if entry.id.contains(['/', '\\']) || entry.id == "." || entry.id == ".." {
            anyhow::bail!("Waveform id '{}' must not contain path separators", entry.id);
        }
        if !ids.insert(entry.id.as_str()) {
            anyhow::bail!("Duplicate waveform id '{}'", entry.id);
        }
        validate_entry(entry, &config.analysis)
            .with_context(|| format!("Invalid waveform '{}'", entry.id))?;
    }

    Ok(())
}

fn validate_entry(entry: &WaveformEntry, analysis: &AnalysisConfig) -> Result<()> {
    let kind: WaveformKind = entry.kind.parse()?;

    if let Some(table) = &entry.table {
        if kind != WaveformKind::Custom {
            anyhow::bail!("'table' is only valid for custom waveforms, not {}", kind);
        }
        if !table.exists() {
            anyhow::bail!("Breakpoint table not found: {:?}", table);
        }
        if !(entry.table_time_scale.is_finite() && entry.table_time_scale > 0.0) {
            anyhow::bail!(
                "table_time_scale must be finite and > 0, got {}",
                entry.table_time_scale
            );
        }
    } else if kind == WaveformKind::Custom
        && !(entry.params.contains_key("t") && entry.params.contains_key("y"))
    {
        anyhow::bail!("custom waveforms need a 'table' or 't'/'y' params");
    }

    if let Some(over) = &entry.analysis {
        over.apply(analysis)
            .validate()
            .context("Invalid analysis override")?;
    }

    Ok(())
}

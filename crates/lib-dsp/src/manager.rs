//! Batch generation and analysis.
//!
//! The manager turns a list of [`WaveformRequest`]s into generated
//! waveforms, their spectra and statistics. Requests are independent and
//! run on the rayon pool; results keep input order.
//!
//! A failing request never aborts the batch: its error is recorded under
//! its identifier in [`BatchOutcome::failures`] and the remaining requests
//! still run. [`BatchOutcome::into_result`] gives all-or-nothing semantics
//! to callers that want them.

use crate::analyzer::{AnalysisConfig, SpectralAnalyzer};
use crate::error::{DspError, GeneratorError};
use crate::generator::{GeneratorConfig, WaveformGenerator};
use crate::params::{ParamValue, Parameters};
use lib_types::{Seconds, SpectrumResult, Waveform, WaveformKind, WaveformStatistics};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

/// One waveform to generate and analyze.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WaveformRequest {
    /// Unique identifier within the batch.
    pub id: String,

    /// Kind tag, e.g. `"step"` or `"half_sine"`.
    pub kind: String,

    #[serde(default)]
    pub parameters: Parameters,

    /// Overrides the manager's shared analysis settings.
    #[serde(default)]
    pub analysis: Option<AnalysisConfig>,
}

impl WaveformRequest {
    pub fn new(id: impl Into<String>, kind: impl Into<String>, parameters: Parameters) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            parameters,
            analysis: None,
        }
    }

    pub fn with_analysis(mut self, analysis: AnalysisConfig) -> Self {
        self.analysis = Some(analysis);
        self
    }
}

/// Manager settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    pub generator: GeneratorConfig,
    pub analysis: AnalysisConfig,
    /// Run requests on the rayon pool.
    pub parallel: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            generator: GeneratorConfig::default(),
            analysis: AnalysisConfig::default(),
            parallel: true,
        }
    }
}

/// Which stage of a request failed.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum StageError {
    #[error("generation failed: {0}")]
    Generate(#[from] GeneratorError),

    #[error("analysis failed: {0}")]
    Analyze(#[from] DspError),
}

/// Batch-level errors.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum BatchError {
    #[error("Duplicate waveform identifier '{0}'")]
    DuplicateIdentifier(String),

    #[error("{kind} waveforms have no width parameter to sweep")]
    NotWidthParameterized { kind: WaveformKind },

    #[error(
        "{} waveform request(s) failed: {}",
        .failures.len(),
        .failures.keys().cloned().collect::<Vec<_>>().join(", ")
    )]
    Failed { failures: BTreeMap<String, StageError> },
}

/// A successfully processed request.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BatchEntry {
    pub id: String,
    pub waveform: Waveform,
    pub spectrum: SpectrumResult,
    pub statistics: WaveformStatistics,
}

/// Results of a batch: successes in input order, failures by identifier.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchOutcome {
    pub entries: Vec<BatchEntry>,
    pub failures: BTreeMap<String, StageError>,
}

impl BatchOutcome {
    /// True when every request succeeded.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&BatchEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// All-or-nothing view of the batch.
    pub fn into_result(self) -> Result<Vec<BatchEntry>, BatchError> {
        if self.failures.is_empty() {
            Ok(self.entries)
        } else {
            Err(BatchError::Failed {
                failures: self.failures,
            })
        }
    }
}

/// Generates and analyzes batches of waveforms.
#[derive(Clone, Debug)]
pub struct WaveformManager {
    generator: WaveformGenerator,
    analyzer: SpectralAnalyzer,
    parallel: bool,
}

impl WaveformManager {
    /// Create a manager; the shared analysis settings are validated here.
    pub fn new(config: ManagerConfig) -> Result<Self, DspError> {
        Ok(Self {
            generator: WaveformGenerator::new(config.generator),
            analyzer: SpectralAnalyzer::new(config.analysis)?,
            parallel: config.parallel,
        })
    }

    pub fn generator(&self) -> &WaveformGenerator {
        &self.generator
    }

    pub fn analysis(&self) -> &AnalysisConfig {
        self.analyzer.config()
    }

    /// Generate and analyze every request.
    pub fn run(&self, requests: &[WaveformRequest]) -> Result<BatchOutcome, BatchError> {
        let mut seen = HashSet::new();
        for request in requests {
            if !seen.insert(request.id.as_str()) {
                return Err(BatchError::DuplicateIdentifier(request.id.clone()));
            }
        }

        tracing::info!(
            "Processing {} waveform request(s){}",
            requests.len(),
            if self.parallel { " in parallel" } else { "" }
        );

        let results: Vec<Result<BatchEntry, StageError>> = if self.parallel {
            requests.par_iter().map(|r| self.process(r)).collect()
        } else {
            requests.iter().map(|r| self.process(r)).collect()
        };

        let mut outcome = BatchOutcome::default();
        for (request, result) in requests.iter().zip(results) {
            match result {
                Ok(entry) => outcome.entries.push(entry),
                Err(e) => {
                    tracing::warn!("Waveform '{}' failed: {}", request.id, e);
                    outcome.failures.insert(request.id.clone(), e);
                }
            }
        }

        tracing::info!(
            "Batch finished: {} succeeded, {} failed",
            outcome.entries.len(),
            outcome.failures.len()
        );
        Ok(outcome)
    }

    /// Run one pulse-width sweep of `kind`, one request per width.
    pub fn sweep_widths(
        &self,
        kind: WaveformKind,
        widths: &[Seconds],
        base: &Parameters,
    ) -> Result<BatchOutcome, BatchError> {
        let requests = width_requests(kind, widths, base)?;
        self.run(&requests)
    }

    /// Run several kinds at the same width; entries are keyed by kind tag.
    pub fn compare(
        &self,
        kinds: &[WaveformKind],
        width: Seconds,
        base: &Parameters,
    ) -> Result<BatchOutcome, BatchError> {
        let requests = kinds
            .iter()
            .map(|&kind| {
                let params = sweep_parameters(kind, width, base)?;
                Ok(WaveformRequest::new(kind.tag(), kind.tag(), params))
            })
            .collect::<Result<Vec<_>, BatchError>>()?;
        self.run(&requests)
    }

    fn process(&self, request: &WaveformRequest) -> Result<BatchEntry, StageError> {
        let waveform = self.generator.generate(&request.kind, &request.parameters)?;

        let override_analyzer;
        let analyzer = match &request.analysis {
            Some(config) => {
                override_analyzer = SpectralAnalyzer::new(config.clone())?;
                &override_analyzer
            }
            None => &self.analyzer,
        };

        let spectrum = analyzer.analyze(&waveform)?;
        let statistics = analyzer.statistics(&waveform)?;

        tracing::debug!(
            "'{}': dominant {:.3} Hz, bandwidth {:.3} Hz, energy {:.4e}",
            request.id,
            spectrum.dominant_frequency.0,
            spectrum.bandwidth.0,
            spectrum.total_energy
        );

        Ok(BatchEntry {
            id: request.id.clone(),
            waveform,
            spectrum,
            statistics,
        })
    }
}

/// Requests for a width sweep, identified as `"{kind}_{width_ms}ms"`.
pub fn width_requests(
    kind: WaveformKind,
    widths: &[Seconds],
    base: &Parameters,
) -> Result<Vec<WaveformRequest>, BatchError> {
    widths
        .iter()
        .map(|&width| {
            let params = sweep_parameters(kind, width, base)?;
            Ok(WaveformRequest::new(width_id(kind, width), kind.tag(), params))
        })
        .collect()
}

/// `"{kind}_{width_ms}ms"`, with the width printed without float noise.
pub fn width_id(kind: WaveformKind, width: Seconds) -> String {
    let ms = (width.as_ms() * 1e6).round() / 1e6;
    format!("{}_{}ms", kind.tag(), ms)
}

/// `base` with the kind's width parameter set, plus the companions some
/// kinds need (ramp record length, square duty cycle, trapezoid edges).
fn sweep_parameters(
    kind: WaveformKind,
    width: Seconds,
    base: &Parameters,
) -> Result<Parameters, BatchError> {
    let name = kind
        .width_parameter()
        .ok_or(BatchError::NotWidthParameterized { kind })?;

    let mut params = base.clone();
    params.insert(name.to_string(), ParamValue::Scalar(width.0));

    let mut default = |key: &str, value: f64| {
        params
            .entry(key.to_string())
            .or_insert(ParamValue::Scalar(value));
    };
    match kind {
        WaveformKind::Ramp => default("t_max", 2.0 * width.0),
        WaveformKind::BipolarSquare => default("duty_cycle", 0.5),
        WaveformKind::Trapezoid => default("rise_time", 0.1 * width.0),
        _ => {}
    }

    Ok(params)
}

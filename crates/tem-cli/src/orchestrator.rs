//! Batch orchestration.
//!
//! Turns a batch config, a width sweep or a kind comparison into a run of
//! the waveform manager.

use crate::config::{BatchConfig, OutputConfig};
use anyhow::{Context, Result};
use lib_dsp::manager::width_requests;
use lib_dsp::{
    AnalysisConfig, BatchOutcome, GeneratorConfig, ManagerConfig, ParamValue, Parameters,
    WaveformManager, WaveformRequest,
};
use lib_io::parse_breakpoint_file;
use lib_types::{Seconds, Waveform, WaveformKind};

/// Pulse widths of the comprehensive survey, in milliseconds.
pub const SURVEY_WIDTHS_MS: [f64; 6] = [0.6, 1.0, 2.5, 5.0, 10.0, 20.0];

/// Kinds that can be swept by pulse width.
pub fn width_parameterized_kinds() -> Vec<WaveformKind> {
    WaveformKind::ALL
        .into_iter()
        .filter(|k| k.width_parameter().is_some())
        .collect()
}

enum Plan {
    Requests(Vec<WaveformRequest>),
    Compare { kinds: Vec<WaveformKind>, width: Seconds },
}

/// Main batch orchestrator.
pub struct Orchestrator {
    name: String,
    manager: WaveformManager,
    output: OutputConfig,
    plan: Plan,
}

impl Orchestrator {
    /// Create an orchestrator from a loaded configuration.
    ///
    /// Breakpoint tables are read here, so a missing or malformed table
    /// fails before any waveform is generated.
    pub fn new(config: BatchConfig) -> Result<Self> {
        let requests = config
            .waveforms
            .iter()
            .map(|entry| {
                let mut params = entry.params.clone();
                if let Some(path) = &entry.table {
                    let table = parse_breakpoint_file(path)
                        .with_context(|| format!("Failed to read breakpoint table {:?}", path))?
                        .scale_time(entry.table_time_scale);
                    tracing::info!("Loaded {} breakpoints for '{}'", table.len(), entry.id);
                    params.insert("t".to_string(), ParamValue::Series(table.t));
                    params.insert("y".to_string(), ParamValue::Series(table.y));
                }

                let mut request = WaveformRequest::new(&entry.id, &entry.kind, params);
                if let Some(over) = &entry.analysis {
                    request = request.with_analysis(over.apply(&config.analysis));
                }
                Ok(request)
            })
            .collect::<Result<Vec<_>>>()?;

        let manager = WaveformManager::new(ManagerConfig {
            generator: config.generator,
            analysis: config.analysis,
            parallel: config.parallel,
        })
        .context("Invalid analysis settings")?;

        Ok(Self {
            name: config.name,
            manager,
            output: config.output,
            plan: Plan::Requests(requests),
        })
    }

    /// Every kind in `kinds` at every width in `widths`.
    pub fn sweep(
        kinds: &[WaveformKind],
        widths: &[Seconds],
        analysis: AnalysisConfig,
    ) -> Result<Self> {
        let mut requests = Vec::with_capacity(kinds.len() * widths.len());
        for &kind in kinds {
            requests.extend(width_requests(kind, widths, &Parameters::new())?);
        }

        Ok(Self {
            name: format!("{}-waveform width sweep", kinds.len()),
            manager: preset_manager(analysis)?,
            output: OutputConfig::default(),
            plan: Plan::Requests(requests),
        })
    }

    /// Several kinds at one width, identified by kind tag.
    pub fn compare(
        kinds: &[WaveformKind],
        width: Seconds,
        analysis: AnalysisConfig,
    ) -> Result<Self> {
        Ok(Self {
            name: format!("Waveform comparison at {} ms", width.as_ms()),
            manager: preset_manager(analysis)?,
            output: OutputConfig::default(),
            plan: Plan::Compare {
                kinds: kinds.to_vec(),
                width,
            },
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn output(&self) -> &OutputConfig {
        &self.output
    }

    /// Run the batch.
    pub fn run(&self) -> Result<BatchOutcome> {
        tracing::info!("Running batch '{}'", self.name);

        let outcome = match &self.plan {
            Plan::Requests(requests) => self.manager.run(requests)?,
            Plan::Compare { kinds, width } => {
                self.manager.compare(kinds, *width, &Parameters::new())?
            }
        };

        if !outcome.is_complete() {
            tracing::warn!(
                "{} of {} waveform(s) failed",
                outcome.failures.len(),
                outcome.entries.len() + outcome.failures.len()
            );
        }
        Ok(outcome)
    }
}

fn preset_manager(analysis: AnalysisConfig) -> Result<WaveformManager> {
    WaveformManager::new(ManagerConfig {
        analysis,
        ..ManagerConfig::default()
    })
    .context("Invalid analysis settings")
}

/// Generate one `kind` waveform of the given pulse width.
pub fn generate_width(
    kind: WaveformKind,
    width: Seconds,
    generator: GeneratorConfig,
) -> Result<Waveform> {
    let requests = width_requests(kind, &[width], &Parameters::new())?;
    let request = requests
        .first()
        .context("Width sweep produced no request")?;

    let generator = lib_dsp::WaveformGenerator::new(generator);
    let waveform = generator
        .generate(&request.kind, &request.parameters)
        .with_context(|| format!("Failed to generate {}", request.id))?;
    Ok(waveform)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WaveformEntry;
    use lib_dsp::params::scalar_params;

    fn small_analysis() -> AnalysisConfig {
        AnalysisConfig::default()
            .with_t_max(Seconds(0.2))
            .with_n_samples(8000)
    }

    #[test]
    fn test_width_parameterized_kinds() {
        let kinds = width_parameterized_kinds();
        assert!(kinds.contains(&WaveformKind::HalfSine));
        assert!(!kinds.contains(&WaveformKind::Custom));
    }

    #[test]
    fn test_sweep_ids_and_order() {
        let widths = [Seconds::from_ms(1.0), Seconds::from_ms(5.0)];
        let orchestrator = Orchestrator::sweep(
            &[WaveformKind::HalfSine, WaveformKind::Gaussian],
            &widths,
            small_analysis(),
        )
        .unwrap();

        let outcome = orchestrator.run().unwrap();
        assert!(outcome.is_complete());
        let ids: Vec<&str> = outcome.entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["half_sine_1ms", "half_sine_5ms", "gaussian_1ms", "gaussian_5ms"]);
    }

    #[test]
    fn test_compare_keys_by_kind() {
        let orchestrator = Orchestrator::compare(
            &[WaveformKind::Triangular, WaveformKind::Trapezoid],
            Seconds::from_ms(2.5),
            small_analysis(),
        )
        .unwrap();

        let outcome = orchestrator.run().unwrap();
        assert!(outcome.get("triangular").is_some());
        assert!(outcome.get("trapezoid").is_some());
    }

    #[test]
    fn test_config_with_table_and_failure() {
        let dir = std::env::temp_dir().join(format!("tem-cli-orch-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let table = dir.join("loop.txt");
        std::fs::write(&table, "# ms  A\n0 0\n1 1\n4 1\n5 0\n").unwrap();

        let config = BatchConfig {
            name: "table".into(),
            analysis: small_analysis(),
            generator: GeneratorConfig::default(),
            output: OutputConfig::default(),
            parallel: false,
            waveforms: vec![
                WaveformEntry {
                    id: "loop".into(),
                    kind: "custom".into(),
                    params: Parameters::new(),
                    table: Some(table),
                    table_time_scale: 1e-3,
                    analysis: None,
                },
                WaveformEntry {
                    id: "bad".into(),
                    kind: "half_sine".into(),
                    params: scalar_params([("width", -1.0)]),
                    table: None,
                    table_time_scale: 1.0,
                    analysis: None,
                },
            ],
        };

        let outcome = Orchestrator::new(config).unwrap().run().unwrap();
        let entry = outcome.get("loop").unwrap();
        assert!((entry.waveform.t_end() - 5e-3).abs() < 1e-12);
        assert!(outcome.failures.contains_key("bad"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_generate_width() {
        let width = Seconds::from_ms(1.0);
        let wf = generate_width(WaveformKind::HalfSine, width, GeneratorConfig::default()).unwrap();
        assert_eq!(wf.kind(), WaveformKind::HalfSine);
        assert!((wf.peak_abs() - 1.0).abs() < 1e-3);

        assert!(generate_width(WaveformKind::Custom, width, GeneratorConfig::default()).is_err());
    }
}

//! End-to-end checks of generation, resampling, analysis and batching.

use lib_dsp::params::scalar_params;
use lib_dsp::{
    analyze, AnalysisConfig, GeneratorError, ManagerConfig, Parameters, SpectralAnalyzer,
    StageError, WaveformGenerator, WaveformManager, WaveformRequest, WaveformSpec,
};
use lib_types::grid::linspace;
use lib_dsp::window::generate_window;
use lib_types::{Seconds, Waveform, WaveformKind, WindowKind};
use std::collections::BTreeMap;
use std::f64::consts::PI;

fn valid_parameters(kind: WaveformKind) -> Parameters {
    match kind {
        WaveformKind::Step => scalar_params([("amplitude", 1.0), ("turn_off_time", 0.01)]),
        WaveformKind::Ramp => scalar_params([("rise_time", 0.002), ("t_max", 0.01)]),
        WaveformKind::BipolarSquare => {
            scalar_params([("period", 0.02), ("duty_cycle", 0.5), ("cycles", 2.0)])
        }
        WaveformKind::Trapezoid => scalar_params([("width", 0.005), ("rise_time", 0.001)]),
        WaveformKind::Custom => {
            let mut params = Parameters::new();
            params.insert("t".into(), vec![0.0, 0.001, 0.003].into());
            params.insert("y".into(), vec![0.0, 1.0, 0.0].into());
            params
        }
        _ => scalar_params([("width", 0.005)]),
    }
}

#[test]
fn every_kind_generates_a_valid_waveform() {
    let generator = WaveformGenerator::default();

    for kind in WaveformKind::ALL {
        let wf = generator
            .generate(kind.tag(), &valid_parameters(kind))
            .unwrap_or_else(|e| panic!("{}: {}", kind, e));

        assert_eq!(wf.t().len(), wf.y().len());
        assert!(wf.len() >= 2, "{}", kind);
        assert!(wf.t().windows(2).all(|w| w[1] > w[0]), "{}", kind);
        assert_eq!(wf.kind(), kind);
    }
}

#[test]
fn resampling_a_native_uniform_grid_is_identity() {
    let n = 1001;
    let t = linspace(0.0, 0.5, n);
    let y: Vec<f64> = t.iter().map(|&x| (-x / 0.05).exp()).collect();
    let wf = Waveform::new(t, y.clone(), WaveformKind::Custom, BTreeMap::new()).unwrap();

    let config = AnalysisConfig::default().with_t_max(Seconds(0.5)).with_n_samples(n);
    let resampled = SpectralAnalyzer::new(config).unwrap().resample(&wf).unwrap();
    assert_eq!(resampled, y);
}

#[test]
fn pure_sinusoid_dominant_within_one_bin() {
    let f0 = 37.0;
    let t = linspace(0.0, 1.0, 4001);
    let y: Vec<f64> = t.iter().map(|&x| (2.0 * PI * f0 * x).sin()).collect();
    let wf = Waveform::new(t, y, WaveformKind::Custom, BTreeMap::new()).unwrap();

    let result = analyze(&wf, &AnalysisConfig::default().with_n_samples(8000)).unwrap();
    assert!((result.dominant_frequency.0 - f0).abs() <= result.frequency_resolution().0);
}

#[test]
fn narrow_pulse_is_wider_band_than_slow_ramp() {
    let generator = WaveformGenerator::default();
    let config = AnalysisConfig::default().with_t_max(Seconds(0.2)).with_n_samples(20_000);

    let pulse = generator.build(&WaveformSpec::half_sine(0.0006)).unwrap();
    let ramp = generator.build(&WaveformSpec::ramp(0.05, 0.1)).unwrap();

    let pulse_spectrum = analyze(&pulse, &config).unwrap();
    let ramp_spectrum = analyze(&ramp, &config).unwrap();

    for s in [&pulse_spectrum, &ramp_spectrum] {
        assert!(s.bandwidth.0 >= 0.0);
        assert!(s.bandwidth.0 <= s.nyquist().0);
        assert!(s.band_low.0 <= s.dominant_frequency.0 && s.dominant_frequency.0 <= s.band_high.0);
    }
    assert!(pulse_spectrum.bandwidth.0 > ramp_spectrum.bandwidth.0);
}

#[test]
fn step_edge_is_exact() {
    let params = scalar_params([("amplitude", 1.0), ("turn_off_time", 0.01)]);
    let wf = WaveformGenerator::default().generate("step", &params).unwrap();

    for (t, y) in wf.samples() {
        let expected = if t < 0.01 { 1.0 } else { 0.0 };
        assert_eq!(y, expected, "t = {}", t);
    }
}

#[test]
fn manager_keeps_valid_results_and_names_the_invalid_one() {
    let manager = WaveformManager::new(ManagerConfig {
        analysis: AnalysisConfig::default().with_n_samples(10_000),
        ..ManagerConfig::default()
    })
    .unwrap();

    let requests = vec![
        WaveformRequest::new("step10", "step", valid_parameters(WaveformKind::Step)),
        WaveformRequest::new("broken", "sawtooth", Parameters::new()),
        WaveformRequest::new("gauss5", "gaussian", valid_parameters(WaveformKind::Gaussian)),
    ];
    let outcome = manager.run(&requests).unwrap();

    let ids: Vec<&str> = outcome.entries.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["step10", "gauss5"]);
    assert_eq!(
        outcome.failures.get("broken"),
        Some(&StageError::Generate(GeneratorError::UnsupportedWaveformType("sawtooth".into())))
    );
}

#[test]
fn analysis_is_deterministic() {
    let generator = WaveformGenerator::default();
    let wf = generator.build(&WaveformSpec::differential_pulse(0.002)).unwrap();
    let config = AnalysisConfig::default().with_n_samples(30_000);

    let a = analyze(&wf, &config).unwrap();
    let b = analyze(&wf, &config).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.total_energy.to_bits(), b.total_energy.to_bits());
}

#[test]
fn total_energy_matches_time_domain_sum() {
    let generator = WaveformGenerator::default();
    let wf = generator.build(&WaveformSpec::triangular(0.004)).unwrap();
    let analyzer = SpectralAnalyzer::new(AnalysisConfig::default().with_n_samples(50_001)).unwrap();

    let samples = analyzer.resample(&wf).unwrap();
    let expected: f64 = samples.iter().map(|v| v * v).sum::<f64>() * analyzer.config().dt();
    let spectrum = analyzer.analyze(&wf).unwrap();

    assert!((spectrum.total_energy - expected).abs() < 1e-9 * expected);
    // Continuous-time energy of a unit triangle is width / 3
    assert!((spectrum.total_energy - 0.004 / 3.0).abs() < 1e-3 * 0.004);
}

#[test]
fn windowed_analysis_keeps_dominant_and_energy() {
    let f0 = 37.0;
    let t = linspace(0.0, 1.0, 4001);
    let y: Vec<f64> = t.iter().map(|&x| (2.0 * PI * f0 * x).sin()).collect();
    let wf = Waveform::new(t, y, WaveformKind::Custom, BTreeMap::new()).unwrap();

    for window in [WindowKind::Hann, WindowKind::Kaiser { beta: 8.6 }] {
        let config = AnalysisConfig::default().with_n_samples(8000).with_window(window);
        let analyzer = SpectralAnalyzer::new(config).unwrap();
        let result = analyzer.analyze(&wf).unwrap();

        let offset = (result.dominant_frequency.0 - f0).abs();
        assert!(offset <= result.frequency_resolution().0, "{:?}: {}", window, offset);

        let samples = analyzer.resample(&wf).unwrap();
        let weights = generate_window(window, samples.len());
        let expected: f64 = samples
            .iter()
            .zip(&weights)
            .map(|(y, w)| (w * y) * (w * y))
            .sum::<f64>()
            * analyzer.config().dt();
        assert!(
            (result.total_energy - expected).abs() < 1e-9 * expected,
            "{:?}: {} vs {}",
            window,
            result.total_energy,
            expected
        );
    }
}

//! Generation and analysis throughput benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lib_dsp::{
    AnalysisConfig, ManagerConfig, SpectralAnalyzer, WaveformGenerator, WaveformManager,
    WaveformSpec,
};
use lib_dsp::manager::width_requests;
use lib_dsp::Parameters;
use lib_types::{Seconds, WaveformKind};

fn bench_generate(c: &mut Criterion) {
    let generator = WaveformGenerator::default();
    let mut group = c.benchmark_group("generate");

    for n_samples in [2001usize, 20_001, 200_001].iter() {
        let spec = WaveformSpec::differential_pulse(0.005).with_n_samples(*n_samples);
        group.bench_with_input(BenchmarkId::new("differential_pulse", n_samples), &spec, |b, s| {
            b.iter(|| generator.build(black_box(s)));
        });
    }

    group.finish();
}

fn bench_analyze(c: &mut Criterion) {
    let generator = WaveformGenerator::default();
    let waveform = generator.build(&WaveformSpec::half_sine(0.005)).unwrap();
    let mut group = c.benchmark_group("analyze");

    // Includes an odd and a prime-ish length
    for n_samples in [10_000usize, 100_000, 100_003].iter() {
        let analyzer =
            SpectralAnalyzer::new(AnalysisConfig::default().with_n_samples(*n_samples)).unwrap();
        group.bench_with_input(BenchmarkId::new("half_sine", n_samples), &analyzer, |b, a| {
            b.iter(|| a.analyze(black_box(&waveform)));
        });
    }

    group.finish();
}

fn bench_batch(c: &mut Criterion) {
    let widths: Vec<Seconds> = [0.6, 1.0, 2.5, 5.0, 10.0, 20.0]
        .iter()
        .map(|&ms| Seconds::from_ms(ms))
        .collect();
    let requests = width_requests(WaveformKind::Gaussian, &widths, &Parameters::new()).unwrap();
    let mut group = c.benchmark_group("batch");

    for parallel in [false, true] {
        let manager = WaveformManager::new(ManagerConfig {
            parallel,
            ..ManagerConfig::default()
        })
        .unwrap();
        let label = if parallel { "parallel" } else { "serial" };
        group.bench_function(label, |b| b.iter(|| manager.run(black_box(&requests))));
    }

    group.finish();
}

criterion_group!(benches, bench_generate, bench_analyze, bench_batch);
criterion_main!(benches);

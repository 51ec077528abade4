//! Result output formatting and writing.

use crate::config::OutputConfig;
use crate::OutputFormat;
use anyhow::Result;
use lib_dsp::{BatchEntry, BatchOutcome, PeakFinder, SpectralPeak};
use std::io::Write;
use std::path::Path;

/// Write batch results to the output directory.
pub fn write_results(
    outcome: &BatchOutcome,
    output_dir: &Path,
    format: OutputFormat,
    options: &OutputConfig,
) -> Result<()> {
    std::fs::create_dir_all(output_dir)?;

    for entry in &outcome.entries {
        if options.waveforms {
            write_waveform(entry, output_dir)?;
        }
        if options.spectra {
            write_spectrum(entry, output_dir, options.max_frequency)?;
        }
        if options.reports {
            write_report(entry, output_dir, format, options)?;
        }
    }

    write_summary(outcome, output_dir, format)?;
    Ok(())
}

fn write_waveform(entry: &BatchEntry, output_dir: &Path) -> Result<()> {
    let path = output_dir.join(format!("{}_waveform.csv", entry.id));
    let mut f = std::io::BufWriter::new(std::fs::File::create(&path)?);

    writeln!(f, "time_s,amplitude")?;
    for (t, y) in entry.waveform.samples() {
        writeln!(f, "{},{}", t, y)?;
    }
    f.flush()?;

    tracing::info!("Wrote waveform to {:?} ({} samples)", path, entry.waveform.len());
    Ok(())
}

fn write_spectrum(entry: &BatchEntry, output_dir: &Path, max_frequency: Option<f64>) -> Result<()> {
    let path = output_dir.join(format!("{}_spectrum.csv", entry.id));
    let mut f = std::io::BufWriter::new(std::fs::File::create(&path)?);

    let spectrum = &entry.spectrum;
    let normalized = spectrum.normalized_magnitudes();
    let limit = max_frequency.unwrap_or(f64::INFINITY);

    writeln!(f, "frequency_hz,magnitude,normalized")?;
    let mut rows = 0;
    let bins = spectrum.frequencies.iter().zip(&spectrum.magnitudes).zip(&normalized);
    for ((freq, mag), norm) in bins {
        if freq.0 > limit {
            break;
        }
        writeln!(f, "{},{},{}", freq.0, mag, norm)?;
        rows += 1;
    }
    f.flush()?;

    tracing::info!("Wrote spectrum to {:?} ({} of {} bins)", path, rows, spectrum.len());
    Ok(())
}

fn extension(format: OutputFormat) -> &'static str {
    match format {
        OutputFormat::Text => "txt",
        OutputFormat::Json => "json",
        OutputFormat::Csv => "csv",
    }
}

fn peaks(entry: &BatchEntry, options: &OutputConfig) -> Vec<SpectralPeak> {
    PeakFinder::new()
        .with_max_peaks(options.max_peaks)
        .with_relative_height(options.peak_height)
        .find_peaks(&entry.spectrum)
}

fn write_report(
    entry: &BatchEntry,
    output_dir: &Path,
    format: OutputFormat,
    options: &OutputConfig,
) -> Result<()> {
    let path = output_dir.join(format!("{}_report.{}", entry.id, extension(format)));
    let mut f = std::fs::File::create(&path)?;

    let spectrum = &entry.spectrum;
    let stats = &entry.statistics;
    let peaks = peaks(entry, options);

    match format {
        OutputFormat::Text => {
            writeln!(f, "Waveform Report: {}", entry.id)?;
            writeln!(f, "================{}", "=".repeat(entry.id.len() + 1))?;
            writeln!(f, "Kind:               {}", entry.waveform.kind().display_name())?;
            for (name, value) in entry.waveform.parameters() {
                writeln!(f, "  {:<18}{}", name, value)?;
            }
            writeln!(f)?;
            writeln!(f, "Time Domain")?;
            writeln!(f, "  Mean:             {:.6}", stats.mean)?;
            writeln!(f, "  Std:              {:.6}", stats.std)?;
            writeln!(f, "  Min / Max:        {:.6} / {:.6}", stats.min, stats.max)?;
            writeln!(f, "  Peak-to-peak:     {:.6}", stats.peak_to_peak)?;
            writeln!(f, "  RMS:              {:.6}", stats.rms)?;
            writeln!(f, "  Energy:           {:.6e}", stats.energy)?;
            if let Some(decay) = &stats.decay {
                writeln!(f, "  Fall time 90-10:  {:.6e} s", decay.fall_time)?;
            }
            writeln!(f)?;
            writeln!(f, "Frequency Domain")?;
            writeln!(f, "  Dominant:         {:.3} Hz", spectrum.dominant_frequency.0)?;
            writeln!(f, "  Magnitude:        {:.6e}", spectrum.dominant_magnitude)?;
            writeln!(
                f,
                "  Bandwidth:        {:.3} Hz ({:.3} - {:.3} Hz)",
                spectrum.bandwidth.0, spectrum.band_low.0, spectrum.band_high.0
            )?;
            writeln!(f, "  Total energy:     {:.6e}", spectrum.total_energy)?;
            writeln!(f, "  Resolution:       {:.4} Hz", spectrum.frequency_resolution().0)?;
            if !peaks.is_empty() {
                writeln!(f)?;
                writeln!(f, "Spectral Peaks")?;
                for (i, peak) in peaks.iter().enumerate() {
                    writeln!(
                        f,
                        "  {}. {:.3} Hz  ({:.3} of max)",
                        i + 1,
                        peak.frequency.0,
                        peak.relative_magnitude
                    )?;
                }
            }
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "id": entry.id,
                "kind": entry.waveform.kind(),
                "parameters": entry.waveform.parameters(),
                "statistics": stats,
                "dominant_frequency_hz": spectrum.dominant_frequency.0,
                "dominant_magnitude": spectrum.dominant_magnitude,
                "bandwidth_hz": spectrum.bandwidth.0,
                "band_low_hz": spectrum.band_low.0,
                "band_high_hz": spectrum.band_high.0,
                "total_energy": spectrum.total_energy,
                "analysis": {
                    "t_max": spectrum.t_max.0,
                    "n_samples": spectrum.n_samples,
                    "window": spectrum.window,
                    "bandwidth_threshold": spectrum.bandwidth_threshold,
                },
                "peaks": peaks,
            });
            writeln!(f, "{}", serde_json::to_string_pretty(&json)?)?;
        }
        OutputFormat::Csv => {
            writeln!(f, "metric,value")?;
            writeln!(f, "kind,{}", entry.waveform.kind().tag())?;
            writeln!(f, "mean,{}", stats.mean)?;
            writeln!(f, "std,{}", stats.std)?;
            writeln!(f, "min,{}", stats.min)?;
            writeln!(f, "max,{}", stats.max)?;
            writeln!(f, "peak_to_peak,{}", stats.peak_to_peak)?;
            writeln!(f, "rms,{}", stats.rms)?;
            writeln!(f, "energy,{}", stats.energy)?;
            writeln!(f, "dominant_frequency_hz,{}", spectrum.dominant_frequency.0)?;
            writeln!(f, "bandwidth_hz,{}", spectrum.bandwidth.0)?;
            writeln!(f, "total_energy,{}", spectrum.total_energy)?;
            for (i, peak) in peaks.iter().enumerate() {
                writeln!(f, "peak_{}_hz,{}", i + 1, peak.frequency.0)?;
            }
        }
    }

    tracing::info!("Wrote report to {:?}", path);
    Ok(())
}

fn write_summary(outcome: &BatchOutcome, output_dir: &Path, format: OutputFormat) -> Result<()> {
    let path = output_dir.join(format!("summary.{}", extension(format)));
    let mut f = std::fs::File::create(&path)?;

    match format {
        OutputFormat::Json => {
            writeln!(f, "{}", serde_json::to_string_pretty(&summary_json(outcome))?)?;
        }
        OutputFormat::Csv => {
            writeln!(f, "id,kind,dominant_frequency_hz,bandwidth_hz,total_energy,error")?;
            for entry in &outcome.entries {
                writeln!(
                    f,
                    "{},{},{},{},{},",
                    entry.id,
                    entry.waveform.kind().tag(),
                    entry.spectrum.dominant_frequency.0,
                    entry.spectrum.bandwidth.0,
                    entry.spectrum.total_energy
                )?;
            }
            for (id, err) in &outcome.failures {
                writeln!(f, "{},,,,,\"{}\"", id, err.to_string().replace('"', "\"\""))?;
            }
        }
        OutputFormat::Text => {
            writeln!(f, "TEM Waveform Batch Summary")?;
            writeln!(f, "==========================")?;
            writeln!(f)?;
            writeln!(
                f,
                "{:<24} {:>14} {:>14} {:>14}",
                "Waveform", "Dominant (Hz)", "Bandwidth (Hz)", "Energy"
            )?;
            for entry in &outcome.entries {
                writeln!(
                    f,
                    "{:<24} {:>14.3} {:>14.3} {:>14.4e}",
                    entry.id,
                    entry.spectrum.dominant_frequency.0,
                    entry.spectrum.bandwidth.0,
                    entry.spectrum.total_energy
                )?;
            }
        }
    }

    if !outcome.failures.is_empty() && matches!(format, OutputFormat::Text) {
        writeln!(f)?;
        writeln!(f, "Failed:")?;
        for (id, err) in &outcome.failures {
            writeln!(f, "  {}: {}", id, err)?;
        }
    }

    tracing::info!("Wrote summary to {:?}", path);
    Ok(())
}

fn summary_json(outcome: &BatchOutcome) -> serde_json::Value {
    let entries: Vec<_> = outcome
        .entries
        .iter()
        .map(|entry| {
            serde_json::json!({
                "id": entry.id,
                "kind": entry.waveform.kind(),
                "dominant_frequency_hz": entry.spectrum.dominant_frequency.0,
                "bandwidth_hz": entry.spectrum.bandwidth.0,
                "total_energy": entry.spectrum.total_energy,
            })
        })
        .collect();
    let failures: serde_json::Map<String, serde_json::Value> = outcome
        .failures
        .iter()
        .map(|(id, err)| (id.clone(), serde_json::Value::String(err.to_string())))
        .collect();

    serde_json::json!({ "entries": entries, "failures": failures })
}

/// Print results to stdout.
pub fn print_results(outcome: &BatchOutcome, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&summary_json(outcome))?);
        }
        OutputFormat::Csv => {
            println!("id,dominant_frequency_hz,bandwidth_hz,total_energy");
            for entry in &outcome.entries {
                println!(
                    "{},{},{},{}",
                    entry.id,
                    entry.spectrum.dominant_frequency.0,
                    entry.spectrum.bandwidth.0,
                    entry.spectrum.total_energy
                );
            }
        }
        OutputFormat::Text => {
            println!("\n=== Waveform Analysis ===\n");
            for entry in &outcome.entries {
                println!("{} ({})", entry.id, entry.waveform.kind().display_name());
                println!("  Dominant:  {:.3} Hz", entry.spectrum.dominant_frequency.0);
                println!("  Bandwidth: {:.3} Hz", entry.spectrum.bandwidth.0);
                println!("  Energy:    {:.4e}", entry.spectrum.total_energy);
            }
            if !outcome.failures.is_empty() {
                println!("\nFailed:");
                for (id, err) in &outcome.failures {
                    println!("  {}: {}", id, err);
                }
            }
            println!();
        }
    }
    Ok(())
}

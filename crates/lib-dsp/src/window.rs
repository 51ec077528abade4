//! Windowing functions for spectral analysis.
//!
//! A window tapers the analysis record before the transform to reduce
//! spectral leakage from a truncated signal. TEM pulses that decay to zero
//! inside the analysis window are usually analyzed unwindowed
//! ([`WindowKind::Rectangular`]); periodic bipolar trains benefit from a
//! taper.

use lib_types::WindowKind;
use std::f64::consts::PI;

/// Compute the zeroth-order modified Bessel function of the first kind, I_0(x).
///
/// Uses the polynomial approximation for efficiency.
fn bessel_i0(x: f64) -> f64 {
    let ax = x.abs();

    if ax < 3.75 {
        // Polynomial approximation for small arguments
        let t = (x / 3.75).powi(2);
        1.0 + t * (3.5156229
            + t * (3.0899424
                + t * (1.2067492
                    + t * (0.2659732
                        + t * (0.0360768 + t * 0.0045813)))))
    } else {
        // Asymptotic expansion for large arguments
        let t = 3.75 / ax;
        (ax.exp() / ax.sqrt())
            * (0.39894228
                + t * (0.01328592
                    + t * (0.00225319
                        + t * (-0.00157565
                            + t * (0.00916281
                                + t * (-0.02057706
                                    + t * (0.02635537
                                        + t * (-0.01647633 + t * 0.00392377))))))))
    }
}

/// Generate symmetric window coefficients for a given window kind and length.
///
/// # Arguments
///
/// * `kind` - Window function to generate
/// * `length` - Number of points in the window
///
/// # Returns
///
/// Vector of window coefficients, length `length`.
pub fn generate_window(kind: WindowKind, length: usize) -> Vec<f64> {
    if length == 0 {
        return Vec::new();
    }
    if length == 1 {
        return vec![1.0];
    }

    let n = length as f64;
    let mut window = Vec::with_capacity(length);

    match kind {
        WindowKind::Rectangular => {
            window.resize(length, 1.0);
        }

        WindowKind::Hann => {
            for i in 0..length {
                let x = i as f64 / (n - 1.0);
                window.push(0.5 * (1.0 - (2.0 * PI * x).cos()));
            }
        }

        WindowKind::Hamming => {
            for i in 0..length {
                let x = i as f64 / (n - 1.0);
                window.push(0.54 - 0.46 * (2.0 * PI * x).cos());
            }
        }

        WindowKind::Blackman => {
            for i in 0..length {
                let x = i as f64 / (n - 1.0);
                window.push(
                    0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos(),
                );
            }
        }

        WindowKind::Kaiser { beta } => {
            let denom = bessel_i0(beta);
            for i in 0..length {
                let x = 2.0 * i as f64 / (n - 1.0) - 1.0; // Range [-1, 1]
                let arg = beta * (1.0 - x * x).max(0.0).sqrt();
                window.push(bessel_i0(arg) / denom);
            }
        }
    }

    window
}

/// Multiply `samples` by the window in place.
///
/// Rectangular windows leave the samples untouched.
pub fn apply_window(samples: &mut [f64], kind: WindowKind) {
    if matches!(kind, WindowKind::Rectangular) {
        return;
    }

    let window = generate_window(kind, samples.len());
    for (sample, w) in samples.iter_mut().zip(window) {
        *sample *= w;
    }
}

/// Check that window parameters are usable.
pub fn validate_window(kind: WindowKind) -> Result<(), String> {
    match kind {
        WindowKind::Kaiser { beta } if !beta.is_finite() || beta < 0.0 => {
            Err(format!("Kaiser beta must be finite and >= 0, got {}", beta))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bessel_i0() {
        // I_0(0) = 1
        assert!((bessel_i0(0.0) - 1.0).abs() < 1e-10);

        // I_0(1) ≈ 1.266
        assert!((bessel_i0(1.0) - 1.266).abs() < 0.001);

        // I_0(3) ≈ 4.881
        assert!((bessel_i0(3.0) - 4.881).abs() < 0.001);

        // Symmetry: I_0(-x) = I_0(x)
        assert!((bessel_i0(-2.0) - bessel_i0(2.0)).abs() < 1e-10);
    }

    #[test]
    fn test_rectangular_window() {
        let window = generate_window(WindowKind::Rectangular, 10);
        assert_eq!(window.len(), 10);
        assert!(window.iter().all(|&w| (w - 1.0).abs() < 1e-10));
    }

    #[test]
    fn test_hann_window() {
        let window = generate_window(WindowKind::Hann, 65);

        // Hann window starts and ends at 0, peaks at the centre
        assert!(window[0].abs() < 1e-10);
        assert!(window[64].abs() < 1e-10);
        assert!((window[32] - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_kaiser_window_symmetry() {
        let window = generate_window(WindowKind::Kaiser { beta: 6.0 }, 65);

        assert!((window[32] - 1.0).abs() < 0.01);
        assert!(window[0] < 0.1);
        for i in 0..32 {
            assert!(
                (window[i] - window[64 - i]).abs() < 1e-10,
                "Asymmetry at index {}: {} vs {}",
                i,
                window[i],
                window[64 - i]
            );
        }
    }

    #[test]
    fn test_apply_window() {
        let mut samples = vec![2.0; 5];
        apply_window(&mut samples, WindowKind::Rectangular);
        assert_eq!(samples, vec![2.0; 5]);

        apply_window(&mut samples, WindowKind::Hann);
        assert!(samples[0].abs() < 1e-12);
        assert!((samples[2] - 2.0).abs() < 1e-12);
        assert!(samples[4].abs() < 1e-12);
    }

    #[test]
    fn test_validate_window() {
        assert!(validate_window(WindowKind::Kaiser { beta: 6.0 }).is_ok());
        assert!(validate_window(WindowKind::Kaiser { beta: -1.0 }).is_err());
        assert!(validate_window(WindowKind::Blackman).is_ok());
    }
}

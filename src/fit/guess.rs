//! Starting point for the Lorentzian fit, read off the measured spectrum.
//!
//! The estimates assume the resonance is the dominant feature of the data:
//! the largest magnitude belongs to the peak and the imaginary part shows a
//! single dispersive lobe pair. Multi-peak or noise-dominated spectra can give
//! a seed the solver cannot recover from.

use log::debug;
use num_complex::Complex64;

use super::lorentz::Lorentzian;
use crate::error::{ResonanceError, Result};

/// Estimate `[f0, A, γ, φ]` for a complex spectrum.
///
/// * `A` – peak-to-trough span of `|signal|`. The plain peak height fits worse
///   on real data, so the span is kept even though it overshoots on clean data.
/// * `γ` – distance between the frequencies of the imaginary-part maximum and minimum.
/// * `f0` – frequency at the integer midpoint index of those two extrema.
/// * `φ` – `phase_hint`, unchanged.
pub fn guess(frequency: &[f64], signal: &[Complex64], phase_hint: f64) -> Result<Lorentzian> {
    if frequency.len() != signal.len() {
        return Err(ResonanceError::DimensionMismatch {
            context: "initial guess",
            expected: frequency.len(),
            actual: signal.len(),
        });
    }
    if signal.is_empty() {
        return Err(ResonanceError::InsufficientData { needed: 1, got: 0 });
    }

    let magnitude: Vec<f64> = signal.iter().map(|z| z.norm()).collect();
    let (r_min, r_max) = arg_extrema(&magnitude);
    let amplitude = magnitude[r_max] - magnitude[r_min];

    let imag: Vec<f64> = signal.iter().map(|z| z.im).collect();
    let (im_min, im_max) = arg_extrema(&imag);
    let gamma = (frequency[im_max] - frequency[im_min]).abs();
    let f0 = frequency[(im_max + im_min) / 2];

    let seed = Lorentzian {
        f0,
        amplitude,
        gamma,
        phase: phase_hint,
    };
    debug!("initial guess: {seed:?}");
    Ok(seed)
}

/// Indices of the first minimum and first maximum.
fn arg_extrema(values: &[f64]) -> (usize, usize) {
    let mut lo = 0;
    let mut hi = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v < values[lo] {
            lo = i;
        }
        if v > values[hi] {
            hi = i;
        }
    }
    (lo, hi)
}

//! Time series → one-sided complex spectrum.

use log::{debug, warn};
use realfft::RealFftPlanner;
use serde::{Deserialize, Serialize};

use crate::data::filter::{filter_spectrum, FrequencyRange};
use crate::data::model::{Spectrum, TimeSeries};
use crate::error::{ResonanceError, Result};

/// Relative deviation of a sampling interval from `time[1] - time[0]` that
/// triggers a non-uniform sampling warning.
const UNIFORM_SAMPLING_TOLERANCE: f64 = 1e-6;

/// Sample window and frequency band applied by [`transform`].
///
/// Indices follow sequence-slicing rules: negative values count from the end
/// and out-of-range values are clamped. `freq_max == 0` selects the Nyquist
/// frequency of the windowed series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformWindow {
    pub start_index: isize,
    pub end_index: isize,
    pub freq_min: f64,
    pub freq_max: f64,
}

impl Default for TransformWindow {
    fn default() -> Self {
        Self {
            start_index: 0,
            end_index: -1,
            freq_min: 0.0,
            freq_max: 0.0,
        }
    }
}

impl TransformWindow {
    /// Every sample, every frequency bin.
    pub fn full() -> Self {
        Self {
            end_index: isize::MAX,
            ..Self::default()
        }
    }

    /// Half-open sample range `[start, end)` for a series of `len` samples.
    pub fn resolve(&self, len: usize) -> std::ops::Range<usize> {
        let start = resolve_index(self.start_index, len);
        let end = resolve_index(self.end_index, len);
        start..end.max(start)
    }
}

fn resolve_index(index: isize, len: usize) -> usize {
    if index < 0 {
        len.saturating_sub(index.unsigned_abs())
    } else {
        index.unsigned_abs().min(len)
    }
}

/// Transform a [`TimeSeries`]. See [`transform`].
pub fn transform_series(series: &TimeSeries, window: &TransformWindow) -> Result<Spectrum> {
    transform(&series.time, &series.signal, window)
}

/// One-sided DFT of the real signal inside `window`, filtered to its band.
///
/// The windowed series of `N` samples yields `N / 2 + 1` bins spaced
/// `1 / (N·Δt)` apart, with `Δt = time[1] - time[0]`. Only the bins with
/// `freq_min ≤ f ≤ freq_max` are returned, in ascending order.
pub fn transform(time: &[f64], signal: &[f64], window: &TransformWindow) -> Result<Spectrum> {
    if time.len() != signal.len() {
        return Err(ResonanceError::DimensionMismatch {
            context: "time-domain signal",
            expected: time.len(),
            actual: signal.len(),
        });
    }

    let range = window.resolve(signal.len());
    let n = range.len();
    if n < 2 {
        return Err(ResonanceError::InsufficientData { needed: 2, got: n });
    }

    let dt = time[1] - time[0];
    if !(dt.is_finite() && dt > 0.0) {
        return Err(ResonanceError::InvalidSampling { dt });
    }
    warn_if_non_uniform(&time[range.clone()], dt);

    let mut input = signal[range].to_vec();
    let fft = RealFftPlanner::<f64>::new().plan_fft_forward(n);
    let mut buffer = fft.make_output_vec();
    fft.process(&mut input, &mut buffer)
        .map_err(|_| ResonanceError::DimensionMismatch {
            context: "real FFT buffers",
            expected: n / 2 + 1,
            actual: buffer.len(),
        })?;

    let step = 1.0 / (n as f64 * dt);
    let frequency: Vec<f64> = (0..buffer.len()).map(|k| k as f64 * step).collect();
    let nyquist = frequency.last().copied().unwrap_or(0.0);
    let band = FrequencyRange::new(
        window.freq_min,
        if window.freq_max == 0.0 {
            nyquist
        } else {
            window.freq_max
        },
    );
    debug!(
        "transform: {n} samples, dt = {dt:e} s, {} bins, band {:.4}..{:.4} Hz",
        frequency.len(),
        band.min,
        band.max
    );

    Ok(filter_spectrum(&Spectrum::from_aligned(frequency, buffer), band))
}

fn warn_if_non_uniform(time: &[f64], dt: f64) {
    let worst = time
        .windows(2)
        .map(|w| ((w[1] - w[0]) - dt).abs() / dt)
        .fold(0.0_f64, f64::max);
    if worst > UNIFORM_SAMPLING_TOLERANCE {
        warn!(
            "non-uniform sampling: interval deviates from dt = {dt:e} s by {:.2e} (relative)",
            worst
        );
    }
}

use std::fmt;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::{ResonanceError, Result};

// ---------------------------------------------------------------------------
// SourceKind – which file layout a record was read from
// ---------------------------------------------------------------------------

/// The two measurement layouts produced by the station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Swept-frequency lock-in output: `{frequency, X, Y, R, φ}` columns.
    #[default]
    Spectral,
    /// Free induction decay: `{time, signal}` columns.
    TimeDomain,
}

impl SourceKind {
    /// Whether data of this kind must pass through the spectral transform
    /// before it can be fitted.
    pub fn requires_transform(self) -> bool {
        matches!(self, SourceKind::TimeDomain)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Spectral => write!(f, "spectral"),
            SourceKind::TimeDomain => write!(f, "time-domain"),
        }
    }
}

// ---------------------------------------------------------------------------
// Measurement – raw columns as read from disk
// ---------------------------------------------------------------------------

/// Lock-in columns of a swept-frequency measurement. All vectors share one length.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralColumns {
    pub frequency: Vec<f64>,
    /// In-phase component X.
    pub in_phase: Vec<f64>,
    /// Quadrature component Y.
    pub quadrature: Vec<f64>,
    /// Magnitude R as recorded by the instrument.
    pub magnitude: Vec<f64>,
    /// Phase as recorded by the instrument.
    pub phase: Vec<f64>,
}

impl SpectralColumns {
    pub fn new(
        frequency: Vec<f64>,
        in_phase: Vec<f64>,
        quadrature: Vec<f64>,
        magnitude: Vec<f64>,
        phase: Vec<f64>,
    ) -> Result<Self> {
        let n = frequency.len();
        for (context, len) in [
            ("in-phase column", in_phase.len()),
            ("quadrature column", quadrature.len()),
            ("magnitude column", magnitude.len()),
            ("phase column", phase.len()),
        ] {
            check_len(context, n, len)?;
        }
        Ok(Self {
            frequency,
            in_phase,
            quadrature,
            magnitude,
            phase,
        })
    }

    /// Build columns from X and Y alone, deriving R and φ (radians).
    pub fn from_quadratures(
        frequency: Vec<f64>,
        in_phase: Vec<f64>,
        quadrature: Vec<f64>,
    ) -> Result<Self> {
        check_len("quadrature column", in_phase.len(), quadrature.len())?;
        let magnitude = in_phase
            .iter()
            .zip(&quadrature)
            .map(|(x, y)| x.hypot(*y))
            .collect();
        let phase = in_phase
            .iter()
            .zip(&quadrature)
            .map(|(x, y)| y.atan2(*x))
            .collect();
        Self::new(frequency, in_phase, quadrature, magnitude, phase)
    }

    /// `X + iY` on the recorded frequency axis.
    pub fn to_spectrum(&self) -> Result<Spectrum> {
        let signal = self
            .in_phase
            .iter()
            .zip(&self.quadrature)
            .map(|(x, y)| Complex64::new(*x, *y))
            .collect();
        Spectrum::new(self.frequency.clone(), signal)
    }
}

/// A sampled time-domain signal.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    pub time: Vec<f64>,
    pub signal: Vec<f64>,
}

impl TimeSeries {
    pub fn new(time: Vec<f64>, signal: Vec<f64>) -> Result<Self> {
        check_len("time-domain signal", time.len(), signal.len())?;
        Ok(Self { time, signal })
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

/// Raw measurement owned by a single record.
#[derive(Debug, Clone, PartialEq)]
pub enum Measurement {
    Spectral(SpectralColumns),
    TimeDomain(TimeSeries),
}

impl Measurement {
    pub fn kind(&self) -> SourceKind {
        match self {
            Measurement::Spectral(_) => SourceKind::Spectral,
            Measurement::TimeDomain(_) => SourceKind::TimeDomain,
        }
    }

    /// Number of samples (rows) in the measurement.
    pub fn len(&self) -> usize {
        match self {
            Measurement::Spectral(cols) => cols.frequency.len(),
            Measurement::TimeDomain(series) => series.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Spectrum – complex signal on a non-negative frequency axis
// ---------------------------------------------------------------------------

/// Complex spectrum, either transformed from a time series or read directly.
/// Immutable once built; the frequency axis and signal always share a length.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Spectrum {
    frequency: Vec<f64>,
    signal: Vec<Complex64>,
}

impl Spectrum {
    /// Fails unless the lengths match and `frequency` is non-negative and
    /// strictly ascending.
    pub fn new(frequency: Vec<f64>, signal: Vec<Complex64>) -> Result<Self> {
        check_len("spectrum", frequency.len(), signal.len())?;
        check_frequency_axis(&frequency)?;
        Ok(Self { frequency, signal })
    }

    /// Build from vectors the caller has gathered pairwise.
    pub(crate) fn from_aligned(frequency: Vec<f64>, signal: Vec<Complex64>) -> Self {
        debug_assert_eq!(frequency.len(), signal.len());
        debug_assert!(check_frequency_axis(&frequency).is_ok());
        Self { frequency, signal }
    }

    pub fn frequency(&self) -> &[f64] {
        &self.frequency
    }

    pub fn signal(&self) -> &[Complex64] {
        &self.signal
    }

    pub fn len(&self) -> usize {
        self.frequency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequency.is_empty()
    }

    /// Elementwise `|signal|`.
    pub fn magnitude(&self) -> Vec<f64> {
        self.signal.iter().map(|z| z.norm()).collect()
    }

    pub fn into_parts(self) -> (Vec<f64>, Vec<Complex64>) {
        (self.frequency, self.signal)
    }
}

// ---------------------------------------------------------------------------
// Filename metadata
// ---------------------------------------------------------------------------

/// Drive current encoded in a source identifier, in microamps.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum CurrentReading {
    Found(f64),
    #[default]
    NotFound,
}

impl CurrentReading {
    /// Numeric view used by tables and plots: `NaN` when absent.
    pub fn value_or_nan(self) -> f64 {
        match self {
            CurrentReading::Found(v) => v,
            CurrentReading::NotFound => f64::NAN,
        }
    }

    pub fn is_found(self) -> bool {
        matches!(self, CurrentReading::Found(_))
    }
}

impl From<Result<f64>> for CurrentReading {
    fn from(res: Result<f64>) -> Self {
        match res {
            Ok(v) => CurrentReading::Found(v),
            Err(_) => CurrentReading::NotFound,
        }
    }
}

impl fmt::Display for CurrentReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CurrentReading::Found(v) => write!(f, "{v} uA"),
            CurrentReading::NotFound => write!(f, "<no current>"),
        }
    }
}

/// Wall-clock stamp encoded in a file name: day of month and time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MeasurementTime {
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl MeasurementTime {
    /// Hours elapsed since `start`. Negative when `self` precedes `start`.
    pub fn hours_since(&self, start: &MeasurementTime) -> f64 {
        let delta = |a: u32, b: u32| a as f64 - b as f64;
        delta(self.day, start.day) * 24.0
            + delta(self.hour, start.hour)
            + delta(self.minute, start.minute) / 60.0
            + delta(self.second, start.second) / 3600.0
    }
}

fn check_len(context: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(ResonanceError::DimensionMismatch {
            context,
            expected,
            actual,
        });
    }
    Ok(())
}

fn check_frequency_axis(frequency: &[f64]) -> Result<()> {
    let mut previous: Option<f64> = None;
    for (index, &f) in frequency.iter().enumerate() {
        if f.is_nan() || f < 0.0 || previous.is_some_and(|p| f <= p) {
            return Err(ResonanceError::InvalidFrequencyAxis {
                index,
                frequency: f,
            });
        }
        previous = Some(f);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spectrum_rejects_length_mismatch() {
        let err = Spectrum::new(vec![1.0, 2.0], vec![Complex64::new(0.0, 0.0)]).unwrap_err();
        assert!(matches!(
            err,
            ResonanceError::DimensionMismatch {
                expected: 2,
                actual: 1,
                ..
            }
        ));
    }

    #[test]
    fn spectrum_rejects_descending_axis() {
        let signal = vec![Complex64::new(1.0, 0.0); 3];
        let err = Spectrum::new(vec![3.0, 2.0, 1.0], signal.clone()).unwrap_err();
        assert_eq!(
            err,
            ResonanceError::InvalidFrequencyAxis {
                index: 1,
                frequency: 2.0
            }
        );
        let repeated = Spectrum::new(vec![1.0, 1.0, 2.0], signal).unwrap_err();
        assert!(matches!(repeated, ResonanceError::InvalidFrequencyAxis { index: 1, .. }));
    }

    #[test]
    fn spectrum_rejects_negative_frequency() {
        let signal = vec![Complex64::new(0.0, 1.0); 3];
        let err = Spectrum::new(vec![-0.5, 0.0, 0.5], signal).unwrap_err();
        assert!(matches!(err, ResonanceError::InvalidFrequencyAxis { index: 0, .. }));
    }

    #[test]
    fn descending_lock_in_sweep_is_not_a_spectrum() {
        let cols = SpectralColumns::from_quadratures(
            vec![5.2, 5.1, 5.0],
            vec![1.0, 2.0, 1.0],
            vec![0.0, 1.0, 0.0],
        )
        .unwrap();
        assert!(matches!(
            cols.to_spectrum(),
            Err(ResonanceError::InvalidFrequencyAxis { .. })
        ));
    }

    #[test]
    fn spectral_columns_build_complex_signal() {
        let cols =
            SpectralColumns::from_quadratures(vec![1.0, 2.0], vec![3.0, 0.0], vec![4.0, -1.0])
                .unwrap();
        assert_eq!(cols.magnitude, vec![5.0, 1.0]);
        let spectrum = cols.to_spectrum().unwrap();
        assert_eq!(spectrum.signal()[0], Complex64::new(3.0, 4.0));
        assert_eq!(spectrum.magnitude(), vec![5.0, 1.0]);
    }

    #[test]
    fn missing_current_reads_as_nan() {
        assert!(CurrentReading::NotFound.value_or_nan().is_nan());
        assert_eq!(CurrentReading::Found(-12.0).value_or_nan(), -12.0);
    }

    #[test]
    fn hours_since_start() {
        let start = MeasurementTime {
            day: 23,
            hour: 18,
            minute: 0,
            second: 0,
        };
        let later = MeasurementTime {
            day: 24,
            hour: 1,
            minute: 30,
            second: 0,
        };
        assert!((later.hours_since(&start) - 7.5).abs() < 1e-12);
    }
}

use std::fmt;
use std::path::Path;

use anyhow::Context;
use log::{info, warn};
use num_complex::Complex64;

use crate::data::loader::{load_measurement, parse_current};
use crate::data::model::{CurrentReading, Measurement, SourceKind, Spectrum};
use crate::error::{ResonanceError, Result};
use crate::fit::engine::{fit_spectrum, FitOptions, FitResult};
use crate::transform::{transform_series, TransformWindow};

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Where a record is in `Created → Read → (Transformed) → Fitted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStage {
    Created,
    Read,
    Transformed,
    Fitted,
}

impl fmt::Display for RecordStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordStage::Created => write!(f, "created"),
            RecordStage::Read => write!(f, "read"),
            RecordStage::Transformed => write!(f, "transformed"),
            RecordStage::Fitted => write!(f, "fitted"),
        }
    }
}

/// Data held in each stage. Later stages keep everything earlier ones had.
#[derive(Debug, Clone)]
enum RecordState {
    Created,
    Read(Measurement),
    Transformed {
        measurement: Measurement,
        spectrum: Spectrum,
    },
    Fitted {
        measurement: Measurement,
        spectrum: Spectrum,
        fit: FitResult,
    },
}

// ---------------------------------------------------------------------------
// ResonanceRecord
// ---------------------------------------------------------------------------

/// One measurement file and everything derived from it.
///
/// Spectral measurements can be fitted straight after [`read`](Self::read);
/// time-domain (FID) measurements need a [`transform`](Self::transform) first.
/// Fitted-parameter accessors fail with [`ResonanceError::NotFitted`] until a
/// fit has succeeded.
#[derive(Debug, Clone)]
pub struct ResonanceRecord {
    source_id: String,
    current: CurrentReading,
    state: RecordState,
}

impl ResonanceRecord {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            current: CurrentReading::NotFound,
            state: RecordState::Created,
        }
    }

    /// Create and read in one step.
    pub fn from_measurement(source_id: impl Into<String>, measurement: Measurement) -> Result<Self> {
        let mut record = Self::new(source_id);
        record.read(measurement)?;
        Ok(record)
    }

    /// Load `path` as `kind` and read it; the path doubles as source id.
    pub fn open(path: &Path, kind: SourceKind) -> anyhow::Result<Self> {
        let measurement = load_measurement(path, kind)?;
        Self::from_measurement(path.to_string_lossy(), measurement)
            .with_context(|| format!("reading {}", path.display()))
    }

    /// `Created → Read`. Also picks up the drive current from the source id.
    pub fn read(&mut self, measurement: Measurement) -> Result<()> {
        if !matches!(self.state, RecordState::Created) {
            return Err(self.invalid("read a measurement"));
        }
        self.current = CurrentReading::from(parse_current(&self.source_id));
        if !self.current.is_found() {
            warn!("{}: no drive current in source id, using NaN", self.source_id);
        }
        info!(
            "{}: read {} samples of {} data",
            self.source_id,
            measurement.len(),
            measurement.kind()
        );
        self.state = RecordState::Read(measurement);
        Ok(())
    }

    /// `Read | Transformed → Transformed` for time-domain data.
    ///
    /// A fitted record is final apart from re-fitting, so it is rejected here.
    pub fn transform(&mut self, window: &TransformWindow) -> Result<()> {
        if matches!(self.state, RecordState::Fitted { .. }) {
            return Err(self.invalid("transform a fitted record"));
        }
        let series = match self.measurement()? {
            Measurement::TimeDomain(series) => series,
            Measurement::Spectral(_) => return Err(self.invalid("transform spectral data")),
        };
        let spectrum = transform_series(series, window)?;
        if let Some(measurement) = self.take_measurement() {
            self.state = RecordState::Transformed {
                measurement,
                spectrum,
            };
        }
        Ok(())
    }

    /// Fit with a seed estimated from the data. See [`fit_with_seed`](Self::fit_with_seed).
    pub fn fit(&mut self, options: &FitOptions) -> Result<&FitResult> {
        self.fit_with_seed(None, options)
    }

    /// `Read (spectral) | Transformed | Fitted → Fitted`.
    ///
    /// On failure the record stays in its previous stage.
    pub fn fit_with_seed(
        &mut self,
        seed: Option<&[f64]>,
        options: &FitOptions,
    ) -> Result<&FitResult> {
        let spectrum = match &self.state {
            RecordState::Created => return Err(self.invalid("fit")),
            RecordState::Read(Measurement::Spectral(cols)) => cols.to_spectrum()?,
            RecordState::Read(Measurement::TimeDomain(_)) => {
                return Err(self.invalid("fit untransformed time-domain data"))
            }
            RecordState::Transformed { spectrum, .. } | RecordState::Fitted { spectrum, .. } => {
                spectrum.clone()
            }
        };

        let fit = fit_spectrum(&spectrum, seed, options)?;
        info!(
            "{}: f0 = {:.6} Hz, gamma = {:.6} Hz ({} iterations)",
            self.source_id,
            fit.parameters[0],
            fit.parameters[2],
            fit.iterations
        );
        if let Some(measurement) = self.take_measurement() {
            self.state = RecordState::Fitted {
                measurement,
                spectrum,
                fit,
            };
        }
        self.fit_result()
    }

    // -- state queries --

    pub fn stage(&self) -> RecordStage {
        match self.state {
            RecordState::Created => RecordStage::Created,
            RecordState::Read(_) => RecordStage::Read,
            RecordState::Transformed { .. } => RecordStage::Transformed,
            RecordState::Fitted { .. } => RecordStage::Fitted,
        }
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Kind of the measurement, once one has been read.
    pub fn kind(&self) -> Option<SourceKind> {
        self.measurement().ok().map(Measurement::kind)
    }

    /// Whether a transform is needed before fitting.
    pub fn requires_transform(&self) -> bool {
        self.kind().is_some_and(SourceKind::requires_transform)
    }

    pub fn current(&self) -> CurrentReading {
        self.current
    }

    /// Drive current in microamps, `NaN` when the source id carried none.
    pub fn current_ua(&self) -> f64 {
        self.current.value_or_nan()
    }

    pub fn measurement(&self) -> Result<&Measurement> {
        match &self.state {
            RecordState::Created => Err(self.invalid("access the measurement")),
            RecordState::Read(measurement)
            | RecordState::Transformed { measurement, .. }
            | RecordState::Fitted { measurement, .. } => Ok(measurement),
        }
    }

    /// Spectrum that was (or will be) fitted: the transform output for FID
    /// data, `X + iY` for spectral data.
    pub fn spectrum(&self) -> Result<Spectrum> {
        match &self.state {
            RecordState::Transformed { spectrum, .. } | RecordState::Fitted { spectrum, .. } => {
                Ok(spectrum.clone())
            }
            RecordState::Read(Measurement::Spectral(cols)) => cols.to_spectrum(),
            _ => Err(self.invalid("access the spectrum")),
        }
    }

    // -- fitted values --

    pub fn fit_result(&self) -> Result<&FitResult> {
        match &self.state {
            RecordState::Fitted { fit, .. } => Ok(fit),
            _ => Err(ResonanceError::NotFitted),
        }
    }

    pub fn parameter(&self, index: usize) -> Result<f64> {
        self.fit_result()?.parameter(index)
    }

    pub fn parameter_error(&self, index: usize) -> Result<f64> {
        self.fit_result()?.standard_error(index)
    }

    /// Resonant frequency f0 in Hz.
    pub fn resonant_frequency(&self) -> Result<f64> {
        self.parameter(0)
    }

    pub fn resonant_frequency_error(&self) -> Result<f64> {
        self.parameter_error(0)
    }

    /// Half-width γ in Hz.
    pub fn linewidth(&self) -> Result<f64> {
        self.parameter(2)
    }

    pub fn linewidth_error(&self) -> Result<f64> {
        self.parameter_error(2)
    }

    pub fn t2_seconds(&self) -> Result<f64> {
        self.fit_result()?.t2_seconds()
    }

    pub fn t2_minutes(&self) -> Result<f64> {
        self.fit_result()?.t2_minutes()
    }

    /// Fitted model evaluated on the fitted frequency axis.
    pub fn fitted_signal(&self) -> Result<Vec<Complex64>> {
        match &self.state {
            RecordState::Fitted { spectrum, fit, .. } => {
                Ok(spectrum.frequency().iter().map(|&f| fit.eval(f)).collect())
            }
            _ => Err(ResonanceError::NotFitted),
        }
    }

    /// Level shift of a step-response FID: mean of the last 20% of the
    /// signal minus the mean of the 30%–50% slice.
    pub fn signal_gap(&self) -> Result<f64> {
        match self.measurement()? {
            Measurement::TimeDomain(series) => signal_gap(&series.signal),
            Measurement::Spectral(_) => Err(self.invalid("measure the signal gap of spectral data")),
        }
    }

    fn invalid(&self, operation: &'static str) -> ResonanceError {
        ResonanceError::InvalidState {
            operation,
            stage: self.stage(),
        }
    }

    fn take_measurement(&mut self) -> Option<Measurement> {
        match std::mem::replace(&mut self.state, RecordState::Created) {
            RecordState::Created => None,
            RecordState::Read(measurement)
            | RecordState::Transformed { measurement, .. }
            | RecordState::Fitted { measurement, .. } => Some(measurement),
        }
    }
}

/// `mean(signal[80%..]) − mean(signal[30%..50%])`.
pub fn signal_gap(signal: &[f64]) -> Result<f64> {
    let n = signal.len();
    let tail = &signal[n * 4 / 5..];
    let middle = &signal[n * 3 / 10..n / 2];
    if tail.is_empty() || middle.is_empty() {
        return Err(ResonanceError::InsufficientData { needed: 2, got: n });
    }
    let mean = |xs: &[f64]| xs.iter().sum::<f64>() / xs.len() as f64;
    Ok(mean(tail) - mean(middle))
}

//! Complex-Lorentzian resonance fitting for magnetometer measurements.
//!
//! A measurement is either a lock-in frequency sweep (in-phase and
//! quadrature columns) or a free-induction decay sampled in time. FIDs are
//! Fourier transformed first; both end up as a complex [`Spectrum`] that is
//! fitted with a complex Lorentzian, optionally on a linear background.
//!
//! ```no_run
//! use std::path::Path;
//! use resofit::{AnalysisConfig, ResonanceRecord, SourceKind};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = AnalysisConfig::default();
//! let mut record = ResonanceRecord::open(Path::new("Curr_150_uA.dat"), SourceKind::Spectral)?;
//! record.fit(&config.fit_options())?;
//! println!("f0 = {} ± {}", record.resonant_frequency()?, record.resonant_frequency_error()?);
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod config;
pub mod data;
pub mod error;
pub mod fit;
pub mod record;
pub mod transform;

pub use config::AnalysisConfig;
pub use data::model::{CurrentReading, Measurement, SourceKind, Spectrum};
pub use error::{ResonanceError, Result};
pub use fit::engine::{fit, FitOptions, FitResult, SolverOptions};
pub use fit::lorentz::ModelVariant;
pub use record::{RecordStage, ResonanceRecord};
pub use transform::{transform, TransformWindow};

//! Error types for the numeric core and the resonance record.

use thiserror::Error;

use crate::record::RecordStage;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResonanceError {
    #[error("insufficient data: need at least {needed} samples, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("fit diverged after {iterations} iterations: {reason}")]
    FitDiverged { iterations: usize, reason: String },

    #[error("resonance has not been fitted yet")]
    NotFitted,

    #[error("division by zero while computing {quantity}")]
    DivisionByZero { quantity: &'static str },

    #[error("no '{pattern}' metadata in '{source_id}'")]
    MetadataNotFound {
        pattern: &'static str,
        source_id: String,
    },

    #[error("cannot {operation} while record is {stage}")]
    InvalidState {
        operation: &'static str,
        stage: RecordStage,
    },

    #[error("parameter index {index} out of range for {len} fitted parameters")]
    ParameterIndex { index: usize, len: usize },

    #[error("degenerate covariance: variance of parameter {index} is {variance}")]
    DegenerateCovariance { index: usize, variance: f64 },

    #[error("frequency axis must be non-negative and strictly ascending, found {frequency} at index {index}")]
    InvalidFrequencyAxis { index: usize, frequency: f64 },

    #[error("invalid sampling interval {dt}")]
    InvalidSampling { dt: f64 },
}

pub type Result<T> = std::result::Result<T, ResonanceError>;

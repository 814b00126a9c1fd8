//! Analysis settings shared by the batch driver and library callers.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::model::SourceKind;
use crate::fit::engine::{FitOptions, SolverOptions};
use crate::fit::lorentz::ModelVariant;
use crate::transform::TransformWindow;

/// Everything needed to turn a directory of files into fit results.
///
/// Every field has a default, so `{}` is a valid configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub source_kind: SourceKind,
    /// Model variant; `None` picks the usual one for `source_kind`.
    pub model: Option<ModelVariant>,
    pub phase_hint: f64,
    /// Only used for time-domain sources.
    pub window: TransformWindow,
    pub solver: SolverOptions,
    /// Data-file extension, without the dot.
    pub extension: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            source_kind: SourceKind::Spectral,
            model: None,
            phase_hint: 0.0,
            window: TransformWindow::default(),
            solver: SolverOptions::default(),
            extension: "dat".to_string(),
        }
    }
}

impl AnalysisConfig {
    /// Read a JSON configuration file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("invalid analysis config")
    }

    /// Lock-in sweeps carry an instrument background, FIDs do not.
    pub fn model_variant(&self) -> ModelVariant {
        self.model.unwrap_or(match self.source_kind {
            SourceKind::Spectral => ModelVariant::LinearBackground,
            SourceKind::TimeDomain => ModelVariant::Plain,
        })
    }

    pub fn fit_options(&self) -> FitOptions {
        FitOptions {
            variant: self.model_variant(),
            phase_hint: self.phase_hint,
            solver: self.solver,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        let cfg = AnalysisConfig::from_json_str("{}").unwrap();
        assert_eq!(cfg, AnalysisConfig::default());
        assert_eq!(cfg.model_variant(), ModelVariant::LinearBackground);
        assert_eq!(cfg.window.end_index, -1);
        assert_eq!(cfg.solver.max_iterations, 200);
    }

    #[test]
    fn time_domain_defaults_to_plain_model() {
        let cfg = AnalysisConfig::from_json_str(
            r#"{ "source_kind": "time_domain", "window": { "start_index": 101, "freq_max": 12.5 } }"#,
        )
        .unwrap();
        assert_eq!(cfg.source_kind, SourceKind::TimeDomain);
        assert_eq!(cfg.model_variant(), ModelVariant::Plain);
        assert_eq!(cfg.window.start_index, 101);
        assert_eq!(cfg.window.end_index, -1);
        assert_eq!(cfg.window.freq_max, 12.5);
    }

    #[test]
    fn explicit_model_wins() {
        let cfg = AnalysisConfig::from_json_str(
            r#"{ "model": "plain", "phase_hint": 0.5, "solver": { "max_iterations": 50 } }"#,
        )
        .unwrap();
        let opts = cfg.fit_options();
        assert_eq!(opts.variant, ModelVariant::Plain);
        assert_eq!(opts.phase_hint, 0.5);
        assert_eq!(opts.solver.max_iterations, 50);
        assert_eq!(opts.solver.ftol, SolverOptions::default().ftol);
    }

    #[test]
    fn unknown_source_kind_is_rejected() {
        assert!(AnalysisConfig::from_json_str(r#"{ "source_kind": "audio" }"#).is_err());
    }
}

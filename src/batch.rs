//! Fit every file of a measurement series.
//!
//! Files are independent: each gets its own [`ResonanceRecord`], fitted on
//! the rayon pool. Results are collected and then merged, so no shared state
//! is written during the fan-out. A failing file is reported with its path
//! and does not stop the rest of the batch.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{error, info};
use rayon::prelude::*;
use serde::Serialize;

use crate::config::AnalysisConfig;
use crate::data::loader::{list_data_files, sort_by_current};
use crate::record::ResonanceRecord;

/// One CSV row per fitted file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitSummary {
    pub file: String,
    pub current_ua: f64,
    pub f0_hz: f64,
    pub f0_err_hz: f64,
    pub gamma_hz: f64,
    pub gamma_err_hz: f64,
    pub amplitude: f64,
    pub phase_rad: f64,
    pub t2_s: Option<f64>,
    pub rss: f64,
    pub iterations: usize,
}

#[derive(Debug, Clone)]
pub struct BatchFailure {
    pub file: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Successful fits, in input order.
    pub summaries: Vec<FitSummary>,
    pub failures: Vec<BatchFailure>,
}

/// Read, transform if needed, and fit a single file.
pub fn analyze_file(path: &Path, config: &AnalysisConfig) -> Result<FitSummary> {
    let mut record = ResonanceRecord::open(path, config.source_kind)?;
    if record.requires_transform() {
        record.transform(&config.window)?;
    }
    let fit = record.fit(&config.fit_options())?;
    let amplitude = fit.parameters[1];
    let phase_rad = fit.parameters[3];
    let rss = fit.residual_sum_squares;
    let iterations = fit.iterations;

    Ok(FitSummary {
        file: path.display().to_string(),
        current_ua: record.current_ua(),
        f0_hz: record.resonant_frequency()?,
        f0_err_hz: record.resonant_frequency_error()?,
        gamma_hz: record.linewidth()?,
        gamma_err_hz: record.linewidth_error()?,
        amplitude,
        phase_rad,
        t2_s: record.t2_seconds().ok(),
        rss,
        iterations,
    })
}

/// Fit all `paths` in parallel. Output order follows input order.
pub fn analyze_files(paths: &[PathBuf], config: &AnalysisConfig) -> BatchReport {
    let outcomes: Vec<(PathBuf, Result<FitSummary>)> = paths
        .par_iter()
        .map(|p| (p.clone(), analyze_file(p, config)))
        .collect();

    let mut report = BatchReport::default();
    for (file, outcome) in outcomes {
        match outcome {
            Ok(summary) => report.summaries.push(summary),
            Err(err) => {
                error!("{}: {err:#}", file.display());
                report.failures.push(BatchFailure {
                    file,
                    error: format!("{err:#}"),
                });
            }
        }
    }
    info!(
        "batch finished: {} fitted, {} failed",
        report.summaries.len(),
        report.failures.len()
    );
    report
}

/// Fit every data file in `dir`, ordered by rising drive current.
pub fn analyze_directory(dir: &Path, config: &AnalysisConfig) -> Result<BatchReport> {
    let files = list_data_files(dir, &config.extension)?;
    info!("{}: {} data files", dir.display(), files.len());
    let ordered: Vec<PathBuf> = sort_by_current(files).into_iter().map(|(p, _)| p).collect();
    Ok(analyze_files(&ordered, config))
}

/// Write summaries as CSV with a header row.
pub fn write_summary<W: io::Write>(writer: W, summaries: &[FitSummary]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for row in summaries {
        csv.serialize(row).context("writing summary row")?;
    }
    csv.flush().context("flushing summary")?;
    Ok(())
}

pub fn write_summary_csv(path: &Path, summaries: &[FitSummary]) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    write_summary(file, summaries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(file: &str, f0: f64) -> FitSummary {
        FitSummary {
            file: file.to_string(),
            current_ua: f64::NAN,
            f0_hz: f0,
            f0_err_hz: 0.01,
            gamma_hz: 0.2,
            gamma_err_hz: 0.001,
            amplitude: 1.0,
            phase_rad: 0.0,
            t2_s: None,
            rss: 0.5,
            iterations: 7,
        }
    }

    #[test]
    fn csv_has_header_and_rows() {
        let mut out = Vec::new();
        write_summary(&mut out, &[summary("a.dat", 5.0), summary("b.dat", 5.5)]).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("file,current_ua,f0_hz"));
        assert!(lines[1].starts_with("a.dat,NaN,5.0"));
    }

    #[test]
    fn missing_files_become_failures() {
        let paths = vec![PathBuf::from("/nonexistent/one.dat"), PathBuf::from("/nonexistent/two.dat")];
        let report = analyze_files(&paths, &AnalysisConfig::default());
        assert!(report.summaries.is_empty());
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].file, paths[0]);
        assert!(report.failures[0].error.contains("one.dat"));
    }
}

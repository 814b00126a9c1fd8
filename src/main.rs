use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use log::info;

use resofit::batch::{analyze_directory, write_summary, write_summary_csv};
use resofit::{AnalysisConfig, ModelVariant, SourceKind};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    Spectral,
    TimeDomain,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModelArg {
    Plain,
    Background,
}

/// Fit every measurement file in a directory and tabulate the resonances.
#[derive(Debug, Parser)]
#[command(name = "resofit", version, about)]
struct Args {
    /// Directory holding the measurement files
    data_dir: PathBuf,

    /// JSON analysis config; command-line flags override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the summary CSV here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long, value_enum)]
    kind: Option<KindArg>,

    #[arg(long, value_enum)]
    model: Option<ModelArg>,

    /// Data-file extension, without the dot
    #[arg(long)]
    extension: Option<String>,
}

impl Args {
    fn analysis_config(&self) -> Result<AnalysisConfig> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::from_json_file(path)?,
            None => AnalysisConfig::default(),
        };
        if let Some(kind) = self.kind {
            config.source_kind = match kind {
                KindArg::Spectral => SourceKind::Spectral,
                KindArg::TimeDomain => SourceKind::TimeDomain,
            };
        }
        if let Some(model) = self.model {
            config.model = Some(match model {
                ModelArg::Plain => ModelVariant::Plain,
                ModelArg::Background => ModelVariant::LinearBackground,
            });
        }
        if let Some(ext) = &self.extension {
            config.extension = ext.clone();
        }
        Ok(config)
    }
}

fn run(args: &Args) -> Result<bool> {
    let config = args.analysis_config()?;
    info!(
        "analysing {} as {} with {} model",
        args.data_dir.display(),
        config.source_kind,
        config.model_variant()
    );

    let report = analyze_directory(&args.data_dir, &config)?;
    match &args.output {
        Some(path) => {
            write_summary_csv(path, &report.summaries)?;
            info!("wrote {} rows to {}", report.summaries.len(), path.display());
        }
        None => write_summary(std::io::stdout().lock(), &report.summaries)?,
    }

    for failure in &report.failures {
        eprintln!("failed: {}: {}", failure.file.display(), failure.error);
    }
    Ok(report.failures.is_empty())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

mod output;
mod settings;

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tablestitch_core::ExtractionReport;
use tablestitch_pdf::PdfPageSource;
use tablestitch_reconcile::TableExtractor;
use tokio::sync::Semaphore;
use tracing_subscriber::EnvFilter;

use output::ColorMode;
use settings::{ExtractionFlags, Settings};

/// Extract tables from PDFs, reconciling several backends and stitching
/// tables that continue across page breaks
#[derive(Parser)]
#[command(name = "tablestitch", version, about)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG applies otherwise
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract tables from one or more PDF files
    Extract {
        /// PDF files to process
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        flags: ExtractionFlags,

        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Summary)]
        format: Format,

        /// Write output to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Number of documents processed at once
        #[arg(short, long, default_value_t = 4)]
        jobs: usize,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// Report per-page border detection and the scanned-document check
    Classify {
        /// PDF file to inspect
        file: PathBuf,

        #[command(flatten)]
        flags: ExtractionFlags,

        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Summary)]
        format: Format,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// Print the effective configuration as TOML
    Config {
        #[command(flatten)]
        flags: ExtractionFlags,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Summary,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Extract {
            files,
            flags,
            format,
            output,
            jobs,
            no_color,
        } => {
            let color = ColorMode(!no_color && output.is_none() && format == Format::Summary);
            extract(files, &flags, format, output, jobs, color).await
        }
        Command::Classify {
            file,
            flags,
            format,
            no_color,
        } => classify(file, &flags, format, ColorMode(!no_color)).await,
        Command::Config { flags } => {
            let settings = Settings::load(&flags)?;
            print!("{}", settings.to_toml()?);
            Ok(())
        }
    }
}

/// Logs go to stderr so stdout stays clean for `--format json`.
fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[derive(Serialize)]
struct DocumentOutput {
    file: String,
    #[serde(flatten)]
    report: Option<ExtractionReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn extract(
    files: Vec<PathBuf>,
    flags: &ExtractionFlags,
    format: Format,
    output: Option<PathBuf>,
    jobs: usize,
    color: ColorMode,
) -> anyhow::Result<()> {
    for file in &files {
        if !file.exists() {
            anyhow::bail!("File not found: {}", file.display());
        }
    }

    let settings = Settings::load(flags)?;
    let extractor = Arc::new(TableExtractor::new(
        settings.config.clone(),
        settings.registry(),
    ));
    let semaphore = Arc::new(Semaphore::new(jobs.max(1)));

    let mut handles = Vec::with_capacity(files.len());
    for path in files {
        let extractor = Arc::clone(&extractor);
        let semaphore = Arc::clone(&semaphore);
        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await?;
            let task_path = path.clone();
            let report = tokio::task::spawn_blocking(move || {
                extractor.extract_document(&task_path, &PdfPageSource::new())
            })
            .await?;
            anyhow::Ok((path, report))
        }));
    }

    let mut writer: Box<dyn Write> = match &output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("cannot create {}", path.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    };

    let progress = if handles.len() > 1 {
        let bar = ProgressBar::new(handles.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.green} [{bar:40.green/dim}] {pos}/{len} {msg}")?
                .progress_chars("=> "),
        );
        bar
    } else {
        ProgressBar::hidden()
    };

    let mut totals = output::Totals::default();
    let mut documents = Vec::new();
    for handle in handles {
        let (path, result) = handle.await??;
        let name = display_name(&path);
        progress.inc(1);
        progress.set_message(name.clone());
        match result {
            Ok(report) => {
                tracing::info!(
                    file = %name,
                    tables = report.tables.len(),
                    warnings = report.warnings.len(),
                    "document done"
                );
                totals.add(&report);
                if format == Format::Summary {
                    progress.suspend(|| output::print_report(&mut *writer, &name, &report, color))?;
                }
                documents.push(DocumentOutput {
                    file: path.display().to_string(),
                    report: Some(report),
                    error: None,
                });
            }
            Err(e) => {
                let error = anyhow::Error::new(e);
                tracing::warn!(file = %name, error = %error, "document failed");
                totals.add_failure();
                if format == Format::Summary {
                    progress.suspend(|| output::print_failure(&mut *writer, &name, &error, color))?;
                }
                documents.push(DocumentOutput {
                    file: path.display().to_string(),
                    report: None,
                    error: Some(format!("{error:#}")),
                });
            }
        }
    }

    progress.finish_and_clear();

    match format {
        Format::Summary => {
            if documents.len() > 1 {
                output::print_totals(&mut *writer, &totals, color)?;
            }
        }
        Format::Json => {
            // A single successful document is written as the bare report
            let single = match documents.as_slice() {
                [DocumentOutput {
                    report: Some(report),
                    ..
                }] => Some(report),
                _ => None,
            };
            match single {
                Some(report) => serde_json::to_writer_pretty(&mut writer, report)?,
                None => serde_json::to_writer_pretty(&mut writer, &documents)?,
            }
            writeln!(writer)?;
        }
    }
    writer.flush()?;

    if let Some(path) = &output {
        eprintln!("Output written to {}", path.display());
    }
    if totals.failed > 0 {
        anyhow::bail!(
            "{} of {} documents could not be processed",
            totals.failed,
            totals.documents
        );
    }
    Ok(())
}

async fn classify(
    file: PathBuf,
    flags: &ExtractionFlags,
    format: Format,
    color: ColorMode,
) -> anyhow::Result<()> {
    if !file.exists() {
        anyhow::bail!("File not found: {}", file.display());
    }

    let settings = Settings::load(flags)?;
    let extractor = TableExtractor::new(settings.config.clone(), settings.registry());
    let task_path = file.clone();
    let classification = tokio::task::spawn_blocking(move || {
        extractor.classify_document(&task_path, &PdfPageSource::new())
    })
    .await??;

    let mut stdout = io::stdout().lock();
    match format {
        Format::Summary => {
            output::print_classification(&mut stdout, &display_name(&file), &classification, color)?
        }
        Format::Json => {
            serde_json::to_writer_pretty(&mut stdout, &classification)?;
            writeln!(stdout)?;
        }
    }
    Ok(())
}

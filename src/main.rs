// pdfmeta CLI - scan folders, show filename vs embedded metadata, apply fixes
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossterm::style::Stylize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use pdfmeta::config::clamp_workers;
use pdfmeta::{
    logging, ApplyReport, ApplyResult, BatchStatus, CancellationToken, Config, FileRecord, Normalization,
    ScanProgress, ScanReport, Session,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Compare PDF filenames with their embedded Author/Title and fix the metadata")]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Worker threads for reading metadata
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// exact, trim or trim-ignore-case
    #[arg(long, global = true)]
    normalization: Option<Normalization>,

    /// Config file (defaults to the user config dir)
    #[arg(long, global = true, env = "PDFMETA_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List every PDF under the folders with filename and embedded metadata side by side
    Scan {
        #[arg(required = true)]
        folders: Vec<PathBuf>,
        /// Only show rows whose metadata disagrees with the filename
        #[arg(long)]
        mismatches_only: bool,
        #[arg(long)]
        json: bool,
    },
    /// Write filename-derived Author/Title into the PDFs
    Apply {
        #[arg(required = true)]
        folders: Vec<PathBuf>,
        /// Only these files (default: every mismatch)
        #[arg(long = "only")]
        only: Vec<PathBuf>,
        /// Every scanned file, matching or not
        #[arg(long, conflicts_with = "only")]
        all: bool,
        /// Treat the filename as "Title - Author"
        #[arg(long)]
        swap: bool,
        /// Show what would be written without touching any file
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    logging::init(args.verbose)?;

    let mut config = match &args.config {
        Some(path) => {
            let mut config = Config::load_from(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?;
            config.apply_env_overrides()?;
            config
        }
        None => Config::load().context("Failed to load config")?,
    };
    if let Some(workers) = args.workers {
        config.scan.workers = clamp_workers(workers);
    }
    if let Some(normalization) = args.normalization {
        config.matching.normalization = normalization;
    }

    let mut session = Session::new(&config);
    match args.command {
        Commands::Scan {
            folders,
            mismatches_only,
            json,
        } => {
            let report = scan(&mut session, folders, json)?;
            if json {
                serde_json::to_writer_pretty(io::stdout().lock(), &report)?;
                println!();
            } else {
                print_records(&report.records, mismatches_only)?;
                print_scan_summary(&report);
            }
            Ok(exit_code(report.status()))
        }
        Commands::Apply {
            folders,
            only,
            all,
            swap,
            dry_run,
            json,
        } => {
            let scan_report = scan(&mut session, folders, json)?;
            let selection: Vec<PathBuf> = if !only.is_empty() {
                only.iter().map(|p| absolute(p)).collect()
            } else if all {
                session.records().iter().map(|r| r.path.clone()).collect()
            } else {
                session.mismatched_paths()
            };

            if swap {
                session.swap(&selection)?;
            }
            if dry_run {
                let pending: Vec<&FileRecord> = selection.iter().filter_map(|p| session.record(p)).collect();
                for record in pending {
                    let effective = record.effective();
                    println!(
                        "{}\n    author: {:?} -> {:?}\n    title:  {:?} -> {:?}",
                        record.path.display(),
                        record.embedded.author,
                        effective.author,
                        record.embedded.title,
                        effective.title
                    );
                }
                return Ok(exit_code(scan_report.status()));
            }

            let progress = ProgressLine::new(json);
            let report = session.apply(&selection, &CancellationToken::new(), |p| {
                progress.show("Writing", p.completed, p.total)
            });
            progress.finish();

            if json {
                serde_json::to_writer_pretty(io::stdout().lock(), &report)?;
                println!();
            } else {
                print_apply_report(&report);
            }
            Ok(exit_code(report.status()))
        }
    }
}

fn scan(session: &mut Session, folders: Vec<PathBuf>, quiet: bool) -> Result<ScanReport> {
    for folder in folders {
        session.add_folder(folder);
    }
    let progress = ProgressLine::new(quiet);
    let report = session.rescan(&CancellationToken::new(), |p: ScanProgress| {
        progress.show("Scanning", p.completed, p.total)
    });
    progress.finish();
    for error in &report.folder_errors {
        eprintln!("skipped folder {}: {}", error.path.display(), error.reason);
    }
    Ok(report)
}

fn absolute(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// 0 complete or empty, 2 partial or cancelled, 1 failed
fn exit_code(status: BatchStatus) -> ExitCode {
    match status {
        BatchStatus::Complete | BatchStatus::Empty => ExitCode::SUCCESS,
        BatchStatus::Partial | BatchStatus::Cancelled => ExitCode::from(2),
        BatchStatus::Failed => ExitCode::from(1),
    }
}

/// Single-line progress counter on stderr, only when stderr is a terminal
struct ProgressLine {
    enabled: bool,
}

impl ProgressLine {
    fn new(quiet: bool) -> Self {
        Self {
            enabled: !quiet && atty::is(atty::Stream::Stderr),
        }
    }

    fn show(&self, label: &str, completed: usize, total: usize) {
        if self.enabled {
            let mut stderr = io::stderr().lock();
            let _ = write!(stderr, "\r{} {}/{}", label, completed, total);
            let _ = stderr.flush();
        }
    }

    fn finish(&self) {
        if self.enabled {
            eprintln!();
        }
    }
}

const TITLE_WIDTH: usize = 32;
const AUTHOR_WIDTH: usize = 24;

fn fit(value: &str, width: usize) -> String {
    let count = value.chars().count();
    if count <= width {
        format!("{:<width$}", value, width = width)
    } else {
        let cut: String = value.chars().take(width.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

fn print_records(records: &[FileRecord], mismatches_only: bool) -> Result<()> {
    let color = atty::is(atty::Stream::Stdout);
    let mut out = io::stdout().lock();
    writeln!(
        out,
        "  {} {} {} {}",
        fit("Filename Title", TITLE_WIDTH),
        fit("Filename Author", AUTHOR_WIDTH),
        fit("Metadata Title", TITLE_WIDTH),
        fit("Metadata Author", AUTHOR_WIDTH)
    )?;
    for record in records.iter().filter(|r| r.mismatch || !mismatches_only) {
        let effective = record.effective();
        let row = format!(
            "{} {} {} {} {} {}",
            if record.mismatch { "≠" } else { " " },
            fit(&effective.title, TITLE_WIDTH),
            fit(&effective.author, AUTHOR_WIDTH),
            fit(&record.embedded.title, TITLE_WIDTH),
            fit(&record.embedded.author, AUTHOR_WIDTH),
            record.file_name()
        );
        if color && record.mismatch {
            writeln!(out, "{}", row.red())?;
        } else {
            writeln!(out, "{}", row)?;
        }
    }
    Ok(())
}

fn print_scan_summary(report: &ScanReport) {
    eprintln!(
        "{} files, {} mismatched, {} from cache, {} unreadable",
        report.records.len(),
        report.mismatches(),
        report.cache_hits,
        report.read_failures.len()
    );
}

fn print_apply_report(report: &ApplyReport) {
    for outcome in &report.outcomes {
        match &outcome.result {
            ApplyResult::Applied { metadata } => {
                println!("updated {} ({} / {})", outcome.path.display(), metadata.author, metadata.title)
            }
            ApplyResult::Failed { failure } => {
                println!("FAILED  {}: {}", outcome.path.display(), failure.reason)
            }
            ApplyResult::Skipped => println!("skipped {}", outcome.path.display()),
        }
    }
    let status = match report.status() {
        BatchStatus::Complete => "all files updated",
        BatchStatus::Partial => "some files could not be updated",
        BatchStatus::Failed => "no files could be updated",
        BatchStatus::Cancelled => "cancelled before finishing",
        BatchStatus::Empty => "nothing to update",
    };
    eprintln!(
        "Updated {} file(s), {} failed: {}",
        report.succeeded(),
        report.failures().count(),
        status
    );
}

// Worker pool scanner - discover PDFs, read metadata through the cache, build records
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Instant, SystemTime};
use tracing::{debug, info, warn};

use crate::cache::{FsTimestamps, ScanCache, TimestampSource};
use crate::cancel::CancellationToken;
use crate::config::{Normalization, ScanConfig};
use crate::discovery;
use crate::filename_parser;
use crate::pdf_meta::{self, MetadataStore};
use crate::pool;
use crate::types::{BatchStatus, FileRecord, FolderError, PdfMetadata, ReadFailure};

/// Emitted once per finished file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanProgress {
    pub completed: usize,
    pub total: usize,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    /// Path-sorted; includes files whose read failed (empty embedded fields)
    pub records: Vec<FileRecord>,
    pub read_failures: Vec<ReadFailure>,
    pub folder_errors: Vec<FolderError>,
    /// Files found by discovery, including any skipped by cancellation
    pub discovered: usize,
    pub cache_hits: usize,
    pub cancelled: bool,
}

impl ScanReport {
    pub fn status(&self) -> BatchStatus {
        if self.cancelled {
            return BatchStatus::Cancelled;
        }
        let failures = self.read_failures.len() + self.folder_errors.len();
        let successes = self.records.len() - self.read_failures.len();
        match (successes, failures) {
            (0, 0) => BatchStatus::Empty,
            (_, 0) => BatchStatus::Complete,
            (0, _) => BatchStatus::Failed,
            _ => BatchStatus::Partial,
        }
    }

    pub fn mismatches(&self) -> usize {
        self.records.iter().filter(|r| r.mismatch).count()
    }
}

struct FileScan {
    record: FileRecord,
    failure: Option<ReadFailure>,
    cache_hit: bool,
}

pub struct Scanner {
    store: Arc<dyn MetadataStore>,
    cache: Arc<ScanCache>,
    timestamps: Arc<dyn TimestampSource>,
    config: ScanConfig,
    normalization: Normalization,
}

impl Scanner {
    pub fn new(store: Arc<dyn MetadataStore>, cache: Arc<ScanCache>) -> Self {
        Self {
            store,
            cache,
            timestamps: Arc::new(FsTimestamps),
            config: ScanConfig::default(),
            normalization: Normalization::default(),
        }
    }

    pub fn with_timestamps(mut self, timestamps: Arc<dyn TimestampSource>) -> Self {
        self.timestamps = timestamps;
        self
    }

    pub fn with_config(mut self, config: ScanConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_normalization(mut self, normalization: Normalization) -> Self {
        self.normalization = normalization;
        self
    }

    /// Scan every PDF under `roots`. Per-file and per-folder failures end up in the
    /// report; nothing here aborts the scan. `progress` runs on the calling thread.
    pub fn scan(
        &self,
        roots: &[PathBuf],
        cancel: &CancellationToken,
        mut progress: impl FnMut(ScanProgress),
    ) -> ScanReport {
        let start = Instant::now();
        let found = discovery::find_pdf_files(roots, &self.config);
        let total = found.files.len();
        info!(roots = roots.len(), files = total, workers = self.config.workers, "scan started");

        let mut completed = 0;
        let outcome = pool::run_ordered(
            &found.files,
            self.config.workers,
            cancel,
            |path| self.scan_file(path),
            |_, scan| {
                completed += 1;
                progress(ScanProgress {
                    completed,
                    total,
                    path: scan.record.path.clone(),
                });
            },
        );
        let cancelled = outcome.cancelled();

        let mut report = ScanReport {
            folder_errors: found.folder_errors,
            discovered: total,
            cancelled,
            ..ScanReport::default()
        };
        for scan in outcome.results.into_iter().flatten() {
            if scan.cache_hit {
                report.cache_hits += 1;
            }
            if let Some(failure) = scan.failure {
                report.read_failures.push(failure);
            }
            report.records.push(scan.record);
        }

        info!(
            files = report.records.len(),
            mismatches = report.mismatches(),
            cache_hits = report.cache_hits,
            read_failures = report.read_failures.len(),
            folder_errors = report.folder_errors.len(),
            cancelled,
            elapsed = ?start.elapsed(),
            "scan finished"
        );
        report
    }

    fn scan_file(&self, path: &Path) -> FileScan {
        let derived = filename_parser::parse_path(path);

        let modified = match self.timestamps.modified(path) {
            Ok(modified) => modified,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot stat file");
                let failure = ReadFailure {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                };
                return self.finish(path, SystemTime::UNIX_EPOCH, derived, PdfMetadata::default(), Some(failure), false);
            }
        };

        if let Some(embedded) = self.cache.get(path, modified) {
            debug!(path = %path.display(), "cache hit");
            return self.finish(path, modified, derived, embedded, None, true);
        }

        let (embedded, failure) = panic::catch_unwind(AssertUnwindSafe(|| {
            pdf_meta::read_or_empty(self.store.as_ref(), path)
        }))
        .unwrap_or_else(|_| {
            warn!(path = %path.display(), "PDF parser panicked");
            (
                PdfMetadata::default(),
                Some(ReadFailure {
                    path: path.to_path_buf(),
                    reason: "PDF parser panicked".to_string(),
                }),
            )
        });

        // failures are not cached so the next scan retries them
        if failure.is_none() {
            self.cache.put(path.to_path_buf(), modified, embedded.clone());
        }
        self.finish(path, modified, derived, embedded, failure, false)
    }

    fn finish(
        &self,
        path: &Path,
        modified: SystemTime,
        derived: PdfMetadata,
        embedded: PdfMetadata,
        failure: Option<ReadFailure>,
        cache_hit: bool,
    ) -> FileScan {
        let record = FileRecord::new(
            path.to_path_buf(),
            modified,
            derived,
            embedded,
            failure.as_ref().map(|f| f.reason.clone()),
            self.normalization,
        );
        FileScan {
            record,
            failure,
            cache_hit,
        }
    }
}

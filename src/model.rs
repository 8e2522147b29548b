// Diff/update model - mismatch detection, pending edits, batch write-back
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::{FsTimestamps, ScanCache, TimestampSource};
use crate::cancel::CancellationToken;
use crate::config::{Normalization, DEFAULT_APPLY_WORKERS};
use crate::pdf_meta::{MetadataStore, PathLocks};
use crate::pool;
use crate::types::{BatchStatus, Field, FileRecord, MetaError, PdfMetadata, RecordState, WriteFailure};

/// True iff the values that would be written differ from the embedded ones after normalization
pub fn compute_mismatch(record: &FileRecord, normalization: Normalization) -> bool {
    let effective = record.effective();
    let differs = |a: &str, b: &str| normalization.normalize(a) != normalization.normalize(b);
    differs(&effective.author, &record.embedded.author) || differs(&effective.title, &record.embedded.title)
}

pub fn refresh_mismatch(record: &mut FileRecord, normalization: Normalization) {
    record.mismatch = compute_mismatch(record, normalization);
}

/// Store a pending override for one field. The file is not touched.
/// Setting a field back to its filename-derived value drops the override.
pub fn set_edit(record: &mut FileRecord, field: Field, value: impl Into<String>, normalization: Normalization) {
    let value = value.into();
    let pending = if value == record.derived.get(field) { None } else { Some(value) };
    match field {
        Field::Author => record.pending_author = pending,
        Field::Title => record.pending_title = pending,
    }
    mark_edited(record);
    refresh_mismatch(record, normalization);
}

/// Exchange the author and title that would be written
pub fn swap(record: &mut FileRecord, normalization: Normalization) {
    let effective = record.effective();
    set_edit(record, Field::Author, effective.title, normalization);
    set_edit(record, Field::Title, effective.author, normalization);
}

/// Drop all pending overrides
pub fn clear_edits(record: &mut FileRecord, normalization: Normalization) {
    record.pending_author = None;
    record.pending_title = None;
    if record.state == RecordState::Edited {
        record.state = RecordState::Scanned;
    }
    refresh_mismatch(record, normalization);
}

fn mark_edited(record: &mut FileRecord) {
    if record.state != RecordState::Applying {
        record.state = RecordState::Edited;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ApplyResult {
    Applied { metadata: PdfMetadata },
    Failed { failure: WriteFailure },
    /// Not dispatched because the batch was cancelled
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyOutcome {
    pub path: PathBuf,
    #[serde(flatten)]
    pub result: ApplyResult,
}

/// Per-file results of one apply batch, in record order
#[derive(Debug, Clone, Default, Serialize)]
pub struct ApplyReport {
    pub outcomes: Vec<ApplyOutcome>,
}

impl ApplyReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.result, ApplyResult::Applied { .. }))
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &WriteFailure> {
        self.outcomes.iter().filter_map(|o| match &o.result {
            ApplyResult::Failed { failure } => Some(failure),
            _ => None,
        })
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.result == ApplyResult::Skipped)
            .count()
    }

    pub fn status(&self) -> BatchStatus {
        if self.skipped() > 0 {
            return BatchStatus::Cancelled;
        }
        match (self.succeeded(), self.failures().count()) {
            (0, 0) => BatchStatus::Empty,
            (_, 0) => BatchStatus::Complete,
            (0, _) => BatchStatus::Failed,
            _ => BatchStatus::Partial,
        }
    }
}

/// Emitted once per finished write
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyProgress {
    pub completed: usize,
    pub total: usize,
    pub path: PathBuf,
    pub ok: bool,
}

struct WriteJob {
    index: usize,
    path: PathBuf,
    metadata: PdfMetadata,
    previous: RecordState,
}

/// Writes accepted metadata back into PDFs on a bounded pool
pub struct Applier {
    store: Arc<dyn MetadataStore>,
    locks: PathLocks,
    cache: Option<Arc<ScanCache>>,
    timestamps: Arc<dyn TimestampSource>,
    workers: usize,
    normalization: Normalization,
}

impl Applier {
    pub fn new(store: Arc<dyn MetadataStore>, locks: PathLocks) -> Self {
        Self {
            store,
            locks,
            cache: None,
            timestamps: Arc::new(FsTimestamps),
            workers: DEFAULT_APPLY_WORKERS,
            normalization: Normalization::default(),
        }
    }

    /// Refresh this cache after each successful write so the next scan is a hit
    pub fn with_cache(mut self, cache: Arc<ScanCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_timestamps(mut self, timestamps: Arc<dyn TimestampSource>) -> Self {
        self.timestamps = timestamps;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_normalization(mut self, normalization: Normalization) -> Self {
        self.normalization = normalization;
        self
    }

    /// Write effective author/title into every selected record's PDF.
    ///
    /// A failed write marks that record `WriteFailed` and leaves its pending edits;
    /// the rest of the batch carries on. Unknown paths are reported as failures.
    pub fn apply_selected(
        &self,
        records: &mut [FileRecord],
        selection: &[PathBuf],
        cancel: &CancellationToken,
        mut progress: impl FnMut(ApplyProgress),
    ) -> ApplyReport {
        let by_path: HashMap<&Path, usize> = records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.path.as_path(), i))
            .collect();

        let mut unknown = Vec::new();
        let mut indices = BTreeSet::new();
        for path in selection {
            match by_path.get(path.as_path()) {
                Some(&index) => {
                    indices.insert(index);
                }
                None => unknown.push(path.clone()),
            }
        }

        let jobs: Vec<WriteJob> = indices
            .into_iter()
            .map(|index| {
                let record = &mut records[index];
                let job = WriteJob {
                    index,
                    path: record.path.clone(),
                    metadata: record.effective().trimmed(),
                    previous: record.state.clone(),
                };
                record.state = RecordState::Applying;
                job
            })
            .collect();

        let total = jobs.len();
        info!(files = total, unknown = unknown.len(), workers = self.workers, "apply started");

        let mut completed = 0;
        let outcome = pool::run_ordered(
            &jobs,
            self.workers,
            cancel,
            |job| self.write_one(job),
            |index, result| {
                completed += 1;
                progress(ApplyProgress {
                    completed,
                    total,
                    path: jobs[index].path.clone(),
                    ok: result.is_ok(),
                });
            },
        );

        let mut report = ApplyReport::default();
        for (job, result) in jobs.into_iter().zip(outcome.results) {
            let record = &mut records[job.index];
            let result = match result {
                Some(Ok(())) => {
                    self.mark_applied(record, &job.metadata);
                    ApplyResult::Applied { metadata: job.metadata }
                }
                Some(Err(reason)) => {
                    record.state = RecordState::WriteFailed(reason.clone());
                    ApplyResult::Failed {
                        failure: WriteFailure {
                            path: job.path.clone(),
                            reason,
                        },
                    }
                }
                None => {
                    record.state = job.previous;
                    ApplyResult::Skipped
                }
            };
            report.outcomes.push(ApplyOutcome {
                path: job.path,
                result,
            });
        }
        for path in unknown {
            let reason = MetaError::UnknownRecord(path.clone()).to_string();
            report.outcomes.push(ApplyOutcome {
                path: path.clone(),
                result: ApplyResult::Failed {
                    failure: WriteFailure { path, reason },
                },
            });
        }

        info!(
            applied = report.succeeded(),
            failed = report.failures().count(),
            skipped = report.skipped(),
            "apply finished"
        );
        report
    }

    fn write_one(&self, job: &WriteJob) -> Result<(), String> {
        self.locks.with_lock(&job.path, || {
            let write = panic::catch_unwind(AssertUnwindSafe(|| self.store.write(&job.path, &job.metadata)));
            match write {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => {
                    warn!(path = %job.path.display(), error = %e, "metadata write failed");
                    Err(match e {
                        MetaError::Write { reason, .. } => reason,
                        other => other.to_string(),
                    })
                }
                Err(_) => {
                    warn!(path = %job.path.display(), "PDF writer panicked");
                    Err("PDF writer panicked".to_string())
                }
            }
        })
    }

    // Accepted edits become the record's derived values, so the row reads as matched
    fn mark_applied(&self, record: &mut FileRecord, written: &PdfMetadata) {
        record.embedded = written.clone();
        record.derived = written.clone();
        record.pending_author = None;
        record.pending_title = None;
        record.read_error = None;
        record.state = RecordState::Applied;

        match self.timestamps.modified(&record.path) {
            Ok(modified) => {
                record.modified = modified;
                if let Some(cache) = &self.cache {
                    cache.put(record.path.clone(), modified, written.clone());
                }
            }
            Err(e) => {
                warn!(path = %record.path.display(), error = %e, "cannot stat file after write");
                if let Some(cache) = &self.cache {
                    cache.invalidate(&record.path);
                }
            }
        }
        refresh_mismatch(record, self.normalization);
    }
}

// Session - chosen root folders plus the records from the latest scan
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::cache::{FsTimestamps, ScanCache, TimestampSource};
use crate::cancel::CancellationToken;
use crate::config::{Config, Normalization};
use crate::discovery;
use crate::model::{self, Applier, ApplyProgress, ApplyReport};
use crate::pdf_meta::{LopdfStore, MetadataStore, PathLocks};
use crate::scanner::{ScanProgress, ScanReport, Scanner};
use crate::types::{Field, FileRecord, MetaError, Result};

pub struct Session {
    roots: Vec<PathBuf>,
    records: Vec<FileRecord>,
    scanner: Scanner,
    applier: Applier,
    normalization: Normalization,
}

impl Session {
    /// Session backed by lopdf and the real filesystem clock
    pub fn new(config: &Config) -> Self {
        Self::with_parts(config, Arc::new(LopdfStore), Arc::new(FsTimestamps))
    }

    pub fn with_parts(
        config: &Config,
        store: Arc<dyn MetadataStore>,
        timestamps: Arc<dyn TimestampSource>,
    ) -> Self {
        let normalization = config.matching.normalization;
        let cache = Arc::new(ScanCache::new());
        let scanner = Scanner::new(store.clone(), cache.clone())
            .with_timestamps(timestamps.clone())
            .with_config(config.scan.clone())
            .with_normalization(normalization);
        let applier = Applier::new(store, PathLocks::new())
            .with_cache(cache)
            .with_timestamps(timestamps)
            .with_workers(config.apply.workers)
            .with_normalization(normalization);
        Self {
            roots: Vec::new(),
            records: Vec::new(),
            scanner,
            applier,
            normalization,
        }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Path-sorted records from the latest scan, with any edits applied since
    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    pub fn record(&self, path: &Path) -> Option<&FileRecord> {
        self.index_of(path).map(|i| &self.records[i])
    }

    pub fn mismatched_paths(&self) -> Vec<PathBuf> {
        self.records
            .iter()
            .filter(|r| r.mismatch)
            .map(|r| r.path.clone())
            .collect()
    }

    /// Replace the folder list. Records are dropped until the next rescan.
    pub fn set_folders(&mut self, roots: Vec<PathBuf>) {
        self.roots.clear();
        self.records.clear();
        for root in roots {
            self.add_folder(root);
        }
    }

    /// Returns false if the folder was already part of the session
    pub fn add_folder(&mut self, root: PathBuf) -> bool {
        let root = normalize_root(&root);
        if self.roots.contains(&root) {
            return false;
        }
        info!(root = %root.display(), "folder added");
        self.roots.push(root);
        true
    }

    /// Drop a folder and the records that only it contributed
    pub fn remove_folder(&mut self, root: &Path) -> bool {
        let root = normalize_root(root);
        let before = self.roots.len();
        self.roots.retain(|r| r != &root);
        if self.roots.len() == before {
            return false;
        }
        let remaining = &self.roots;
        self.records
            .retain(|record| !record.is_under(&root) || remaining.iter().any(|r| record.is_under(r)));
        info!(root = %root.display(), records = self.records.len(), "folder removed");
        true
    }

    /// Rebuild all records from the current folders. Unchanged files come from the cache.
    pub fn rescan(&mut self, cancel: &CancellationToken, progress: impl FnMut(ScanProgress)) -> ScanReport {
        let report = self.scanner.scan(&self.roots, cancel, progress);
        self.records = report.records.clone();
        report
    }

    pub fn edit(&mut self, path: &Path, field: Field, value: impl Into<String>) -> Result<&FileRecord> {
        let index = self.require(path)?;
        model::set_edit(&mut self.records[index], field, value, self.normalization);
        Ok(&self.records[index])
    }

    /// Swap author/title on each path; nothing changes if any path is unknown
    pub fn swap(&mut self, paths: &[PathBuf]) -> Result<()> {
        let indices = paths
            .iter()
            .map(|p| self.require(p))
            .collect::<Result<Vec<_>>>()?;
        for index in indices {
            model::swap(&mut self.records[index], self.normalization);
        }
        Ok(())
    }

    pub fn clear_edits(&mut self, path: &Path) -> Result<&FileRecord> {
        let index = self.require(path)?;
        model::clear_edits(&mut self.records[index], self.normalization);
        Ok(&self.records[index])
    }

    pub fn apply(
        &mut self,
        selection: &[PathBuf],
        cancel: &CancellationToken,
        progress: impl FnMut(ApplyProgress),
    ) -> ApplyReport {
        self.applier
            .apply_selected(&mut self.records, selection, cancel, progress)
    }

    fn index_of(&self, path: &Path) -> Option<usize> {
        self.records
            .binary_search_by(|r| r.path.as_path().cmp(path))
            .ok()
    }

    fn require(&self, path: &Path) -> Result<usize> {
        self.index_of(path)
            .ok_or_else(|| MetaError::UnknownRecord(path.to_path_buf()))
    }
}

// Roots are compared in canonical form when the folder exists; a missing one is kept as given
// so the next scan can report it.
fn normalize_root(root: &Path) -> PathBuf {
    discovery::canonical_root(root).unwrap_or_else(|_| root.to_path_buf())
}

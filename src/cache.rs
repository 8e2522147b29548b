// Scan cache - embedded metadata keyed by path, valid while the modification time is unchanged
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use crate::types::PdfMetadata;

/// Where "last modified" comes from. Injected so tests can move time without touching files.
pub trait TimestampSource: Send + Sync {
    fn modified(&self, path: &Path) -> io::Result<SystemTime>;
}

/// Filesystem mtime
#[derive(Debug, Default, Clone, Copy)]
pub struct FsTimestamps;

impl TimestampSource for FsTimestamps {
    fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        fs::metadata(path)?.modified()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CacheEntry {
    modified: SystemTime,
    metadata: PdfMetadata,
}

/// Process-lifetime cache shared by scan workers. No eviction.
#[derive(Debug, Default)]
pub struct ScanCache {
    entries: Mutex<HashMap<PathBuf, CacheEntry>>,
}

impl ScanCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<PathBuf, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cached metadata if the stored timestamp equals `current`; anything else is a miss
    pub fn get(&self, path: &Path, current: SystemTime) -> Option<PdfMetadata> {
        self.entries()
            .get(path)
            .filter(|entry| entry.modified == current)
            .map(|entry| entry.metadata.clone())
    }

    /// Store or overwrite the entry for `path`
    pub fn put(&self, path: PathBuf, modified: SystemTime, metadata: PdfMetadata) {
        self.entries().insert(path, CacheEntry { modified, metadata });
    }

    pub fn invalidate(&self, path: &Path) {
        self.entries().remove(path);
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// PDF metadata capability - read/write Author and Title
pub mod locks;
pub mod lopdf_helper;

use std::path::Path;
use tracing::{debug, warn};

use crate::types::{MetaError, PdfMetadata, ReadFailure, Result};

pub use locks::PathLocks;

/// Read/write access to a PDF's embedded Author/Title.
///
/// Implementations must be safe to call from several worker threads at once;
/// serializing writes to one path is the caller's job (see [`PathLocks`]).
pub trait MetadataStore: Send + Sync {
    fn read(&self, path: &Path) -> Result<PdfMetadata>;
    fn write(&self, path: &Path, metadata: &PdfMetadata) -> Result<()>;
}

/// lopdf-backed store used outside of tests
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfStore;

impl MetadataStore for LopdfStore {
    fn read(&self, path: &Path) -> Result<PdfMetadata> {
        lopdf_helper::with_pdf(path, |doc| Ok(lopdf_helper::read_info(doc))).map_err(|e| {
            MetaError::Read {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        })
    }

    fn write(&self, path: &Path, metadata: &PdfMetadata) -> Result<()> {
        let write = || -> Result<()> {
            let mut doc = lopdf_helper::load_pdf(path)?;
            lopdf_helper::write_info(&mut doc, metadata)?;
            lopdf_helper::save_atomically(&mut doc, path)
        };
        write().map_err(|e| MetaError::Write {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

/// Metadata Reader: never fails, an unreadable file yields empty fields plus a ReadFailure
pub fn read_or_empty(store: &dyn MetadataStore, path: &Path) -> (PdfMetadata, Option<ReadFailure>) {
    match store.read(path) {
        Ok(metadata) => {
            debug!(path = %path.display(), author = %metadata.author, title = %metadata.title, "read metadata");
            (metadata, None)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "metadata read failed");
            let reason = match e {
                MetaError::Read { reason, .. } => reason,
                other => other.to_string(),
            };
            (
                PdfMetadata::default(),
                Some(ReadFailure {
                    path: path.to_path_buf(),
                    reason,
                }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn corrupt_file_reads_as_empty_with_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Broken - File.pdf");
        fs::write(&path, b"definitely not a pdf").unwrap();

        let (metadata, failure) = read_or_empty(&LopdfStore, &path);
        assert!(metadata.is_empty());
        let failure = failure.expect("corrupt file should report a read failure");
        assert_eq!(failure.path, path);
    }

    #[test]
    fn write_to_missing_file_is_a_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.pdf");
        let err = LopdfStore
            .write(&path, &PdfMetadata::new("a", "b"))
            .unwrap_err();
        assert!(matches!(err, MetaError::Write { .. }));
        assert!(!path.exists());
    }
}

// PDF discovery - recursive walk of the chosen root folders
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::config::ScanConfig;
use crate::types::{FolderError, MetaError, Result};

/// Every PDF found under the roots (sorted, deduplicated) plus the folders that could not be read
#[derive(Debug, Default)]
pub struct Discovery {
    pub files: Vec<PathBuf>,
    pub folder_errors: Vec<FolderError>,
}

/// `.pdf` extension, any case
pub fn is_pdf(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// Absolute, symlink-free form of a root folder; errors if it is not a readable directory
pub fn canonical_root(root: &Path) -> Result<PathBuf> {
    let canonical = fs::canonicalize(root).map_err(|source| MetaError::Filesystem {
        path: root.to_path_buf(),
        source,
    })?;
    if !canonical.is_dir() {
        return Err(MetaError::Filesystem {
            path: root.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "not a directory"),
        });
    }
    Ok(canonical)
}

/// Find all PDF files under each root. A bad root or subfolder is recorded and skipped.
pub fn find_pdf_files(roots: &[PathBuf], config: &ScanConfig) -> Discovery {
    let mut files = BTreeSet::new();
    let mut folder_errors = Vec::new();

    for root in roots {
        match canonical_root(root) {
            Ok(root) => find_pdfs_in_dir(&root, config, &mut files, &mut folder_errors),
            Err(e) => {
                warn!(root = %root.display(), error = %e, "skipping folder");
                folder_errors.push(FolderError {
                    path: root.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    debug!(files = files.len(), folder_errors = folder_errors.len(), "discovery finished");
    Discovery {
        files: files.into_iter().collect(),
        folder_errors,
    }
}

fn find_pdfs_in_dir(
    root: &Path,
    config: &ScanConfig,
    files: &mut BTreeSet<PathBuf>,
    folder_errors: &mut Vec<FolderError>,
) {
    let include_hidden = config.include_hidden;
    let walker = WalkDir::new(root)
        .follow_links(config.follow_symlinks)
        .into_iter()
        .filter_entry(move |entry| include_hidden || entry.depth() == 0 || !is_hidden(entry));

    for entry in walker {
        match entry {
            Ok(entry) if entry.file_type().is_file() && is_pdf(entry.path()) => {
                files.insert(entry.into_path());
            }
            Ok(_) => {}
            Err(e) => {
                let path = e.path().unwrap_or(root).to_path_buf();
                warn!(path = %path.display(), error = %e, "cannot read folder entry");
                folder_errors.push(FolderError {
                    path,
                    reason: e.to_string(),
                });
            }
        }
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

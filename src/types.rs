// Core types for pdfmeta
use serde::{Serialize, Serializer};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::config::Normalization;
use crate::model;

/// Author/title pair, either parsed from a filename or read from a PDF Info dictionary
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct PdfMetadata {
    pub author: String,
    pub title: String,
}

impl PdfMetadata {
    pub fn new(author: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            title: title.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.author.is_empty() && self.title.is_empty()
    }

    /// Both fields without surrounding whitespace, the form the PDF reader returns
    pub fn trimmed(&self) -> Self {
        Self::new(self.author.trim(), self.title.trim())
    }

    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::Author => &self.author,
            Field::Title => &self.title,
        }
    }
}

/// Editable column of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Author,
    Title,
}

impl std::str::FromStr for Field {
    type Err = MetaError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "author" => Ok(Field::Author),
            "title" => Ok(Field::Title),
            other => Err(MetaError::Config(format!("unknown field '{}'", other))),
        }
    }
}

/// Lifecycle of a record: Scanned -> Edited* -> Applying -> Applied | WriteFailed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum RecordState {
    #[default]
    Scanned,
    Edited,
    Applying,
    Applied,
    WriteFailed(String),
}

/// One scanned PDF and everything the diff view needs to know about it
#[derive(Debug, Clone, Serialize)]
pub struct FileRecord {
    pub path: PathBuf,
    #[serde(serialize_with = "serialize_modified")]
    pub modified: SystemTime,
    /// Parsed from the filename
    pub derived: PdfMetadata,
    /// Read from the PDF Info dictionary
    pub embedded: PdfMetadata,
    pub pending_author: Option<String>,
    pub pending_title: Option<String>,
    pub mismatch: bool,
    pub state: RecordState,
    /// Set when the metadata read failed; embedded is empty in that case
    pub read_error: Option<String>,
}

impl FileRecord {
    pub fn new(
        path: PathBuf,
        modified: SystemTime,
        derived: PdfMetadata,
        embedded: PdfMetadata,
        read_error: Option<String>,
        normalization: Normalization,
    ) -> Self {
        let mut record = Self {
            path,
            modified,
            derived,
            embedded,
            pending_author: None,
            pending_title: None,
            mismatch: false,
            state: RecordState::Scanned,
            read_error,
        };
        record.mismatch = model::compute_mismatch(&record, normalization);
        record
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Values that would be written on apply: pending overrides, else filename-derived
    pub fn effective(&self) -> PdfMetadata {
        PdfMetadata {
            author: self
                .pending_author
                .clone()
                .unwrap_or_else(|| self.derived.author.clone()),
            title: self
                .pending_title
                .clone()
                .unwrap_or_else(|| self.derived.title.clone()),
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending_author.is_some() || self.pending_title.is_some()
    }

    pub fn is_under(&self, root: &Path) -> bool {
        self.path.starts_with(root)
    }
}

fn serialize_modified<S: Serializer>(time: &SystemTime, s: S) -> std::result::Result<S::Ok, S::Error> {
    let dt: chrono::DateTime<chrono::Utc> = (*time).into();
    s.serialize_str(&dt.to_rfc3339())
}

/// A file whose metadata could not be read; the scan continues without it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// A rejected metadata write; the batch continues without it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// A root folder (or subfolder) that could not be walked
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderError {
    pub path: PathBuf,
    pub reason: String,
}

/// How a scan or apply batch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Nothing to do
    Empty,
    /// Every item succeeded
    Complete,
    /// Some items failed, some succeeded
    Partial,
    /// Every item failed
    Failed,
    /// Stopped early on request; results so far are still reported
    Cancelled,
}

// Error types
#[derive(Debug, thiserror::Error)]
pub enum MetaError {
    #[error("failed to read metadata from {}: {reason}", .path.display())]
    Read { path: PathBuf, reason: String },

    #[error("failed to write metadata to {}: {reason}", .path.display())]
    Write { path: PathBuf, reason: String },

    #[error("cannot scan folder {}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config error: {0}")]
    Config(String),

    #[error("no scanned record for {}", .0.display())]
    UnknownRecord(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),
}

pub type Result<T> = std::result::Result<T, MetaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_prefers_pending_values() {
        let mut record = FileRecord::new(
            PathBuf::from("/books/Stephen King - The Shining.pdf"),
            SystemTime::UNIX_EPOCH,
            PdfMetadata::new("Stephen King", "The Shining"),
            PdfMetadata::default(),
            None,
            Normalization::TrimIgnoreCase,
        );
        record.pending_title = Some("Shining".to_string());

        let effective = record.effective();
        assert_eq!(effective.author, "Stephen King");
        assert_eq!(effective.title, "Shining");
        assert!(record.has_pending());
    }

    #[test]
    fn field_parses_case_insensitively() {
        assert_eq!("Author".parse::<Field>().unwrap(), Field::Author);
        assert_eq!("TITLE".parse::<Field>().unwrap(), Field::Title);
        assert!("subject".parse::<Field>().is_err());
    }

    #[test]
    fn modified_serializes_as_rfc3339() {
        let record = FileRecord::new(
            PathBuf::from("/a.pdf"),
            SystemTime::UNIX_EPOCH,
            PdfMetadata::default(),
            PdfMetadata::default(),
            None,
            Normalization::Exact,
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["modified"], "1970-01-01T00:00:00+00:00");
        assert_eq!(json["state"]["state"], "scanned");
    }
}

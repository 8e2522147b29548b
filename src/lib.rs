// pdfmeta - compare PDF filenames with embedded Author/Title metadata and write fixes back
pub mod cache;
pub mod cancel;
pub mod config;
pub mod controller;
pub mod discovery;
pub mod filename_parser;
pub mod logging;
pub mod model;
pub mod pdf_meta;
pub mod pool;
pub mod scanner;
pub mod session;
pub mod types;

pub use cache::{FsTimestamps, ScanCache, TimestampSource};
pub use cancel::CancellationToken;
pub use config::{Config, Normalization};
pub use controller::{Command, ControllerHandle, Event};
pub use model::{Applier, ApplyOutcome, ApplyReport, ApplyResult};
pub use pdf_meta::{LopdfStore, MetadataStore, PathLocks};
pub use scanner::{ScanProgress, ScanReport, Scanner};
pub use session::Session;
pub use types::{BatchStatus, Field, FileRecord, MetaError, PdfMetadata, RecordState, Result};

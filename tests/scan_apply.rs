// End to end: scan real PDFs, reuse the cache, write fixes back
mod common;

use filetime::FileTime;
use pdfmeta::{
    BatchStatus, CancellationToken, Config, Field, FileRecord, LopdfStore, MetadataStore, Normalization,
    PdfMetadata, RecordState, Session,
};
use std::fs;
use std::path::{Path, PathBuf};

fn library() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    common::write_pdf(
        &dir.path().join("Stephen King - The Shining.pdf"),
        Some(("Stephen King", "The Shining")),
    );
    common::write_pdf(&dir.path().join("Anne Rice - Lestat.pdf"), None);
    fs::write(dir.path().join("broken.pdf"), b"this is not a pdf").unwrap();
    fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();
    dir
}

fn find<'a>(session: &'a Session, name: &str) -> &'a FileRecord {
    session
        .records()
        .iter()
        .find(|r| r.file_name() == name)
        .unwrap_or_else(|| panic!("no record for {}", name))
}

fn path_of(session: &Session, name: &str) -> PathBuf {
    find(session, name).path.clone()
}

fn rescan(session: &mut Session) -> pdfmeta::ScanReport {
    session.rescan(&CancellationToken::new(), |_| {})
}

#[test]
fn scan_reports_every_pdf_with_filename_and_embedded_values() {
    let dir = library();
    let mut session = Session::new(&Config::default());
    session.add_folder(dir.path().to_path_buf());

    let report = rescan(&mut session);

    assert_eq!(report.records.len(), 3);
    assert_eq!(report.read_failures.len(), 1);
    assert_eq!(report.status(), BatchStatus::Partial);

    let shining = find(&session, "Stephen King - The Shining.pdf");
    assert_eq!(shining.derived, PdfMetadata::new("Stephen King", "The Shining"));
    assert_eq!(shining.embedded, shining.derived);
    assert!(!shining.mismatch);

    let lestat = find(&session, "Anne Rice - Lestat.pdf");
    assert_eq!(lestat.embedded, PdfMetadata::default());
    assert!(lestat.mismatch);

    let broken = find(&session, "broken.pdf");
    assert!(broken.read_error.is_some());
    assert_eq!(broken.derived, PdfMetadata::new("", "broken"));
}

#[test]
fn rescan_uses_cache_until_the_file_changes() {
    let dir = library();
    let mut session = Session::new(&Config::default());
    session.add_folder(dir.path().to_path_buf());

    let first = rescan(&mut session);
    assert_eq!(first.cache_hits, 0);

    let second = rescan(&mut session);
    // the unreadable file is read again every time
    assert_eq!(second.cache_hits, 2);

    let shining = path_of(&session, "Stephen King - The Shining.pdf");
    common::write_pdf(&shining, Some(("Someone Else", "Another Book")));
    let later = FileTime::from_unix_time(FileTime::now().unix_seconds() + 120, 0);
    filetime::set_file_mtime(&shining, later).unwrap();

    let third = rescan(&mut session);
    assert_eq!(third.cache_hits, 1);
    let record = find(&session, "Stephen King - The Shining.pdf");
    assert_eq!(record.embedded, PdfMetadata::new("Someone Else", "Another Book"));
    assert!(record.mismatch);
}

#[test]
fn apply_mismatched_writes_fixes_and_reports_failures() {
    let dir = library();
    let mut session = Session::new(&Config::default());
    session.add_folder(dir.path().to_path_buf());
    rescan(&mut session);

    let selection = session.mismatched_paths();
    assert_eq!(selection.len(), 2);

    let report = session.apply(&selection, &CancellationToken::new(), |_| {});
    assert_eq!(report.status(), BatchStatus::Partial);
    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.failures().count(), 1);

    let lestat = path_of(&session, "Anne Rice - Lestat.pdf");
    assert_eq!(
        LopdfStore.read(&lestat).unwrap(),
        PdfMetadata::new("Anne Rice", "Lestat")
    );
    assert_eq!(find(&session, "Anne Rice - Lestat.pdf").state, RecordState::Applied);
    assert!(!find(&session, "Anne Rice - Lestat.pdf").mismatch);

    let broken = find(&session, "broken.pdf");
    assert!(matches!(broken.state, RecordState::WriteFailed(_)));
    assert_eq!(fs::read(&broken.path).unwrap(), b"this is not a pdf");

    // a fresh scan agrees with what was written
    let after = rescan(&mut session);
    assert!(!find(&session, "Anne Rice - Lestat.pdf").mismatch);
    assert_eq!(after.mismatches(), 1);
}

#[test]
fn swapped_and_edited_values_are_what_gets_written() {
    let dir = tempfile::tempdir().unwrap();
    common::write_pdf(&dir.path().join("The Shining - Stephen King.pdf"), None);
    common::write_pdf(&dir.path().join("Rice - Lestat.pdf"), None);
    let mut session = Session::new(&Config::default());
    session.add_folder(dir.path().to_path_buf());
    rescan(&mut session);

    let shining = path_of(&session, "The Shining - Stephen King.pdf");
    let lestat = path_of(&session, "Rice - Lestat.pdf");
    session.swap(&[shining.clone()]).unwrap();
    session.edit(&lestat, Field::Author, "Anne Rice").unwrap();

    let report = session.apply(&[shining.clone(), lestat.clone()], &CancellationToken::new(), |_| {});
    assert_eq!(report.status(), BatchStatus::Complete);

    assert_eq!(
        LopdfStore.read(&shining).unwrap(),
        PdfMetadata::new("Stephen King", "The Shining")
    );
    assert_eq!(LopdfStore.read(&lestat).unwrap(), PdfMetadata::new("Anne Rice", "Lestat"));
}

#[test]
fn missing_folder_is_a_failed_scan() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::new(&Config::default());
    session.add_folder(dir.path().join("gone"));

    let report = rescan(&mut session);
    assert!(report.records.is_empty());
    assert_eq!(report.folder_errors.len(), 1);
    assert_eq!(report.status(), BatchStatus::Failed);
}

#[test]
fn nested_folders_are_scanned_once() {
    let dir = tempfile::tempdir().unwrap();
    common::write_pdf(&dir.path().join("sub/A - One.pdf"), Some(("A", "One")));
    let mut session = Session::new(&Config::default());
    session.add_folder(dir.path().to_path_buf());
    session.add_folder(dir.path().join("sub"));

    let report = rescan(&mut session);
    assert_eq!(report.records.len(), 1);
    assert_eq!(report.status(), BatchStatus::Complete);
    assert!(Path::new(&report.records[0].path).ends_with("sub/A - One.pdf"));
}

#[test]
fn cached_rescan_after_apply_agrees_with_a_cold_read() {
    let dir = tempfile::tempdir().unwrap();
    common::write_pdf(&dir.path().join("Anne Rice - Lestat.pdf"), None);
    let mut config = Config::default();
    config.matching.normalization = Normalization::Exact;

    let mut session = Session::new(&config);
    session.add_folder(dir.path().to_path_buf());
    rescan(&mut session);
    let lestat = path_of(&session, "Anne Rice - Lestat.pdf");
    session.edit(&lestat, Field::Title, "Lestat ").unwrap();
    let report = session.apply(&[lestat.clone()], &CancellationToken::new(), |_| {});
    assert_eq!(report.status(), BatchStatus::Complete);

    let cached = rescan(&mut session);
    assert_eq!(cached.cache_hits, 1);

    let mut cold_session = Session::new(&config);
    cold_session.add_folder(dir.path().to_path_buf());
    let cold = rescan(&mut cold_session);
    assert_eq!(cold.cache_hits, 0);

    assert_eq!(cached.records[0].embedded, cold.records[0].embedded);
    assert_eq!(cached.records[0].mismatch, cold.records[0].mismatch);
    assert_eq!(cached.records[0].embedded, PdfMetadata::new("Anne Rice", "Lestat"));
    assert!(!cached.records[0].mismatch);
}

// Shared fixtures: tiny one-page PDFs built with lopdf
#![allow(dead_code)]
use lopdf::{dictionary, Document, Object, Stream};
use std::path::{Path, PathBuf};

/// Write a one-page PDF, optionally with an Info dictionary
pub fn write_pdf(path: &Path, info: Option<(&str, &str)>) -> PathBuf {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let content_id = doc.add_object(Stream::new(dictionary! {}, b"BT ET".to_vec()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    if let Some((author, title)) = info {
        let info_id = doc.add_object(dictionary! {
            "Author" => Object::string_literal(author),
            "Title" => Object::string_literal(title),
            "Producer" => Object::string_literal("fixture"),
        });
        doc.trailer.set("Info", info_id);
    }
    doc.save(path).unwrap();
    path.to_path_buf()
}

// lopdf helper - Info dictionary access and PDF text strings
use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::types::{PdfMetadata, Result};

pub const AUTHOR_KEY: &[u8] = b"Author";
pub const TITLE_KEY: &[u8] = b"Title";
const INFO_KEY: &[u8] = b"Info";

/// Load a PDF document using lopdf
pub fn load_pdf(path: &Path) -> Result<Document> {
    Ok(Document::load(path)?)
}

/// Execute an operation with a PDF document
pub fn with_pdf<F, R>(path: &Path, f: F) -> Result<R>
where
    F: FnOnce(&Document) -> Result<R>,
{
    let document = load_pdf(path)?;
    f(&document)
}

/// The trailer's /Info dictionary, direct or indirect
pub fn info_dictionary(doc: &Document) -> Option<&Dictionary> {
    match doc.trailer.get(INFO_KEY).ok()? {
        Object::Reference(id) => doc.get_object(*id).ok()?.as_dict().ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

/// Author/Title from the Info dictionary; missing entries come back empty
pub fn read_info(doc: &Document) -> PdfMetadata {
    match info_dictionary(doc) {
        Some(info) => PdfMetadata::new(
            text_entry(doc, info, AUTHOR_KEY),
            text_entry(doc, info, TITLE_KEY),
        ),
        None => PdfMetadata::default(),
    }
}

/// Set Author/Title, creating the Info dictionary if the document has none.
/// Other Info entries are left alone.
pub fn write_info(doc: &mut Document, metadata: &PdfMetadata) -> Result<()> {
    let id = ensure_info_dictionary(doc);
    let info = doc.get_object_mut(id)?.as_dict_mut()?;
    info.set(AUTHOR_KEY, encode_text_string(&metadata.author));
    info.set(TITLE_KEY, encode_text_string(&metadata.title));
    Ok(())
}

fn ensure_info_dictionary(doc: &mut Document) -> ObjectId {
    let current = doc.trailer.get(INFO_KEY).ok().cloned();
    let id = match current {
        Some(Object::Reference(id)) if matches!(doc.get_object(id), Ok(Object::Dictionary(_))) => id,
        Some(Object::Dictionary(dict)) => doc.add_object(dict),
        _ => doc.add_object(Dictionary::new()),
    };
    doc.trailer.set(INFO_KEY, Object::Reference(id));
    id
}

fn text_entry(doc: &Document, dict: &Dictionary, key: &[u8]) -> String {
    let value = match dict.get(key) {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(object) => object,
            Err(_) => return String::new(),
        },
        Ok(object) => object,
        Err(_) => return String::new(),
    };
    match value {
        Object::String(bytes, _) => decode_text_string(bytes).trim().to_string(),
        Object::Name(name) => String::from_utf8_lossy(name).trim().to_string(),
        _ => String::new(),
    }
}

/// Decode a PDF text string: UTF-16BE or UTF-8 with BOM, else PDFDocEncoding.
/// BOM-less UTF-8 is accepted too since plenty of producers write it.
pub fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
        return char::decode_utf16(units)
            .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect();
    }
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(rest).into_owned();
    }
    // Many producers write bare UTF-8. A PDFDocEncoding string that is also valid UTF-8
    // (C3 A9 is "Ã©" there) decodes as UTF-8 instead.
    if !bytes.is_ascii() {
        if let Ok(utf8) = std::str::from_utf8(bytes) {
            return utf8.to_string();
        }
    }
    bytes.iter().map(|&b| pdf_doc_char(b)).collect()
}

/// ASCII goes out as a literal string, anything else as UTF-16BE with a BOM
pub fn encode_text_string(value: &str) -> Object {
    if value.is_ascii() {
        return Object::String(value.as_bytes().to_vec(), StringFormat::Literal);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in value.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

// PDFDocEncoding differs from Latin-1 only in 0x80..=0xA0
fn pdf_doc_char(byte: u8) -> char {
    match byte {
        0x80 => '\u{2022}',
        0x81 => '\u{2020}',
        0x82 => '\u{2021}',
        0x83 => '\u{2026}',
        0x84 => '\u{2014}',
        0x85 => '\u{2013}',
        0x86 => '\u{0192}',
        0x87 => '\u{2044}',
        0x88 => '\u{2039}',
        0x89 => '\u{203A}',
        0x8A => '\u{2212}',
        0x8B => '\u{2030}',
        0x8C => '\u{201E}',
        0x8D => '\u{201C}',
        0x8E => '\u{201D}',
        0x8F => '\u{2018}',
        0x90 => '\u{2019}',
        0x91 => '\u{201A}',
        0x92 => '\u{2122}',
        0x93 => '\u{FB01}',
        0x94 => '\u{FB02}',
        0x95 => '\u{0141}',
        0x96 => '\u{0152}',
        0x97 => '\u{0160}',
        0x98 => '\u{0178}',
        0x99 => '\u{017D}',
        0x9A => '\u{0131}',
        0x9B => '\u{0142}',
        0x9C => '\u{0153}',
        0x9D => '\u{0161}',
        0x9E => '\u{017E}',
        0x9F => char::REPLACEMENT_CHARACTER,
        0xA0 => '\u{20AC}',
        other => other as char,
    }
}

/// Write the document next to `path` and rename it over the original,
/// so a crash mid-write never leaves a truncated PDF behind
pub fn save_atomically(doc: &mut Document, path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = tempfile::Builder::new()
        .prefix(".pdfmeta-")
        .suffix(".pdf.tmp")
        .tempfile_in(dir)?;
    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        doc.save_to(&mut writer)?;
        writer.flush()?;
    }
    temp.as_file().sync_all()?;

    if let Ok(original) = fs::metadata(path) {
        fs::set_permissions(temp.path(), original.permissions())?;
    }
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    #[test]
    fn decodes_each_text_encoding() {
        assert_eq!(decode_text_string(b"The Shining"), "The Shining");
        assert_eq!(
            decode_text_string(&[0xFE, 0xFF, 0x00, 0x4B, 0x00, 0xF6, 0x00, 0x62]),
            "Köb"
        );
        assert_eq!(decode_text_string(&[0xEF, 0xBB, 0xBF, b'h', b'i']), "hi");
        assert_eq!(decode_text_string("Brontë".as_bytes()), "Brontë");
        assert_eq!(decode_text_string(&[b'A', 0x84, b'B']), "A\u{2014}B");
        assert_eq!(decode_text_string(&[0xE9]), "é");
    }

    #[test]
    fn bare_utf8_wins_over_pdf_doc_encoding() {
        assert_eq!(decode_text_string(&[0xC3, 0xA9]), "é");
        // not valid UTF-8, so each byte maps through PDFDocEncoding
        assert_eq!(decode_text_string(&[0xC3, 0x41]), "ÃA");
    }

    #[test]
    fn encode_picks_format_by_content() {
        assert!(matches!(
            encode_text_string("Plain"),
            Object::String(ref bytes, StringFormat::Literal) if bytes == b"Plain"
        ));
        match encode_text_string("Zoë") {
            Object::String(bytes, StringFormat::Hexadecimal) => {
                assert_eq!(decode_text_string(&bytes), "Zoë");
            }
            other => panic!("unexpected encoding: {:?}", other),
        }
    }

    #[test]
    fn reads_direct_and_indirect_info() {
        let mut doc = Document::with_version("1.5");
        doc.trailer.set(
            "Info",
            dictionary! {
                "Author" => Object::string_literal(" Stephen King "),
                "Title" => Object::string_literal("The Shining"),
            },
        );
        assert_eq!(read_info(&doc), PdfMetadata::new("Stephen King", "The Shining"));

        let title_id = doc.add_object(Object::string_literal("Carrie"));
        let info_id = doc.add_object(dictionary! { "Title" => Object::Reference(title_id) });
        doc.trailer.set("Info", Object::Reference(info_id));
        assert_eq!(read_info(&doc), PdfMetadata::new("", "Carrie"));
    }

    #[test]
    fn write_creates_info_and_keeps_other_keys() {
        let mut doc = Document::with_version("1.5");
        assert_eq!(read_info(&doc), PdfMetadata::default());

        write_info(&mut doc, &PdfMetadata::new("A", "B")).unwrap();
        assert_eq!(read_info(&doc), PdfMetadata::new("A", "B"));

        let info_id = doc.trailer.get(b"Info").unwrap().as_reference().unwrap();
        doc.get_object_mut(info_id)
            .unwrap()
            .as_dict_mut()
            .unwrap()
            .set("Producer", Object::string_literal("scanner"));

        write_info(&mut doc, &PdfMetadata::new("C", "Dé")).unwrap();
        assert_eq!(read_info(&doc), PdfMetadata::new("C", "Dé"));
        let info = info_dictionary(&doc).unwrap();
        assert!(info.has(b"Producer"));
    }
}

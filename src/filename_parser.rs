// Filename parser - "Author - Title.pdf" with a title-only fallback
use std::path::Path;

use crate::types::PdfMetadata;

pub const SEPARATOR: &str = " - ";
const PDF_EXTENSION: &str = ".pdf";

/// Split a filename stem on the first " - " into (author, title).
/// Without a separator the whole stem is the title and the author is empty.
pub fn parse_stem(stem: &str) -> PdfMetadata {
    match stem.split_once(SEPARATOR) {
        Some((author, title)) => PdfMetadata::new(author.trim(), title.trim()),
        None => PdfMetadata::new("", stem.trim()),
    }
}

/// Same as [`parse_stem`] but accepts a full filename and drops a trailing `.pdf` (any case)
pub fn parse_file_name(name: &str) -> PdfMetadata {
    parse_stem(strip_pdf_extension(name))
}

pub fn parse_path(path: &Path) -> PdfMetadata {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    parse_file_name(&name)
}

fn strip_pdf_extension(name: &str) -> &str {
    let split = name.len().saturating_sub(PDF_EXTENSION.len());
    match (name.get(..split), name.get(split..)) {
        (Some(stem), Some(ext)) if ext.eq_ignore_ascii_case(PDF_EXTENSION) => stem,
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Stephen King - The Shining.pdf", "Stephen King", "The Shining")]
    #[case("ComplexDocument_v2.pdf", "", "ComplexDocument_v2")]
    #[case("A - B - C.pdf", "A", "B - C")]
    #[case("  Ursula Le Guin  -  The Dispossessed .PDF", "Ursula Le Guin", "The Dispossessed")]
    #[case("Author-Title.pdf", "", "Author-Title")]
    #[case(" - Untitled.pdf", "", "Untitled")]
    #[case("notes.pdf.bak", "", "notes.pdf.bak")]
    fn parses_file_names(#[case] name: &str, #[case] author: &str, #[case] title: &str) {
        let parsed = parse_file_name(name);
        assert_eq!(parsed.author, author);
        assert_eq!(parsed.title, title);
    }

    #[test]
    fn handles_multibyte_names_without_panicking() {
        assert_eq!(parse_file_name("é").title, "é");
        assert_eq!(parse_file_name("村上春樹 - 海辺のカフカ.pdf").author, "村上春樹");
    }

    #[test]
    fn parse_path_uses_the_file_name_only() {
        let parsed = parse_path(Path::new("/library/Horror - Stories/Stephen King - It.pdf"));
        assert_eq!(parsed, PdfMetadata::new("Stephen King", "It"));
    }
}

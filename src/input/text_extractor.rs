//! Text extraction from uploaded files

use crate::error::{Result, TypesetError};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};
use std::path::Path;
use tokio::fs;

pub trait TextExtractor {
    fn extract(&self, path: &Path) -> impl std::future::Future<Output = Result<String>> + Send;
}

pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    async fn extract(&self, path: &Path) -> Result<String> {
        let bytes = fs::read(path).await?;
        String::from_utf8(bytes).map_err(|e| {
            TypesetError::Extraction(format!("'{}' is not valid UTF-8: {}", path.display(), e))
        })
    }
}

pub struct DocxExtractor;

impl TextExtractor for DocxExtractor {
    async fn extract(&self, path: &Path) -> Result<String> {
        let bytes = fs::read(path).await?;
        let display = path.display().to_string();

        tokio::task::spawn_blocking(move || extract_docx_text(&bytes))
            .await
            .map_err(|e| TypesetError::Extraction(format!("extraction task for '{}' failed: {}", display, e)))?
    }
}

/// Raw paragraph text of a `.docx` package, paragraphs separated by a blank line.
pub fn extract_docx_text(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| TypesetError::Extraction(format!("not a Word package: {}", e)))?;

    let mut xml = Vec::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| TypesetError::Extraction(format!("missing word/document.xml: {}", e)))?
        .read_to_end(&mut xml)?;

    let paragraphs = document_paragraphs(&xml)?;
    Ok(paragraphs.join("\n\n"))
}

fn document_paragraphs(xml: &[u8]) -> Result<Vec<String>> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);

    let mut paragraphs = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| TypesetError::Extraction(format!("malformed document.xml: {}", e)))?;

        match event {
            Event::Eof => break,
            Event::Start(e) => match e.name().as_ref() {
                b"w:p" => current = Some(String::new()),
                b"w:t" => in_text = true,
                _ => {}
            },
            Event::End(e) => match e.name().as_ref() {
                b"w:p" => {
                    if let Some(text) = current.take() {
                        paragraphs.push(text);
                    }
                }
                b"w:t" => in_text = false,
                _ => {}
            },
            Event::Empty(e) => {
                let name = e.name();
                match name.as_ref() {
                    b"w:p" => paragraphs.push(String::new()),
                    b"w:tab" => push_control(&mut current, '\t'),
                    b"w:br" | b"w:cr" => push_control(&mut current, '\n'),
                    _ => {}
                }
            }
            Event::Text(t) if in_text => {
                let text = t
                    .unescape()
                    .map_err(|e| TypesetError::Extraction(format!("bad text node: {}", e)))?;
                if let Some(para) = current.as_mut() {
                    para.push_str(&text);
                }
            }
            _ => {}
        }
    }

    Ok(paragraphs)
}

fn push_control(current: &mut Option<String>, ch: char) {
    if let Some(para) = current.as_mut() {
        para.push(ch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn package_with(document_xml: &str) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("word/document.xml", SimpleFileOptions::default())
            .unwrap();
        zip.write_all(document_xml.as_bytes()).unwrap();
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn test_paragraphs_tabs_and_breaks() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
<w:body>
<w:p><w:r><w:t>Hello</w:t></w:r><w:r><w:t xml:space="preserve"> world</w:t></w:r></w:p>
<w:p/>
<w:p><w:r><w:t>a</w:t><w:tab/><w:t>b</w:t><w:br/><w:t>c &amp; d</w:t></w:r></w:p>
</w:body>
</w:document>"#;

        let text = extract_docx_text(&package_with(xml)).unwrap();
        assert_eq!(text, "Hello world\n\n\n\na\tb\nc & d");
    }

    #[test]
    fn test_non_zip_input_is_extraction_error() {
        let err = extract_docx_text(b"\xD0\xCF\x11\xE0 legacy doc").unwrap_err();
        assert!(matches!(err, TypesetError::Extraction(_)));
    }

    #[test]
    fn test_package_without_document_part() {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("other.xml", SimpleFileOptions::default()).unwrap();
        zip.write_all(b"<x/>").unwrap();
        let bytes = zip.finish().unwrap().into_inner();

        let err = extract_docx_text(&bytes).unwrap_err();
        assert!(err.to_string().contains("word/document.xml"));
    }

    #[tokio::test]
    async fn test_plain_text_rejects_invalid_utf8() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.txt");
        std::fs::write(&path, [0xff, 0xfe, 0x00, 0x41]).unwrap();

        let result = PlainTextExtractor.extract(&path).await;
        assert!(matches!(result, Err(TypesetError::Extraction(_))));
    }
}

//! HTML to Word (OOXML) conversion
//!
//! The HTML is walked into paragraphs, runs and tables (`html`), serialised
//! as WordprocessingML (`xml`) and zipped together with the fixed package
//! parts (`parts`).

pub mod html;
pub mod parts;
pub mod xml;

use crate::config::DocumentConfig;
use crate::error::{Result, TypesetError};
use chrono::Utc;
use log::debug;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Core properties written to `docProps/core.xml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMetadata {
    pub title: String,
    pub subject: String,
    pub creator: String,
    pub keywords: Vec<String>,
    pub description: String,
}

/// Converts final HTML into `.docx` bytes with configured metadata defaults.
#[derive(Debug, Clone)]
pub struct DocxConverter {
    defaults: DocumentConfig,
}

impl DocxConverter {
    pub fn new(defaults: DocumentConfig) -> Self {
        Self { defaults }
    }

    /// Metadata for a document; a blank `title` falls back to the configured default.
    pub fn metadata_for(&self, title: Option<&str>) -> DocumentMetadata {
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(&self.defaults.default_title);

        DocumentMetadata {
            title: title.to_string(),
            subject: self.defaults.subject.clone(),
            creator: self.defaults.creator.clone(),
            keywords: self.defaults.keywords.clone(),
            description: self.defaults.description.clone(),
        }
    }

    pub fn convert(&self, html: &str, title: Option<&str>) -> Result<Vec<u8>> {
        html_to_docx(html, &self.metadata_for(title))
    }
}

impl Default for DocxConverter {
    fn default() -> Self {
        Self::new(DocumentConfig::default())
    }
}

pub fn html_to_docx(html: &str, metadata: &DocumentMetadata) -> Result<Vec<u8>> {
    let blocks = html::parse_blocks(html);
    debug!("Converted HTML into {} top-level blocks", blocks.len());

    let document = xml::document_xml(&blocks)?;
    let core = xml::core_xml(metadata, Utc::now())?;

    package(&[
        ("[Content_Types].xml", parts::CONTENT_TYPES.as_bytes()),
        ("_rels/.rels", parts::PACKAGE_RELS.as_bytes()),
        ("word/document.xml", document.as_slice()),
        ("word/_rels/document.xml.rels", parts::DOCUMENT_RELS.as_bytes()),
        ("word/styles.xml", parts::STYLES.as_bytes()),
        ("docProps/core.xml", core.as_slice()),
        ("docProps/app.xml", parts::APP_PROPERTIES.as_bytes()),
    ])
}

fn package(entries: &[(&str, &[u8])]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, data) in entries {
        zip.start_file(*name, options)?;
        zip.write_all(data)
            .map_err(|e| TypesetError::Conversion(format!("write {}: {}", name, e)))?;
    }

    Ok(zip.finish()?.into_inner())
}

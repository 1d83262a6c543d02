//! Input manager: routes an upload to the right extractor and builds its preview

use crate::input::file_detector::FileType;
use crate::input::text_extractor::{DocxExtractor, PlainTextExtractor, TextExtractor};
use log::{error, info, warn};
use std::path::Path;

pub const DEFAULT_PREVIEW_CHARS: usize = 500;
pub const TRUNCATION_MARKER: &str = "...";

/// Text pulled out of an upload. `text` is empty whenever extraction degraded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub preview: String,
    pub text: String,
}

impl Extraction {
    fn placeholder(preview: String) -> Self {
        Self {
            preview,
            text: String::new(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.text.is_empty()
    }
}

pub struct InputManager {
    preview_chars: usize,
}

impl InputManager {
    pub fn new() -> Self {
        Self {
            preview_chars: DEFAULT_PREVIEW_CHARS,
        }
    }

    pub fn with_preview_chars(mut self, preview_chars: usize) -> Self {
        self.preview_chars = preview_chars;
        self
    }

    /// Extract text from a stored upload.
    ///
    /// `original_name` is the client-side file name; its extension decides the
    /// extractor and it is echoed in placeholder previews. Failures never
    /// propagate: they yield a placeholder preview and empty text.
    pub async fn extract(&self, path: &Path, original_name: &str) -> Extraction {
        match FileType::from_filename(original_name) {
            FileType::PlainText => {
                info!("Reading plain text upload: {}", original_name);
                match PlainTextExtractor.extract(path).await {
                    Ok(text) => self.with_preview(text),
                    Err(e) => {
                        warn!("Plain text upload {} could not be decoded: {}", original_name, e);
                        Extraction::placeholder(
                            "[二进制文件内容无法直接预览，请确保文件编码为UTF-8]".to_string(),
                        )
                    }
                }
            }
            FileType::WordDocument => {
                info!("Extracting text from Word document: {}", original_name);
                match DocxExtractor.extract(path).await {
                    Ok(text) => self.with_preview(text),
                    Err(e) => {
                        error!("Word extraction failed for {}: {}", original_name, e);
                        Extraction::placeholder(format!(
                            "[{} - 文档解析失败，请确保文件格式正确]",
                            original_name
                        ))
                    }
                }
            }
            FileType::Binary => {
                info!("Skipping preview for binary upload: {}", original_name);
                Extraction::placeholder(format!("[{} - 二进制文件，内容无法直接预览]", original_name))
            }
        }
    }

    fn with_preview(&self, text: String) -> Extraction {
        Extraction {
            preview: preview(&text, self.preview_chars),
            text,
        }
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

/// First `limit` characters of `text`, with the truncation marker appended
/// only when something was cut.
pub fn preview(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}{}", &text[..cut], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_short_text_is_unchanged() {
        assert_eq!(preview("Hello world", 500), "Hello world");
        assert_eq!(preview("", 500), "");
    }

    #[test]
    fn test_preview_exact_limit_has_no_marker() {
        let text = "a".repeat(500);
        assert_eq!(preview(&text, 500), text);
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let text = "排".repeat(501);
        let out = preview(&text, 500);
        assert!(out.ends_with(TRUNCATION_MARKER));
        assert_eq!(out.chars().count(), 500 + TRUNCATION_MARKER.len());
        assert_eq!(out.trim_end_matches(TRUNCATION_MARKER), "排".repeat(500));
    }

    #[tokio::test]
    async fn test_unknown_extension_gets_binary_placeholder() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("upload.bin");
        std::fs::write(&path, b"whatever").unwrap();

        let extraction = InputManager::new().extract(&path, "photo.PNG").await;
        assert_eq!(extraction.preview, "[photo.PNG - 二进制文件，内容无法直接预览]");
        assert!(extraction.is_degraded());
    }

    #[tokio::test]
    async fn test_broken_docx_degrades_with_name() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("upload.docx");
        std::fs::write(&path, b"not a zip at all").unwrap();

        let extraction = InputManager::new().extract(&path, "report.docx").await;
        assert_eq!(extraction.preview, "[report.docx - 文档解析失败，请确保文件格式正确]");
        assert!(extraction.text.is_empty());
    }

    #[tokio::test]
    async fn test_long_text_keeps_full_extraction() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("long.md");
        let content = "x".repeat(1200);
        std::fs::write(&path, &content).unwrap();

        let extraction = InputManager::new().extract(&path, "long.md").await;
        assert_eq!(extraction.text, content);
        assert_eq!(extraction.preview, format!("{}...", "x".repeat(500)));
    }
}

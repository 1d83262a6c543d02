//! File type detection

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// `.txt`, `.md`, `.html`, `.htm`: read directly as UTF-8.
    PlainText,
    /// `.docx`, `.doc`: routed through the Word text extractor.
    WordDocument,
    /// Anything else is stored but never previewed.
    Binary,
}

impl FileType {
    /// Accepts the extension with or without its leading dot, in any case.
    pub fn from_extension(ext: &str) -> Self {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "txt" | "md" | "html" | "htm" => FileType::PlainText,
            "docx" | "doc" => FileType::WordDocument,
            _ => FileType::Binary,
        }
    }

    pub fn from_filename(name: &str) -> Self {
        Self::from_extension(&extension_of(name))
    }
}

/// Lower-cased extension of `name` without the dot, or an empty string.
pub fn extension_of(name: &str) -> String {
    std::path::Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .unwrap_or_default()
}

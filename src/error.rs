//! Error handling for the typesetting service

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TypesetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Missing API credential: environment variable {0} is not set")]
    MissingCredential(String),

    #[error("Text extraction error: {0}")]
    Extraction(String),

    #[error("Completion request failed: {message}")]
    Completion {
        status: Option<u16>,
        message: String,
    },

    #[error("Word conversion error: {0}")]
    Conversion(String),

    #[error("Artifact storage error: {0}")]
    Storage(String),

    #[error("Output formatting error: {0}")]
    OutputFormatting(String),
}

pub type Result<T> = std::result::Result<T, TypesetError>;

impl TypesetError {
    pub fn completion(status: Option<u16>, message: impl Into<String>) -> Self {
        TypesetError::Completion {
            status,
            message: message.into(),
        }
    }
}

/// Convert anyhow errors to our custom error type
impl From<anyhow::Error> for TypesetError {
    fn from(err: anyhow::Error) -> Self {
        TypesetError::Configuration(err.to_string())
    }
}

impl From<reqwest::Error> for TypesetError {
    fn from(err: reqwest::Error) -> Self {
        TypesetError::Completion {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

impl From<zip::result::ZipError> for TypesetError {
    fn from(err: zip::result::ZipError) -> Self {
        TypesetError::Conversion(err.to_string())
    }
}

impl From<askama::Error> for TypesetError {
    fn from(err: askama::Error) -> Self {
        TypesetError::OutputFormatting(err.to_string())
    }
}

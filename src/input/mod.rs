//! Input processing module
//! Handles file type detection, text extraction and preview building

pub mod file_detector;
pub mod text_extractor;
pub mod manager;

pub use manager::{Extraction, InputManager};

//! Output stage: HTML cleanup and Word document generation

pub mod docx;
pub mod normalizer;
pub mod sanitizer;

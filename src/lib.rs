//! Quick typeset library

pub mod cli;
pub mod config;
pub mod error;
pub mod input;
pub mod llm;
pub mod output;
pub mod pipeline;
pub mod server;
pub mod storage;

pub use config::Config;
pub use error::{Result, TypesetError};
pub use pipeline::TypesetPipeline;

//! CLI interface for the typesetting service

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "quick-typeset")]
#[command(about = "AI-assisted typesetting: plain text in, formatted HTML and Word documents out")]
#[command(long_about = "Upload a text or Word file, describe the layout you want, and let a chat-completion model produce a styled HTML page that can be converted into a .docx document")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP service
    Serve {
        /// Interface to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Directory for uploads and generated artifacts
        #[arg(long)]
        uploads_dir: Option<PathBuf>,
    },

    /// Print the text extracted from a file
    Extract {
        /// Path to a text or Word (.docx) file
        file: PathBuf,

        /// Print the whole text instead of the preview
        #[arg(long)]
        full: bool,
    },

    /// Typeset a file and produce both HTML and Word output
    Typeset {
        /// Path to a text or Word (.docx) file
        file: PathBuf,

        /// Free-text layout instructions forwarded to the model
        #[arg(short, long)]
        intent: String,

        /// Where to write the artifacts (defaults to the uploads directory)
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Convert an HTML file into a Word document
    Convert {
        /// HTML input file
        html: PathBuf,

        /// Output path (defaults to the input with a .docx extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Document title stored in the package metadata
        #[arg(long)]
        title: Option<String>,
    },

    /// Show or initialise configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

/// Validate file extension
pub fn validate_file_extension(path: &Path, allowed_extensions: &[&str]) -> Result<(), String> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => {
            if allowed_extensions.contains(&ext.to_lowercase().as_str()) {
                Ok(())
            } else {
                Err(format!(
                    "Unsupported file extension: .{}. Allowed: {}",
                    ext,
                    allowed_extensions.join(", ")
                ))
            }
        }
        None => Err("File has no extension".to_string()),
    }
}

/// `report.html` -> `report.docx`, next to the input.
pub fn default_docx_path(html: &Path) -> PathBuf {
    html.with_extension("docx")
}

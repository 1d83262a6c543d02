//! Quick typeset: AI-assisted document typesetting service and CLI

use anyhow::{bail, Context};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};
use quick_typeset::cli::{self, Cli, Commands, ConfigAction};
use quick_typeset::input::InputManager;
use quick_typeset::output::docx::DocxConverter;
use quick_typeset::pipeline::{TypesetPipeline, TypesetRequest};
use quick_typeset::server::{self, AppState};
use quick_typeset::Config;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    // Pick up the API key and overrides from a local .env file, if any
    if let Ok(path) = dotenvy::dotenv() {
        info!("Loaded environment from {}", path.display());
    }

    // Load configuration
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    // Execute command
    if let Err(e) = run_command(cli.command, config, cli.config).await {
        error!("Command failed: {:#}", e);
        process::exit(1);
    }
}

async fn run_command(command: Commands, mut config: Config, config_file: Option<PathBuf>) -> anyhow::Result<()> {
    match command {
        Commands::Serve { host, port, uploads_dir } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(dir) = uploads_dir {
                config.storage.uploads_dir = dir;
            }

            let addr = config.bind_addr();
            let pipeline = TypesetPipeline::new(config).context("failed to initialise pipeline")?;
            server::start_server(&addr, AppState::new(pipeline))
                .await
                .with_context(|| format!("server on {} stopped", addr))?;
        }

        Commands::Extract { file, full } => {
            let name = file_name(&file)?;
            let extraction = InputManager::new()
                .with_preview_chars(config.typeset.preview_chars)
                .extract(&file, &name)
                .await;

            if extraction.is_degraded() {
                eprintln!("{} {}", "⚠".yellow(), "No text could be extracted".yellow());
            }
            if full && !extraction.is_degraded() {
                println!("{}", extraction.text);
            } else {
                println!("{}", extraction.preview);
            }
        }

        Commands::Typeset { file, intent, out_dir } => {
            if let Some(dir) = out_dir {
                config.storage.uploads_dir = dir;
            }
            run_typeset(config, &file, &intent).await?;
        }

        Commands::Convert { html, output, title } => {
            if let Err(e) = cli::validate_file_extension(&html, &["html", "htm"]) {
                bail!(e);
            }
            let content = tokio::fs::read_to_string(&html)
                .await
                .with_context(|| format!("failed to read {}", html.display()))?;
            let title = title.or_else(|| html.file_stem().map(|s| s.to_string_lossy().to_string()));

            let bytes = DocxConverter::new(config.document).convert(&content, title.as_deref())?;
            let output = output.unwrap_or_else(|| cli::default_docx_path(&html));
            tokio::fs::write(&output, &bytes)
                .await
                .with_context(|| format!("failed to write {}", output.display()))?;

            println!("{} {} ({} bytes)", "✓".green(), output.display(), bytes.len());
        }

        Commands::Config { action } => match action {
            Some(ConfigAction::Show) | None => {
                println!("{}\n", "Current configuration".bold());
                let path = config_file.unwrap_or_else(Config::config_path);
                println!("File: {}{}", path.display(), if path.exists() { "" } else { " (not present, using defaults)" });
                let credential = if config.has_api_key() { "set".green() } else { "missing".red() };
                println!("Credential ({}): {}\n", config.llm.api_key_env, credential);
                print!("{}", toml::to_string_pretty(&config).context("failed to render configuration")?);
            }

            Some(ConfigAction::Init { force }) => {
                let path = config_file.unwrap_or_else(Config::config_path);
                if path.exists() && !force {
                    bail!("{} already exists, pass --force to overwrite", path.display());
                }
                Config::default().save(&path)?;
                println!("{} Wrote default configuration to {}", "✓".green(), path.display());
            }
        },
    }

    Ok(())
}

/// Upload, typeset and convert one local file, mirroring the three API calls.
async fn run_typeset(config: Config, file: &Path, intent: &str) -> anyhow::Result<()> {
    let name = file_name(file)?;
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;

    let pipeline = TypesetPipeline::new(config)?;
    let record = pipeline.upload(&name, &bytes, Some(intent)).await?;
    if record.extracted_text.is_empty() {
        bail!("no text could be extracted from {}: {}", name, record.text_preview);
    }
    println!("{} Extracted {} characters from {}", "✓".green(), record.extracted_text.chars().count(), name);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed}]")
            .context("invalid spinner template")?
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    spinner.set_message("Waiting for the completion endpoint...");
    spinner.enable_steady_tick(Duration::from_millis(80));

    let request = TypesetRequest {
        extracted_text: Some(record.extracted_text),
        intent: Some(record.intent),
        filename: Some(name.clone()),
        ..TypesetRequest::default()
    };
    let typeset = pipeline.typeset(&request).await;
    spinner.finish_and_clear();
    let typeset = typeset?;
    info!("Typeset HTML stored as {}", typeset.filename);
    println!("{} HTML: {}", "✓".green(), pipeline.store().root().join(&typeset.filename).display());

    let word = pipeline.convert_to_word(Some(&typeset.html), Some(&name)).await?;
    println!("{} Word: {}", "✓".green(), pipeline.store().root().join(&word.filename).display());

    Ok(())
}

fn file_name(path: &Path) -> anyhow::Result<String> {
    match path.file_name() {
        Some(name) => Ok(name.to_string_lossy().to_string()),
        None => bail!("{} is not a file", path.display()),
    }
}

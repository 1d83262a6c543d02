//! Upload → typeset → convert stages
//!
//! Each stage is driven by one client request and only sees what that request
//! carries; nothing links the stages server-side.

use crate::config::Config;
use crate::error::{Result, TypesetError};
use crate::input::InputManager;
use crate::llm::{CompletionClient, PromptParams, PromptTemplates};
use crate::output::docx::DocxConverter;
use crate::output::{normalizer, sanitizer};
use crate::storage::ArtifactStore;
use log::{info, warn};
use serde::Deserialize;

pub const MISSING_TYPESET_INPUT: &str = "缺少文本内容或排版意图";
pub const MISSING_HTML: &str = "缺少HTML内容";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRecord {
    pub filename: String,
    pub original_name: String,
    pub text_preview: String,
    pub extracted_text: String,
    pub intent: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypesetRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub extracted_text: Option<String>,
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

impl TypesetRequest {
    /// `extractedText` wins over `text` when both are non-empty.
    pub fn content(&self) -> Option<&str> {
        non_empty(self.extracted_text.as_deref()).or_else(|| non_empty(self.text.as_deref()))
    }

    pub fn intent(&self) -> Option<&str> {
        non_empty(self.intent.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypesetResult {
    pub html: String,
    pub html_url: String,
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordResult {
    pub download_url: String,
    pub filename: String,
}

pub struct TypesetPipeline {
    config: Config,
    input: InputManager,
    prompts: PromptTemplates,
    completion: CompletionClient,
    converter: DocxConverter,
    store: ArtifactStore,
}

impl TypesetPipeline {
    pub fn new(config: Config) -> Result<Self> {
        let completion = CompletionClient::new(&config.llm)?;
        let input = InputManager::new().with_preview_chars(config.typeset.preview_chars);
        let converter = DocxConverter::new(config.document.clone());
        let store = ArtifactStore::new(config.storage.uploads_dir.clone());

        Ok(Self {
            config,
            input,
            prompts: PromptTemplates::default(),
            completion,
            converter,
            store,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Store an uploaded file and extract its text. Extraction problems
    /// degrade the record instead of failing it.
    pub async fn upload(&self, original_name: &str, bytes: &[u8], intent: Option<&str>) -> Result<UploadRecord> {
        let stored = self.store.store_upload(original_name, bytes).await?;
        info!("Stored upload {} as {}", original_name, stored.name);

        let extraction = self.input.extract(&stored.path, original_name).await;
        if extraction.is_degraded() {
            warn!("Upload {} produced no extractable text", stored.name);
        }

        let intent = non_empty(intent)
            .map(str::to_string)
            .unwrap_or_else(|| self.config.typeset.default_intent.clone());

        Ok(UploadRecord {
            filename: stored.name,
            original_name: original_name.to_string(),
            text_preview: extraction.preview,
            extracted_text: extraction.text,
            intent,
        })
    }

    /// Ask the completion endpoint for HTML, clean it up and persist it.
    pub async fn typeset(&self, request: &TypesetRequest) -> Result<TypesetResult> {
        let (content, intent) = match (request.content(), request.intent()) {
            (Some(content), Some(intent)) => (content, intent),
            _ => return Err(TypesetError::InvalidInput(MISSING_TYPESET_INPUT.to_string())),
        };

        if !self.completion.has_credential() {
            return Err(TypesetError::MissingCredential(self.config.llm.api_key_env.clone()));
        }

        let prompt = self.prompts.render_typeset(&PromptParams {
            content: content.to_string(),
            intent: intent.to_string(),
        });
        let completion = self.completion.complete(&prompt).await?;
        info!(
            "Completion for {} returned {} chars in {}ms",
            request.filename.as_deref().unwrap_or("<unnamed>"),
            completion.content.len(),
            completion.latency_ms
        );

        let mut html = normalizer::normalize(&completion.content, request.filename.as_deref())?;
        if self.config.typeset.sanitize_html {
            html = sanitizer::sanitize(&html);
        }

        let stored = self.store.store_generated("typeset", "html", html.as_bytes()).await?;
        Ok(TypesetResult {
            html_url: stored.url(),
            filename: stored.name,
            html,
        })
    }

    /// Convert final HTML into a Word document and persist it.
    pub async fn convert_to_word(&self, html: Option<&str>, filename: Option<&str>) -> Result<WordResult> {
        let html = non_empty(html)
            .ok_or_else(|| TypesetError::InvalidInput(MISSING_HTML.to_string()))?
            .to_string();

        let converter = self.converter.clone();
        let title = filename.map(str::to_string);
        let bytes = tokio::task::spawn_blocking(move || converter.convert(&html, title.as_deref()))
            .await
            .map_err(|e| TypesetError::Conversion(format!("conversion task failed: {}", e)))??;

        let stored = self.store.store_generated("document", "docx", &bytes).await?;
        info!("Generated Word document {} ({} bytes)", stored.name, bytes.len());

        Ok(WordResult {
            download_url: stored.url(),
            filename: stored.name,
        })
    }
}

/// Only the empty string counts as missing; whitespace is forwarded as given.
fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

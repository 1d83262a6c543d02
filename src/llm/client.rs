//! Chat-completion client for the remote typesetting model

use crate::config::LlmConfig;
use crate::error::{Result, TypesetError};
use crate::llm::prompts::TypesetPrompt;
use log::{debug, error, info};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Completion output plus timing, for logging.
#[derive(Debug, Clone)]
pub struct Completion {
    pub content: String,
    pub latency_ms: u64,
}

/// HTTP client for the chat-completions endpoint
#[derive(Debug, Clone)]
pub struct CompletionClient {
    client: Client,
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    api_key_env: String,
    api_key: Option<String>,
}

impl CompletionClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| TypesetError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.api_base.trim_end_matches('/')),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            api_key_env: config.api_key_env.clone(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one completion request and return the first choice's content.
    ///
    /// A missing credential is reported before any network activity. Upstream
    /// failures carry the HTTP status and the provider's error message.
    pub async fn complete(&self, prompt: &TypesetPrompt) -> Result<Completion> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| TypesetError::MissingCredential(self.api_key_env.clone()))?;

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: &prompt.system,
                },
                Message {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        info!("Requesting completion from {} (model {})", self.endpoint, self.model);
        let start = Instant::now();

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = upstream_message(&body)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("upstream error").to_string());
            error!("Completion endpoint returned {}: {}", status, body);
            return Err(TypesetError::completion(Some(status.as_u16()), message));
        }

        let chat: ChatResponse = response.json().await?;
        let latency_ms = start.elapsed().as_millis() as u64;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| TypesetError::completion(None, "completion response contained no choices"))?;

        debug!("Completion returned {} chars in {}ms", content.len(), latency_ms);
        Ok(Completion { content, latency_ms })
    }
}

/// Provider error message from an OpenAI-style `{"error": {"message": ..}}`
/// body, falling back to the raw body text.
fn upstream_message(body: &str) -> Option<String> {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        return Some(envelope.error.message);
    }
    let trimmed = body.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

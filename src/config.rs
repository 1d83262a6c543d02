//! Configuration management for the typesetting service

use crate::error::{Result, TypesetError};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub typeset: TypesetConfig,
    pub storage: StorageConfig,
    pub document: DocumentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Front-end build directory served for every non-API path.
    pub static_dir: PathBuf,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_base: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Name of the environment variable holding the bearer token.
    pub api_key_env: String,
    pub timeout_secs: Option<u64>,
    /// Resolved from `api_key_env` at load time, never written to disk.
    #[serde(skip)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TypesetConfig {
    pub default_intent: String,
    pub sanitize_html: bool,
    pub preview_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub uploads_dir: PathBuf,
    /// Artifacts older than this are swept. `None` keeps everything.
    pub retention_secs: Option<u64>,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    pub default_title: String,
    pub subject: String,
    pub creator: String,
    pub keywords: Vec<String>,
    pub description: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            llm: LlmConfig::default(),
            typeset: TypesetConfig::default(),
            storage: StorageConfig::default(),
            document: DocumentConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5001,
            static_dir: PathBuf::from("client/build"),
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.deepseek.com/v1".to_string(),
            model: "deepseek-chat".to_string(),
            temperature: 0.7,
            max_tokens: 4000,
            api_key_env: "DEEPSEEK_API_KEY".to_string(),
            timeout_secs: None,
            api_key: None,
        }
    }
}

impl Default for TypesetConfig {
    fn default() -> Self {
        Self {
            default_intent: "标准排版，包括标题、段落、列表等基本格式".to_string(),
            sanitize_html: true,
            preview_chars: 500,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            uploads_dir: PathBuf::from("uploads"),
            retention_secs: None,
            sweep_interval_secs: 600,
        }
    }
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            default_title: "排版文档".to_string(),
            subject: "快速排版系统生成的文档".to_string(),
            creator: "快速排版系统".to_string(),
            keywords: vec!["排版".to_string(), "文档".to_string(), "转换".to_string()],
            description: "通过DeepSeek API生成的排版文档".to_string(),
        }
    }
}

impl Config {
    /// Load from an explicit path, the per-user config file, or defaults,
    /// then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Self::config_path();
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    debug!("No config file at {}, using defaults", default_path.display());
                    Self::default()
                }
            }
        };

        config.apply_env();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TypesetError::Configuration(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| TypesetError::Configuration(format!("Failed to parse config: {}", e)))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| TypesetError::Configuration(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
            .join("quick-typeset")
            .join("config.toml")
    }

    fn apply_env(&mut self) {
        if let Ok(port) = std::env::var("PORT") {
            match port.parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!("Ignoring invalid PORT value: {}", port),
            }
        }

        if let Ok(dir) = std::env::var("QUICK_TYPESET_UPLOADS_DIR") {
            if !dir.is_empty() {
                self.storage.uploads_dir = PathBuf::from(dir);
            }
        }

        self.llm.api_key = std::env::var(&self.llm.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());
    }

    /// Explicitly set (or clear) the completion credential.
    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.llm.api_key = key.filter(|k| !k.trim().is_empty());
        self
    }

    pub fn has_api_key(&self) -> bool {
        self.llm.api_key.is_some()
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_service_contract() {
        let config = Config::default();
        assert_eq!(config.server.port, 5001);
        assert_eq!(config.llm.model, "deepseek-chat");
        assert_eq!(config.llm.max_tokens, 4000);
        assert!((config.llm.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.typeset.preview_chars, 500);
        assert!(config.storage.retention_secs.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [server]
            port = 8088

            [storage]
            retention_secs = 3600
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8088);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.storage.retention_secs, Some(3600));
        assert_eq!(config.llm.api_key_env, "DEEPSEEK_API_KEY");
    }

    #[test]
    fn test_invalid_toml_is_configuration_error() {
        let err = Config::from_toml("server = 3").unwrap_err();
        assert!(matches!(err, TypesetError::Configuration(_)));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.typeset.sanitize_html = false;
        config.save(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert!(!loaded.typeset.sanitize_html);
        assert!(loaded.llm.api_key.is_none());
    }

    #[test]
    fn test_blank_api_key_is_treated_as_missing() {
        let config = Config::default().with_api_key(Some("   ".to_string()));
        assert!(!config.has_api_key());

        let config = Config::default().with_api_key(Some("sk-test".to_string()));
        assert!(config.has_api_key());
    }
}

//! Pipeline configuration: upload limits, storage paths and provider
//! settings. Loaded from a JSON file with serde defaults for every field,
//! then semantically validated.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const KNOWN_PROVIDERS: &[&str] = &["ollama", "openai", "mock"];

fn default_upload_directory() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".bankfeed").join("uploads"))
        .unwrap_or_else(|| PathBuf::from("uploads"))
}

fn default_max_upload_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3.2".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IngestConfig {
    /// Where uploaded statement bytes are stored.
    pub upload_directory: PathBuf,
    /// Database file; `None` means the platform default path.
    pub database_path: Option<PathBuf>,
    /// Upload size cap.
    pub max_upload_bytes: u64,
    pub providers: ProvidersConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            upload_directory: default_upload_directory(),
            database_path: None,
            max_upload_bytes: default_max_upload_bytes(),
            providers: ProvidersConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProvidersConfig {
    /// Provider tried first when no explicit hint is given.
    pub preferred: Option<String>,
    /// Deadline for a single extraction call.
    pub request_timeout_secs: u64,
    pub ollama: OllamaConfig,
    pub openai: OpenAiConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            preferred: None,
            request_timeout_secs: default_request_timeout_secs(),
            ollama: OllamaConfig::default(),
            openai: OpenAiConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_base_url(),
            model: default_ollama_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OpenAiConfig {
    /// Key is read from config or the OPENAI_API_KEY environment variable;
    /// absent key simply makes the provider unavailable.
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            base_url: default_openai_base_url(),
            model: default_openai_model(),
        }
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<IngestConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<IngestConfig, ConfigError> {
    let config: IngestConfig = serde_json::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &IngestConfig) -> Result<(), ConfigError> {
    if config.max_upload_bytes == 0 {
        return Err(ConfigError::Validation {
            message: "maxUploadBytes must be greater than zero".to_string(),
        });
    }

    if config.providers.request_timeout_secs == 0 {
        return Err(ConfigError::Validation {
            message: "requestTimeoutSecs must be greater than zero".to_string(),
        });
    }

    if let Some(preferred) = &config.providers.preferred {
        if !KNOWN_PROVIDERS.contains(&preferred.as_str()) {
            return Err(ConfigError::Validation {
                message: format!(
                    "unknown preferred provider '{}', expected one of: {}",
                    preferred,
                    KNOWN_PROVIDERS.join(", ")
                ),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_uses_defaults() {
        let config = load_config_from_str("{}").unwrap();
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.providers.request_timeout_secs, 120);
        assert_eq!(config.providers.ollama.model, "llama3.2");
    }

    #[test]
    fn test_partial_override() {
        let config = load_config_from_str(
            r#"{
                "maxUploadBytes": 1048576,
                "providers": {
                    "preferred": "mock",
                    "ollama": {"model": "mistral"}
                }
            }"#,
        )
        .unwrap();
        assert_eq!(config.max_upload_bytes, 1_048_576);
        assert_eq!(config.providers.preferred.as_deref(), Some("mock"));
        assert_eq!(config.providers.ollama.model, "mistral");
        // Untouched fields keep their defaults.
        assert_eq!(config.providers.ollama.base_url, "http://localhost:11434");
    }

    #[test]
    fn test_unknown_preferred_provider_rejected() {
        let result = load_config_from_str(r#"{"providers": {"preferred": "gemini"}}"#);
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = load_config_from_str(r#"{"providers": {"requestTimeoutSecs": 0}}"#);
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_malformed_json_rejected() {
        let result = load_config_from_str("{not json");
        assert!(matches!(result, Err(ConfigError::ParseJson(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"maxUploadBytes": 512}"#).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.max_upload_bytes, 512);
    }

    #[test]
    fn test_missing_file_error() {
        let result = load_config("/nonexistent/bankfeed.json");
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }
}

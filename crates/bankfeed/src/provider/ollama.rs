//! Ollama extraction provider: local LLM inference, no API key required.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use super::{pdf, prompt, ExtractedStatement, ExtractionProvider, ProviderError};
use crate::config::OllamaConfig;

/// Probe requests get a short timeout; the extraction call itself runs
/// under the coordinator's deadline.
const PROBE_TIMEOUT_SECS: u64 = 5;

pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaProvider {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    pub fn from_config(config: &OllamaConfig) -> Self {
        Self::new(&config.base_url, &config.model)
    }

    fn http_err(&self, e: reqwest::Error) -> ProviderError {
        ProviderError::Http {
            name: self.name().to_string(),
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl ExtractionProvider for OllamaProvider {
    fn name(&self) -> &'static str {
        "ollama"
    }

    /// Checks that the daemon answers and the configured model is pulled.
    async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        let response = match self
            .client
            .get(&url)
            .timeout(std::time::Duration::from_secs(PROBE_TIMEOUT_SECS))
            .send()
            .await
        {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                debug!("ollama probe returned {}", r.status());
                return false;
            }
            Err(e) => {
                debug!("ollama not reachable: {}", e);
                return false;
            }
        };

        let body: serde_json::Value = match response.json().await {
            Ok(v) => v,
            Err(_) => return false,
        };

        // Tag lists come back as "llama3.2:latest"; compare base names.
        let wanted = self.model.split(':').next().unwrap_or(&self.model);
        body["models"]
            .as_array()
            .map(|models| {
                models.iter().any(|m| {
                    m["name"]
                        .as_str()
                        .and_then(|name| name.split(':').next())
                        .map(|base| base == wanted)
                        .unwrap_or(false)
                })
            })
            .unwrap_or(false)
    }

    async fn extract(&self, bytes: &[u8]) -> Result<ExtractedStatement, ProviderError> {
        let text = pdf::extract_text(bytes)?;

        let payload = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": prompt::system_prompt()},
                {"role": "user", "content": prompt::user_prompt(&text)},
            ],
            "stream": false,
            "format": "json",
            "options": {
                "temperature": 0.1,
                "num_predict": 8192,
            }
        });

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&payload)
            .send()
            .await
            .map_err(|e| self.http_err(e))?
            .error_for_status()
            .map_err(|e| self.http_err(e))?;

        let body: serde_json::Value = response.json().await.map_err(|e| self.http_err(e))?;
        let content = body["message"]["content"].as_str().unwrap_or_default();

        prompt::parse_response(self.name(), content)
    }
}

//! OpenAI extraction provider: cloud inference behind an API key.

use async_trait::async_trait;
use serde_json::json;

use super::{pdf, prompt, ExtractedStatement, ExtractionProvider, ProviderError};
use crate::config::OpenAiConfig;

pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(
        api_key: Option<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    pub fn from_config(config: &OpenAiConfig) -> Self {
        Self::new(config.api_key.clone(), &config.base_url, &config.model)
    }

    fn http_err(&self, e: reqwest::Error) -> ProviderError {
        ProviderError::Http {
            name: self.name().to_string(),
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl ExtractionProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    /// Available when a key is configured; a failing key surfaces as an
    /// HTTP error on the extraction call instead of blocking selection.
    async fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn extract(&self, bytes: &[u8]) -> Result<ExtractedStatement, ProviderError> {
        let api_key = self.api_key.as_ref().ok_or_else(|| ProviderError::Unavailable {
            name: self.name().to_string(),
        })?;

        let text = pdf::extract_text(bytes)?;

        let payload = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": prompt::system_prompt()},
                {"role": "user", "content": prompt::user_prompt(&text)},
            ],
            "temperature": 0.1,
            "max_tokens": 8192,
            "response_format": {"type": "json_object"},
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| self.http_err(e))?
            .error_for_status()
            .map_err(|e| self.http_err(e))?;

        let body: serde_json::Value = response.json().await.map_err(|e| self.http_err(e))?;
        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default();

        prompt::parse_response(self.name(), content)
    }
}

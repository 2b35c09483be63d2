//! Extraction provider abstraction.
//!
//! A provider turns raw statement bytes into candidate transaction rows.
//! Implementations are probed for availability and selected through
//! `selector::ProviderRegistry`: explicit hint first, otherwise the first
//! available provider in fixed priority order wins.

use async_trait::async_trait;
use thiserror::Error;

pub mod mock;
pub mod ollama;
pub mod openai;
pub mod pdf;
pub mod prompt;
pub mod selector;

pub use mock::MockProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use selector::{ProviderInfo, ProviderRegistry};

/// One raw transaction row as reported by a provider, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedRow {
    /// Date string in whatever shape the provider produced.
    pub date: String,
    pub description: String,
    /// Exact statement text, when the provider preserved it.
    pub original_description: Option<String>,
    /// Unsigned decimal amount; the direction carries the sign.
    pub amount: f64,
    /// Provider-reported direction ("income"/"expense"/"credit"/...).
    pub direction: String,
    pub category: Option<String>,
    pub confidence: f64,
}

/// Full provider output for one statement.
#[derive(Debug, Clone, Default)]
pub struct ExtractedStatement {
    pub rows: Vec<ExtractedRow>,
    pub statement_start: Option<String>,
    pub statement_end: Option<String>,
}

/// Errors from extraction providers.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider '{name}' is not available")]
    Unavailable { name: String },

    #[error("No extraction provider is available")]
    NoneAvailable,

    #[error("Provider '{name}' timed out after {seconds}s")]
    Timeout { name: String, seconds: u64 },

    #[error("Provider '{name}' request failed: {message}")]
    Http { name: String, message: String },

    #[error("Provider '{name}' returned malformed output: {message}")]
    Malformed { name: String, message: String },

    #[error("Provider '{name}' extracted zero transactions")]
    EmptyExtraction { name: String },

    #[error("Failed to read statement PDF: {0}")]
    Pdf(String),
}

impl ProviderError {
    /// Whether a retry (possibly via a different provider) may succeed.
    /// A PDF that cannot be parsed will not parse better next time.
    pub fn retryable(&self) -> bool {
        !matches!(self, Self::Pdf(_))
    }
}

/// A pluggable extraction backend.
#[async_trait]
pub trait ExtractionProvider: Send + Sync {
    /// Stable provider name, usable as a selection hint.
    fn name(&self) -> &'static str;

    /// Cheap availability probe (service reachable, model present, key set).
    async fn is_available(&self) -> bool;

    /// Extracts candidate rows from raw statement bytes.
    async fn extract(&self, bytes: &[u8]) -> Result<ExtractedStatement, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdf_errors_are_not_retryable() {
        assert!(!ProviderError::Pdf("garbled".to_string()).retryable());
    }

    #[test]
    fn test_transport_errors_are_retryable() {
        assert!(ProviderError::Timeout {
            name: "ollama".to_string(),
            seconds: 120
        }
        .retryable());
        assert!(ProviderError::EmptyExtraction {
            name: "mock".to_string()
        }
        .retryable());
        assert!(ProviderError::NoneAvailable.retryable());
    }
}

//! Provider selection: explicit hint, or first available in priority order.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use super::{ExtractionProvider, MockProvider, OllamaProvider, OpenAiProvider, ProviderError};
use crate::config::ProvidersConfig;

/// Availability report for one registered provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderInfo {
    pub name: String,
    pub available: bool,
}

/// Ordered set of extraction providers.
///
/// Priority is the registration order: ollama (local, free) before openai
/// (cloud) before mock (always available). A configured preference is moved
/// to the front rather than replacing the probe chain.
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn ExtractionProvider>>,
}

impl ProviderRegistry {
    pub fn new(providers: Vec<Arc<dyn ExtractionProvider>>) -> Self {
        Self { providers }
    }

    pub fn from_config(config: &ProvidersConfig) -> Self {
        let mut providers: Vec<Arc<dyn ExtractionProvider>> = vec![
            Arc::new(OllamaProvider::from_config(&config.ollama)),
            Arc::new(OpenAiProvider::from_config(&config.openai)),
            Arc::new(MockProvider::new()),
        ];

        if let Some(preferred) = &config.preferred {
            if let Some(idx) = providers.iter().position(|p| p.name() == preferred) {
                let favored = providers.remove(idx);
                providers.insert(0, favored);
            }
        }

        Self::new(providers)
    }

    /// Selects a provider for an extraction run.
    ///
    /// A hint names a specific provider and fails when it is absent or
    /// unavailable; without a hint the first provider whose probe passes
    /// wins.
    pub async fn select(
        &self,
        hint: Option<&str>,
    ) -> Result<Arc<dyn ExtractionProvider>, ProviderError> {
        if let Some(name) = hint {
            let provider = self
                .providers
                .iter()
                .find(|p| p.name() == name)
                .ok_or_else(|| ProviderError::Unavailable {
                    name: name.to_string(),
                })?;
            if !provider.is_available().await {
                return Err(ProviderError::Unavailable {
                    name: name.to_string(),
                });
            }
            return Ok(provider.clone());
        }

        for provider in &self.providers {
            if provider.is_available().await {
                info!("selected extraction provider '{}'", provider.name());
                return Ok(provider.clone());
            }
        }

        Err(ProviderError::NoneAvailable)
    }

    /// Probes every registered provider.
    pub async fn list(&self) -> Vec<ProviderInfo> {
        let mut infos = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            infos.push(ProviderInfo {
                name: provider.name().to_string(),
                available: provider.is_available().await,
            });
        }
        infos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NamedMock {
        name: &'static str,
        available: bool,
    }

    #[async_trait::async_trait]
    impl ExtractionProvider for NamedMock {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn is_available(&self) -> bool {
            self.available
        }

        async fn extract(
            &self,
            _bytes: &[u8],
        ) -> Result<super::super::ExtractedStatement, ProviderError> {
            Ok(Default::default())
        }
    }

    fn registry(entries: &[(&'static str, bool)]) -> ProviderRegistry {
        ProviderRegistry::new(
            entries
                .iter()
                .map(|(name, available)| {
                    Arc::new(NamedMock {
                        name,
                        available: *available,
                    }) as Arc<dyn ExtractionProvider>
                })
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_first_available_wins() {
        let registry = registry(&[("ollama", false), ("openai", true), ("mock", true)]);
        let selected = registry.select(None).await.unwrap();
        assert_eq!(selected.name(), "openai");
    }

    #[tokio::test]
    async fn test_hint_overrides_priority() {
        let registry = registry(&[("ollama", true), ("openai", true), ("mock", true)]);
        let selected = registry.select(Some("mock")).await.unwrap();
        assert_eq!(selected.name(), "mock");
    }

    #[tokio::test]
    async fn test_unavailable_hint_fails() {
        let registry = registry(&[("ollama", false), ("mock", true)]);
        let err = registry.select(Some("ollama")).await.err().unwrap();
        assert!(matches!(err, ProviderError::Unavailable { name } if name == "ollama"));
    }

    #[tokio::test]
    async fn test_unknown_hint_fails() {
        let registry = registry(&[("mock", true)]);
        let err = registry.select(Some("gemini")).await.err().unwrap();
        assert!(matches!(err, ProviderError::Unavailable { name } if name == "gemini"));
    }

    #[tokio::test]
    async fn test_no_provider_available() {
        let registry = registry(&[("ollama", false), ("openai", false)]);
        let err = registry.select(None).await.err().unwrap();
        assert!(matches!(err, ProviderError::NoneAvailable));
    }

    #[tokio::test]
    async fn test_list_probes_all() {
        let registry = registry(&[("ollama", false), ("mock", true)]);
        let infos = registry.list().await;
        assert_eq!(infos.len(), 2);
        assert!(!infos[0].available);
        assert!(infos[1].available);
    }
}

//! Provider registry mapping each settings variant to its backend.
//!
//! The [`ProviderRegistry`] holds one [`CaptionProvider`] per [`ProviderKind`]
//! and selects between them by matching on the configured
//! [`ModelProviderConfig`] variant, so switching backends is a settings change
//! rather than a code path keyed by free-form names.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use captioneer_common::{Error, Result};
use reqwest::Client;

use super::provider::CaptionProvider;
use super::providers::{OllamaProvider, OpenAiProvider};
use crate::config::{ModelProviderConfig, ProviderKind, Settings};

/// A registry that owns one provider per backend kind.
///
/// # Examples
///
/// ```rust,ignore
/// use captioneer::captioning::ProviderRegistry;
///
/// let registry = ProviderRegistry::with_defaults(&settings);
/// let provider = registry.select(&settings.provider)?;
/// let info = provider.generate_image_info(&settings, &image).await?;
/// ```
pub struct ProviderRegistry {
    providers: HashMap<ProviderKind, Arc<dyn CaptionProvider>>,
}

impl ProviderRegistry {
    /// Create an empty registry with no providers.
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Create a registry with the OpenAI and Ollama providers, sharing one
    /// HTTP client configured with the settings' request timeout.
    pub fn with_defaults(settings: &Settings) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with timeout: {}", e);
                Client::new()
            });

        let mut registry = Self::new();
        registry.register(Arc::new(OpenAiProvider::new(client.clone())));
        registry.register(Arc::new(OllamaProvider::new(client)));
        registry
    }

    /// Register a provider under its [`CaptionProvider::kind`], replacing any
    /// provider previously registered for that kind.
    pub fn register(&mut self, provider: Arc<dyn CaptionProvider>) {
        self.providers.insert(provider.kind(), provider);
    }

    /// Look up the provider registered for `kind`.
    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn CaptionProvider>> {
        self.providers.get(&kind).cloned()
    }

    /// Select the provider serving the configured settings variant.
    pub fn select(&self, config: &ModelProviderConfig) -> Result<Arc<dyn CaptionProvider>> {
        let kind = match config {
            ModelProviderConfig::OpenAi(_) => ProviderKind::OpenAi,
            ModelProviderConfig::Ollama(_) => ProviderKind::Ollama,
        };
        self.get(kind)
            .ok_or_else(|| Error::configuration(format!("no provider registered for {kind}")))
    }

    /// Whether the selected provider has every field it needs.
    pub fn is_initialized(&self, settings: &Settings) -> bool {
        self.select(&settings.provider)
            .map(|p| p.is_initialized(settings))
            .unwrap_or(false)
    }

    /// Models offered by the selected provider; empty if none is registered.
    pub async fn get_models(&self, settings: &Settings) -> Vec<String> {
        match self.select(&settings.provider) {
            Ok(provider) => provider.get_models(settings).await,
            Err(_) => Vec::new(),
        }
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

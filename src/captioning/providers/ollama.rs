//! Ollama caption provider.
//!
//! Talks to a locally hosted Ollama server through its native `/api/chat`
//! endpoint. Local inference is free, so every call reports zero cost.

use async_trait::async_trait;
use captioneer_common::{Error, Image, ImageInfo, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{endpoint, error_for_status};
use crate::captioning::prompt::{parse_response, system_prompt};
use crate::captioning::provider::{encode_image, CaptionProvider};
use crate::config::{ModelProviderConfig, OllamaConfig, ProviderKind, Settings};

/// User turn sent alongside the image.
const USER_PROMPT: &str = "Describe the image";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    name: String,
}

/// Caption provider for a local Ollama server.
pub struct OllamaProvider {
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn config(settings: &Settings) -> Result<&OllamaConfig> {
        match &settings.provider {
            ModelProviderConfig::Ollama(config) => Ok(config),
            other => Err(Error::configuration(format!(
                "ollama provider invoked with {} settings",
                other.kind()
            ))),
        }
    }

    fn validate(config: &OllamaConfig) -> Result<()> {
        if config.base_url.trim().is_empty() {
            return Err(Error::configuration("Ollama base URL not specified"));
        }
        if config.model.trim().is_empty() {
            return Err(Error::configuration("Ollama model not specified"));
        }
        Ok(())
    }

    async fn list_models(&self, config: &OllamaConfig) -> anyhow::Result<Vec<String>> {
        let url = endpoint(&config.base_url, "/api/tags");
        let resp = self.client.get(&url).send().await?.error_for_status()?;
        let body: TagsResponse = resp.json().await?;
        Ok(body.models.into_iter().map(|m| m.name).collect())
    }
}

#[async_trait]
impl CaptionProvider for OllamaProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    fn is_initialized(&self, settings: &Settings) -> bool {
        Self::config(settings)
            .and_then(Self::validate)
            .is_ok()
    }

    async fn generate_image_info(&self, settings: &Settings, image: &Image) -> Result<ImageInfo> {
        let config = Self::config(settings)?;
        Self::validate(config)?;

        let encoded = encode_image(image).await?;
        let request = ChatRequest {
            model: &config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt(),
                    images: Vec::new(),
                },
                ChatMessage {
                    role: "user",
                    content: USER_PROMPT,
                    images: vec![encoded.base64],
                },
            ],
            stream: false,
        };

        let url = endpoint(&config.base_url, "/api/chat");
        debug!(url = %url, image_id = %image.id, model = %config.model, "Ollama chat");

        let resp = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::backend(format!("Ollama request failed: {e}")))?;

        let body: ChatResponse = error_for_status(resp, "Ollama")
            .await?
            .json()
            .await
            .map_err(|e| Error::backend(format!("failed to parse Ollama response: {e}")))?;

        let parsed = parse_response(&body.message.content);
        Ok(ImageInfo {
            caption: parsed.caption,
            tags: parsed.tags,
            cost: 0.0,
        })
    }

    async fn get_models(&self, settings: &Settings) -> Vec<String> {
        let config = match Self::config(settings) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "Cannot list Ollama models");
                return Vec::new();
            }
        };

        match self.list_models(config).await {
            Ok(models) => models,
            Err(e) => {
                warn!(base_url = %config.base_url, error = %e, "Failed to fetch Ollama models");
                Vec::new()
            }
        }
    }
}

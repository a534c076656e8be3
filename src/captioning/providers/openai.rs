//! OpenAI-compatible caption provider.
//!
//! Implements [`CaptionProvider`] against the chat completions API. Any
//! server speaking that protocol (OpenAI itself, Azure-style proxies, local
//! gateways) works as long as the configured model has an entry in the
//! pricing table.

use async_trait::async_trait;
use captioneer_common::{Error, Image, ImageInfo, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{endpoint, error_for_status};
use crate::captioning::pricing;
use crate::captioning::prompt::{parse_response, system_prompt};
use crate::captioning::provider::{encode_image, CaptionProvider};
use crate::config::{ModelProviderConfig, OpenAiConfig, ProviderKind, Settings};

// ---------------------------------------------------------------------------
// Wire types (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: MessageContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

// ---------------------------------------------------------------------------
// Provider implementation
// ---------------------------------------------------------------------------

/// Caption provider for OpenAI-compatible chat completion endpoints.
pub struct OpenAiProvider {
    client: reqwest::Client,
}

impl OpenAiProvider {
    /// Create a provider issuing requests through `client`.
    ///
    /// The client should carry a request timeout; the caption queue has none.
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn config(settings: &Settings) -> Result<&OpenAiConfig> {
        match &settings.provider {
            ModelProviderConfig::OpenAi(config) => Ok(config),
            other => Err(Error::configuration(format!(
                "openai provider invoked with {} settings",
                other.kind()
            ))),
        }
    }

    fn validate(config: &OpenAiConfig) -> Result<()> {
        if config.base_url.trim().is_empty() {
            return Err(Error::configuration("OpenAI base URL not specified"));
        }
        if config.api_key.trim().is_empty() {
            return Err(Error::configuration("OpenAI API key not specified"));
        }
        if config.model.trim().is_empty() {
            return Err(Error::configuration("OpenAI model not specified"));
        }
        Ok(())
    }
}

#[async_trait]
impl CaptionProvider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn is_initialized(&self, settings: &Settings) -> bool {
        Self::config(settings)
            .and_then(Self::validate)
            .is_ok()
    }

    async fn generate_image_info(&self, settings: &Settings, image: &Image) -> Result<ImageInfo> {
        let config = Self::config(settings)?;
        Self::validate(config)?;
        let rates = pricing::openai_rates(&config.model)?;

        let encoded = encode_image(image).await?;
        let request = ChatRequest {
            model: &config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(system_prompt()),
                },
                ChatMessage {
                    role: "user",
                    content: MessageContent::Parts(vec![ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: encoded.data_url(),
                        },
                    }]),
                },
            ],
            stream: false,
        };

        let url = endpoint(&config.base_url, "/chat/completions");
        debug!(url = %url, image_id = %image.id, model = %config.model, "OpenAI chat completion");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::backend(format!("OpenAI request failed: {e}")))?;

        let body: ChatResponse = error_for_status(resp, "OpenAI")
            .await?
            .json()
            .await
            .map_err(|e| Error::backend(format!("failed to parse OpenAI response: {e}")))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::backend("OpenAI response contained no message"))?;

        let parsed = parse_response(&content);
        Ok(ImageInfo {
            caption: parsed.caption,
            tags: parsed.tags,
            cost: rates.cost(body.usage.prompt_tokens, body.usage.completion_tokens),
        })
    }

    async fn get_models(&self, _settings: &Settings) -> Vec<String> {
        pricing::openai_models()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OllamaConfig;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(base_url: &str, api_key: &str, model: &str) -> Settings {
        Settings {
            provider: ModelProviderConfig::OpenAi(OpenAiConfig {
                base_url: base_url.into(),
                api_key: api_key.into(),
                model: model.into(),
            }),
            ..Settings::default()
        }
    }

    fn test_image(dir: &tempfile::TempDir) -> Image {
        let path = dir.path().join("cat.png");
        std::fs::write(&path, b"not really a png").unwrap();
        Image::from_path(&path)
    }

    fn completion(content: &str, prompt_tokens: u64, completion_tokens: u64) -> serde_json::Value {
        json!({
            "id": "chatcmpl-1",
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }],
            "usage": { "prompt_tokens": prompt_tokens, "completion_tokens": completion_tokens }
        })
    }

    #[tokio::test]
    async fn generates_caption_tags_and_cost() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({ "model": "gpt-4o", "stream": false })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(
                "<caption>A cat on a mat</caption><tags>cat, animal</tags>",
                1000,
                200,
            )))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let provider = OpenAiProvider::new(reqwest::Client::new());
        let info = provider
            .generate_image_info(&settings(&server.uri(), "sk-test", "gpt-4o"), &test_image(&dir))
            .await
            .unwrap();

        assert_eq!(info.caption, "A cat on a mat");
        assert_eq!(info.tags, vec!["cat", "animal"]);
        assert!((info.cost - 0.0045).abs() < 1e-12);
    }

    #[tokio::test]
    async fn sends_image_as_data_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({
                "messages": [
                    { "role": "system" },
                    { "role": "user", "content": [{
                        "type": "image_url",
                        "image_url": { "url": "data:image/png;base64,bm90IHJlYWxseSBhIHBuZw==" }
                    }] }
                ]
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(completion("<caption>x</caption>", 1, 1)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let provider = OpenAiProvider::new(reqwest::Client::new());
        provider
            .generate_image_info(&settings(&server.uri(), "sk-test", "gpt-4o"), &test_image(&dir))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn non_success_status_is_backend_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let provider = OpenAiProvider::new(reqwest::Client::new());
        let err = provider
            .generate_image_info(&settings(&server.uri(), "sk-test", "gpt-4o"), &test_image(&dir))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Backend(ref msg) if msg.contains("429")));
    }

    #[tokio::test]
    async fn missing_api_key_fails_before_any_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let provider = OpenAiProvider::new(reqwest::Client::new());
        let err = provider
            .generate_image_info(&settings(&server.uri(), "", "gpt-4o"), &test_image(&dir))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Configuration(_)));
    }

    #[tokio::test]
    async fn unknown_model_fails_before_any_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let provider = OpenAiProvider::new(reqwest::Client::new());
        let err = provider
            .generate_image_info(&settings(&server.uri(), "sk-test", "gpt-9"), &test_image(&dir))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::UnknownModel(_)));
    }

    #[tokio::test]
    async fn empty_choices_is_backend_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let provider = OpenAiProvider::new(reqwest::Client::new());
        let err = provider
            .generate_image_info(&settings(&server.uri(), "sk-test", "gpt-4o"), &test_image(&dir))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Backend(_)));
    }

    #[test]
    fn is_initialized_requires_all_fields() {
        let provider = OpenAiProvider::new(reqwest::Client::new());
        assert!(provider.is_initialized(&settings("https://api.openai.com/v1", "sk", "gpt-4o")));
        assert!(!provider.is_initialized(&settings("", "sk", "gpt-4o")));
        assert!(!provider.is_initialized(&settings("https://api.openai.com/v1", "", "gpt-4o")));
        assert!(!provider.is_initialized(&settings("https://api.openai.com/v1", "sk", " ")));
    }

    #[test]
    fn is_initialized_rejects_other_variant() {
        let provider = OpenAiProvider::new(reqwest::Client::new());
        let settings = Settings {
            provider: ModelProviderConfig::Ollama(OllamaConfig {
                base_url: "http://localhost:11434".into(),
                model: "llava".into(),
            }),
            ..Settings::default()
        };
        assert!(!provider.is_initialized(&settings));
    }

    #[tokio::test]
    async fn models_are_the_curated_list() {
        let provider = OpenAiProvider::new(reqwest::Client::new());
        let models = provider.get_models(&Settings::default()).await;
        assert!(models.contains(&"gpt-4o".to_string()));
        assert!(models.contains(&"gpt-4-turbo".to_string()));
    }
}

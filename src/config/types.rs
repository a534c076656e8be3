use serde::{Deserialize, Serialize};

/// Settings read by the caption pipeline on every provider invocation.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    /// Per-request timeout applied to the shared HTTP client.
    ///
    /// The caption queue itself imposes no timeout, so a hung backend call
    /// would otherwise stall every image behind it.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub provider: ModelProviderConfig,
}

fn default_request_timeout() -> u64 {
    120
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            provider: ModelProviderConfig::default(),
        }
    }
}

/// Backend family a provider configuration selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[serde(rename = "openai")]
    OpenAi,
    Ollama,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::OpenAi => write!(f, "openai"),
            ProviderKind::Ollama => write!(f, "ollama"),
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "ollama" => Ok(ProviderKind::Ollama),
            other => Err(format!("unknown provider '{other}' (expected openai or ollama)")),
        }
    }
}

/// Provider configuration, tagged by backend kind.
///
/// ```toml
/// [provider]
/// name = "openai"
/// base_url = "https://api.openai.com/v1"
/// api_key = "sk-..."
/// model = "gpt-4o"
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "name")]
pub enum ModelProviderConfig {
    /// Remote hosted, OpenAI-compatible chat completions API.
    #[serde(rename = "openai")]
    OpenAi(OpenAiConfig),
    /// Locally hosted Ollama server.
    #[serde(rename = "ollama")]
    Ollama(OllamaConfig),
}

impl Default for ModelProviderConfig {
    fn default() -> Self {
        ModelProviderConfig::OpenAi(OpenAiConfig::default())
    }
}

impl ModelProviderConfig {
    /// Default configuration for a backend kind.
    pub fn for_kind(kind: ProviderKind) -> Self {
        match kind {
            ProviderKind::OpenAi => ModelProviderConfig::OpenAi(OpenAiConfig::default()),
            ProviderKind::Ollama => ModelProviderConfig::Ollama(OllamaConfig::default()),
        }
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            ModelProviderConfig::OpenAi(_) => ProviderKind::OpenAi,
            ModelProviderConfig::Ollama(_) => ProviderKind::Ollama,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            ModelProviderConfig::OpenAi(c) => &c.model,
            ModelProviderConfig::Ollama(c) => &c.model,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OpenAiConfig {
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_openai_model")]
    pub model: String,
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o".to_string()
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            api_key: String::new(),
            model: default_openai_model(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,

    /// Vision-capable model tag, e.g. `llava:13b`.
    #[serde(default)]
    pub model: String,
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_base_url(),
            model: String::new(),
        }
    }
}

//! Concrete caption provider implementations.
//!
//! Each submodule wraps a single backend protocol and implements the
//! [`CaptionProvider`](super::CaptionProvider) trait.

pub mod ollama;
pub mod openai;

pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

/// Join a configured base URL and an endpoint path.
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

/// Turn a non-success response into a backend error carrying its body.
pub(crate) async fn error_for_status(
    resp: reqwest::Response,
    context: &str,
) -> captioneer_common::Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    Err(captioneer_common::Error::backend(format!(
        "{context} returned {status}: {}",
        body.trim()
    )))
}

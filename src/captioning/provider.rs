//! Trait definition for caption providers.
//!
//! This module defines the [`CaptionProvider`] trait that all captioning
//! backends must implement, along with the shared helper that reads an image
//! from disk and encodes it for transport.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use captioneer_common::paths::image_mime_type;
use captioneer_common::{Image, ImageInfo, Result};

use crate::config::{ProviderKind, Settings};

// ---------------------------------------------------------------------------
// Provider trait
// ---------------------------------------------------------------------------

/// Async trait that all caption providers must implement.
///
/// Each provider wraps a single backend protocol and turns an image into a
/// caption, a tag list, and the monetary cost of doing so. Settings are passed
/// on every call rather than captured at construction, so a settings change
/// takes effect on the next queued image without rebuilding the provider.
#[async_trait]
pub trait CaptionProvider: Send + Sync {
    /// Which settings variant this provider serves.
    fn kind(&self) -> ProviderKind;

    /// Returns `true` when every field this provider requires is present and
    /// non-empty. Never performs I/O.
    fn is_initialized(&self, settings: &Settings) -> bool;

    /// Generate a caption and tags for `image`.
    ///
    /// Required settings are validated before any network call; a missing
    /// field yields [`Error::Configuration`](captioneer_common::Error). Transport
    /// failures and non-success responses yield `Error::Backend`.
    async fn generate_image_info(&self, settings: &Settings, image: &Image) -> Result<ImageInfo>;

    /// List the model identifiers selectable for this provider.
    ///
    /// Failures degrade to an empty list.
    async fn get_models(&self, settings: &Settings) -> Vec<String>;
}

// ---------------------------------------------------------------------------
// Transport encoding
// ---------------------------------------------------------------------------

/// Image bytes prepared for a JSON request body.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    /// Content type hint derived from the file extension.
    pub mime_type: String,
    /// Standard base64 encoding of the raw file bytes.
    pub base64: String,
}

impl EncodedImage {
    /// Render as a `data:` URL.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64)
    }
}

/// Read the image from its source path and base64-encode it.
pub async fn encode_image(image: &Image) -> Result<EncodedImage> {
    let path = image.source_path();
    let bytes = tokio::fs::read(&path).await?;

    Ok(EncodedImage {
        mime_type: image_mime_type(&path),
        base64: STANDARD.encode(bytes),
    })
}

//! Core image types shared between the caption pipeline and the catalog.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::ids::ImageId;
use crate::paths::{file_url, source_path};

/// Caption published when generation could not produce one.
pub const UNKNOWN_CAPTION: &str = "Unknown";

/// A catalog image and its generated metadata.
///
/// `caption` and `tags` always reflect the last completed generation. While
/// `processing` is set a new generation is pending; its result replaces
/// caption and tags and clears the flag in a single update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    /// Absolute source path, used as identity.
    pub id: ImageId,
    /// Display source reference (`file://` URL).
    pub src: String,
    /// Generated caption, empty until the first generation completes.
    #[serde(default)]
    pub caption: String,
    /// Ordered, duplicate-free tags from the controlled vocabulary.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Whether a caption generation is pending for this image.
    #[serde(default)]
    pub processing: bool,
}

impl Image {
    /// Create a fresh, uncaptioned image for a discovered file.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        Self {
            id: ImageId::from(path),
            src: file_url(path),
            caption: String::new(),
            tags: Vec::new(),
            processing: false,
        }
    }

    /// Filesystem path the image bytes are read from.
    #[must_use]
    pub fn source_path(&self) -> PathBuf {
        source_path(&self.src)
    }

    /// Fold a generation result into the image and clear `processing`.
    pub fn apply_info(&mut self, info: &ImageInfo) {
        self.caption = info.caption.clone();
        self.tags = info.tags.clone();
        self.processing = false;
    }

    /// Replace caption and tags with the terminal "Unknown" result.
    pub fn mark_unknown(&mut self) {
        self.caption = UNKNOWN_CAPTION.to_string();
        self.tags.clear();
        self.processing = false;
    }
}

/// Result of one successful caption generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageInfo {
    /// Parsed caption text.
    pub caption: String,
    /// Parsed tags.
    pub tags: Vec<String>,
    /// Monetary cost of the call in US dollars.
    pub cost: f64,
}

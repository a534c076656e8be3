//! Common error types used throughout captioneer.
//!
//! The variants separate failures the caption queue must treat differently:
//! configuration problems are never retried, backend and I/O failures are.

/// Common error type for captioneer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Required provider settings are missing or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The captioning backend failed or answered with a non-success status.
    #[error("Backend error: {0}")]
    Backend(String),

    /// A paid provider was asked to price a model it has no rates for.
    #[error("No pricing known for model: {0}")]
    UnknownModel(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a new Configuration error.
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a new Backend error.
    pub fn backend<S: Into<String>>(msg: S) -> Self {
        Self::Backend(msg.into())
    }

    /// Create a new UnknownModel error.
    pub fn unknown_model<S: Into<String>>(model: S) -> Self {
        Self::UnknownModel(model.into())
    }

    /// Whether a later attempt with the same settings could succeed.
    ///
    /// Configuration and pricing problems are deterministic, so retrying
    /// them only burns queue time.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Backend(_) | Self::Io(_))
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;

//! Caption generation pipeline.
//!
//! This module defines the [`CaptionProvider`] trait that every captioning
//! backend implements, the prompt and response protocol they share, and the
//! single-consumer [`CaptionQueue`] that serializes calls to them.
//!
//! # Module layout
//!
//! - [`provider`] -- Trait definition and image transport encoding.
//! - [`prompt`] -- System instruction, tag vocabulary, and response parsing.
//! - [`pricing`] -- Per-model token rates for paid backends.
//! - [`providers`] -- Concrete backends (OpenAI-compatible, Ollama).
//! - [`registry`] -- Selection of the provider matching the current settings.
//! - [`queue`] -- Background caption queue with retry and cost accounting.

pub mod pricing;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod queue;
pub mod registry;

pub use provider::CaptionProvider;
pub use queue::{CaptionQueue, MAX_RETRY_COUNT};
pub use registry::ProviderRegistry;

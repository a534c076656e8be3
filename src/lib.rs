//! Captioneer - AI caption and tag generation for image folders
//!
//! This library crate exposes the core functionality for integration testing.

pub mod captioning;
pub mod config;
pub mod events;
pub mod library;
pub mod store;
pub mod sync;

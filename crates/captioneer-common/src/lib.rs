//! Captioneer-Common: Shared types, constants, and utilities.
//!
//! This crate provides common functionality used across captioneer:
//!
//! - **Typed IDs**: [`ImageId`], the stable identity of a catalog image
//! - **Core Types**: [`Image`] and the transient [`ImageInfo`] generation result
//! - **Path Utilities**: Functions to detect image files and their content type
//! - **Error Handling**: Common error types and result aliases
//!
//! # Examples
//!
//! ```
//! use captioneer_common::{Error, Image, Result};
//! use captioneer_common::paths::is_image_file;
//! use std::path::Path;
//!
//! let image = Image::from_path(Path::new("/photos/cat.jpg"));
//! assert_eq!(image.src, "file:///photos/cat.jpg");
//!
//! assert!(is_image_file(Path::new("cat.jpg")));
//!
//! fn example() -> Result<()> {
//!     Err(Error::configuration("model not specified"))
//! }
//! ```

pub mod error;
pub mod ids;
pub mod paths;
pub mod types;

pub use error::{Error, Result};
pub use ids::*;
pub use types::*;

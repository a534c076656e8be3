//! Path utilities for detecting image files and preparing them for transport.

use std::path::{Path, PathBuf};

/// Scheme prefix used for display source references.
const FILE_SCHEME: &str = "file://";

/// List of supported image file extensions.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// Check if a path has an image file extension.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use captioneer_common::paths::is_image_file;
///
/// assert!(is_image_file(Path::new("photo.jpg")));
/// assert!(is_image_file(Path::new("/path/to/image.PNG")));
/// assert!(!is_image_file(Path::new("notes.txt")));
/// ```
pub fn is_image_file(path: &Path) -> bool {
    extension(path)
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Get the list of image file extensions.
#[must_use]
pub fn image_extensions() -> &'static [&'static str] {
    IMAGE_EXTENSIONS
}

/// Content type hint for an image, derived from its extension.
///
/// Unrecognised extensions fall back to `image/<ext>` so the backend still
/// receives a plausible hint.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use captioneer_common::paths::image_mime_type;
///
/// assert_eq!(image_mime_type(Path::new("a.jpg")), "image/jpeg");
/// assert_eq!(image_mime_type(Path::new("a.png")), "image/png");
/// ```
pub fn image_mime_type(path: &Path) -> String {
    match extension(path).as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg".to_string(),
        Some(ext) => format!("image/{ext}"),
        None => "application/octet-stream".to_string(),
    }
}

/// Build the `file://` display reference for a path.
pub fn file_url(path: &Path) -> String {
    format!("{FILE_SCHEME}{}", path.display())
}

/// Resolve a display reference (or a bare path) back to a filesystem path.
pub fn source_path(src: &str) -> PathBuf {
    PathBuf::from(src.strip_prefix(FILE_SCHEME).unwrap_or(src))
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

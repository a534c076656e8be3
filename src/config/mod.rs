pub mod persist;
mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Locations searched, in order, when no config path is given.
const DEFAULT_PATHS: &[&str] = &["./captioneer.toml", "~/.config/captioneer/config.toml"];

/// Load settings from a TOML file
pub fn load_config(path: &Path) -> Result<Settings> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let settings: Settings = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&settings)?;

    Ok(settings)
}

/// Resolve the config file to use: the explicit path if given, otherwise the
/// first default location that exists.
pub fn find_config(custom_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = custom_path {
        return Some(path.to_path_buf());
    }

    DEFAULT_PATHS
        .iter()
        .map(|p| PathBuf::from(shellexpand::tilde(p).as_ref()))
        .find(|p| p.exists())
}

/// Where settings are written: the resolved config file, or the per-user
/// location when none exists yet.
pub fn settings_path(custom_path: Option<&Path>) -> PathBuf {
    find_config(custom_path).unwrap_or_else(|| {
        let user = DEFAULT_PATHS[DEFAULT_PATHS.len() - 1];
        PathBuf::from(shellexpand::tilde(user).as_ref())
    })
}

/// Load settings from the resolved config path or return defaults.
///
/// An explicit path that does not exist yet yields defaults, so that a later
/// `configure` can create it.
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Settings> {
    match find_config(custom_path) {
        Some(path) if path.exists() => load_config(&path),
        _ => Ok(Settings::default()),
    }
}

/// Validate settings
pub fn validate_config(settings: &Settings) -> Result<()> {
    if settings.request_timeout_secs == 0 {
        anyhow::bail!("request_timeout_secs cannot be 0");
    }

    if settings.provider.model().trim().is_empty() {
        tracing::warn!(
            provider = %settings.provider.kind(),
            "No model configured; captions cannot be generated until one is set"
        );
    }

    Ok(())
}

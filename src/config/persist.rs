//! Settings persistence using toml_edit to preserve formatting and comments.

use super::Settings;
use anyhow::{Context, Result};
use std::path::Path;
use toml_edit::DocumentMut;

/// Keys owned by [`Settings`]; everything else in the file is left alone.
const SETTINGS_KEYS: &[&str] = &["request_timeout_secs", "provider"];

/// Save settings to a TOML file, preserving unrelated keys and comments.
pub fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
    let new_content =
        toml::to_string_pretty(settings).with_context(|| "Failed to serialize settings")?;
    let new_doc: DocumentMut = new_content
        .parse()
        .with_context(|| "Failed to parse serialized settings")?;

    if !path.exists() {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }
        std::fs::write(path, new_doc.to_string())
            .with_context(|| format!("Failed to write config file: {:?}", path))?;
        return Ok(());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let mut doc: DocumentMut = content
        .parse()
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    for key in SETTINGS_KEYS {
        match new_doc.get(key) {
            Some(item) => doc[*key] = item.clone(),
            None => {
                doc.remove(key);
            }
        }
    }

    std::fs::write(path, doc.to_string())
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    Ok(())
}

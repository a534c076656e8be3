//! Persistent catalog of images and the settings the pipeline reads.
//!
//! [`Store`] is the seam between the caption pipeline and persistence.
//! [`FileStore`] keeps the catalog in memory and saves it to a JSON file in
//! the data directory; settings live in the TOML config file and are written
//! back with [`config::persist`](crate::config::persist).
//!
//! Catalog writes come in two speeds. [`Store::update_images`] and
//! [`Store::set_images`] save before returning. [`Store::stage_images`] only
//! marks the catalog dirty, and the next [`Store::flush`] writes everything
//! staged since the last write in one go. Per-image queue updates are staged
//! so a long run does not rewrite the whole file for every event.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use captioneer_common::Image;
use parking_lot::{Mutex, RwLock};

use crate::config::{self, Settings};

/// Catalog file name inside the data directory.
pub const CATALOG_FILE: &str = "images.json";

/// Key-value persistence for the image catalog and settings.
pub trait Store: Send + Sync {
    /// The full image catalog.
    fn get_images(&self) -> Result<Vec<Image>>;

    /// Replace the full image catalog.
    fn set_images(&self, images: Vec<Image>) -> Result<()>;

    /// Current settings. Read on every provider invocation.
    fn get_settings(&self) -> Settings;

    /// Replace and persist settings.
    fn set_settings(&self, settings: Settings) -> Result<()>;

    /// Read-modify-write the catalog.
    ///
    /// The default goes through `get_images`/`set_images`; implementations
    /// should override it to make the whole update atomic.
    fn update_images(&self, f: &mut dyn FnMut(&mut Vec<Image>)) -> Result<()> {
        let mut images = self.get_images()?;
        f(&mut images);
        self.set_images(images)
    }

    /// Like `update_images`, but the write may be deferred until `flush`.
    fn stage_images(&self, f: &mut dyn FnMut(&mut Vec<Image>)) -> Result<()> {
        self.update_images(f)
    }

    /// Write any staged catalog changes.
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// File-backed store. Without paths it is purely in memory.
///
/// Staged changes still pending when the store is dropped are flushed then.
pub struct FileStore {
    catalog_path: Option<PathBuf>,
    settings_path: Option<PathBuf>,
    images: RwLock<Vec<Image>>,
    settings: RwLock<Settings>,
    // Set under the `images` write lock whenever memory is ahead of disk.
    dirty: AtomicBool,
    // Serializes writers so an older snapshot never replaces a newer one.
    flush_lock: Mutex<()>,
}

impl FileStore {
    /// Open the catalog in `data_dir`, creating the directory if needed.
    ///
    /// `settings_path` is where [`Store::set_settings`] writes; `None` keeps
    /// settings changes in memory only.
    pub fn open(data_dir: &Path, settings_path: Option<PathBuf>, settings: Settings) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

        let catalog_path = data_dir.join(CATALOG_FILE);
        let images = load_catalog(&catalog_path)?;
        tracing::debug!(path = ?catalog_path, images = images.len(), "Loaded image catalog");

        Ok(Self {
            catalog_path: Some(catalog_path),
            settings_path,
            images: RwLock::new(images),
            settings: RwLock::new(settings),
            dirty: AtomicBool::new(false),
            flush_lock: Mutex::new(()),
        })
    }

    /// Create a store with no backing files.
    pub fn in_memory(settings: Settings) -> Self {
        Self {
            catalog_path: None,
            settings_path: None,
            images: RwLock::new(Vec::new()),
            settings: RwLock::new(settings),
            dirty: AtomicBool::new(false),
            flush_lock: Mutex::new(()),
        }
    }

    /// Path of the catalog file, if file-backed.
    pub fn catalog_path(&self) -> Option<&Path> {
        self.catalog_path.as_deref()
    }

    /// Whether staged changes have not been written yet.
    pub fn has_unsaved_changes(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    fn persist(&self, images: &[Image]) -> Result<()> {
        let Some(path) = &self.catalog_path else {
            return Ok(());
        };

        let json = serde_json::to_string_pretty(images)?;
        // Write-then-rename so a crash never leaves a truncated catalog.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("Failed to write catalog: {:?}", tmp))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("Failed to replace catalog: {:?}", path))?;
        Ok(())
    }
}

fn load_catalog(path: &Path) -> Result<Vec<Image>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog: {:?}", path))?;
    let images = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse catalog: {:?}", path))?;
    Ok(images)
}

impl Store for FileStore {
    fn get_images(&self) -> Result<Vec<Image>> {
        Ok(self.images.read().clone())
    }

    fn set_images(&self, images: Vec<Image>) -> Result<()> {
        {
            let mut current = self.images.write();
            *current = images;
            self.dirty.store(true, Ordering::SeqCst);
        }
        self.flush()
    }

    fn get_settings(&self) -> Settings {
        self.settings.read().clone()
    }

    fn set_settings(&self, settings: Settings) -> Result<()> {
        config::validate_config(&settings)?;
        if let Some(path) = &self.settings_path {
            config::persist::save_settings(path, &settings)?;
        }
        *self.settings.write() = settings;
        Ok(())
    }

    fn update_images(&self, f: &mut dyn FnMut(&mut Vec<Image>)) -> Result<()> {
        self.stage_images(f)?;
        self.flush()
    }

    fn stage_images(&self, f: &mut dyn FnMut(&mut Vec<Image>)) -> Result<()> {
        let mut current = self.images.write();
        f(&mut current);
        self.dirty.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        let _flush = self.flush_lock.lock();
        if !self.dirty.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        let snapshot = self.images.read().clone();
        if let Err(e) = self.persist(&snapshot) {
            self.dirty.store(true, Ordering::SeqCst);
            return Err(e);
        }
        tracing::trace!(images = snapshot.len(), "Saved image catalog");
        Ok(())
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!(error = %e, "Failed to save image catalog on shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ModelProviderConfig, OllamaConfig};

    fn image(path: &str) -> Image {
        Image::from_path(Path::new(path))
    }

    #[test]
    fn in_memory_round_trip() {
        let store = FileStore::in_memory(Settings::default());
        assert!(store.get_images().unwrap().is_empty());

        store.set_images(vec![image("/a.jpg"), image("/b.jpg")]).unwrap();
        let images = store.get_images().unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[1].id.as_str(), "/b.jpg");
        assert!(store.catalog_path().is_none());
    }

    #[test]
    fn catalog_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();

        {
            let store = FileStore::open(dir.path(), None, Settings::default()).unwrap();
            let mut captioned = image("/photos/cat.jpg");
            captioned.caption = "A cat on a mat".into();
            captioned.tags = vec!["cat".into()];
            store.set_images(vec![captioned]).unwrap();
        }

        let store = FileStore::open(dir.path(), None, Settings::default()).unwrap();
        let images = store.get_images().unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].caption, "A cat on a mat");
        assert_eq!(images[0].tags, vec!["cat"]);
        assert!(!dir.path().join("images.json.tmp").exists());
    }

    #[test]
    fn corrupt_catalog_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CATALOG_FILE), "{ not json").unwrap();
        assert!(FileStore::open(dir.path(), None, Settings::default()).is_err());
    }

    #[test]
    fn update_images_applies_closure() {
        let store = FileStore::in_memory(Settings::default());
        store.set_images(vec![image("/a.jpg")]).unwrap();

        store
            .update_images(&mut |images| images.push(image("/b.jpg")))
            .unwrap();

        assert_eq!(store.get_images().unwrap().len(), 2);
    }

    #[test]
    fn staged_changes_wait_for_flush() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path(), None, Settings::default()).unwrap();
        store.set_images(vec![image("/a.jpg")]).unwrap();
        assert!(!store.has_unsaved_changes());

        for caption in ["first", "second", "third"] {
            store
                .stage_images(&mut |images| images[0].caption = caption.into())
                .unwrap();
        }
        assert!(store.has_unsaved_changes());
        assert_eq!(store.get_images().unwrap()[0].caption, "third");

        let on_disk = load_catalog(&dir.path().join(CATALOG_FILE)).unwrap();
        assert_eq!(on_disk[0].caption, "");

        store.flush().unwrap();
        assert!(!store.has_unsaved_changes());
        let on_disk = load_catalog(&dir.path().join(CATALOG_FILE)).unwrap();
        assert_eq!(on_disk[0].caption, "third");
    }

    #[test]
    fn flush_without_changes_does_not_write() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path(), None, Settings::default()).unwrap();

        store.flush().unwrap();
        assert!(!dir.path().join(CATALOG_FILE).exists());
    }

    #[test]
    fn dropping_store_saves_staged_changes() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileStore::open(dir.path(), None, Settings::default()).unwrap();
            store.stage_images(&mut |images| images.push(image("/a.jpg"))).unwrap();
        }

        let store = FileStore::open(dir.path(), None, Settings::default()).unwrap();
        assert_eq!(store.get_images().unwrap().len(), 1);
    }

    #[test]
    fn set_settings_writes_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("captioneer.toml");
        let store = FileStore::open(
            &dir.path().join("data"),
            Some(config_path.clone()),
            Settings::default(),
        )
        .unwrap();

        let settings = Settings {
            provider: ModelProviderConfig::Ollama(OllamaConfig {
                base_url: "http://localhost:11434".into(),
                model: "llava".into(),
            }),
            ..Settings::default()
        };
        store.set_settings(settings.clone()).unwrap();

        assert_eq!(store.get_settings(), settings);
        assert_eq!(config::load_config(&config_path).unwrap(), settings);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let store = FileStore::in_memory(Settings::default());
        let bad = Settings {
            request_timeout_secs: 0,
            ..Settings::default()
        };
        assert!(store.set_settings(bad).is_err());
        assert_eq!(store.get_settings(), Settings::default());
    }
}

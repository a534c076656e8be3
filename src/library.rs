//! Image library workflows.
//!
//! Folder scanning, regeneration, resuming interrupted work and removing
//! folders from the catalog. Each workflow updates the [`Store`] first and
//! then hands images to the [`CaptionQueue`], so every event the queue
//! publishes refers to an image the catalog already knows.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use captioneer_common::{paths::is_image_file, Image, ImageId};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::captioning::{CaptionQueue, ProviderRegistry};
use crate::store::Store;

/// Outcome of a folder scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanSummary {
    /// Image files found under the folder.
    pub discovered: usize,
    /// Images that were not in the catalog before.
    pub added: usize,
}

/// Catalog workflows over a store and a caption queue.
pub struct Library {
    store: Arc<dyn Store>,
    providers: Arc<ProviderRegistry>,
    queue: CaptionQueue,
}

impl Library {
    pub fn new(store: Arc<dyn Store>, providers: Arc<ProviderRegistry>, queue: CaptionQueue) -> Self {
        Self {
            store,
            providers,
            queue,
        }
    }

    pub fn queue(&self) -> &CaptionQueue {
        &self.queue
    }

    /// All catalog images.
    pub fn images(&self) -> Result<Vec<Image>> {
        self.store.get_images()
    }

    /// Scan `folder` recursively and queue every image found.
    ///
    /// Fails without touching the catalog if the selected provider is
    /// missing required settings.
    pub fn scan_folder(&self, folder: &Path) -> Result<ScanSummary> {
        let settings = self.store.get_settings();
        if !self.providers.is_initialized(&settings) {
            anyhow::bail!(
                "{} provider is not configured; set its base URL, API key and model first",
                settings.provider.kind()
            );
        }

        let folder = folder
            .canonicalize()
            .with_context(|| format!("Failed to resolve folder: {:?}", folder))?;
        if !folder.is_dir() {
            anyhow::bail!("Not a directory: {:?}", folder);
        }

        info!("Scanning folder: {:?}", folder);
        let paths = discover_images(&folder);

        let mut queued = Vec::with_capacity(paths.len());
        let mut added = 0;
        self.store.update_images(&mut |images| {
            for path in &paths {
                let id = ImageId::from(path.as_path());
                match images.iter_mut().find(|image| image.id == id) {
                    Some(existing) => {
                        existing.processing = true;
                        queued.push(existing.clone());
                    }
                    None => {
                        let mut image = Image::from_path(path);
                        image.processing = true;
                        images.push(image.clone());
                        queued.push(image);
                        added += 1;
                    }
                }
            }
        })?;

        let summary = ScanSummary {
            discovered: queued.len(),
            added,
        };

        for image in queued {
            self.queue.enqueue(image, false);
        }

        info!(
            discovered = summary.discovered,
            added = summary.added,
            "Scan complete: {:?}",
            folder
        );
        Ok(summary)
    }

    /// Queue a single image for a fresh caption, adding it to the catalog if
    /// it is not there yet.
    pub fn regenerate(&self, path: &Path) -> Result<Image> {
        let path = path
            .canonicalize()
            .with_context(|| format!("Failed to resolve image: {:?}", path))?;
        if !is_image_file(&path) {
            anyhow::bail!("Not a supported image file: {:?}", path);
        }

        let id = ImageId::from(path.as_path());
        let mut image = None;
        self.store.update_images(&mut |images| {
            let index = match images.iter().position(|i| i.id == id) {
                Some(index) => index,
                None => {
                    debug!(image_id = %id, "Registering image before regeneration");
                    images.push(Image::from_path(&path));
                    images.len() - 1
                }
            };
            images[index].processing = true;
            image = Some(images[index].clone());
        })?;

        let image = image.context("catalog update did not run")?;
        self.queue.enqueue(image.clone(), false);
        Ok(image)
    }

    /// Silently re-queue every catalog image still flagged as processing.
    ///
    /// Returns the number of images queued.
    pub fn resume_pending(&self) -> Result<usize> {
        let pending: Vec<Image> = self
            .store
            .get_images()?
            .into_iter()
            .filter(|image| image.processing)
            .collect();

        let count = pending.len();
        for image in pending {
            self.queue.enqueue(image, true);
        }

        if count > 0 {
            info!("Resumed {} pending images", count);
        }
        Ok(count)
    }

    /// Drop every catalog image under `folder` and its queued work.
    ///
    /// Returns the images that remain in the catalog.
    pub fn remove_folder(&self, folder: &Path) -> Result<Vec<Image>> {
        let folder = folder.canonicalize().unwrap_or_else(|e| {
            warn!("Failed to resolve folder {:?}: {}; matching as given", folder, e);
            folder.to_path_buf()
        });

        let mut removed = Vec::new();
        let mut remaining = Vec::new();
        self.store.update_images(&mut |images| {
            images.retain(|image| {
                let inside = image.source_path().starts_with(&folder);
                if inside {
                    removed.push(image.id.clone());
                }
                !inside
            });
            remaining = images.clone();
        })?;

        self.queue.remove_queued_images(&removed);
        info!("Removed {} images under {:?}", removed.len(), folder);
        Ok(remaining)
    }

    /// Distinct parent directories of catalog images.
    pub fn list_folders(&self) -> Result<BTreeSet<PathBuf>> {
        Ok(self
            .store
            .get_images()?
            .iter()
            .filter_map(|image| image.source_path().parent().map(Path::to_path_buf))
            .collect())
    }
}

/// Image files under `folder`, canonicalized and sorted. Symbolic links are
/// followed and resolved, so a file reached through several links is listed
/// once, under the same path `regenerate` would use. Unreadable entries are
/// skipped with a warning.
pub fn discover_images(folder: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkDir::new(folder)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_image_file(entry.path()))
        .map(|entry| {
            let path = entry.into_path();
            match path.canonicalize() {
                Ok(resolved) => resolved,
                Err(e) => {
                    warn!("Failed to resolve {:?}: {}; keeping path as found", path, e);
                    path
                }
            }
        })
        .collect();

    paths.sort();
    paths.dedup();
    paths
}

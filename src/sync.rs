//! Catalog synchronizer: keeps the persisted catalog in step with the
//! caption queue and relays changes to the presentation layer.

use std::sync::Arc;

use anyhow::Result;
use captioneer_common::Image;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::events::{Event, EventPayload, EventSubscriber};
use crate::store::Store;

/// Buffer of the outbound presentation channel.
const OUTBOUND_CAPACITY: usize = 256;

/// Subscriber that merges `image-updated` events into the catalog.
///
/// Events for images the catalog does not know are dropped: an image must be
/// registered (by a scan or a regenerate request) before it is enqueued.
pub struct CatalogSync {
    store: Arc<dyn Store>,
    outbound: broadcast::Sender<Event>,
}

impl CatalogSync {
    pub fn new(store: Arc<dyn Store>) -> Self {
        let (outbound, _) = broadcast::channel(OUTBOUND_CAPACITY);
        Self { store, outbound }
    }

    /// Subscribe to the events forwarded to the presentation boundary.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.outbound.subscribe()
    }

    /// Replace the matching catalog entry. Returns whether one matched.
    ///
    /// The change is staged; the owner of the store decides when to flush.
    fn merge(&self, image: &Image) -> Result<bool> {
        let mut matched = false;
        self.store.stage_images(&mut |images| {
            matched = false;
            if let Some(slot) = images.iter_mut().find(|i| i.id == image.id) {
                *slot = image.clone();
                matched = true;
            }
        })?;
        Ok(matched)
    }
}

impl EventSubscriber for CatalogSync {
    fn on_event(&self, event: &Event) {
        let EventPayload::ImageUpdated { image } = &event.payload;

        match self.merge(image) {
            Ok(true) => {
                // Ignore send errors (no presentation attached).
                let _ = self.outbound.send(event.clone());
            }
            Ok(false) => {
                debug!(image_id = %image.id, "Ignoring update for image not in catalog");
            }
            Err(e) => {
                warn!(image_id = %image.id, error = %e, "Failed to persist image update");
            }
        }
    }
}

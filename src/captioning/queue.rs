//! Background caption queue serializing calls to the captioning backend.
//!
//! The [`CaptionQueue`] accepts images through [`enqueue`](CaptionQueue::enqueue),
//! a synchronous, fire-and-forget call, and processes them one at a time in a
//! spawned Tokio task. Every state change is published on the [`EventBus`] as
//! an `image-updated` event; callers that need the final image subscribe
//! there rather than awaiting anything.
//!
//! Scheduling rules:
//!
//! - Newly enqueued images go to the **front**: a regenerate request jumps
//!   ahead of a scan backlog.
//! - Enqueueing an image that is already queued replaces the pending entry.
//! - A failed call goes to the **back** with its retry count incremented, so
//!   one failing image cannot starve the rest. After [`MAX_RETRY_COUNT`]
//!   retries the image degrades to the `"Unknown"` caption.
//! - Each enqueue bumps a per-image generation. A call that completes after
//!   its image was enqueued again is discarded, so the latest request is the
//!   only one whose outcome is published.
//!
//! # Example
//!
//! ```rust,ignore
//! let queue = CaptionQueue::new(store, providers, events);
//! queue.enqueue(image, false);
//! queue.wait_idle().await;
//! println!("spent ${:.4}", queue.total_cost());
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use captioneer_common::{Error, Image, ImageId, ImageInfo};
use parking_lot::{Mutex, ReentrantMutex};
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use super::registry::ProviderRegistry;
use crate::events::{EventBus, EventPayload};
use crate::store::Store;

/// Number of times a failed generation is re-queued before the image
/// degrades to the `"Unknown"` caption.
pub const MAX_RETRY_COUNT: u32 = 3;

/// One pending unit of work.
#[derive(Debug, Clone)]
struct QueueEntry {
    image: Image,
    retry_count: u32,
    generation: u64,
}

#[derive(Debug, Default)]
struct QueueState {
    entries: VecDeque<QueueEntry>,
    processing: bool,
    total_cost: f64,
    generations: HashMap<ImageId, u64>,
    next_generation: u64,
    // Entry the worker is currently generating for.
    in_flight: Option<(ImageId, u64)>,
}

impl QueueState {
    fn bump_generation(&mut self, id: &ImageId) -> u64 {
        self.next_generation += 1;
        self.generations.insert(id.clone(), self.next_generation);
        self.next_generation
    }

    fn is_current(&self, id: &ImageId, generation: u64) -> bool {
        self.generations.get(id) == Some(&generation)
    }

    /// Forget a generation that was dropped before it ran. If an older call
    /// for the same image is still in flight, its generation becomes current
    /// again so its outcome is published.
    fn withdraw_generation(&mut self, id: &ImageId, generation: u64) {
        if !self.is_current(id, generation) {
            return;
        }
        match &self.in_flight {
            Some((in_flight, previous)) if in_flight == id => {
                let previous = *previous;
                self.generations.insert(id.clone(), previous);
            }
            _ => {
                self.generations.remove(id);
            }
        }
    }
}

struct Inner {
    state: Mutex<QueueState>,
    // Orders "check generation, then publish" against enqueue's
    // "bump generation, then publish". Reentrant so a subscriber may enqueue.
    publish_lock: ReentrantMutex<()>,
    store: Arc<dyn Store>,
    providers: Arc<ProviderRegistry>,
    events: Arc<EventBus>,
    runtime: Handle,
    idle: Notify,
}

/// Handle to the caption queue. Clones share the same queue.
#[derive(Clone)]
pub struct CaptionQueue {
    inner: Arc<Inner>,
}

impl CaptionQueue {
    /// Create a queue bound to the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn new(
        store: Arc<dyn Store>,
        providers: Arc<ProviderRegistry>,
        events: Arc<EventBus>,
    ) -> Self {
        Self::with_runtime(store, providers, events, Handle::current())
    }

    /// Create a queue whose worker runs on `runtime`.
    pub fn with_runtime(
        store: Arc<dyn Store>,
        providers: Arc<ProviderRegistry>,
        events: Arc<EventBus>,
        runtime: Handle,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState::default()),
                publish_lock: ReentrantMutex::new(()),
                store,
                providers,
                events,
                runtime,
                idle: Notify::new(),
            }),
        }
    }

    /// Queue `image` for caption generation.
    ///
    /// Marks the image as processing and, unless `silent`, publishes that
    /// state before returning. Any pending entry for the same image is
    /// superseded. Never blocks on network I/O; the worker is started if it
    /// is not already running.
    pub fn enqueue(&self, mut image: Image, silent: bool) {
        image.processing = true;

        let start_worker = {
            let _publish = self.inner.publish_lock.lock();

            let generation = self.inner.state.lock().bump_generation(&image.id);
            if !silent {
                self.inner.events.publish(EventPayload::ImageUpdated {
                    image: image.clone(),
                });
            }

            let mut state = self.inner.state.lock();
            state.entries.retain(|e| e.image.id != image.id);
            debug!(image_id = %image.id, generation, queued = state.entries.len() + 1, "Queued image for captioning");
            state.entries.push_front(QueueEntry {
                image,
                retry_count: 0,
                generation,
            });
            !std::mem::replace(&mut state.processing, true)
        };

        if start_worker {
            self.inner.runtime.spawn(process_queue(Arc::clone(&self.inner)));
        }
    }

    /// Drop queued entries for `ids` without publishing anything.
    ///
    /// A generation already in flight is not cancelled; its outcome is still
    /// published, even when a newer queued request for it was removed.
    pub fn remove_queued_images(&self, ids: &[ImageId]) {
        let mut state = self.inner.state.lock();
        let mut removed = Vec::new();
        state.entries.retain(|e| {
            let keep = !ids.contains(&e.image.id);
            if !keep {
                removed.push((e.image.id.clone(), e.generation));
            }
            keep
        });

        for (id, generation) in &removed {
            state.withdraw_generation(id, *generation);
        }
        if !removed.is_empty() {
            debug!(removed = removed.len(), "Removed queued images");
        }
    }

    /// Number of entries waiting (excluding the one in flight).
    pub fn len(&self) -> usize {
        self.inner.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the worker is running.
    pub fn is_processing(&self) -> bool {
        self.inner.state.lock().processing
    }

    /// Identifiers of the queued entries, front first.
    pub fn queued_ids(&self) -> Vec<ImageId> {
        self.inner
            .state
            .lock()
            .entries
            .iter()
            .map(|e| e.image.id.clone())
            .collect()
    }

    /// Running cost of all successful generations since construction.
    pub fn total_cost(&self) -> f64 {
        self.inner.state.lock().total_cost
    }

    /// Resolve once the worker has drained the queue.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if !self.is_processing() {
                return;
            }
            notified.await;
        }
    }
}

/// Worker loop. Exactly one runs at a time; `processing` is cleared under
/// the same lock that observed the empty queue so no enqueue is stranded.
async fn process_queue(inner: Arc<Inner>) {
    debug!("Caption queue worker started");
    let mut guard = WorkerGuard {
        inner: Arc::clone(&inner),
        armed: true,
    };

    loop {
        let entry = {
            let mut state = inner.state.lock();
            match state.entries.pop_front() {
                Some(entry) => {
                    state.in_flight = Some((entry.image.id.clone(), entry.generation));
                    entry
                }
                None => {
                    state.processing = false;
                    break;
                }
            }
        };

        inner.process_entry(entry).await;
        inner.state.lock().in_flight = None;
    }

    guard.armed = false;
    debug!(total_cost = inner.state.lock().total_cost, "Caption queue worker idle");
    inner.idle.notify_waiters();
}

/// Keeps the queue alive when the worker task ends early, e.g. because a
/// provider or subscriber panicked.
struct WorkerGuard {
    inner: Arc<Inner>,
    armed: bool,
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let restart = {
            let mut state = self.inner.state.lock();
            state.in_flight = None;
            state.processing = !state.entries.is_empty();
            state.processing
        };

        if restart {
            error!("Caption queue worker aborted; restarting");
            self.inner
                .runtime
                .spawn(process_queue(Arc::clone(&self.inner)));
        } else {
            error!("Caption queue worker aborted");
            self.inner.idle.notify_waiters();
        }
    }
}

impl Inner {
    async fn process_entry(&self, entry: QueueEntry) {
        let QueueEntry {
            mut image,
            retry_count,
            generation,
        } = entry;

        info!(image_id = %image.id, retry_count, "Generating caption");
        let result = self.generate(&image).await;

        match result {
            Ok(info) => {
                let total_cost = {
                    let mut state = self.state.lock();
                    state.total_cost += info.cost;
                    state.total_cost
                };
                info!(
                    image_id = %image.id,
                    caption = %info.caption,
                    tags = ?info.tags,
                    cost = info.cost,
                    total_cost,
                    "Generated caption"
                );

                image.apply_info(&info);
                self.publish_if_current(image, generation);
            }
            Err(e) if e.is_retryable() && retry_count < MAX_RETRY_COUNT => {
                warn!(
                    image_id = %image.id,
                    retry_count,
                    error = %e,
                    "Caption generation failed; re-queueing at the back"
                );

                let mut state = self.state.lock();
                if state.is_current(&image.id, generation) {
                    state.entries.push_back(QueueEntry {
                        image,
                        retry_count: retry_count + 1,
                        generation,
                    });
                } else {
                    debug!(image_id = %image.id, "Image was re-queued meanwhile; dropping retry");
                }
            }
            Err(e) => {
                error!(
                    image_id = %image.id,
                    retry_count,
                    error = %e,
                    "Caption generation failed permanently"
                );

                image.mark_unknown();
                self.publish_if_current(image, generation);
            }
        }
    }

    async fn generate(&self, image: &Image) -> Result<ImageInfo, Error> {
        let settings = self.store.get_settings();
        let provider = self.providers.select(&settings.provider)?;
        provider.generate_image_info(&settings, image).await
    }

    fn publish_if_current(&self, image: Image, generation: u64) {
        let _publish = self.publish_lock.lock();
        if !self.state.lock().is_current(&image.id, generation) {
            debug!(image_id = %image.id, generation, "Discarding superseded result");
            return;
        }
        self.events.publish(EventPayload::ImageUpdated { image });
    }
}

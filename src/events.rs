//! In-process notification bus for image state changes.
//!
//! [`EventBus`] delivers every published [`Event`] synchronously to each
//! registered [`EventSubscriber`], in publish order, before `publish` returns.
//! It also mirrors events onto a `tokio::sync::broadcast` channel for async
//! observers.
//!
//! Delivery is best-effort: there is no durability and no backpressure. A
//! slow subscriber delays the publisher, so subscribers must not block.

use std::sync::Arc;

use captioneer_common::Image;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// EventPayload
// ---------------------------------------------------------------------------

/// Payload describing what happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum EventPayload {
    /// An image changed state: it started processing, or a generation
    /// finished (successfully or by terminal degrade). Carries the full
    /// image snapshot.
    ImageUpdated { image: Image },
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A timestamped event ready for delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event identifier.
    pub id: Uuid,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub payload: EventPayload,
}

impl Event {
    /// Create a new event with a fresh UUID and the current timestamp.
    pub fn new(payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Create an `image-updated` event.
    pub fn image_updated(image: Image) -> Self {
        Self::new(EventPayload::ImageUpdated { image })
    }

    /// The image carried by this event, if any.
    pub fn image(&self) -> Option<&Image> {
        match &self.payload {
            EventPayload::ImageUpdated { image } => Some(image),
        }
    }
}

// ---------------------------------------------------------------------------
// Subscribers
// ---------------------------------------------------------------------------

/// Receiver of synchronously delivered events.
pub trait EventSubscriber: Send + Sync {
    fn on_event(&self, event: &Event);
}

impl<F> EventSubscriber for F
where
    F: Fn(&Event) + Send + Sync,
{
    fn on_event(&self, event: &Event) {
        self(event)
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Synchronous fan-out bus with a broadcast mirror.
pub struct EventBus {
    subscribers: RwLock<Vec<Arc<dyn EventSubscriber>>>,
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new event bus.
    ///
    /// `capacity` controls the broadcast channel buffer size.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            subscribers: RwLock::new(Vec::new()),
            tx,
        }
    }

    /// Register a synchronous subscriber.
    pub fn subscribe(&self, subscriber: Arc<dyn EventSubscriber>) {
        self.subscribers.write().push(subscriber);
    }

    /// Subscribe to the broadcast mirror.
    pub fn subscribe_channel(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Publish an event to every subscriber and return it.
    pub fn publish(&self, payload: EventPayload) -> Event {
        let event = Event::new(payload);

        // Snapshot so a subscriber may register others without deadlocking.
        let subscribers: Vec<Arc<dyn EventSubscriber>> = self.subscribers.read().clone();
        for subscriber in &subscribers {
            subscriber.on_event(&event);
        }

        // Ignore send errors (no subscribers).
        let _ = self.tx.send(event.clone());

        event
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

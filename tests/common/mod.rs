//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which opens a [`FileStore`] in a temporary data
//! directory and wires the provider registry, [`EventBus`], [`CatalogSync`]
//! and [`Library`] the same way the binary does. The [`with_ollama`]
//! constructor points the Ollama provider at a wiremock server.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use captioneer::captioning::{CaptionQueue, ProviderRegistry};
use captioneer::config::{ModelProviderConfig, OllamaConfig, Settings};
use captioneer::events::{Event, EventBus};
use captioneer::library::Library;
use captioneer::store::{FileStore, Store};
use captioneer::sync::CatalogSync;
use serde_json::json;
use tempfile::TempDir;
use tokio::sync::broadcast;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Test harness wrapping a fully wired pipeline backed by a temp directory.
pub struct TestHarness {
    pub data_dir: TempDir,
    pub store: Arc<FileStore>,
    pub events: Arc<EventBus>,
    pub sync: Arc<CatalogSync>,
    pub library: Library,
}

impl TestHarness {
    /// Create a harness with the given settings and the default providers.
    pub fn with_settings(settings: Settings) -> Self {
        let data_dir = TempDir::new().expect("failed to create data dir");
        let store = Arc::new(
            FileStore::open(data_dir.path(), None, settings.clone()).expect("failed to open store"),
        );

        let providers = Arc::new(ProviderRegistry::with_defaults(&settings));
        let events = Arc::new(EventBus::default());
        let sync = Arc::new(CatalogSync::new(store.clone()));
        events.subscribe(sync.clone());

        let queue = CaptionQueue::new(store.clone(), providers.clone(), events.clone());
        let library = Library::new(store.clone(), providers, queue);

        Self {
            data_dir,
            store,
            events,
            sync,
            library,
        }
    }

    /// Start a mock Ollama server and return a harness configured for it.
    pub async fn with_ollama() -> (Self, MockServer) {
        let server = MockServer::start().await;
        let harness = Self::with_settings(ollama_settings(&server.uri()));
        (harness, server)
    }

    /// Subscribe to updates forwarded by the catalog synchronizer.
    pub fn updates(&self) -> broadcast::Receiver<Event> {
        self.sync.subscribe()
    }

    /// Wait for the caption queue to drain, then save staged catalog changes.
    pub async fn drain(&self) {
        tokio::time::timeout(Duration::from_secs(10), self.library.queue().wait_idle())
            .await
            .expect("caption queue did not drain");
        self.store.flush().expect("failed to save catalog");
    }
}

pub fn ollama_settings(base_url: &str) -> Settings {
    Settings {
        provider: ModelProviderConfig::Ollama(OllamaConfig {
            base_url: base_url.to_string(),
            model: "llava".to_string(),
        }),
        ..Settings::default()
    }
}

/// Mount a `/api/chat` mock that always answers with `content`.
pub async fn mock_ollama_reply(server: &MockServer, content: &str) {
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "llava",
            "message": { "role": "assistant", "content": content },
            "done": true
        })))
        .mount(server)
        .await;
}

/// Create fake image files under `dir` and return their paths.
pub fn write_images(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
    names
        .iter()
        .map(|name| {
            let path = dir.join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(&path, format!("fake image {name}")).unwrap();
            path
        })
        .collect()
}

/// Drain every event currently buffered on `rx`.
pub fn collect_events(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

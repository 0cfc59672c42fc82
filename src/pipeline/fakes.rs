//! In-memory collaborators for pipeline tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::models::{Config, Watch};
use crate::notify::{Notifier, WatchEvent};
use crate::pipeline::process::WatchContext;
use crate::services::{Fetch, FetchError, FetchResponse, InvalidResponse};
use crate::storage::{SnapshotBackend, SnapshotData, SnapshotStore};

pub type FetchResult = std::result::Result<FetchResponse, FetchError>;

pub fn ok(body: &str) -> FetchResult {
    Ok(FetchResponse {
        status: 200,
        headers: Default::default(),
        duration: Duration::from_millis(12),
        body: body.as_bytes().to_vec(),
    })
}

pub fn invalid(status: u16, body: &str) -> FetchError {
    FetchError::InvalidResponse(Box::new(InvalidResponse {
        status,
        headers: Default::default(),
        duration: Duration::from_millis(12),
        body: body.as_bytes().to_vec(),
    }))
}

/// Fetcher answering from a fixed table, with optional latency.
#[derive(Default)]
pub struct FakeFetcher {
    responses: HashMap<String, FetchResult>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, url: &str, result: FetchResult) -> Self {
        self.responses.insert(url.to_string(), result);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetch for FakeFetcher {
    async fn fetch(&self, url: &str, cancel: &CancellationToken) -> FetchResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.in_flight.fetch_sub(1, Ordering::SeqCst);
                    return Err(FetchError::Cancelled);
                }
                _ = tokio::time::sleep(self.delay) => {}
            }
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.responses
            .get(url)
            .cloned()
            .unwrap_or_else(|| Err(FetchError::Transport(format!("no route to {url}"))))
    }
}

/// Notifier keeping every event it was handed.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<(String, WatchEvent)>>,
    attempts: AtomicUsize,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A notifier whose deliveries always fail.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    pub fn events(&self) -> Vec<(String, WatchEvent)> {
        self.events.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, watch: &Watch, event: &WatchEvent) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AppError::notify(&watch.name, "transport down"));
        }
        self.events
            .lock()
            .unwrap()
            .push((watch.name.clone(), event.clone()));
        Ok(())
    }
}

/// Backend remembering what was saved.
#[derive(Default)]
pub struct MemoryBackend {
    pub saved: Mutex<Option<SnapshotData>>,
}

#[async_trait]
impl SnapshotBackend for MemoryBackend {
    async fn load(&self) -> Result<SnapshotData> {
        Ok(self.saved.lock().unwrap().clone().unwrap_or_default())
    }

    async fn save(&self, data: &SnapshotData) -> Result<()> {
        *self.saved.lock().unwrap() = Some(data.clone());
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

pub fn context(
    config: Config,
    fetcher: FakeFetcher,
    notifier: Arc<RecordingNotifier>,
) -> WatchContext {
    WatchContext {
        config: Arc::new(config),
        fetcher: Arc::new(fetcher),
        notifier,
        store: Arc::new(SnapshotStore::with_data(
            Arc::new(MemoryBackend::default()),
            SnapshotData::default(),
        )),
        dry_run: false,
    }
}

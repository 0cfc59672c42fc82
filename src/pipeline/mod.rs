//! Watch run pipeline.
//!
//! - `detect`: compare transformed content with the snapshot
//! - `process`: drive one watch from fetch to outcome
//! - `scheduler`: bounded fan-out over all watches
//!
//! [`Watcher::run`] ties them together: clean the snapshot, process every
//! watch, then stamp and persist the snapshot.

pub mod detect;
pub mod process;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod fakes;

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::models::{Config, RunReport};
use crate::notify::{LogNotifier, Notifier, WebhookNotifier};
use crate::services::{Fetch, HttpFetcher};
use crate::storage::{LocalStorage, SnapshotStore};

pub use process::WatchContext;
pub use scheduler::Scheduler;

/// A configured watcher, ready to run.
pub struct Watcher {
    context: Arc<WatchContext>,
}

impl Watcher {
    pub fn new(
        config: Config,
        store: SnapshotStore,
        fetcher: Arc<dyn Fetch>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            context: Arc::new(WatchContext {
                config: Arc::new(config),
                fetcher,
                notifier,
                store: Arc::new(store),
                dry_run: false,
            }),
        }
    }

    /// Build the production watcher: reqwest fetcher, webhook (or log)
    /// notifier, and the snapshot file named in the configuration.
    pub async fn from_config(config: Config) -> Result<Self> {
        let fetcher = Arc::new(HttpFetcher::new(&config.http)?);
        let notifier: Arc<dyn Notifier> = match &config.notify {
            Some(notify) => Arc::new(WebhookNotifier::new(notify.clone())?),
            None => {
                log::warn!("no [notify] section configured, notifications go to the log");
                Arc::new(LogNotifier)
            }
        };
        let backend = Arc::new(LocalStorage::new(&config.storage.database));
        let store = SnapshotStore::open(backend).await?;
        Ok(Self::new(config, store, fetcher, notifier))
    }

    /// Suppress change notifications; changes are only logged.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        if let Some(context) = Arc::get_mut(&mut self.context) {
            context.dry_run = dry_run;
        }
        self
    }

    pub fn config(&self) -> &Config {
        &self.context.config
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.context.store
    }

    /// Execute one full run and persist the snapshot.
    ///
    /// Per-watch failures are contained in the report; only snapshot
    /// persistence errors are returned.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<RunReport> {
        let started = Utc::now();
        let config = &self.context.config;
        let store = &self.context.store;

        let removed = store.cleanup(&config.watch_urls());
        if !removed.is_empty() {
            log::info!("removed {} stale snapshot entries", removed.len());
        }

        log::info!(
            "checking {} watches ({} at a time)",
            config.watches.len(),
            config.http.parallel_checks.max(1)
        );

        let scheduler = Scheduler::new(Arc::clone(&self.context), config.http.parallel_checks);
        let report = scheduler.run(&config.watches, cancel).await;

        store.set_last_run(started);
        store.save().await?;

        Ok(report)
    }
}

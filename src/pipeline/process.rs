// src/pipeline/process.rs

//! Per-watch processing: fetch, transform, compare, store.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::models::{Config, ErrorKind, ProcessingOutcome, Watch};
use crate::notify::{Notifier, WatchEvent};
use crate::pipeline::detect::{Change, detect_change};
use crate::services::{Fetch, FetchError, InvalidResponse, Transformer};
use crate::storage::SnapshotStore;

/// Everything a watch task needs, shared by all tasks of a run.
pub struct WatchContext {
    pub config: Arc<Config>,
    pub fetcher: Arc<dyn Fetch>,
    pub notifier: Arc<dyn Notifier>,
    pub store: Arc<SnapshotStore>,
    /// Log detected changes instead of sending them
    pub dry_run: bool,
}

impl WatchContext {
    /// Process one watch to a terminal outcome.
    ///
    /// Errors that escape [`Self::process_watch`] become `FatalError`s with a
    /// generic error notification; nothing is stored for them.
    pub async fn run_watch(&self, watch: &Watch, cancel: &CancellationToken) -> ProcessingOutcome {
        match self.process_watch(watch, cancel).await {
            Ok(outcome) => outcome,
            Err(error) => {
                let kind = error.kind();
                log::error!("error on {}: {}", watch.name, error);
                if kind.is_notified() {
                    let event = WatchEvent::Failed {
                        kind,
                        error: error.to_string(),
                    };
                    self.send(watch, &event).await;
                }
                ProcessingOutcome::FatalError {
                    kind,
                    message: error.to_string(),
                }
            }
        }
    }

    /// Fetch, transform and compare a watch, updating its snapshot entry.
    ///
    /// Hard HTTP errors and timeouts are resolved here; transport, pattern
    /// and cancellation failures are returned to the caller.
    pub async fn process_watch(
        &self,
        watch: &Watch,
        cancel: &CancellationToken,
    ) -> Result<ProcessingOutcome> {
        log::info!("processing {}: {}", watch.name, watch.url);
        let previous = self.store.get(&watch.url);

        let response = match self.fetcher.fetch(&watch.url, cancel).await {
            Ok(response) => response,
            Err(FetchError::InvalidResponse(invalid)) => {
                return Ok(self.handle_invalid_response(watch, invalid).await);
            }
            // Timeouts are treated as network noise, never as a change or an alert.
            Err(error @ FetchError::Timeout(_)) => {
                log::warn!("timeout on {} ({}): {}", watch.name, watch.url, error);
                return Ok(ProcessingOutcome::IgnoredError { kind: error.kind() });
            }
            Err(error) => return Err(error.into()),
        };

        let content = Transformer::for_watch(watch)?.apply(&response.body)?;

        let outcome = match detect_change(previous.as_deref(), &content) {
            Change::New => {
                log::debug!(
                    "new website {} {} detected, not comparing",
                    watch.name,
                    watch.url
                );
                ProcessingOutcome::NewResource
            }
            Change::Unchanged => {
                log::debug!("no change on {}", watch.name);
                ProcessingOutcome::Unchanged
            }
            Change::Changed => {
                if self.dry_run {
                    log::info!(
                        "website {} {} differs, would send notification in prod",
                        watch.name,
                        watch.url
                    );
                } else {
                    log::info!("Detected change on {}", watch.name);
                    let event = WatchEvent::Changed {
                        duration: response.duration,
                        status: response.status,
                        old: previous.unwrap_or_default(),
                        new: content.clone(),
                    };
                    // Keep the old entry so the next run detects the change again.
                    if !self.send(watch, &event).await {
                        log::warn!(
                            "keeping previous snapshot of {} until the change is delivered",
                            watch.name
                        );
                        return Ok(ProcessingOutcome::Changed);
                    }
                }
                ProcessingOutcome::Changed
            }
        };

        self.store.set(&watch.url, content);
        Ok(outcome)
    }

    async fn handle_invalid_response(
        &self,
        watch: &Watch,
        invalid: Box<InvalidResponse>,
    ) -> ProcessingOutcome {
        let status = invalid.status;
        let kind = if self.config.ignores_status(watch, status) {
            ErrorKind::Ignorable
        } else {
            ErrorKind::Reportable
        };

        if !kind.is_notified() {
            log::info!(
                "ignoring invalid response for {} - status: {}, bodylen: {}, duration: {:?}",
                watch.name,
                status,
                invalid.body.len(),
                invalid.duration
            );
            return ProcessingOutcome::IgnoredError { kind };
        }

        log::error!(
            "invalid response for {} - status: {}, bodylen: {}, duration: {:?}",
            watch.name,
            status,
            invalid.body.len(),
            invalid.duration
        );
        self.send(watch, &WatchEvent::InvalidResponse(invalid)).await;
        ProcessingOutcome::ReportedError { status }
    }

    /// Deliver a notification, returning whether it went out.
    ///
    /// A failed delivery is logged, never propagated.
    async fn send(&self, watch: &Watch, event: &WatchEvent) -> bool {
        match self.notifier.notify(watch, event).await {
            Ok(()) => true,
            Err(error) => {
                log::error!("could not send notification for {}: {}", watch.name, error);
                false
            }
        }
    }
}

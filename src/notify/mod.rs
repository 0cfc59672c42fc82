//! Notifications for detected changes and persistent errors.
//!
//! The pipeline hands a [`WatchEvent`] to a [`Notifier`]; the notifier
//! renders it ([`render`]) and delivers it through its transport.

pub mod diff;
pub mod render;
mod webhook;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ErrorKind, Watch};
use crate::services::InvalidResponse;

pub use render::{Message, render};
pub use webhook::WebhookNotifier;

/// Something worth telling a human about one watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// Content differs from the stored snapshot
    Changed {
        duration: Duration,
        status: u16,
        old: Vec<u8>,
        new: Vec<u8>,
    },
    /// The server answered with a hard error that is not ignored
    InvalidResponse(Box<InvalidResponse>),
    /// Processing or transport failure
    Failed { kind: ErrorKind, error: String },
}

/// Trait for notification transports.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `event` for `watch`.
    async fn notify(&self, watch: &Watch, event: &WatchEvent) -> Result<()>;
}

/// Notifier that only writes the subject to the log.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, watch: &Watch, event: &WatchEvent) -> Result<()> {
        let message = render(watch, event);
        log::info!("{} (no notification transport configured)", message.subject);
        Ok(())
    }
}

//! Webhook transport: posts rendered messages as JSON.
//!
//! ```text
//! POST {webhook_url}
//! { "from": "...", "to": ["..."], "subject": "...", "html": "..." }
//! ```
//!
//! The receiving side is expected to turn the payload into an email.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::{NotifyConfig, Watch};
use crate::notify::{Notifier, WatchEvent, render};

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    html: &'a str,
}

/// Notifier posting to an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    config: NotifyConfig,
    client: Client,
}

impl WebhookNotifier {
    pub fn new(config: NotifyConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { config, client })
    }

    /// Global recipients followed by the watch's own, without duplicates.
    fn recipients<'a>(&'a self, watch: &'a Watch) -> Vec<&'a str> {
        let mut to: Vec<&str> = Vec::new();
        for address in self.config.to.iter().chain(&watch.additional_to) {
            if !to.contains(&address.as_str()) {
                to.push(address);
            }
        }
        to
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, watch: &Watch, event: &WatchEvent) -> Result<()> {
        let message = render(watch, event);
        let payload = WebhookPayload {
            from: &self.config.from,
            to: self.recipients(watch),
            subject: &message.subject,
            html: &message.html,
        };

        log::debug!("sending \"{}\" to {:?}", message.subject, payload.to);

        let response = self
            .client
            .post(&self.config.webhook_url)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::notify(
                &watch.name,
                format!("webhook returned {status}: {body}"),
            ));
        }
        Ok(())
    }
}

// src/services/fetcher.rs

//! Retrying HTTP fetcher.
//!
//! Every watch is fetched with a single GET. A response only counts as a
//! success when the status is exactly 200, the body is non-empty and the body
//! does not carry one of the known soft-error pages that some servers return
//! with a misleading status. Everything else becomes a [`FetchError`], which
//! is classified once through [`FetchError::kind`].

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::HeaderMap;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::models::{ErrorKind, HttpConfig};

/// Body fragments that mark a 200 response as an infrastructure error page.
pub const SOFT_ERROR_SIGNATURES: [&str; 3] = [
    "504 - Gateway Time-out",
    "404 - Not Found",
    "503 - Service Unavailable",
];

/// Response headers, grouped by lowercase name in sorted order.
pub type Headers = BTreeMap<String, Vec<String>>;

/// A successful fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub headers: Headers,
    /// Time until the response headers arrived
    pub duration: Duration,
    pub body: Vec<u8>,
}

/// Diagnostics of a hard error response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidResponse {
    pub status: u16,
    pub headers: Headers,
    pub duration: Duration,
    pub body: Vec<u8>,
}

/// Why a fetch failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Non-200 status, empty body or soft-error body
    #[error("invalid response: status {}, bodylen {}", .0.status, .0.body.len())]
    InvalidResponse(Box<InvalidResponse>),

    /// The request deadline was exceeded
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Any other network failure
    #[error("transport error: {0}")]
    Transport(String),

    /// The run was cancelled while the fetch was pending
    #[error("fetch cancelled")]
    Cancelled,
}

impl FetchError {
    /// Classify the error, before any ignore list is consulted.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::InvalidResponse(_) => ErrorKind::Reportable,
            FetchError::Timeout(_) => ErrorKind::Timeout,
            FetchError::Transport(_) => ErrorKind::Transport,
            FetchError::Cancelled => ErrorKind::Fatal,
        }
    }
}

/// Anything able to fetch a watched URL.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Fetch `url`, applying the fetcher's retry policy.
    async fn fetch(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<FetchResponse, FetchError>;
}

/// Reqwest-backed fetcher.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    retries: u32,
    retry_delay: Duration,
}

impl HttpFetcher {
    /// Build a fetcher from the HTTP settings.
    ///
    /// Certificate validation is disabled: watched sites are compared by
    /// content, their TLS setup is not our concern.
    pub fn new(config: &HttpConfig) -> crate::error::Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout())
            .danger_accept_invalid_certs(true)
            .build()?;

        Ok(Self {
            client,
            retries: config.retries.max(1),
            retry_delay: config.retry_delay(),
        })
    }

    /// Perform a single attempt.
    async fn fetch_once(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<FetchResponse, FetchError> {
        let start = Instant::now();
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            result = self.client.get(url).send() => result.map_err(map_reqwest_error)?,
        };
        let duration = start.elapsed();

        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());

        let body = tokio::select! {
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            result = response.bytes() => result.map_err(map_reqwest_error)?.to_vec(),
        };

        if status != 200 || body.is_empty() || is_soft_error(&body) {
            return Err(FetchError::InvalidResponse(Box::new(InvalidResponse {
                status,
                headers,
                duration,
                body,
            })));
        }

        Ok(FetchResponse {
            status,
            headers,
            duration,
            body,
        })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<FetchResponse, FetchError> {
        retry_with_delay(self.retries, self.retry_delay, cancel, url, |_| {
            self.fetch_once(url, cancel)
        })
        .await
    }
}

/// Run `attempt` up to `retries` times, sleeping `delay` between failures.
///
/// No delay follows the last attempt, whose error is returned as is. The wait
/// ends early with [`FetchError::Cancelled`] when `cancel` fires, and a
/// cancelled attempt is never retried.
pub async fn retry_with_delay<F, Fut>(
    retries: u32,
    delay: Duration,
    cancel: &CancellationToken,
    url: &str,
    mut attempt: F,
) -> std::result::Result<FetchResponse, FetchError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = std::result::Result<FetchResponse, FetchError>>,
{
    let retries = retries.max(1);
    let mut try_number = 1;

    loop {
        log::debug!("try #{} for {}", try_number, url);

        let error = match attempt(try_number).await {
            Ok(response) => return Ok(response),
            Err(FetchError::Cancelled) => return Err(FetchError::Cancelled),
            Err(error) => error,
        };

        if try_number >= retries {
            return Err(error);
        }

        if delay.is_zero() {
            log::warn!("got error on try #{} for {}, retrying: {}", try_number, url, error);
        } else {
            log::warn!(
                "got error on try #{} for {}, retrying after {:?}: {}",
                try_number,
                url,
                delay,
                error
            );
            tokio::select! {
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        try_number += 1;
    }
}

/// Whether a body is a known error page served with a success status.
pub fn is_soft_error(body: &[u8]) -> bool {
    !body.is_empty()
        && SOFT_ERROR_SIGNATURES
            .iter()
            .any(|signature| contains(body, signature.as_bytes()))
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

fn collect_headers(map: &HeaderMap) -> Headers {
    let mut headers = Headers::new();
    for (name, value) in map {
        headers
            .entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    headers
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::Timeout(error_chain(&err));
    }
    FetchError::Transport(error_chain(&err))
}

/// Render an error with its sources, e.g. `error sending request: dns error`.
fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

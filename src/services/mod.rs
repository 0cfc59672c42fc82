//! Service layer for the watcher application.
//!
//! - Fetching watched resources with retries (`HttpFetcher`)
//! - Extracting and normalizing fetched content (`Transformer`)

mod fetcher;
mod transform;

pub use fetcher::{
    Fetch, FetchError, FetchResponse, Headers, HttpFetcher, InvalidResponse,
    SOFT_ERROR_SIGNATURES, is_soft_error, retry_with_delay,
};
pub use transform::{TransformError, Transformer, transform};

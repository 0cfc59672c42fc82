// src/error.rs

//! Unified error handling for the watcher application.

use std::fmt;

use thiserror::Error;

use crate::models::ErrorKind;
use crate::services::{FetchError, TransformError};

/// Result type alias for watcher operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed outside of a watch fetch (client setup, notifications)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Fetching a watched resource failed
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Extraction or replacement patterns failed
    #[error(transparent)]
    Transform(#[from] TransformError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Snapshot database error
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// Notification delivery error
    #[error("Notification error for {context}: {message}")]
    Notify { context: String, message: String },
}

impl AppError {
    /// Classify the error for per-watch handling.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Fetch(e) => e.kind(),
            AppError::Transform(_) => ErrorKind::Processing,
            _ => ErrorKind::Fatal,
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a snapshot database error.
    pub fn snapshot(message: impl Into<String>) -> Self {
        Self::Snapshot(message.into())
    }

    /// Create a notification error with context.
    pub fn notify(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Notify {
            context: context.into(),
            message: message.to_string(),
        }
    }
}

// src/models/mod.rs

//! Domain models for the watcher application.

mod config;
mod outcome;
mod watch;

pub use config::{Config, HttpConfig, NotifyConfig, StorageConfig};
pub use outcome::{ErrorKind, ProcessingOutcome, RunReport};
pub use watch::{Replace, Watch};

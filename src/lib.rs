//! Linkrot: a URL liveness monitoring service
//!
//! This crate implements the crawl-dispatch-store-notify pipeline behind a
//! link checker: URLs are submitted (individually or in named groups,
//! optionally on a recurring schedule), probed over HTTP, persisted in a
//! key-value store, and registered callbacks are notified of the outcome.

pub mod config;
pub mod crawler;
pub mod hash;
pub mod migrations;
pub mod storage;
pub mod url;
pub mod webhook;

use thiserror::Error;

/// Main error type for linkrot operations
#[derive(Debug, Error)]
pub enum LinkrotError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for linkrot operations
pub type Result<T> = std::result::Result<T, LinkrotError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, Fetcher, Scheduler};
pub use storage::{
    Frequency, GroupRecord, MemoryStorage, ProbeResult, RedirectHop, RedisStorage, Storage,
    UrlRecord,
};
pub use webhook::{RetryOutcome, RetryPolicy, WebhookDispatcher};

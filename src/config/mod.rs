//! Configuration module for linkrot
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files. Every setting has a default, so an empty file (or an absent
//! section) yields a runnable configuration pointed at a local store.
//!
//! # Example
//!
//! ```no_run
//! use linkrot::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("linkrot.toml")).unwrap();
//! println!("Probing with a {}s HEAD timeout", config.fetcher.head_timeout);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, FetcherConfig, StorageConfig, WebhookConfig};

// Re-export parser functions
pub use parser::load_config;

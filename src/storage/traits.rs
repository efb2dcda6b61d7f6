//! Storage trait and error types
//!
//! This module defines the trait interface the pipeline components program
//! against; the Redis and in-memory backends both satisfy it.

use crate::storage::{Frequency, GroupRecord, ProbeResult, UrlRecord};
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backing store could not be reached or answered badly. Fatal to
    /// the calling operation; no retry happens at this layer.
    #[error("Storage unavailable: {0}")]
    Unavailable(#[from] redis::RedisError),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// All writes are field-level merges: an update only overwrites the fields
/// it supplies, leaving the rest of the record intact. Implementations must
/// be shareable across tasks.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Persists a URL record, creating it if needed, and returns its key.
    /// Idempotent: the key joins the global URL list only on first sight.
    async fn store_url(&self, url: &str) -> StorageResult<String>;

    /// Files a URL under a named group. Overwrites the URL record's group
    /// pointer; a previous group's membership entry is left behind (accepted
    /// eventual-consistency gap).
    async fn store_group(&self, url: &str, group: &str) -> StorageResult<()>;

    /// Queues a URL's group for periodic re-checking. The group joins the
    /// cadence list at most once.
    async fn store_frequency(
        &self,
        url: &str,
        group: &str,
        frequency: Frequency,
    ) -> StorageResult<()>;

    /// Merges a probe outcome into the URL record, stamping `updated` with
    /// the current time, and returns the stored snapshot. Last-write-wins
    /// under concurrent probes of the same URL.
    async fn store_metadata(&self, url: &str, probe: &ProbeResult) -> StorageResult<UrlRecord>;

    /// Fetches a URL record by key.
    async fn get_url(&self, key: &str) -> StorageResult<Option<UrlRecord>>;

    /// Fetches a group record by key.
    async fn get_group(&self, key: &str) -> StorageResult<Option<GroupRecord>>;

    /// Every known URL record with its key, in insertion order.
    async fn get_all_urls(&self) -> StorageResult<Vec<(String, UrlRecord)>>;

    /// Member URLs of every group queued at the given cadence.
    async fn get_frequency_urls(&self, frequency: Frequency) -> StorageResult<Vec<String>>;

    /// Atomically plants the in-flight marker for a URL unless one is
    /// already present. Returns false when another probe holds the flag.
    async fn try_acquire_check_flag(&self, url: &str) -> StorageResult<bool>;

    /// Clears the in-flight marker. The flag's TTL covers probes that crash
    /// before reaching this call.
    async fn release_check_flag(&self, url: &str) -> StorageResult<()>;

    /// Registers a callback URL for a checked URL. Append-only and
    /// deduplicated; never pruned automatically.
    async fn store_webhook(&self, url: &str, callback_url: &str) -> StorageResult<()>;

    /// Callback URLs registered for a checked URL, in registration order.
    async fn get_webhooks_for_url(&self, url: &str) -> StorageResult<Vec<String>>;

    /// Removes a URL record and its global-list entry (administrative purge).
    async fn delete_url(&self, key: &str) -> StorageResult<()>;

    /// Rewrites a stored `content-type` through the charset split
    /// (migration path for records written before the split existed).
    async fn store_content_type(&self, key: &str, content_type: &str) -> StorageResult<()>;
}

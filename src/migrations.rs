//! Administrative migrations
//!
//! One-shot maintenance operations driven through the storage interface.
//! Both are idempotent and safe to re-run.

use crate::storage::{Storage, StorageResult};
use crate::url::host_of;

/// Deletes every URL record whose host matches `domain` exactly.
/// Returns how many records were removed.
pub async fn delete_urls_for<S: Storage>(storage: &S, domain: &str) -> StorageResult<usize> {
    tracing::info!("Deleting URLs for domain {}", domain);
    let domain = domain.to_lowercase();
    let mut deleted = 0;
    for (key, record) in storage.get_all_urls().await? {
        if host_of(&record.checked_url).as_deref() == Some(domain.as_str()) {
            storage.delete_url(&key).await?;
            deleted += 1;
        }
    }
    Ok(deleted)
}

/// Re-splits `content-type` values stored before the charset split existed.
/// Returns how many records were rewritten.
pub async fn split_content_types<S: Storage>(storage: &S) -> StorageResult<usize> {
    tracing::info!("Splitting content types");
    let mut rewritten = 0;
    for (key, record) in storage.get_all_urls().await? {
        if let Some(content_type) = record.headers.get("content-type") {
            if content_type.contains(';') {
                storage.store_content_type(&key, content_type).await?;
                rewritten += 1;
            }
        }
    }
    Ok(rewritten)
}

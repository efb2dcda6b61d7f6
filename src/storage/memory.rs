//! In-memory storage backend
//!
//! Satisfies the same trait as the Redis backend with plain maps behind a
//! mutex. The test suite runs against it; it also serves for local
//! experiments without a store.

use crate::hash::{check_key, group_key, url_key, webhook_key};
use crate::storage::traits::{Storage, StorageResult};
use crate::storage::{
    metadata_fields, split_content_type, Frequency, GroupRecord, ProbeResult, UrlRecord,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Key of the global list of URL record keys
const URLS_LIST: &str = "urls";

#[derive(Default)]
struct Tables {
    /// Record key → field map
    hashes: HashMap<String, HashMap<String, String>>,
    /// List key → ordered members
    lists: HashMap<String, Vec<String>>,
    /// Check-flag key → (URL, expiry)
    flags: HashMap<String, (String, Instant)>,
}

impl Tables {
    fn push_if_absent(&mut self, list: &str, value: &str) {
        let members = self.lists.entry(list.to_string()).or_default();
        if !members.iter().any(|member| member == value) {
            members.push(value.to_string());
        }
    }

    fn hset(&mut self, key: &str, field: &str, value: &str) {
        self.hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
    }
}

/// In-process storage
pub struct MemoryStorage {
    tables: Mutex<Tables>,
    check_flag_ttl: Duration,
}

impl MemoryStorage {
    pub fn new(check_flag_ttl: Duration) -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            check_flag_ttl,
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new(Duration::from_secs(600))
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn store_url(&self, url: &str) -> StorageResult<String> {
        let key = url_key(url);
        let mut tables = self.tables.lock().await;
        tables.hset(&key, "checked-url", url);
        tables.push_if_absent(URLS_LIST, &key);
        Ok(key)
    }

    async fn store_group(&self, url: &str, group: &str) -> StorageResult<()> {
        let url_record = url_key(url);
        let group_record = group_key(group);
        let mut tables = self.tables.lock().await;
        tables.hset(&url_record, "group", &group_record);
        tables.hset(&group_record, "name", group);
        tables.hset(&group_record, &url_record, url);
        Ok(())
    }

    async fn store_frequency(
        &self,
        url: &str,
        group: &str,
        frequency: Frequency,
    ) -> StorageResult<()> {
        let url_record = url_key(url);
        let group_record = group_key(group);
        let mut tables = self.tables.lock().await;
        tables.hset(&url_record, "frequency", frequency.as_str());
        tables.push_if_absent(frequency.list_key(), &group_record);
        Ok(())
    }

    async fn store_metadata(&self, url: &str, probe: &ProbeResult) -> StorageResult<UrlRecord> {
        let key = url_key(url);
        let fields = metadata_fields(probe, Utc::now().to_rfc3339());
        let mut tables = self.tables.lock().await;
        for (field, value) in fields {
            tables.hset(&key, &field, &value);
        }
        let stored = tables.hashes.get(&key).cloned().unwrap_or_default();
        Ok(UrlRecord::from_fields(stored))
    }

    async fn get_url(&self, key: &str) -> StorageResult<Option<UrlRecord>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .hashes
            .get(key)
            .cloned()
            .map(UrlRecord::from_fields))
    }

    async fn get_group(&self, key: &str) -> StorageResult<Option<GroupRecord>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .hashes
            .get(key)
            .cloned()
            .map(GroupRecord::from_fields))
    }

    async fn get_all_urls(&self) -> StorageResult<Vec<(String, UrlRecord)>> {
        let tables = self.tables.lock().await;
        let keys = tables.lists.get(URLS_LIST).cloned().unwrap_or_default();
        Ok(keys
            .into_iter()
            .filter_map(|key| {
                tables
                    .hashes
                    .get(&key)
                    .cloned()
                    .map(|fields| (key, UrlRecord::from_fields(fields)))
            })
            .collect())
    }

    async fn get_frequency_urls(&self, frequency: Frequency) -> StorageResult<Vec<String>> {
        let tables = self.tables.lock().await;
        let group_keys = tables
            .lists
            .get(frequency.list_key())
            .cloned()
            .unwrap_or_default();
        let mut urls = Vec::new();
        for key in group_keys {
            if let Some(fields) = tables.hashes.get(&key) {
                let group = GroupRecord::from_fields(fields.clone());
                urls.extend(group.member_urls().cloned());
            }
        }
        Ok(urls)
    }

    async fn try_acquire_check_flag(&self, url: &str) -> StorageResult<bool> {
        let key = check_key(url);
        let now = Instant::now();
        let mut tables = self.tables.lock().await;
        match tables.flags.get(&key) {
            Some((_, expiry)) if *expiry > now => Ok(false),
            _ => {
                tables
                    .flags
                    .insert(key, (url.to_string(), now + self.check_flag_ttl));
                Ok(true)
            }
        }
    }

    async fn release_check_flag(&self, url: &str) -> StorageResult<()> {
        let mut tables = self.tables.lock().await;
        tables.flags.remove(&check_key(url));
        Ok(())
    }

    async fn store_webhook(&self, url: &str, callback_url: &str) -> StorageResult<()> {
        let mut tables = self.tables.lock().await;
        tables.push_if_absent(&webhook_key(url), callback_url);
        Ok(())
    }

    async fn get_webhooks_for_url(&self, url: &str) -> StorageResult<Vec<String>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .lists
            .get(&webhook_key(url))
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_url(&self, key: &str) -> StorageResult<()> {
        let mut tables = self.tables.lock().await;
        tables.hashes.remove(key);
        if let Some(members) = tables.lists.get_mut(URLS_LIST) {
            members.retain(|member| member != key);
        }
        Ok(())
    }

    async fn store_content_type(&self, key: &str, content_type: &str) -> StorageResult<()> {
        let (media_type, charset) = split_content_type(content_type);
        let mut tables = self.tables.lock().await;
        tables.hset(key, "content-type", &media_type);
        if let Some(charset) = charset {
            tables.hset(key, "charset", &charset);
        }
        Ok(())
    }
}

#[cfg(test)]
impl MemoryStorage {
    /// Writes a raw field, bypassing normal write paths. Fixture for data
    /// shaped by older versions of the service.
    pub(crate) async fn set_raw_field(&self, key: &str, field: &str, value: &str) {
        let mut tables = self.tables.lock().await;
        tables.hset(key, field, value);
    }
}

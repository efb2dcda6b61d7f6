//! Redis storage backend
//!
//! Records are Redis hashes, the global URL list and the frequency queues
//! are Redis lists, and the check-flag is a plain key written with
//! `SET NX EX` so acquisition and expiry are one atomic step.

use crate::hash::{check_key, group_key, url_key, webhook_key};
use crate::storage::traits::{Storage, StorageResult};
use crate::storage::{
    metadata_fields, split_content_type, Frequency, GroupRecord, ProbeResult, UrlRecord,
};
use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::collections::HashMap;
use std::time::Duration;

/// Key of the global list of URL record keys
const URLS_LIST: &str = "urls";

/// Redis-backed storage
///
/// Cloning is cheap; the connection manager multiplexes one connection and
/// reconnects on its own, while individual commands still fail fast when
/// the server is unreachable.
#[derive(Clone)]
pub struct RedisStorage {
    conn: ConnectionManager,
    check_flag_ttl: u64,
}

impl RedisStorage {
    /// Connects to the store at `redis_url`.
    pub async fn connect(redis_url: &str, check_flag_ttl: Duration) -> StorageResult<Self> {
        let client = Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn,
            check_flag_ttl: check_flag_ttl.as_secs(),
        })
    }

    /// Appends `value` to the list unless it is already a member.
    async fn push_if_absent(&self, list: &str, value: &str) -> StorageResult<()> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = conn.lrange(list, 0, -1).await?;
        if !members.iter().any(|member| member == value) {
            let _: () = conn.rpush(list, value).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for RedisStorage {
    async fn store_url(&self, url: &str) -> StorageResult<String> {
        let key = url_key(url);
        let mut conn = self.conn.clone();
        let _: () = conn.hset(&key, "checked-url", url).await?;
        self.push_if_absent(URLS_LIST, &key).await?;
        Ok(key)
    }

    async fn store_group(&self, url: &str, group: &str) -> StorageResult<()> {
        let url_record = url_key(url);
        let group_record = group_key(group);
        let mut conn = self.conn.clone();
        let _: () = conn.hset(&url_record, "group", &group_record).await?;
        let _: () = conn.hset(&group_record, "name", group).await?;
        let _: () = conn.hset(&group_record, &url_record, url).await?;
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
        let mut conn = self.conn.clone();
        let _: () = conn
            .hset(&url_record, "frequency", frequency.as_str())
            .await?;
        self.push_if_absent(frequency.list_key(), &group_record)
            .await?;
        Ok(())
    }

    async fn store_metadata(&self, url: &str, probe: &ProbeResult) -> StorageResult<UrlRecord> {
        let key = url_key(url);
        let fields = metadata_fields(probe, Utc::now().to_rfc3339());
        let mut conn = self.conn.clone();
        let _: () = conn.hset_multiple(&key, &fields).await?;
        let stored: HashMap<String, String> = conn.hgetall(&key).await?;
        Ok(UrlRecord::from_fields(stored))
    }

    async fn get_url(&self, key: &str) -> StorageResult<Option<UrlRecord>> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn.hgetall(key).await?;
        if fields.is_empty() {
            Ok(None)
        } else {
            Ok(Some(UrlRecord::from_fields(fields)))
        }
    }

    async fn get_group(&self, key: &str) -> StorageResult<Option<GroupRecord>> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn.hgetall(key).await?;
        if fields.is_empty() {
            Ok(None)
        } else {
            Ok(Some(GroupRecord::from_fields(fields)))
        }
    }

    async fn get_all_urls(&self) -> StorageResult<Vec<(String, UrlRecord)>> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = conn.lrange(URLS_LIST, 0, -1).await?;
        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(record) = self.get_url(&key).await? {
                records.push((key, record));
            }
        }
        Ok(records)
    }

    async fn get_frequency_urls(&self, frequency: Frequency) -> StorageResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let group_keys: Vec<String> = conn.lrange(frequency.list_key(), 0, -1).await?;
        let mut urls = Vec::new();
        for key in group_keys {
            if let Some(group) = self.get_group(&key).await? {
                urls.extend(group.member_urls().cloned());
            }
        }
        Ok(urls)
    }

    async fn try_acquire_check_flag(&self, url: &str) -> StorageResult<bool> {
        let mut conn = self.conn.clone();
        // SET NX EX is atomic: existence check and TTL in one round-trip
        let acquired: bool = redis::cmd("SET")
            .arg(check_key(url))
            .arg(url)
            .arg("NX")
            .arg("EX")
            .arg(self.check_flag_ttl)
            .query_async(&mut conn)
            .await?;
        Ok(acquired)
    }

    async fn release_check_flag(&self, url: &str) -> StorageResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(check_key(url)).await?;
        Ok(())
    }

    async fn store_webhook(&self, url: &str, callback_url: &str) -> StorageResult<()> {
        self.push_if_absent(&webhook_key(url), callback_url).await
    }

    async fn get_webhooks_for_url(&self, url: &str) -> StorageResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let callbacks: Vec<String> = conn.lrange(webhook_key(url), 0, -1).await?;
        Ok(callbacks)
    }

    async fn delete_url(&self, key: &str) -> StorageResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await?;
        let _: usize = conn.lrem(URLS_LIST, 0, key).await?;
        Ok(())
    }

    async fn store_content_type(&self, key: &str, content_type: &str) -> StorageResult<()> {
        let (media_type, charset) = split_content_type(content_type);
        let mut conn = self.conn.clone();
        let _: () = conn.hset(key, "content-type", media_type).await?;
        if let Some(charset) = charset {
            let _: () = conn.hset(key, "charset", charset).await?;
        }
        Ok(())
    }
}

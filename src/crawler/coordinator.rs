//! Crawl coordination - the check pipeline
//!
//! The coordinator ties the pieces together: validate the submission,
//! persist the URL and its associations, gate on the in-flight flag, probe,
//! persist the outcome, and notify observers of the freshly stored record.

use crate::crawler::Fetcher;
use crate::storage::{Frequency, Storage, UrlRecord};
use crate::url::validate_url;
use crate::LinkrotError;
use std::sync::Arc;
use tokio::sync::{broadcast, Semaphore};

/// Capacity of the crawled-event channel
const EVENT_BUFFER: usize = 256;

/// Central orchestrator of the check pipeline
pub struct Coordinator<S> {
    storage: Arc<S>,
    fetcher: Fetcher,
    probe_limit: Semaphore,
    events: broadcast::Sender<UrlRecord>,
}

impl<S: Storage> Coordinator<S> {
    pub fn new(storage: Arc<S>, fetcher: Fetcher, max_concurrent_probes: usize) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            storage,
            fetcher,
            probe_limit: Semaphore::new(max_concurrent_probes),
            events,
        }
    }

    /// Subscribes to crawled-record notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<UrlRecord> {
        self.events.subscribe()
    }

    /// Checks one URL, optionally filing it under a group and cadence.
    ///
    /// A malformed URL is logged and dropped, never retried. The URL record
    /// (and group/frequency associations) are persisted before probing so
    /// the entity exists for querying even when the probe fails. The
    /// check-flag keeps concurrent submissions of the same URL down to one
    /// probe within its TTL window; a flagged URL is skipped entirely. Only
    /// storage failures abort the operation.
    pub async fn check(
        &self,
        url: &str,
        group: Option<&str>,
        frequency: Option<Frequency>,
    ) -> Result<(), LinkrotError> {
        tracing::info!(
            "Checking {} for group {:?} and frequency {:?}",
            url,
            group,
            frequency
        );

        let parsed = match validate_url(url) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::error!("Error with {}: {}", url, err);
                return Ok(());
            }
        };

        self.storage.store_url(url).await?;
        if let Some(group) = group {
            self.storage.store_group(url, group).await?;
            if let Some(frequency) = frequency {
                self.storage.store_frequency(url, group, frequency).await?;
            }
        }

        if !self.storage.try_acquire_check_flag(url).await? {
            tracing::debug!("A probe for {} is already in flight, skipping", url);
            return Ok(());
        }

        let probe = match self.probe_limit.acquire().await {
            Ok(_permit) => self.fetcher.probe(&parsed).await,
            Err(_) => {
                // Semaphore closed mid-shutdown; undo the gate and bail
                self.storage.release_check_flag(url).await?;
                return Ok(());
            }
        };

        // The flag is released whatever the persistence outcome, so a
        // future probe is never permanently blocked.
        let stored = self.storage.store_metadata(url, &probe).await;
        let released = self.storage.release_check_flag(url).await;
        let record = stored?;
        released?;

        // A send error only means nobody is subscribed right now
        let _ = self.events.send(record);
        Ok(())
    }

    /// Registers a callback to notify when probes of `url` complete.
    ///
    /// Registration is independent of the dedup gate: the callback lands
    /// even while a probe for the URL is in flight. A malformed callback is
    /// logged and simply not registered.
    pub async fn register_webhook(&self, url: &str, callback_url: &str) -> Result<(), LinkrotError> {
        if let Err(err) = validate_url(callback_url) {
            tracing::error!("Error with callback {}: {}", callback_url, err);
            return Ok(());
        }
        self.storage.store_webhook(url, callback_url).await?;
        Ok(())
    }
}

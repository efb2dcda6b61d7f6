//! Webhook delivery
//!
//! Subscribes to crawled notifications and POSTs the stored record to every
//! callback registered for the checked URL. Deliveries are independent per
//! callback: a failing endpoint drives its own retry/backoff and its
//! exhaustion is logged, never propagated back to the crawl.

mod retry;

pub use retry::{RetryOutcome, RetryPolicy};

use crate::config::WebhookConfig;
use crate::storage::{Storage, UrlRecord};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;

/// A single failed delivery attempt
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Callback answered {0}")]
    Status(u16),

    #[error("Callback unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),
}

/// Delivers crawled records to registered callbacks
pub struct WebhookDispatcher<S> {
    storage: Arc<S>,
    client: Client,
    retry: RetryPolicy,
}

impl<S: Storage + 'static> WebhookDispatcher<S> {
    pub fn new(storage: Arc<S>, config: &WebhookConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout))
            .timeout(Duration::from_secs(config.total_timeout))
            .build()?;

        Ok(Self {
            storage,
            client,
            retry: RetryPolicy::new(
                config.max_attempts,
                Duration::from_secs(config.base_delay),
                config.backoff_factor,
            ),
        })
    }

    /// Consumes crawled events until the channel closes.
    ///
    /// Each event's deliveries run as their own task so a slow callback
    /// never delays the next event.
    pub async fn run(self: Arc<Self>, mut events: broadcast::Receiver<UrlRecord>) {
        loop {
            match events.recv().await {
                Ok(record) => {
                    let dispatcher = Arc::clone(&self);
                    tokio::spawn(async move { dispatcher.dispatch(&record).await });
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!("Webhook dispatcher lagged, {} crawled events lost", missed);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    /// Delivers one crawled record to every callback registered for it.
    /// Returns once every delivery reached a terminal state.
    pub async fn dispatch(&self, record: &UrlRecord) {
        let callbacks = match self.storage.get_webhooks_for_url(&record.checked_url).await {
            Ok(callbacks) => callbacks,
            Err(err) => {
                tracing::error!(
                    "Could not look up webhooks for {}: {}",
                    record.checked_url,
                    err
                );
                return;
            }
        };
        if callbacks.is_empty() {
            return;
        }

        let mut deliveries = tokio::task::JoinSet::new();
        for callback_url in callbacks {
            let client = self.client.clone();
            let retry = self.retry.clone();
            let record = record.clone();
            deliveries.spawn(async move { deliver(client, retry, &callback_url, &record).await });
        }
        while deliveries.join_next().await.is_some() {}
    }
}

/// Runs the retry policy for one callback and logs the terminal state.
async fn deliver(client: Client, retry: RetryPolicy, callback_url: &str, record: &UrlRecord) {
    tracing::debug!(
        "Calling webhook {} for checked url {}",
        callback_url,
        record.checked_url
    );
    match retry.run(|| send(&client, callback_url, record)).await {
        RetryOutcome::Delivered { attempts } => {
            tracing::debug!(
                "Successfully called webhook {} (attempt {})",
                callback_url,
                attempts
            );
        }
        RetryOutcome::Exhausted {
            attempts,
            last_error,
        } => {
            tracing::error!(
                "Webhook unreachable after {} attempts: {} - {}",
                attempts,
                callback_url,
                last_error
            );
        }
    }
}

/// POSTs the crawled record to one callback. Non-2xx/3xx answers count as
/// failures alongside transport errors.
async fn send(client: &Client, callback_url: &str, record: &UrlRecord) -> Result<(), DeliveryError> {
    let response = client
        .post(callback_url)
        .json(&serde_json::json!({ "data": record }))
        .send()
        .await?;

    let status = response.status().as_u16();
    if !(200..400).contains(&status) {
        return Err(DeliveryError::Status(status));
    }
    Ok(())
}

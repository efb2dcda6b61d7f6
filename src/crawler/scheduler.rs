//! Periodic re-check scheduling
//!
//! Each cadence runs its own timer loop: every interval the groups queued
//! under that frequency are enumerated and their member URLs re-submitted
//! through the coordinator as bare re-checks (no group or frequency
//! override). Individual failures follow the coordinator's own policy and
//! never abort a sweep.

use crate::crawler::Coordinator;
use crate::storage::{Frequency, Storage};
use std::sync::Arc;
use tokio::task::{JoinHandle, JoinSet};

/// Drives the hourly/daily/monthly re-check sweeps
pub struct Scheduler<S> {
    storage: Arc<S>,
    coordinator: Arc<Coordinator<S>>,
}

impl<S: Storage + 'static> Scheduler<S> {
    pub fn new(storage: Arc<S>, coordinator: Arc<Coordinator<S>>) -> Self {
        Self {
            storage,
            coordinator,
        }
    }

    /// Spawns one timer loop per cadence and returns their handles.
    pub fn spawn(self: Arc<Self>) -> Vec<JoinHandle<()>> {
        Frequency::ALL
            .iter()
            .map(|&frequency| {
                let scheduler = Arc::clone(&self);
                tokio::spawn(async move {
                    loop {
                        tokio::time::sleep(frequency.interval()).await;
                        scheduler.run_due(frequency).await;
                    }
                })
            })
            .collect()
    }

    /// Runs one sweep: re-submits every member URL of every group queued at
    /// the given cadence. Each re-check is its own task; the sweep returns
    /// once all of them finished.
    pub async fn run_due(&self, frequency: Frequency) {
        tracing::info!("Checking {} resources", frequency.as_str());

        let urls = match self.storage.get_frequency_urls(frequency).await {
            Ok(urls) => urls,
            Err(err) => {
                tracing::error!(
                    "Could not enumerate {} groups: {}",
                    frequency.as_str(),
                    err
                );
                return;
            }
        };

        let mut checks = JoinSet::new();
        for url in urls {
            let coordinator = Arc::clone(&self.coordinator);
            checks.spawn(async move {
                if let Err(err) = coordinator.check(&url, None, None).await {
                    tracing::error!("Re-check failed for {}: {}", url, err);
                }
            });
        }
        while let Some(joined) = checks.join_next().await {
            if let Err(err) = joined {
                tracing::error!("Re-check task failed: {}", err);
            }
        }
    }
}

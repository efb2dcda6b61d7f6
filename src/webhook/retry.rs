//! Retry policy for webhook delivery
//!
//! A pure control-flow construct: run an operation up to `max_attempts`
//! times, waiting `base_delay` before the first retry and multiplying the
//! delay by `backoff_factor` after each failure.

use std::future::Future;
use std::time::Duration;

/// Bounded exponential-backoff retry
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    backoff_factor: u32,
}

/// Terminal outcome of a retried operation
#[derive(Debug)]
pub enum RetryOutcome<E> {
    /// The operation succeeded on the recorded attempt
    Delivered { attempts: u32 },
    /// Every attempt failed; the last error is kept for logging
    Exhausted { attempts: u32, last_error: E },
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, backoff_factor: u32) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff_factor,
        }
    }

    /// Runs `operation` until it succeeds or attempts run out.
    pub async fn run<F, Fut, E>(&self, mut operation: F) -> RetryOutcome<E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        let mut delay = self.base_delay;
        let mut attempts = 0;
        loop {
            attempts += 1;
            match operation().await {
                Ok(()) => return RetryOutcome::Delivered { attempts },
                Err(err) => {
                    if attempts >= self.max_attempts {
                        return RetryOutcome::Exhausted {
                            attempts,
                            last_error: err,
                        };
                    }
                    tokio::time::sleep(delay).await;
                    delay *= self.backoff_factor;
                }
            }
        }
    }
}

//! Retry Executor
//!
//! At-least-once retry wrapper for fallible ledger reads. Nodes drop calls
//! at random, so every one-shot read goes through `retry()` with a bounded
//! attempt budget. Background polling uses `RetryOptions::unbounded()`,
//! which keeps going until the read succeeds (or the predicate gives up).
//!
//! Created: 2026-10-19

use crate::error::{Result, WatcherError};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Default delay between attempts
pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 1000;

/// Default attempt budget for one-shot reads
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Inspects a failure and decides whether another attempt is worthwhile.
pub type RetryPredicate = Arc<dyn Fn(&WatcherError) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct RetryOptions {
    pub interval: Duration,
    /// `None` = retry until success
    pub max_attempts: Option<u32>,
    pub retry_if: Option<RetryPredicate>,
}

impl RetryOptions {
    pub fn new(interval_ms: u64, max_attempts: u32) -> Self {
        Self {
            interval: Duration::from_millis(interval_ms),
            max_attempts: Some(max_attempts.max(1)),
            retry_if: None,
        }
    }

    /// Never gives up on its own. Only for background loops.
    pub fn unbounded(interval_ms: u64) -> Self {
        Self {
            interval: Duration::from_millis(interval_ms),
            max_attempts: None,
            retry_if: None,
        }
    }

    pub fn with_predicate(mut self, retry_if: RetryPredicate) -> Self {
        self.retry_if = Some(retry_if);
        self
    }
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_INTERVAL_MS, DEFAULT_MAX_ATTEMPTS)
    }
}

impl std::fmt::Debug for RetryOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryOptions")
            .field("interval", &self.interval)
            .field("max_attempts", &self.max_attempts)
            .field("retry_if", &self.retry_if.is_some())
            .finish()
    }
}

/// Run `operation` until it succeeds or the retry budget runs out.
///
/// Exhausting a bounded budget yields `RetriesExhausted` wrapping the last
/// failure. A predicate rejection surfaces the failure unchanged.
pub async fn retry<T, F, Fut>(options: &RetryOptions, label: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 1;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if let Some(max) = options.max_attempts {
            if attempt >= max {
                return Err(WatcherError::RetriesExhausted {
                    attempts: attempt,
                    source: Box::new(err),
                });
            }
        }

        if let Some(retry_if) = &options.retry_if {
            if !retry_if(&err) {
                return Err(err);
            }
        }

        match options.max_attempts {
            Some(max) => warn!("{} failed (attempt {}/{}): {}, retrying", label, attempt, max, err),
            None => warn!("{} failed (attempt {}): {}, retrying", label, attempt, err),
        }

        tokio::time::sleep(options.interval).await;
        attempt = attempt.saturating_add(1);
    }
}

//! Pool watchers
//!
//! `PoolWatcher` owns one pool: it initialises the static pool description,
//! runs the commitment window scheduler and the log listeners, and
//! publishes everything as `PoolEvent`s. `MultiPoolWatcher` runs one
//! `PoolWatcher` per address and forwards their events tagged with the
//! source pool.
//!
//! Created: 2026-10-19

pub mod multi;
pub mod single;

pub use multi::MultiPoolWatcher;
pub use single::PoolWatcher;

use crate::contracts::{pool_swap_library_address, supported_chain_ids};
use crate::error::{Result, WatcherError};
use crate::events::EventFilter;
use crate::pool::PriceTransformer;
use crate::retry::RetryOptions;
use alloy::primitives::Address;
use std::fmt;

/// Broadcast capacity of each watcher's event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default seconds before window end at which the prediction runs
pub const DEFAULT_COMMITMENT_WINDOW_BUFFER: u64 = 10;

/// Construction parameters shared by single- and multi-pool watchers.
#[derive(Clone)]
pub struct WatcherOptions {
    pub node_url: String,
    pub chain_id: u64,
    pub commitment_window_buffer: u64,
    /// Defaults to the two-point moving average
    pub price_transformer: Option<PriceTransformer>,
    pub ignore_events: EventFilter,
    /// Attempt budget for one-shot reads
    pub retry: RetryOptions,
}

impl WatcherOptions {
    pub fn new(node_url: impl Into<String>, chain_id: u64) -> Self {
        Self {
            node_url: node_url.into(),
            chain_id,
            commitment_window_buffer: DEFAULT_COMMITMENT_WINDOW_BUFFER,
            price_transformer: None,
            ignore_events: EventFilter::default(),
            retry: RetryOptions::default(),
        }
    }

    /// Pool swap library for the configured chain, or `UnsupportedChain`.
    pub fn pool_swap_library(&self) -> Result<Address> {
        pool_swap_library_address(self.chain_id).ok_or_else(|| WatcherError::UnsupportedChain {
            chain_id: self.chain_id,
            supported: supported_chain_ids(),
        })
    }
}

impl fmt::Debug for WatcherOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatcherOptions")
            .field("node_url", &self.node_url)
            .field("chain_id", &self.chain_id)
            .field("commitment_window_buffer", &self.commitment_window_buffer)
            .field("price_transformer", &self.price_transformer.is_some())
            .field("ignore_events", &self.ignore_events)
            .field("retry", &self.retry)
            .finish()
    }
}

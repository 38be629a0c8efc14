//! Leveraged Pool Watcher Library
//!
//! Watches two-sided leveraged pools, predicts the pool state each upkeep
//! will produce from the commitments still pending, and republishes the
//! committer/keeper events as typed `PoolEvent`s.
//!
//! Created: 2026-10-19

pub mod config;
pub mod contracts;
pub mod error;
pub mod events;
pub mod ledger;
pub mod pool;
pub mod retry;
pub mod scheduler;
pub mod types;
pub mod units;
pub mod watcher;

// Re-export commonly used types
pub use config::WatcherConfig;
pub use error::{Result, WatcherError};
pub use events::{EventFilter, EventKind, PoolEvent, TaggedPoolEvent};
pub use ledger::{AlloyPoolLedger, PoolLedger};
pub use pool::SimulationEngine;
pub use retry::{retry, RetryOptions};
pub use types::{PendingCommitmentBatch, PoolSnapshot, PredictedPoolState, WatchedPoolConfig};
pub use watcher::{MultiPoolWatcher, PoolWatcher, WatcherOptions};

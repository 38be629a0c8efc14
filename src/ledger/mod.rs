//! Ledger access seam
//!
//! Everything the watcher needs from the chain goes through `PoolLedger`:
//! one-shot reads, the per-interval commitment fetch, raw log subscriptions
//! and block timestamp lookups. Implementations convert wire integers into
//! decimals so nothing above this layer sees fixed-point values.
//!
//! `AlloyPoolLedger` talks to a node. Tests drive the watcher with
//! `mock::MockLedger`.

pub mod alloy_ledger;
#[cfg(test)]
pub mod mock;

pub use alloy_ledger::AlloyPoolLedger;

use crate::error::Result;
use crate::types::{PendingCommitmentBatch, PoolSnapshot, WatchedPoolConfig};
use alloy::primitives::Address;
use alloy::rpc::types::Log;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::fmt;

/// Raw log stream for one event kind, filtered to the watched pool.
pub type LogStream = BoxStream<'static, Log>;

/// Ledger log kinds the watcher listens to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerLogKind {
    /// `PoolCommitter.CreateCommit`
    CommitCreated,
    /// `PoolKeeper.UpkeepSuccessful` for this pool
    UpkeepSuccessful,
    /// `PoolCommitter.ExecutedCommitsForInterval`
    CommitsExecuted,
}

impl fmt::Display for LedgerLogKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LedgerLogKind::CommitCreated => write!(f, "CreateCommit"),
            LedgerLogKind::UpkeepSuccessful => write!(f, "UpkeepSuccessful"),
            LedgerLogKind::CommitsExecuted => write!(f, "ExecutedCommitsForInterval"),
        }
    }
}

#[async_trait]
pub trait PoolLedger: Send + Sync + 'static {
    /// Read the static pool description (name, intervals, leverage, sub-contracts).
    async fn load_pool(&self, pool_address: Address) -> Result<WatchedPoolConfig>;

    /// Timestamp of the last successful upkeep.
    async fn last_price_timestamp(&self, pool: &WatchedPoolConfig) -> Result<u64>;

    /// Next update interval id scheduled for execution.
    async fn update_interval_id(&self, pool: &WatchedPoolConfig) -> Result<u64>;

    /// Interval id a commit submitted right now would be assigned to.
    async fn appropriate_update_interval_id(&self, pool: &WatchedPoolConfig) -> Result<u64>;

    /// Aggregate pending commitments for one interval.
    async fn fetch_batch(
        &self,
        pool: &WatchedPoolConfig,
        update_interval_id: u64,
    ) -> Result<PendingCommitmentBatch>;

    /// Current balances, supplies and oracle prices.
    async fn snapshot(&self, pool: &WatchedPoolConfig) -> Result<PoolSnapshot>;

    async fn subscribe(&self, pool: &WatchedPoolConfig, kind: LedgerLogKind) -> Result<LogStream>;

    async fn block_timestamp(&self, block_number: u64) -> Result<u64>;
}

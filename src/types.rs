//! Core data structures
//!
//! Static pool configuration, pending commitment batches, pool snapshots and
//! the predicted post-upkeep state.

use alloy::primitives::Address;
use rust_decimal::Decimal;
use std::fmt;

/// Static description of the watched pool.
///
/// Written once by `initialize()`, read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedPoolConfig {
    pub address: Address,
    pub name: String,
    pub settlement_token: Address,
    pub settlement_token_decimals: u8,
    /// Seconds between upkeeps (> 0)
    pub update_interval: u64,
    /// Seconds before upkeep during which new commits roll to a later interval
    pub front_running_interval: u64,
    pub leverage: u32,
    pub committer: Address,
    pub keeper: Address,
    pub long_token: Address,
    pub short_token: Address,
    /// Last upkeep timestamp as of initialization
    pub last_price_timestamp: u64,
}

impl WatchedPoolConfig {
    /// Number of upkeeps that can happen inside one front-running window,
    /// beyond the next one. Zero when the front-running interval is shorter
    /// than the update interval.
    pub fn upkeeps_per_front_running_interval(&self) -> u64 {
        if self.front_running_interval < self.update_interval {
            0
        } else {
            self.front_running_interval / self.update_interval
        }
    }
}

/// Aggregate pending commitments for one update interval.
///
/// Mint amounts are settlement token, burn amounts are pool tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingCommitmentBatch {
    pub update_interval_id: u64,
    pub long_mint_settlement: Decimal,
    pub long_burn_pool_tokens: Decimal,
    pub short_mint_settlement: Decimal,
    pub short_burn_pool_tokens: Decimal,
    /// Short tokens burned, proceeds minted into long
    pub short_burn_long_mint_pool_tokens: Decimal,
    /// Long tokens burned, proceeds minted into short
    pub long_burn_short_mint_pool_tokens: Decimal,
}

impl PendingCommitmentBatch {
    pub fn empty(update_interval_id: u64) -> Self {
        Self {
            update_interval_id,
            ..Default::default()
        }
    }
}

/// Pool balances, supplies and oracle prices read fresh for one prediction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub long_balance: Decimal,
    pub short_balance: Decimal,
    pub long_token_supply: Decimal,
    pub short_token_supply: Decimal,
    pub current_oracle_price: Decimal,
    /// Price used at the last upkeep
    pub last_oracle_price: Decimal,
}

/// Predicted pool state after every relevant pending batch has been applied.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictedPoolState {
    pub timestamp: u64,
    pub current_skew: Decimal,
    pub current_long_balance: Decimal,
    pub current_long_supply: Decimal,
    pub current_short_balance: Decimal,
    pub current_short_supply: Decimal,
    pub expected_skew: Decimal,
    pub expected_long_balance: Decimal,
    pub expected_long_supply: Decimal,
    pub expected_short_balance: Decimal,
    pub expected_short_supply: Decimal,
    pub total_net_pending_long: Decimal,
    pub total_net_pending_short: Decimal,
    pub expected_long_token_price: Decimal,
    pub expected_short_token_price: Decimal,
    pub last_oracle_price: Decimal,
    pub expected_oracle_price: Decimal,
    pub pending_commits: Vec<PendingCommitmentBatch>,
}

/// Long/short value moved by one rebalance step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValueTransfer {
    pub long_value_transfer: Decimal,
    pub short_value_transfer: Decimal,
}

/// Commit kinds as encoded by the pool committer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommitType {
    ShortMint,
    ShortBurn,
    LongMint,
    LongBurn,
    LongBurnShortMint,
    ShortBurnLongMint,
}

impl TryFrom<u8> for CommitType {
    type Error = u8;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(CommitType::ShortMint),
            1 => Ok(CommitType::ShortBurn),
            2 => Ok(CommitType::LongMint),
            3 => Ok(CommitType::LongBurn),
            4 => Ok(CommitType::LongBurnShortMint),
            5 => Ok(CommitType::ShortBurnLongMint),
            other => Err(other),
        }
    }
}

impl fmt::Display for CommitType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CommitType::ShortMint => write!(f, "ShortMint"),
            CommitType::ShortBurn => write!(f, "ShortBurn"),
            CommitType::LongMint => write!(f, "LongMint"),
            CommitType::LongBurn => write!(f, "LongBurn"),
            CommitType::LongBurnShortMint => write!(f, "LongBurnShortMint"),
            CommitType::ShortBurnLongMint => write!(f, "ShortBurnLongMint"),
        }
    }
}

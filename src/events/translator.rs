//! Event Translator
//!
//! Decodes raw committer/keeper logs into `PoolEvent`s. Amounts use the
//! settlement token decimals, prices are WAD. Each event carries its block
//! number, transaction hash and block timestamp (looked up when the node
//! did not include it in the log).

use super::{CommitCreated, CommitsExecuted, EventMeta, PoolEvent, SettlementSucceeded};
use crate::contracts::{IPoolCommitter, IPoolKeeper};
use crate::error::{Result, WatcherError};
use crate::ledger::{LedgerLogKind, PoolLedger};
use crate::retry::{retry, RetryOptions};
use crate::types::{CommitType, WatchedPoolConfig};
use crate::units::{from_fixed_point, from_signed_fixed_point, WAD_DECIMALS};
use alloy::primitives::U256;
use alloy::rpc::types::Log;
use alloy::sol_types::SolEvent;
use std::sync::Arc;

pub struct EventTranslator {
    ledger: Arc<dyn PoolLedger>,
    settlement_token_decimals: u8,
    retry_options: RetryOptions,
}

fn interval_id(value: U256) -> Result<u64> {
    u64::try_from(value).map_err(|_| WatcherError::Decode(format!("interval id {} out of range", value)))
}

impl EventTranslator {
    pub fn new(ledger: Arc<dyn PoolLedger>, pool: &WatchedPoolConfig, retry_options: RetryOptions) -> Self {
        Self {
            ledger,
            settlement_token_decimals: pool.settlement_token_decimals,
            retry_options,
        }
    }

    pub async fn translate(&self, kind: LedgerLogKind, log: &Log) -> Result<PoolEvent> {
        match kind {
            LedgerLogKind::CommitCreated => self.commit_created(log).await.map(PoolEvent::CommitCreated),
            LedgerLogKind::UpkeepSuccessful => self.settlement_succeeded(log).await.map(PoolEvent::Upkeep),
            LedgerLogKind::CommitsExecuted => self.commits_executed(log).await.map(PoolEvent::CommitsExecuted),
        }
    }

    async fn meta(&self, log: &Log) -> Result<EventMeta> {
        let block_number = log
            .block_number
            .ok_or_else(|| WatcherError::Decode("log has no block number (pending?)".to_string()))?;
        let tx_hash = log
            .transaction_hash
            .ok_or_else(|| WatcherError::Decode("log has no transaction hash".to_string()))?;

        let timestamp = match log.block_timestamp {
            Some(timestamp) => timestamp,
            None => {
                retry(&self.retry_options, "getBlock", || {
                    self.ledger.block_timestamp(block_number)
                })
                .await?
            }
        };

        Ok(EventMeta {
            block_number,
            tx_hash,
            timestamp,
        })
    }

    pub async fn commit_created(&self, log: &Log) -> Result<CommitCreated> {
        let event = IPoolCommitter::CreateCommit::decode_log_data(&log.inner.data)
            .map_err(|e| WatcherError::Decode(format!("CreateCommit: {}", e)))?;

        let commit_type = CommitType::try_from(event.commitType)
            .map_err(|raw| WatcherError::Decode(format!("unknown commit type {}", raw)))?;

        Ok(CommitCreated {
            user: event.user,
            amount: from_fixed_point(event.amount, self.settlement_token_decimals)?,
            commit_type,
            appropriate_interval_id: interval_id(event.appropriateUpdateIntervalId)?,
            from_aggregate_balance: event.fromAggregateBalance,
            pay_for_claim: event.payForClaim,
            minting_fee: event.mintingFee,
            settlement_token_decimals: self.settlement_token_decimals,
            meta: self.meta(log).await?,
        })
    }

    pub async fn settlement_succeeded(&self, log: &Log) -> Result<SettlementSucceeded> {
        let event = IPoolKeeper::UpkeepSuccessful::decode_log_data(&log.inner.data)
            .map_err(|e| WatcherError::Decode(format!("UpkeepSuccessful: {}", e)))?;

        Ok(SettlementSucceeded {
            pool: event.pool,
            data: event.data,
            start_price: from_signed_fixed_point(event.startPrice, WAD_DECIMALS)?,
            end_price: from_signed_fixed_point(event.endPrice, WAD_DECIMALS)?,
            meta: self.meta(log).await?,
        })
    }

    pub async fn commits_executed(&self, log: &Log) -> Result<CommitsExecuted> {
        let event = IPoolCommitter::ExecutedCommitsForInterval::decode_log_data(&log.inner.data)
            .map_err(|e| WatcherError::Decode(format!("ExecutedCommitsForInterval: {}", e)))?;

        Ok(CommitsExecuted {
            update_interval_id: interval_id(event.updateIntervalId)?,
            burning_fee: event.burningFee,
            meta: self.meta(log).await?,
        })
    }
}

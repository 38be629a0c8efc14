//! Alloy-backed pool ledger
//!
//! Reads pool, committer, keeper and token state over any alloy provider.
//! WebSocket endpoints get push log subscriptions (`eth_subscribe`); HTTP
//! endpoints fall back to filter polling.
//!
//! Created: 2026-10-19

use super::{LedgerLogKind, LogStream, PoolLedger};
use crate::contracts::{IERC20, ILeveragedPool, IPoolCommitter, IPoolKeeper, IPoolSwapLibrary};
use crate::error::{Result, WatcherError};
use crate::types::{PendingCommitmentBatch, PoolSnapshot, WatchedPoolConfig};
use crate::units::{from_fixed_point, from_signed_fixed_point, WAD_DECIMALS};
use alloy::primitives::{Address, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder, WsConnect};
use alloy::rpc::types::Filter;
use alloy::sol_types::SolEvent;
use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, info};

pub struct AlloyPoolLedger {
    provider: DynProvider,
    pool_swap_library: Address,
    /// true for WebSocket transports
    pubsub: bool,
}

fn to_u64(value: U256, what: &str) -> Result<u64> {
    u64::try_from(value)
        .map_err(|_| WatcherError::Conversion(format!("{} = {} does not fit in u64", what, value)))
}

impl AlloyPoolLedger {
    pub fn new(provider: DynProvider, pool_swap_library: Address, pubsub: bool) -> Self {
        Self {
            provider,
            pool_swap_library,
            pubsub,
        }
    }

    /// Connect by URL. `ws://`/`wss://` get a WebSocket transport, anything
    /// else is treated as HTTP.
    pub async fn connect(node_url: &str, pool_swap_library: Address) -> Result<Self> {
        if node_url.starts_with("ws://") || node_url.starts_with("wss://") {
            let ws = WsConnect::new(node_url);
            let provider = ProviderBuilder::new()
                .connect_ws(ws)
                .await
                .map_err(|e| WatcherError::read("WebSocket connect", e))?;
            info!("Connected to {} via WebSocket", &node_url[..40.min(node_url.len())]);
            Ok(Self::new(provider.erased(), pool_swap_library, true))
        } else {
            let url = node_url
                .parse()
                .map_err(|e| WatcherError::InvalidConfig(format!("invalid node url {}: {}", node_url, e)))?;
            let provider = ProviderBuilder::new().connect_http(url);
            info!(
                "Connected to {} via HTTP (log polling)",
                &node_url[..40.min(node_url.len())]
            );
            Ok(Self::new(provider.erased(), pool_swap_library, false))
        }
    }

    fn log_filter(pool: &WatchedPoolConfig, kind: LedgerLogKind) -> Filter {
        match kind {
            LedgerLogKind::CommitCreated => Filter::new()
                .address(pool.committer)
                .event_signature(IPoolCommitter::CreateCommit::SIGNATURE_HASH),
            LedgerLogKind::CommitsExecuted => Filter::new()
                .address(pool.committer)
                .event_signature(IPoolCommitter::ExecutedCommitsForInterval::SIGNATURE_HASH),
            // keeper serves many pools, narrow to ours via the indexed pool topic
            LedgerLogKind::UpkeepSuccessful => Filter::new()
                .address(pool.keeper)
                .event_signature(IPoolKeeper::UpkeepSuccessful::SIGNATURE_HASH)
                .topic1(pool.address.into_word()),
        }
    }
}

#[async_trait]
impl PoolLedger for AlloyPoolLedger {
    async fn load_pool(&self, pool_address: Address) -> Result<WatchedPoolConfig> {
        let pool = ILeveragedPool::new(pool_address, &self.provider);

        let name_call = pool.poolName();
        let committer_call = pool.poolCommitter();
        let keeper_call = pool.keeper();
        let update_interval_call = pool.updateInterval();
        let leverage_call = pool.leverageAmount();
        let front_running_call = pool.frontRunningInterval();
        let settlement_token_call = pool.settlementToken();
        let long_token_call = pool.tokens(U256::ZERO);
        let short_token_call = pool.tokens(U256::from(1));
        let last_price_timestamp_call = pool.lastPriceTimestamp();

        let (
            name,
            committer,
            keeper,
            update_interval,
            leverage_amount,
            front_running_interval,
            settlement_token,
            long_token,
            short_token,
            last_price_timestamp,
        ) = tokio::join!(
            name_call.call(),
            committer_call.call(),
            keeper_call.call(),
            update_interval_call.call(),
            leverage_call.call(),
            front_running_call.call(),
            settlement_token_call.call(),
            long_token_call.call(),
            short_token_call.call(),
            last_price_timestamp_call.call()
        );

        let name = name.map_err(|e| WatcherError::read("poolName", e))?;
        let committer = committer.map_err(|e| WatcherError::read("poolCommitter", e))?;
        let keeper = keeper.map_err(|e| WatcherError::read("keeper", e))?;
        let update_interval = update_interval.map_err(|e| WatcherError::read("updateInterval", e))?;
        let leverage_amount = leverage_amount.map_err(|e| WatcherError::read("leverageAmount", e))?;
        let front_running_interval =
            front_running_interval.map_err(|e| WatcherError::read("frontRunningInterval", e))?;
        let settlement_token = settlement_token.map_err(|e| WatcherError::read("settlementToken", e))?;
        let long_token = long_token.map_err(|e| WatcherError::read("tokens(0)", e))?;
        let short_token = short_token.map_err(|e| WatcherError::read("tokens(1)", e))?;
        let last_price_timestamp =
            last_price_timestamp.map_err(|e| WatcherError::read("lastPriceTimestamp", e))?;

        // leverage is stored as an ABDK quad float, the swap library converts it
        let library = IPoolSwapLibrary::new(self.pool_swap_library, &self.provider);
        let leverage = library
            .convertDecimalToUInt(leverage_amount)
            .call()
            .await
            .map_err(|e| WatcherError::read("convertDecimalToUInt", e))?;
        let leverage = u32::try_from(leverage)
            .map_err(|_| WatcherError::Conversion(format!("leverage {} does not fit in u32", leverage)))?;

        let settlement_token_decimals = IERC20::new(settlement_token, &self.provider)
            .decimals()
            .call()
            .await
            .map_err(|e| WatcherError::read("settlement token decimals", e))?;

        debug!(
            "Loaded pool {} ({:?}): committer={:?} keeper={:?} leverage={} intervals=({}s, {}s)",
            name, pool_address, committer, keeper, leverage, update_interval, front_running_interval
        );

        Ok(WatchedPoolConfig {
            address: pool_address,
            name,
            settlement_token,
            settlement_token_decimals,
            update_interval: update_interval as u64,
            front_running_interval: front_running_interval as u64,
            leverage,
            committer,
            keeper,
            long_token,
            short_token,
            last_price_timestamp: to_u64(last_price_timestamp, "lastPriceTimestamp")?,
        })
    }

    async fn last_price_timestamp(&self, pool: &WatchedPoolConfig) -> Result<u64> {
        let timestamp = ILeveragedPool::new(pool.address, &self.provider)
            .lastPriceTimestamp()
            .call()
            .await
            .map_err(|e| WatcherError::read("lastPriceTimestamp", e))?;
        to_u64(timestamp, "lastPriceTimestamp")
    }

    async fn update_interval_id(&self, pool: &WatchedPoolConfig) -> Result<u64> {
        let id = IPoolCommitter::new(pool.committer, &self.provider)
            .updateIntervalId()
            .call()
            .await
            .map_err(|e| WatcherError::read("updateIntervalId", e))?;
        to_u64(id, "updateIntervalId")
    }

    async fn appropriate_update_interval_id(&self, pool: &WatchedPoolConfig) -> Result<u64> {
        let id = IPoolCommitter::new(pool.committer, &self.provider)
            .getAppropriateUpdateIntervalId()
            .call()
            .await
            .map_err(|e| WatcherError::read("getAppropriateUpdateIntervalId", e))?;
        to_u64(id, "getAppropriateUpdateIntervalId")
    }

    async fn fetch_batch(
        &self,
        pool: &WatchedPoolConfig,
        update_interval_id: u64,
    ) -> Result<PendingCommitmentBatch> {
        let totals = IPoolCommitter::new(pool.committer, &self.provider)
            .totalPoolCommitments(U256::from(update_interval_id))
            .call()
            .await
            .map_err(|e| WatcherError::read("totalPoolCommitments", e))?;

        let decimals = pool.settlement_token_decimals;
        Ok(PendingCommitmentBatch {
            update_interval_id,
            long_mint_settlement: from_fixed_point(totals.longMintSettlement, decimals)?,
            long_burn_pool_tokens: from_fixed_point(totals.longBurnPoolTokens, decimals)?,
            short_mint_settlement: from_fixed_point(totals.shortMintSettlement, decimals)?,
            short_burn_pool_tokens: from_fixed_point(totals.shortBurnPoolTokens, decimals)?,
            short_burn_long_mint_pool_tokens: from_fixed_point(
                totals.shortBurnLongMintPoolTokens,
                decimals,
            )?,
            long_burn_short_mint_pool_tokens: from_fixed_point(
                totals.longBurnShortMintPoolTokens,
                decimals,
            )?,
        })
    }

    async fn snapshot(&self, pool: &WatchedPoolConfig) -> Result<PoolSnapshot> {
        let pool_contract = ILeveragedPool::new(pool.address, &self.provider);
        let keeper = IPoolKeeper::new(pool.keeper, &self.provider);
        let long_token = IERC20::new(pool.long_token, &self.provider);
        let short_token = IERC20::new(pool.short_token, &self.provider);

        let long_balance_call = pool_contract.longBalance();
        let short_balance_call = pool_contract.shortBalance();
        let oracle_price_call = pool_contract.getOraclePrice();
        let execution_price_call = keeper.executionPrice(pool.address);
        let long_supply_call = long_token.totalSupply();
        let short_supply_call = short_token.totalSupply();

        let (long_balance, short_balance, oracle_price, execution_price, long_supply, short_supply) = tokio::join!(
            long_balance_call.call(),
            short_balance_call.call(),
            oracle_price_call.call(),
            execution_price_call.call(),
            long_supply_call.call(),
            short_supply_call.call()
        );

        let decimals = pool.settlement_token_decimals;
        Ok(PoolSnapshot {
            long_balance: from_fixed_point(
                long_balance.map_err(|e| WatcherError::read("longBalance", e))?,
                decimals,
            )?,
            short_balance: from_fixed_point(
                short_balance.map_err(|e| WatcherError::read("shortBalance", e))?,
                decimals,
            )?,
            long_token_supply: from_fixed_point(
                long_supply.map_err(|e| WatcherError::read("long token totalSupply", e))?,
                decimals,
            )?,
            short_token_supply: from_fixed_point(
                short_supply.map_err(|e| WatcherError::read("short token totalSupply", e))?,
                decimals,
            )?,
            current_oracle_price: from_signed_fixed_point(
                oracle_price.map_err(|e| WatcherError::read("getOraclePrice", e))?,
                WAD_DECIMALS,
            )?,
            last_oracle_price: from_signed_fixed_point(
                execution_price.map_err(|e| WatcherError::read("executionPrice", e))?,
                WAD_DECIMALS,
            )?,
        })
    }

    async fn subscribe(&self, pool: &WatchedPoolConfig, kind: LedgerLogKind) -> Result<LogStream> {
        let filter = Self::log_filter(pool, kind);

        if self.pubsub {
            let subscription = self
                .provider
                .subscribe_logs(&filter)
                .await
                .map_err(|e| WatcherError::read(&format!("subscribe {}", kind), e))?;
            debug!("{} subscription active for pool {:?}", kind, pool.address);
            Ok(subscription.into_stream().boxed())
        } else {
            let poller = self
                .provider
                .watch_logs(&filter)
                .await
                .map_err(|e| WatcherError::read(&format!("watch {}", kind), e))?;
            debug!("{} filter polling active for pool {:?}", kind, pool.address);
            Ok(poller.into_stream().flat_map(futures::stream::iter).boxed())
        }
    }

    async fn block_timestamp(&self, block_number: u64) -> Result<u64> {
        match self.provider.get_block_by_number(block_number.into()).await {
            Ok(Some(block)) => Ok(block.header.timestamp),
            Ok(None) => Err(WatcherError::Read(format!("block {} not found", block_number))),
            Err(e) => Err(WatcherError::read("getBlockByNumber", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> WatchedPoolConfig {
        WatchedPoolConfig {
            address: Address::repeat_byte(0x11),
            name: "3-ETH/USD".to_string(),
            settlement_token: Address::repeat_byte(0x22),
            settlement_token_decimals: 18,
            update_interval: 300,
            front_running_interval: 30,
            leverage: 3,
            committer: Address::repeat_byte(0x33),
            keeper: Address::repeat_byte(0x44),
            long_token: Address::repeat_byte(0x55),
            short_token: Address::repeat_byte(0x66),
            last_price_timestamp: 1_644_496_867,
        }
    }

    #[test]
    fn test_upkeep_filter_targets_keeper_and_pool_topic() {
        let pool = pool();
        let filter = AlloyPoolLedger::log_filter(&pool, LedgerLogKind::UpkeepSuccessful);
        assert!(filter.address.matches(&pool.keeper));
        assert!(!filter.address.matches(&pool.committer));
        assert!(filter.topics[1].matches(&pool.address.into_word()));
    }

    #[test]
    fn test_commit_filter_targets_committer() {
        let pool = pool();
        let filter = AlloyPoolLedger::log_filter(&pool, LedgerLogKind::CommitCreated);
        assert!(filter.address.matches(&pool.committer));
        assert!(filter.topics[0].matches(&IPoolCommitter::CreateCommit::SIGNATURE_HASH));
    }

    #[test]
    fn test_to_u64_rejects_large_values() {
        assert_eq!(to_u64(U256::from(42u64), "x").unwrap(), 42);
        assert!(to_u64(U256::MAX, "x").is_err());
    }
}

//! State Simulation Engine
//!
//! Folds the pending commitment batches over a pool snapshot, one upkeep at
//! a time, to predict balances, supplies and token prices after every
//! relevant settlement has executed.
//!
//! Each step:
//! 1. smooth the oracle price (`price_before` → `price_after`)
//! 2. apply the leveraged rebalance between sides
//! 3. price each side's tokens at `balance / (supply + burned)`
//! 4. settle mints, burns and flips at those prices
//!
//! Created: 2026-10-19

use super::rebalance::{leveraged_value_transfer, moving_average_price_transformer, PriceTransformer, RebalanceFn};
use crate::error::{Result, WatcherError};
use crate::types::{PendingCommitmentBatch, PoolSnapshot, PredictedPoolState};
use rust_decimal::Decimal;
use tracing::debug;

// ── Checked arithmetic ───────────────────────────────────────────────

fn overflow(what: &str, a: Decimal, op: char, b: Decimal) -> WatcherError {
    WatcherError::Overflow(format!("{}: {} {} {}", what, a, op, b))
}

fn add(what: &str, a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_add(b).ok_or_else(|| overflow(what, a, '+', b))
}

fn sub(what: &str, a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_sub(b).ok_or_else(|| overflow(what, a, '-', b))
}

fn mul(what: &str, a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_mul(b).ok_or_else(|| overflow(what, a, '*', b))
}

fn div(what: &str, a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_div(b).ok_or_else(|| overflow(what, a, '/', b))
}

/// Long/short ratio, 1 when either side is empty
pub fn skew(long_balance: Decimal, short_balance: Decimal) -> Result<Decimal> {
    if long_balance.is_zero() || short_balance.is_zero() {
        Ok(Decimal::ONE)
    } else {
        div("skew", long_balance, short_balance)
    }
}

/// Settlement price of one side's tokens. An empty denominator prices the
/// whole side at its balance.
pub fn settlement_price(balance: Decimal, supply: Decimal, burned: Decimal) -> Result<Decimal> {
    let denominator = add("settlement price", supply, burned)?;
    if denominator <= Decimal::ZERO {
        Ok(balance)
    } else {
        div("settlement price", balance, denominator)
    }
}

/// Tokens minted for `value` at `price`. A zero price mints 1:1.
fn tokens_for(value: Decimal, price: Decimal) -> Result<Decimal> {
    if price.is_zero() {
        Ok(value)
    } else {
        div("minted tokens", value, price)
    }
}

#[derive(Clone)]
pub struct SimulationEngine {
    price_transformer: PriceTransformer,
    rebalance: RebalanceFn,
}

impl Default for SimulationEngine {
    fn default() -> Self {
        Self::new(moving_average_price_transformer(), leveraged_value_transfer)
    }
}

impl SimulationEngine {
    pub fn new(price_transformer: PriceTransformer, rebalance: RebalanceFn) -> Self {
        Self {
            price_transformer,
            rebalance,
        }
    }

    pub fn with_price_transformer(price_transformer: PriceTransformer) -> Self {
        Self::new(price_transformer, leveraged_value_transfer)
    }

    /// Predict the pool state after `batches` settle, in ascending interval order.
    ///
    /// Fails with `Overflow` when an intermediate value leaves the decimal
    /// range (e.g. a dust balance against a large supply).
    pub fn simulate(
        &self,
        snapshot: &PoolSnapshot,
        leverage: u32,
        batches: Vec<PendingCommitmentBatch>,
        timestamp: u64,
    ) -> Result<PredictedPoolState> {
        let mut long_balance = snapshot.long_balance;
        let mut short_balance = snapshot.short_balance;
        let mut long_supply = snapshot.long_token_supply;
        let mut short_supply = snapshot.short_token_supply;

        let mut total_net_pending_long = Decimal::ZERO;
        let mut total_net_pending_short = Decimal::ZERO;

        let mut price_after = snapshot.last_oracle_price;

        for batch in &batches {
            let price_before = price_after;
            price_after = (self.price_transformer)(price_before, snapshot.current_oracle_price);

            let transfer = (self.rebalance)(price_before, price_after, leverage, long_balance, short_balance);
            long_balance = add("long rebalance", long_balance, transfer.long_value_transfer)?;
            short_balance = add("short rebalance", short_balance, transfer.short_value_transfer)?;

            let total_long_burn = add(
                "long burn",
                batch.long_burn_pool_tokens,
                batch.long_burn_short_mint_pool_tokens,
            )?;
            let total_short_burn = add(
                "short burn",
                batch.short_burn_pool_tokens,
                batch.short_burn_long_mint_pool_tokens,
            )?;

            let long_price = settlement_price(long_balance, long_supply, total_long_burn)?;
            let short_price = settlement_price(short_balance, short_supply, total_short_burn)?;

            let total_long_mint = add(
                "long mint",
                batch.long_mint_settlement,
                mul("short flip value", batch.short_burn_long_mint_pool_tokens, short_price)?,
            )?;
            let total_short_mint = add(
                "short mint",
                batch.short_mint_settlement,
                mul("long flip value", batch.long_burn_short_mint_pool_tokens, long_price)?,
            )?;

            let net_long = sub(
                "net long",
                total_long_mint,
                mul("long burn value", total_long_burn, long_price)?,
            )?;
            let net_short = sub(
                "net short",
                total_short_mint,
                mul("short burn value", total_short_burn, short_price)?,
            )?;

            total_net_pending_long = add("net pending long", total_net_pending_long, net_long)?;
            total_net_pending_short = add("net pending short", total_net_pending_short, net_short)?;
            long_balance = add("long balance", long_balance, net_long)?;
            short_balance = add("short balance", short_balance, net_short)?;

            long_supply = add(
                "long supply",
                sub("long supply", long_supply, total_long_burn)?,
                tokens_for(total_long_mint, long_price)?,
            )?;
            short_supply = add(
                "short supply",
                sub("short supply", short_supply, total_short_burn)?,
                tokens_for(total_short_mint, short_price)?,
            )?;

            debug!(
                "interval {}: price {} -> {}, long {} @ {}, short {} @ {}",
                batch.update_interval_id,
                price_before,
                price_after,
                long_balance,
                long_price,
                short_balance,
                short_price
            );
        }

        Ok(PredictedPoolState {
            timestamp,
            current_skew: skew(snapshot.long_balance, snapshot.short_balance)?,
            current_long_balance: snapshot.long_balance,
            current_long_supply: snapshot.long_token_supply,
            current_short_balance: snapshot.short_balance,
            current_short_supply: snapshot.short_token_supply,
            expected_skew: skew(long_balance, short_balance)?,
            expected_long_balance: long_balance,
            expected_long_supply: long_supply,
            expected_short_balance: short_balance,
            expected_short_supply: short_supply,
            total_net_pending_long,
            total_net_pending_short,
            expected_long_token_price: settlement_price(long_balance, long_supply, Decimal::ZERO)?,
            expected_short_token_price: settlement_price(short_balance, short_supply, Decimal::ZERO)?,
            last_oracle_price: snapshot.last_oracle_price,
            expected_oracle_price: price_after,
            pending_commits: batches,
        })
    }
}

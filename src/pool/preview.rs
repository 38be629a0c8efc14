//! On-demand state preview: fresh snapshot + relevant batches → simulation.

use super::aggregator::relevant_batches;
use super::simulation::SimulationEngine;
use crate::error::Result;
use crate::ledger::PoolLedger;
use crate::retry::{retry, RetryOptions};
use crate::types::{PredictedPoolState, WatchedPoolConfig};

pub async fn preview_state(
    ledger: &dyn PoolLedger,
    pool: &WatchedPoolConfig,
    engine: &SimulationEngine,
    retry_options: &RetryOptions,
    timestamp: u64,
) -> Result<PredictedPoolState> {
    let (snapshot, batches) = tokio::try_join!(
        retry(retry_options, "pool snapshot", || ledger.snapshot(pool)),
        relevant_batches(ledger, pool, retry_options),
    )?;

    engine.simulate(&snapshot, pool.leverage, batches, timestamp)
}

//! Pending Commitment Aggregator
//!
//! Works out which update intervals can still settle before a commit made
//! now would, and fetches their aggregate commitments. With a front-running
//! interval shorter than the update interval only the next interval
//! matters; otherwise `front_running_interval / update_interval` further
//! upkeeps fit inside one front-running window.

use crate::error::Result;
use crate::ledger::PoolLedger;
use crate::retry::{retry, RetryOptions};
use crate::types::{PendingCommitmentBatch, WatchedPoolConfig};
use futures::future::try_join_all;
use tracing::debug;

/// Interval ids whose commitments settle before a commit made now.
pub fn relevant_interval_ids(pool: &WatchedPoolConfig, next_interval_id: u64) -> Vec<u64> {
    let extra = pool.upkeeps_per_front_running_interval();
    (next_interval_id..=next_interval_id.saturating_add(extra)).collect()
}

/// Fetch every relevant batch, ascending by interval id.
pub async fn relevant_batches(
    ledger: &dyn PoolLedger,
    pool: &WatchedPoolConfig,
    retry_options: &RetryOptions,
) -> Result<Vec<PendingCommitmentBatch>> {
    let next_interval_id = retry(retry_options, "updateIntervalId", || ledger.update_interval_id(pool)).await?;
    let ids = relevant_interval_ids(pool, next_interval_id);

    debug!("{}: fetching pending commits for intervals {:?}", pool.name, ids);

    let fetches = ids.into_iter().map(|id| {
        retry(retry_options, "totalPoolCommitments", move || ledger.fetch_batch(pool, id))
    });

    try_join_all(fetches).await
}

//! Leveraged pool watcher
//!
//! Watches one or more pools, logs commits, upkeeps and executed batches,
//! and logs the predicted pool state shortly before each commitment
//! window closes.
//!
//! Usage:
//!     pool-watcher                         # settings from .env / environment
//!     pool-watcher --config watcher.toml   # settings from TOML (or WATCHER_CONFIG)
//!     RUST_LOG=debug pool-watcher --node-url wss://... --chain-id 421611
//!
//! Created: 2026-10-19

use anyhow::{Context, Result};
use clap::Parser;
use leveraged_pool_watcher::{MultiPoolWatcher, PoolEvent, TaggedPoolEvent, WatcherConfig};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Leveraged pool watcher
#[derive(Parser)]
#[command(name = "pool-watcher")]
struct Args {
    /// TOML config file (otherwise read from the environment)
    #[arg(short, long, env = "WATCHER_CONFIG")]
    config: Option<String>,

    /// Override the configured chain id
    #[arg(long)]
    chain_id: Option<u64>,

    /// Override the configured node URL (ws:// or http://)
    #[arg(long)]
    node_url: Option<String>,
}

fn log_event(tagged: &TaggedPoolEvent) {
    let pool = tagged.pool;
    match &tagged.event {
        PoolEvent::CommitCreated(commit) => info!(
            "[{:?}] COMMIT {} {} by {:?} for interval {} (block {})",
            pool,
            commit.commit_type,
            commit.amount,
            commit.user,
            commit.appropriate_interval_id,
            commit.meta.block_number
        ),
        PoolEvent::Upkeep(upkeep) => info!(
            "[{:?}] UPKEEP price {} -> {} (block {})",
            pool, upkeep.start_price, upkeep.end_price, upkeep.meta.block_number
        ),
        PoolEvent::CommitmentWindowEnding(ending) => {
            let state = &ending.state;
            info!(
                "[{:?}] COMMITMENT_WINDOW_ENDING interval {}: skew {} -> {}, long {} -> {}, short {} -> {}, oracle {} -> {}",
                pool,
                ending.update_interval_id,
                state.current_skew.round_dp(4),
                state.expected_skew.round_dp(4),
                state.current_long_balance.round_dp(4),
                state.expected_long_balance.round_dp(4),
                state.current_short_balance.round_dp(4),
                state.expected_short_balance.round_dp(4),
                state.last_oracle_price.round_dp(4),
                state.expected_oracle_price.round_dp(4)
            );
        }
        PoolEvent::CommitmentWindowEnded { update_interval_id } => info!(
            "[{:?}] COMMITMENT_WINDOW_ENDED interval {}",
            pool, update_interval_id
        ),
        PoolEvent::CommitsExecuted(executed) => info!(
            "[{:?}] COMMITS_EXECUTED interval {} (block {})",
            pool, executed.update_interval_id, executed.meta.block_number
        ),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => WatcherConfig::load_toml(path)?,
        None => WatcherConfig::from_env().context("Failed to load configuration from environment")?,
    };
    if let Some(chain_id) = args.chain_id {
        config.chain_id = chain_id;
    }
    if let Some(node_url) = args.node_url {
        config.node_url = node_url;
    }

    let pools = config.pool_addresses()?;
    let options = config.watcher_options()?;

    info!("Leveraged pool watcher starting (chain_id: {})", config.chain_id);
    info!("Node URL: {}", &config.node_url[..40.min(config.node_url.len())]);
    info!(
        "Pools: {} | commitment window buffer: {}s | price transformer: {:?}",
        pools.len(),
        config.commitment_window_buffer,
        config.price_transformer
    );

    let watcher = MultiPoolWatcher::connect(&pools, &options)
        .await
        .context("Failed to create pool watchers")?;
    let mut events = watcher.subscribe();
    watcher
        .initialize_and_start()
        .await
        .context("Failed to initialise watched pools")?;

    loop {
        tokio::select! {
            received = events.recv() => match received {
                Ok(tagged) => log_event(&tagged),
                Err(RecvError::Lagged(skipped)) => warn!("Event log lagged, {} events skipped", skipped),
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested");
                break;
            }
        }
    }

    watcher.stop();
    info!("Stopped");
    Ok(())
}

//! Pool state prediction
//!
//! Pending commitment aggregation, the per-upkeep simulation fold and the
//! pluggable price/rebalance functions it runs with.
//!
//! Created: 2026-10-19

pub mod aggregator;
pub mod preview;
pub mod rebalance;
pub mod simulation;

pub use aggregator::{relevant_batches, relevant_interval_ids};
pub use preview::preview_state;
pub use rebalance::{
    leveraged_value_transfer, moving_average_price_transformer, spot_price_transformer, PriceTransformer,
    RebalanceFn,
};
pub use simulation::{settlement_price, skew, SimulationEngine};

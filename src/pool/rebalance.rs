//! Oracle price smoothing and leveraged value transfer
//!
//! Pure helpers plugged into the simulation engine. The price transformer
//! emulates the smoothing oracle wrapper in front of the pool; the
//! rebalance formula models the value moved between sides at each upkeep.

use crate::types::ValueTransfer;
use rust_decimal::Decimal;
use std::sync::Arc;

/// `(previous, current) -> smoothed` oracle price
pub type PriceTransformer = Arc<dyn Fn(Decimal, Decimal) -> Decimal + Send + Sync>;

/// `(price_before, price_after, leverage, long_balance, short_balance) -> transfer`
pub type RebalanceFn = fn(Decimal, Decimal, u32, Decimal, Decimal) -> ValueTransfer;

/// Two-point moving average (the default)
pub fn moving_average_price_transformer() -> PriceTransformer {
    Arc::new(|previous: Decimal, current: Decimal| (previous + current) / Decimal::TWO)
}

/// No smoothing: always the current oracle price
pub fn spot_price_transformer() -> PriceTransformer {
    Arc::new(|_previous: Decimal, current: Decimal| current)
}

/// Value moved between sides when the price goes from `price_before` to
/// `price_after`.
///
/// Price up: short loses `short * (1 - (before/after)^leverage)` to long.
/// Price down: long loses `long * (1 - (after/before)^leverage)` to short.
pub fn leveraged_value_transfer(
    price_before: Decimal,
    price_after: Decimal,
    leverage: u32,
    long_balance: Decimal,
    short_balance: Decimal,
) -> ValueTransfer {
    if price_before <= Decimal::ZERO || price_after <= Decimal::ZERO || price_before == price_after {
        return ValueTransfer::default();
    }

    if price_after > price_before {
        let loss = short_balance * loss_multiplier(price_before / price_after, leverage);
        ValueTransfer {
            long_value_transfer: loss,
            short_value_transfer: -loss,
        }
    } else {
        let loss = long_balance * loss_multiplier(price_after / price_before, leverage);
        ValueTransfer {
            long_value_transfer: -loss,
            short_value_transfer: loss,
        }
    }
}

/// `1 - ratio^leverage` for a ratio in (0, 1)
fn loss_multiplier(ratio: Decimal, leverage: u32) -> Decimal {
    let mut power = Decimal::ONE;
    for _ in 0..leverage {
        power *= ratio;
    }
    Decimal::ONE - power
}

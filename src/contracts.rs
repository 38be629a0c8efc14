//! Contract Definitions
//!
//! Perpetual pools contract interfaces, defined using alloy's `sol!` macro.
//! Each interface is annotated with `#[sol(rpc)]` to generate contract
//! instance types that can make RPC calls via any alloy Provider.
//!
//! Return types are widened to `uint256` where the contracts store narrower
//! integers (`uint112` balances, `uint128` interval ids). Selectors depend
//! only on the argument types, and the ABI word layout is identical.

use alloy::primitives::{address, Address};
use alloy::sol;

// ── Leveraged pool ───────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface ILeveragedPool {
        function poolName() external view returns (string);
        function poolCommitter() external view returns (address);
        function keeper() external view returns (address);
        function updateInterval() external view returns (uint32);
        function frontRunningInterval() external view returns (uint32);
        function leverageAmount() external view returns (bytes16);
        function settlementToken() external view returns (address);
        function tokens(uint256 index) external view returns (address);
        function lastPriceTimestamp() external view returns (uint256);
        function longBalance() external view returns (uint256);
        function shortBalance() external view returns (uint256);
        function getOraclePrice() external view returns (int256);
    }
}

// ── Pool committer ───────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IPoolCommitter {
        event CreateCommit(
            address indexed user,
            uint256 indexed amount,
            uint8 indexed commitType,
            uint256 appropriateUpdateIntervalId,
            bool fromAggregateBalance,
            bool payForClaim,
            bytes16 mintingFee
        );

        event ExecutedCommitsForInterval(uint256 indexed updateIntervalId, bytes16 burningFee);

        function updateIntervalId() external view returns (uint256);
        function getAppropriateUpdateIntervalId() external view returns (uint256);
        function totalPoolCommitments(uint256 intervalId) external view returns (
            uint256 longMintSettlement,
            uint256 longBurnPoolTokens,
            uint256 shortMintSettlement,
            uint256 shortBurnPoolTokens,
            uint256 shortBurnLongMintPoolTokens,
            uint256 longBurnShortMintPoolTokens,
            uint256 updateIntervalId
        );
    }
}

// ── Pool keeper ──────────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IPoolKeeper {
        event UpkeepSuccessful(address indexed pool, bytes data, int256 indexed startPrice, int256 indexed endPrice);

        function executionPrice(address pool) external view returns (int256);
    }
}

// ── Pool swap library ────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IPoolSwapLibrary {
        function convertDecimalToUInt(bytes16 value) external pure returns (uint256);
    }
}

// ── ERC20 ─────────────────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function decimals() external view returns (uint8);
        function totalSupply() external view returns (uint256);
    }
}

/// Deployed pool swap library per chain id
pub const POOL_SWAP_LIBRARY_ADDRESSES: [(u64, Address); 1] = [
    (421611, address!("8e761005bAFB81CEde15366158B1F769a411dDfc")), // Arbitrum Rinkeby
];

pub fn pool_swap_library_address(chain_id: u64) -> Option<Address> {
    POOL_SWAP_LIBRARY_ADDRESSES
        .iter()
        .find(|(id, _)| *id == chain_id)
        .map(|(_, addr)| *addr)
}

pub fn supported_chain_ids() -> String {
    POOL_SWAP_LIBRARY_ADDRESSES
        .iter()
        .map(|(id, _)| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

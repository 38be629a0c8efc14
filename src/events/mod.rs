//! Pool events
//!
//! Typed events published by a watcher: decoded ledger logs (commit
//! created, upkeep, commits executed) and the commitment window
//! notifications produced by the scheduler. All of them travel on one
//! `broadcast` channel per watcher as `PoolEvent`.
//!
//! Created: 2026-10-19

pub mod translator;

pub use translator::EventTranslator;

use crate::error::{Result, WatcherError};
use crate::types::{CommitType, PredictedPoolState};
use alloy::primitives::{Address, Bytes, FixedBytes, B256};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

// ── Event kinds ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Commit,
    Upkeep,
    CommitmentWindowEnding,
    CommitmentWindowEnded,
    CommitsExecuted,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::Commit,
        EventKind::Upkeep,
        EventKind::CommitmentWindowEnding,
        EventKind::CommitmentWindowEnded,
        EventKind::CommitsExecuted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Commit => "COMMIT",
            EventKind::Upkeep => "UPKEEP",
            EventKind::CommitmentWindowEnding => "COMMITMENT_WINDOW_ENDING",
            EventKind::CommitmentWindowEnded => "COMMITMENT_WINDOW_ENDED",
            EventKind::CommitsExecuted => "COMMITS_EXECUTED",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = WatcherError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim();
        EventKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| {
                WatcherError::InvalidConfig(format!(
                    "unknown event name {:?}, expected one of {}",
                    name,
                    EventKind::ALL.map(|k| k.as_str()).join(", ")
                ))
            })
    }
}

/// Event kinds a watcher should not publish
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    ignored: HashSet<EventKind>,
}

impl EventFilter {
    pub fn ignore(mut self, kind: EventKind) -> Self {
        self.ignored.insert(kind);
        self
    }

    /// Build from event names such as `"UPKEEP"`. Unknown names are rejected.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let mut filter = EventFilter::default();
        for name in names {
            if name.as_ref().trim().is_empty() {
                continue;
            }
            filter.ignored.insert(name.as_ref().parse()?);
        }
        Ok(filter)
    }

    pub fn is_enabled(&self, kind: EventKind) -> bool {
        !self.ignored.contains(&kind)
    }

    /// Whether the scheduler has anything to publish
    pub fn window_events_enabled(&self) -> bool {
        self.is_enabled(EventKind::CommitmentWindowEnding) || self.is_enabled(EventKind::CommitmentWindowEnded)
    }
}

// ── Payloads ─────────────────────────────────────────────────────────

/// Where a decoded log came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMeta {
    pub block_number: u64,
    pub tx_hash: B256,
    /// Block timestamp (unix seconds)
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommitCreated {
    pub user: Address,
    pub amount: Decimal,
    pub commit_type: CommitType,
    pub appropriate_interval_id: u64,
    pub from_aggregate_balance: bool,
    pub pay_for_claim: bool,
    /// Raw 16-byte quad float
    pub minting_fee: FixedBytes<16>,
    pub settlement_token_decimals: u8,
    pub meta: EventMeta,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SettlementSucceeded {
    pub pool: Address,
    pub data: Bytes,
    pub start_price: Decimal,
    pub end_price: Decimal,
    pub meta: EventMeta,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommitsExecuted {
    pub update_interval_id: u64,
    pub burning_fee: FixedBytes<16>,
    pub meta: EventMeta,
}

/// Predicted state published just before the commitment window closes.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitmentWindowEnding {
    /// Interval the prediction was made for
    pub update_interval_id: u64,
    pub state: PredictedPoolState,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PoolEvent {
    CommitCreated(CommitCreated),
    Upkeep(SettlementSucceeded),
    CommitmentWindowEnding(Box<CommitmentWindowEnding>),
    CommitmentWindowEnded { update_interval_id: u64 },
    CommitsExecuted(CommitsExecuted),
}

impl PoolEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            PoolEvent::CommitCreated(_) => EventKind::Commit,
            PoolEvent::Upkeep(_) => EventKind::Upkeep,
            PoolEvent::CommitmentWindowEnding(_) => EventKind::CommitmentWindowEnding,
            PoolEvent::CommitmentWindowEnded { .. } => EventKind::CommitmentWindowEnded,
            PoolEvent::CommitsExecuted(_) => EventKind::CommitsExecuted,
        }
    }
}

/// Event forwarded by the multi-pool watcher, tagged with its source pool
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedPoolEvent {
    pub pool: Address,
    pub event: PoolEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_parsing() {
        assert_eq!("UPKEEP".parse::<EventKind>().unwrap(), EventKind::Upkeep);
        assert_eq!(
            " commitment_window_ended ".parse::<EventKind>().unwrap(),
            EventKind::CommitmentWindowEnded
        );
        for kind in EventKind::ALL {
            assert_eq!(kind.to_string().parse::<EventKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_event_name_rejected() {
        let err = EventFilter::from_names(&["COMMIT", "SWAP"]).unwrap_err();
        assert!(matches!(err, WatcherError::InvalidConfig(_)));
        assert!(err.to_string().contains("SWAP"));
    }

    #[test]
    fn test_filter() {
        let filter = EventFilter::from_names(&["COMMIT", "", "COMMITMENT_WINDOW_ENDING"]).unwrap();
        assert!(!filter.is_enabled(EventKind::Commit));
        assert!(filter.is_enabled(EventKind::Upkeep));
        assert!(filter.window_events_enabled());

        let filter = filter.ignore(EventKind::CommitmentWindowEnded);
        assert!(!filter.window_events_enabled());
        assert!(EventFilter::default().window_events_enabled());
    }
}

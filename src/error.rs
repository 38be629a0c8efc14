//! Watcher error taxonomy
//!
//! Configuration, lifecycle and ledger-read failures share one enum so that
//! retry predicates and background loops can inspect what went wrong.
//!
//! Created: 2026-10-19

use thiserror::Error;

pub type Result<T> = std::result::Result<T, WatcherError>;

#[derive(Debug, Error)]
pub enum WatcherError {
    /// Chain id has no deployed pool swap library.
    #[error("unsupported chainId: {chain_id}, supported values are [{supported}]")]
    UnsupportedChain { chain_id: u64, supported: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Pool configuration requested before `initialize()` completed.
    #[error("{0}: watched pool not initialised")]
    Uninitialized(&'static str),

    #[error("start_watching: already watching")]
    AlreadyWatching,

    /// A single ledger read failed. Retried by the retry executor.
    #[error("ledger read failed: {0}")]
    Read(String),

    #[error("gave up after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<WatcherError>,
    },

    #[error("failed to decode log: {0}")]
    Decode(String),

    #[error("fixed-point conversion failed: {0}")]
    Conversion(String),

    /// Simulated value left the representable decimal range.
    #[error("simulation overflow: {0}")]
    Overflow(String),
}

impl WatcherError {
    /// Wrap any displayable ledger/transport error as a transient read failure.
    pub fn read(context: &str, err: impl std::fmt::Display) -> Self {
        WatcherError::Read(format!("{}: {}", context, err))
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, WatcherError::Read(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_chain_message_lists_supported_ids() {
        let err = WatcherError::UnsupportedChain {
            chain_id: 1,
            supported: "421611".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "unsupported chainId: 1, supported values are [421611]"
        );
    }

    #[test]
    fn test_exhausted_wraps_last_failure() {
        let err = WatcherError::RetriesExhausted {
            attempts: 3,
            source: Box::new(WatcherError::read("lastPriceTimestamp", "timeout")),
        };
        assert!(err.to_string().contains("3 attempts"));
        assert!(err.to_string().contains("timeout"));
        assert!(!err.is_transient());
    }
}

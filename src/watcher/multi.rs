//! Multi-pool watcher: one `PoolWatcher` per address over a shared ledger,
//! events re-emitted as `TaggedPoolEvent`.

use super::{PoolWatcher, WatcherOptions, EVENT_CHANNEL_CAPACITY};
use crate::error::{Result, WatcherError};
use crate::events::TaggedPoolEvent;
use crate::ledger::{AlloyPoolLedger, PoolLedger};
use crate::scheduler::Clock;
use alloy::primitives::Address;
use futures::future::try_join_all;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinSet;
use tracing::{info, warn};

pub struct MultiPoolWatcher {
    watchers: Vec<Arc<PoolWatcher>>,
    events: broadcast::Sender<TaggedPoolEvent>,
    forwarders: Mutex<JoinSet<()>>,
}

impl MultiPoolWatcher {
    pub async fn connect(pool_addresses: &[Address], options: &WatcherOptions) -> Result<Self> {
        let library = options.pool_swap_library()?;
        let ledger = AlloyPoolLedger::connect(&options.node_url, library).await?;
        Self::with_ledger(pool_addresses, options, Arc::new(ledger))
    }

    pub fn with_ledger(
        pool_addresses: &[Address],
        options: &WatcherOptions,
        ledger: Arc<dyn PoolLedger>,
    ) -> Result<Self> {
        if pool_addresses.is_empty() {
            return Err(WatcherError::InvalidConfig("no pool addresses to watch".to_string()));
        }

        let watchers = pool_addresses
            .iter()
            .map(|address| PoolWatcher::with_ledger(*address, options, Arc::clone(&ledger)).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY * watchers.len());

        Ok(Self {
            watchers,
            events,
            forwarders: Mutex::new(JoinSet::new()),
        })
    }

    /// Replace every watcher's clock. Only valid before `initialize_and_start`.
    pub fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
        let watchers = self
            .watchers
            .into_iter()
            .map(|watcher| match Arc::try_unwrap(watcher) {
                Ok(watcher) => Arc::new(watcher.with_clock(Arc::clone(&clock))),
                Err(shared) => shared,
            })
            .collect();
        Self { watchers, ..self }
    }

    pub fn watchers(&self) -> &[Arc<PoolWatcher>] {
        &self.watchers
    }

    /// Initialise every pool in parallel, then start them all.
    pub async fn initialize_and_start(&self) -> Result<()> {
        try_join_all(self.watchers.iter().map(|watcher| watcher.initialize())).await?;

        let mut forwarders = self.forwarders.lock().unwrap_or_else(PoisonError::into_inner);

        for watcher in &self.watchers {
            // subscribe before starting so nothing is missed
            let mut receiver = watcher.subscribe();
            watcher.start()?;

            let pool = watcher.pool_address();
            let events = self.events.clone();
            forwarders.spawn(async move {
                loop {
                    match receiver.recv().await {
                        Ok(event) => {
                            let _ = events.send(TaggedPoolEvent { pool, event });
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("{:?}: forwarder lagged, {} events skipped", pool, skipped);
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            });
        }

        info!("Watching {} pools", self.watchers.len());
        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaggedPoolEvent> {
        self.events.subscribe()
    }

    pub fn stop(&self) {
        for watcher in &self.watchers {
            watcher.stop();
        }
        self.forwarders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .abort_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::IPoolCommitter;
    use crate::events::{EventFilter, PoolEvent};
    use crate::ledger::mock::{mined_log, sample_pool, MockLedger};
    use crate::ledger::LedgerLogKind;
    use crate::retry::RetryOptions;
    use crate::scheduler::clock::TestClock;
    use alloy::primitives::{FixedBytes, U256};
    use alloy::sol_types::SolEvent;
    use std::collections::HashSet;
    use std::time::Duration;
    use tokio::time::timeout;

    fn options() -> WatcherOptions {
        WatcherOptions {
            retry: RetryOptions::new(10, 3),
            ignore_events: EventFilter::from_names(&["COMMITMENT_WINDOW_ENDING", "COMMITMENT_WINDOW_ENDED"])
                .unwrap(),
            ..WatcherOptions::new("ws://localhost:8546", 421611)
        }
    }

    #[test]
    fn test_requires_addresses() {
        let ledger = Arc::new(MockLedger::new(sample_pool()));
        let err = MultiPoolWatcher::with_ledger(&[], &options(), ledger).err().unwrap();
        assert!(matches!(err, WatcherError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_initializes_every_pool() {
        let ledger = Arc::new(MockLedger::new(sample_pool()));
        let addresses = [Address::repeat_byte(0x10), Address::repeat_byte(0x20)];
        let multi = MultiPoolWatcher::with_ledger(&addresses, &options(), ledger)
            .unwrap()
            .with_clock(Arc::new(TestClock::starting_at(0)));

        multi.initialize_and_start().await.unwrap();

        for (watcher, address) in multi.watchers().iter().zip(addresses) {
            assert_eq!(watcher.pool().unwrap().address, address);
            assert!(watcher.is_watching());
        }
        multi.stop();
    }

    #[tokio::test]
    async fn test_poisoned_forwarder_set_is_recovered() {
        let ledger = Arc::new(MockLedger::new(sample_pool()));
        let multi = MultiPoolWatcher::with_ledger(&[Address::repeat_byte(0x10)], &options(), ledger).unwrap();

        let poisoned = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = multi.forwarders.lock().unwrap();
            panic!("forwarder set holder panicked");
        }));
        assert!(poisoned.is_err());

        multi.initialize_and_start().await.unwrap();
        assert!(multi.watchers()[0].is_watching());
        multi.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_are_tagged_with_their_pool() {
        let ledger = Arc::new(MockLedger::new(sample_pool()));
        let addresses = [Address::repeat_byte(0x10), Address::repeat_byte(0x20)];
        let multi = MultiPoolWatcher::with_ledger(&addresses, &options(), ledger.clone()).unwrap();
        let mut events = multi.subscribe();
        multi.initialize_and_start().await.unwrap();

        // both pools share the mock committer, so one log reaches both watchers
        while ledger.subscriber_count(LedgerLogKind::CommitCreated) < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let data = IPoolCommitter::CreateCommit {
            user: Address::repeat_byte(0x42),
            amount: U256::from(1u64),
            commitType: 3,
            appropriateUpdateIntervalId: U256::from(1u64),
            fromAggregateBalance: false,
            payForClaim: false,
            mintingFee: FixedBytes::ZERO,
        }
        .encode_log_data();
        ledger.emit(
            LedgerLogKind::CommitCreated,
            mined_log(sample_pool().committer, data, 5),
        );

        let mut pools = HashSet::new();
        for _ in 0..2 {
            let tagged = timeout(Duration::from_secs(1), events.recv()).await.unwrap().unwrap();
            assert!(matches!(tagged.event, PoolEvent::CommitCreated(_)));
            pools.insert(tagged.pool);
        }
        assert_eq!(pools, addresses.into_iter().collect());
        multi.stop();
    }
}

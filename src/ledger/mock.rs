//! Scripted in-memory ledger for tests

use super::{LedgerLogKind, LogStream, PoolLedger};
use crate::error::{Result, WatcherError};
use crate::types::{PendingCommitmentBatch, PoolSnapshot, WatchedPoolConfig};
use alloy::primitives::{Address, LogData, B256};
use alloy::rpc::types::Log;
use async_trait::async_trait;
use futures::StreamExt;
use rust_decimal_macros::dec;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

/// Block timestamps are `BLOCK_TIME_BASE + block_number`
pub const BLOCK_TIME_BASE: u64 = 1_644_000_000;

pub struct MockLedger {
    pub pool: WatchedPoolConfig,
    pub snapshot: Mutex<PoolSnapshot>,
    pub batches: Mutex<HashMap<u64, PendingCommitmentBatch>>,
    pub update_interval_id: AtomicU64,
    pub last_price_timestamp: AtomicU64,
    /// Served front to back, the last value repeats
    appropriate_ids: Mutex<VecDeque<u64>>,
    /// Fail this many upcoming reads of any kind
    pub failures_remaining: AtomicU32,
    pub snapshot_calls: AtomicU32,
    pub appropriate_id_calls: AtomicU32,
    pub fetched_ids: Mutex<Vec<u64>>,
    logs: Mutex<HashMap<LedgerLogKind, broadcast::Sender<Log>>>,
}

impl MockLedger {
    pub fn new(pool: WatchedPoolConfig) -> Self {
        Self {
            last_price_timestamp: AtomicU64::new(pool.last_price_timestamp),
            pool,
            snapshot: Mutex::new(sample_snapshot()),
            batches: Mutex::new(HashMap::new()),
            update_interval_id: AtomicU64::new(1),
            appropriate_ids: Mutex::new(VecDeque::from([1])),
            failures_remaining: AtomicU32::new(0),
            snapshot_calls: AtomicU32::new(0),
            appropriate_id_calls: AtomicU32::new(0),
            fetched_ids: Mutex::new(Vec::new()),
            logs: Mutex::new(HashMap::new()),
        }
    }

    pub fn script_appropriate_ids(&self, ids: &[u64]) {
        let mut queue = self.appropriate_ids.lock().unwrap();
        queue.clear();
        queue.extend(ids.iter().copied());
    }

    pub fn insert_batch(&self, batch: PendingCommitmentBatch) {
        self.batches
            .lock()
            .unwrap()
            .insert(batch.update_interval_id, batch);
    }

    pub fn fetched(&self) -> Vec<u64> {
        let mut ids = self.fetched_ids.lock().unwrap().clone();
        ids.sort_unstable();
        ids
    }

    fn sender(&self, kind: LedgerLogKind) -> broadcast::Sender<Log> {
        self.logs
            .lock()
            .unwrap()
            .entry(kind)
            .or_insert_with(|| broadcast::channel(64).0)
            .clone()
    }

    /// Push a raw log to every open subscription of `kind`.
    pub fn emit(&self, kind: LedgerLogKind, log: Log) {
        let _ = self.sender(kind).send(log);
    }

    pub fn subscriber_count(&self, kind: LedgerLogKind) -> usize {
        self.sender(kind).receiver_count()
    }

    /// Wait (in paused test time) until a listener has subscribed to `kind`.
    pub async fn wait_for_subscriber(&self, kind: LedgerLogKind) {
        while self.subscriber_count(kind) == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    fn maybe_fail(&self, what: &str) -> Result<()> {
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(WatcherError::read(what, "scripted failure"));
        }
        Ok(())
    }
}

/// Wrap encoded event data as a mined log
pub fn mined_log(emitter: Address, data: LogData, block_number: u64) -> Log {
    Log {
        inner: alloy::primitives::Log { address: emitter, data },
        block_number: Some(block_number),
        transaction_hash: Some(B256::repeat_byte(0x77)),
        ..Default::default()
    }
}

pub fn sample_pool() -> WatchedPoolConfig {
    WatchedPoolConfig {
        address: Address::repeat_byte(0xaa),
        name: "3-ETH/USD".to_string(),
        settlement_token: Address::repeat_byte(0x01),
        settlement_token_decimals: 18,
        update_interval: 300,
        front_running_interval: 30,
        leverage: 3,
        committer: Address::repeat_byte(0x02),
        keeper: Address::repeat_byte(0x03),
        long_token: Address::repeat_byte(0x04),
        short_token: Address::repeat_byte(0x05),
        last_price_timestamp: 0,
    }
}

pub fn sample_snapshot() -> PoolSnapshot {
    PoolSnapshot {
        long_balance: dec!(120000),
        short_balance: dec!(100000),
        long_token_supply: dec!(90000),
        short_token_supply: dec!(80000),
        current_oracle_price: dec!(110000),
        last_oracle_price: dec!(100000),
    }
}

#[async_trait]
impl PoolLedger for MockLedger {
    async fn load_pool(&self, pool_address: Address) -> Result<WatchedPoolConfig> {
        self.maybe_fail("load_pool")?;
        Ok(WatchedPoolConfig {
            address: pool_address,
            last_price_timestamp: self.last_price_timestamp.load(Ordering::SeqCst),
            ..self.pool.clone()
        })
    }

    async fn last_price_timestamp(&self, _pool: &WatchedPoolConfig) -> Result<u64> {
        self.maybe_fail("last_price_timestamp")?;
        Ok(self.last_price_timestamp.load(Ordering::SeqCst))
    }

    async fn update_interval_id(&self, _pool: &WatchedPoolConfig) -> Result<u64> {
        self.maybe_fail("update_interval_id")?;
        Ok(self.update_interval_id.load(Ordering::SeqCst))
    }

    async fn appropriate_update_interval_id(&self, _pool: &WatchedPoolConfig) -> Result<u64> {
        self.maybe_fail("appropriate_update_interval_id")?;
        self.appropriate_id_calls.fetch_add(1, Ordering::SeqCst);
        let mut queue = self.appropriate_ids.lock().unwrap();
        let id = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().copied()
        };
        Ok(id.unwrap_or(1))
    }

    async fn fetch_batch(
        &self,
        _pool: &WatchedPoolConfig,
        update_interval_id: u64,
    ) -> Result<PendingCommitmentBatch> {
        self.maybe_fail("fetch_batch")?;
        self.fetched_ids.lock().unwrap().push(update_interval_id);
        Ok(self
            .batches
            .lock()
            .unwrap()
            .get(&update_interval_id)
            .cloned()
            .unwrap_or_else(|| PendingCommitmentBatch::empty(update_interval_id)))
    }

    async fn snapshot(&self, _pool: &WatchedPoolConfig) -> Result<PoolSnapshot> {
        self.maybe_fail("snapshot")?;
        self.snapshot_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.snapshot.lock().unwrap().clone())
    }

    async fn subscribe(&self, _pool: &WatchedPoolConfig, kind: LedgerLogKind) -> Result<LogStream> {
        let rx = self.sender(kind).subscribe();
        Ok(BroadcastStream::new(rx)
            .filter_map(|item| async move { item.ok() })
            .boxed())
    }

    async fn block_timestamp(&self, block_number: u64) -> Result<u64> {
        Ok(BLOCK_TIME_BASE + block_number)
    }
}

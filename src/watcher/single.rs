//! Single-pool watcher

use super::{WatcherOptions, EVENT_CHANNEL_CAPACITY};
use crate::error::{Result, WatcherError};
use crate::events::{EventFilter, EventKind, EventTranslator, PoolEvent};
use crate::ledger::{AlloyPoolLedger, LedgerLogKind, PoolLedger};
use crate::pool::{preview_state, relevant_batches, SimulationEngine};
use crate::retry::{retry, RetryOptions};
use crate::scheduler::{
    commitment_window_open, Clock, CommitmentWindowScheduler, SchedulerSettings, SystemClock,
};
use crate::types::{PendingCommitmentBatch, PredictedPoolState, WatchedPoolConfig};
use alloy::primitives::Address;
use futures::stream::{Stream, StreamExt};
use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, error, info, warn};

pub struct PoolWatcher {
    pool_address: Address,
    ledger: Arc<dyn PoolLedger>,
    engine: SimulationEngine,
    commitment_window_buffer: u64,
    ignore_events: EventFilter,
    retry_options: RetryOptions,
    clock: Arc<dyn Clock>,
    pool: OnceCell<WatchedPoolConfig>,
    events: broadcast::Sender<PoolEvent>,
    watching: AtomicBool,
    tasks: Mutex<JoinSet<()>>,
}

impl PoolWatcher {
    /// Validate the chain id, then connect to `options.node_url`.
    pub async fn connect(pool_address: Address, options: &WatcherOptions) -> Result<Self> {
        let library = options.pool_swap_library()?;
        let ledger = AlloyPoolLedger::connect(&options.node_url, library).await?;
        Self::with_ledger(pool_address, options, Arc::new(ledger))
    }

    /// Build on an existing ledger connection.
    pub fn with_ledger(
        pool_address: Address,
        options: &WatcherOptions,
        ledger: Arc<dyn PoolLedger>,
    ) -> Result<Self> {
        options.pool_swap_library()?;

        let engine = match &options.price_transformer {
            Some(transformer) => SimulationEngine::with_price_transformer(transformer.clone()),
            None => SimulationEngine::default(),
        };
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            pool_address,
            ledger,
            engine,
            commitment_window_buffer: options.commitment_window_buffer,
            ignore_events: options.ignore_events.clone(),
            retry_options: options.retry.clone(),
            clock: Arc::new(SystemClock),
            pool: OnceCell::new(),
            events,
            watching: AtomicBool::new(false),
            tasks: Mutex::new(JoinSet::new()),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn pool_address(&self) -> Address {
        self.pool_address
    }

    /// Static pool description, or `Uninitialized` before `initialize()`.
    pub fn pool(&self) -> Result<&WatchedPoolConfig> {
        self.pool.get().ok_or(WatcherError::Uninitialized("pool"))
    }

    /// Read and store the pool description. Later calls return the stored value.
    pub async fn initialize(&self) -> Result<&WatchedPoolConfig> {
        if let Some(pool) = self.pool.get() {
            return Ok(pool);
        }

        let config = retry(&self.retry_options, "load pool", || {
            self.ledger.load_pool(self.pool_address)
        })
        .await?;

        if config.update_interval == 0 {
            return Err(WatcherError::InvalidConfig(format!(
                "pool {:?} reports an update interval of 0",
                self.pool_address
            )));
        }

        info!(
            "Watching {} ({:?}): leverage {}x, update interval {}s, front-running interval {}s",
            config.name,
            config.address,
            config.leverage,
            config.update_interval,
            config.front_running_interval
        );

        Ok(self.pool.get_or_init(|| config))
    }

    /// Pending commitment batches that settle before a commit made now.
    pub async fn relevant_batches(&self) -> Result<Vec<PendingCommitmentBatch>> {
        let pool = self.pool.get().ok_or(WatcherError::Uninitialized("relevant_batches"))?;
        relevant_batches(self.ledger.as_ref(), pool, &self.retry_options).await
    }

    /// Predict the pool state once every relevant pending batch has settled.
    pub async fn predict_state(&self) -> Result<PredictedPoolState> {
        let pool = self.pool.get().ok_or(WatcherError::Uninitialized("predict_state"))?;
        preview_state(
            self.ledger.as_ref(),
            pool,
            &self.engine,
            &self.retry_options,
            self.clock.now_unix(),
        )
        .await
    }

    pub async fn is_commitment_window_still_open(&self, update_interval_id: u64) -> Result<bool> {
        let pool = self
            .pool
            .get()
            .ok_or(WatcherError::Uninitialized("is_commitment_window_still_open"))?;
        commitment_window_open(self.ledger.as_ref(), pool, &self.retry_options, update_interval_id).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PoolEvent> {
        self.events.subscribe()
    }

    /// Events as a stream. Lagged receivers skip what they missed.
    pub fn event_stream(&self) -> impl Stream<Item = PoolEvent> + Send + 'static {
        BroadcastStream::new(self.events.subscribe()).filter_map(|item| async move { item.ok() })
    }

    pub fn is_watching(&self) -> bool {
        self.watching.load(Ordering::SeqCst)
    }

    /// Spawn the scheduler and the enabled log listeners.
    ///
    /// Requires `initialize()`. A watcher starts at most once, stopping
    /// does not make it startable again.
    pub fn start(&self) -> Result<()> {
        let pool = self.pool.get().ok_or(WatcherError::Uninitialized("start_watching"))?;

        if self.watching.swap(true, Ordering::SeqCst) {
            return Err(WatcherError::AlreadyWatching);
        }

        let translator = Arc::new(EventTranslator::new(
            Arc::clone(&self.ledger),
            pool,
            self.retry_options.clone(),
        ));
        let resubscribe = RetryOptions::unbounded(self.retry_options.interval.as_millis() as u64);
        let schedule_windows = self.ignore_events.window_events_enabled();
        let (settlements, _) = broadcast::channel::<u64>(16);

        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);

        if schedule_windows {
            let scheduler = CommitmentWindowScheduler::new(
                Arc::clone(&self.ledger),
                pool.clone(),
                self.engine.clone(),
                SchedulerSettings {
                    commitment_window_buffer: self.commitment_window_buffer,
                    events: self.ignore_events.clone(),
                    read_retry: self.retry_options.clone(),
                    poll_retry: resubscribe.clone(),
                },
                Arc::clone(&self.clock),
                self.events.clone(),
                settlements.clone(),
            );
            tasks.spawn(scheduler.run());
        }

        let listeners = [
            (LedgerLogKind::CommitCreated, EventKind::Commit),
            (LedgerLogKind::UpkeepSuccessful, EventKind::Upkeep),
            (LedgerLogKind::CommitsExecuted, EventKind::CommitsExecuted),
        ];

        for (log_kind, event_kind) in listeners {
            let publish = self.ignore_events.is_enabled(event_kind);
            // upkeeps also drive the scheduler
            let signal = match log_kind {
                LedgerLogKind::UpkeepSuccessful if schedule_windows => Some(settlements.clone()),
                _ => None,
            };
            if !publish && signal.is_none() {
                debug!("{}: {} events ignored", pool.name, event_kind);
                continue;
            }

            tasks.spawn(run_listener(LogListener {
                ledger: Arc::clone(&self.ledger),
                pool: pool.clone(),
                kind: log_kind,
                translator: Arc::clone(&translator),
                publish: publish.then(|| self.events.clone()),
                settlements: signal,
                resubscribe: resubscribe.clone(),
            }));
        }

        info!("{}: watching started ({} tasks)", pool.name, tasks.len());
        Ok(())
    }

    /// Abort the scheduler and every listener.
    pub fn stop(&self) {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        if !tasks.is_empty() {
            info!("{:?}: stopping {} watcher tasks", self.pool_address, tasks.len());
        }
        tasks.abort_all();
    }
}

// ── Log listeners ────────────────────────────────────────────────────

struct LogListener {
    ledger: Arc<dyn PoolLedger>,
    pool: WatchedPoolConfig,
    kind: LedgerLogKind,
    translator: Arc<EventTranslator>,
    /// Present when the decoded event should be published
    publish: Option<broadcast::Sender<PoolEvent>>,
    /// Present on the upkeep listener when the scheduler runs
    settlements: Option<broadcast::Sender<u64>>,
    resubscribe: RetryOptions,
}

async fn run_listener(listener: LogListener) {
    let LogListener {
        ledger,
        pool,
        kind,
        translator,
        publish,
        settlements,
        resubscribe,
    } = listener;
    let label = format!("subscribe {}", kind);

    loop {
        let mut logs = match retry(&resubscribe, &label, || ledger.subscribe(&pool, kind)).await {
            Ok(logs) => logs,
            Err(e) => {
                error!("{}: giving up on {} logs: {}", pool.name, kind, e);
                return;
            }
        };
        info!("{}: listening for {} logs", pool.name, kind);

        while let Some(log) = logs.next().await {
            if log.removed {
                debug!("{}: skipping removed {} log", pool.name, kind);
                continue;
            }

            if let Some(settlements) = &settlements {
                let _ = settlements.send(log.block_number.unwrap_or_default());
            }

            let Some(events) = &publish else {
                continue;
            };

            match translator.translate(kind, &log).await {
                Ok(event) => {
                    if events.send(event).is_err() {
                        debug!("{}: no event subscribers", pool.name);
                    }
                }
                Err(e) => warn!("{}: dropping {} log: {}", pool.name, kind, e),
            }
        }

        warn!("{}: {} log stream ended, resubscribing", pool.name, kind);
    }
}

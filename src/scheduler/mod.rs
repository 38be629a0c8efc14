//! Commitment Window Scheduler
//!
//! Decides when to run the state prediction for a pool and publishes the
//! commitment window notifications. One cycle per upkeep:
//!
//! 1. read the last upkeep timestamp and the interval id a commit made now
//!    would land in
//! 2. window end = last upkeep + update interval (- front-running interval
//!    when that is shorter), arm time = window end - buffer
//! 3. arm time already passed: publish ENDED (now, or at window end) and
//!    skip the prediction
//! 4. otherwise sleep until arm time, schedule ENDED one buffer later,
//!    predict, and publish ENDING only if the interval id is unchanged
//!    both before and after the prediction
//! 5. wait for the next upkeep and start over
//!
//! The pending ENDED deadline is raced against every wait, so the whole
//! cycle lives in one task and aborting it cancels everything.
//!
//! Created: 2026-10-19

pub mod clock;

pub use clock::{Clock, SystemClock};

use crate::error::Result;
use crate::events::{CommitmentWindowEnding, EventFilter, EventKind, PoolEvent};
use crate::ledger::PoolLedger;
use crate::pool::{preview_state, SimulationEngine};
use crate::retry::{retry, RetryOptions};
use crate::types::{PredictedPoolState, WatchedPoolConfig};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info};

// ── Window arithmetic ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPlan {
    /// Last moment (unix seconds) a commit lands in the current interval
    pub window_end: u64,
    /// When to start the prediction
    pub arm_at: u64,
}

pub fn plan_window(pool: &WatchedPoolConfig, last_price_timestamp: u64, buffer_secs: u64) -> WindowPlan {
    let window_end = if pool.front_running_interval < pool.update_interval {
        last_price_timestamp + pool.update_interval - pool.front_running_interval
    } else {
        last_price_timestamp + pool.update_interval
    };

    WindowPlan {
        window_end,
        arm_at: window_end.saturating_sub(buffer_secs),
    }
}

/// True while commits still land in `update_interval_id`.
pub async fn commitment_window_open(
    ledger: &dyn PoolLedger,
    pool: &WatchedPoolConfig,
    retry_options: &RetryOptions,
    update_interval_id: u64,
) -> Result<bool> {
    let current = retry(retry_options, "getAppropriateUpdateIntervalId", || {
        ledger.appropriate_update_interval_id(pool)
    })
    .await?;
    Ok(current == update_interval_id)
}

// ── State machine ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    IdleWaitingForWindow,
    Armed { fire_at: Instant, update_interval_id: u64 },
    Computing { update_interval_id: u64 },
    WaitingForSettlementEvent,
}

#[derive(Debug, Clone, Copy)]
struct PendingEnded {
    at: Instant,
    update_interval_id: u64,
}

async fn ended_deadline(pending: Option<PendingEnded>) -> u64 {
    match pending {
        Some(pending) => {
            sleep_until(pending.at).await;
            pending.update_interval_id
        }
        None => std::future::pending().await,
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Seconds before window end at which the prediction runs
    pub commitment_window_buffer: u64,
    pub events: EventFilter,
    /// Bounded retry for the prediction reads
    pub read_retry: RetryOptions,
    /// Unbounded retry for the per-cycle window reads
    pub poll_retry: RetryOptions,
}

pub struct CommitmentWindowScheduler {
    ledger: Arc<dyn PoolLedger>,
    pool: WatchedPoolConfig,
    engine: SimulationEngine,
    settings: SchedulerSettings,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<PoolEvent>,
    /// Block numbers of successful upkeeps for this pool
    settlements: broadcast::Sender<u64>,
}

impl CommitmentWindowScheduler {
    pub fn new(
        ledger: Arc<dyn PoolLedger>,
        pool: WatchedPoolConfig,
        engine: SimulationEngine,
        settings: SchedulerSettings,
        clock: Arc<dyn Clock>,
        events: broadcast::Sender<PoolEvent>,
        settlements: broadcast::Sender<u64>,
    ) -> Self {
        Self {
            ledger,
            pool,
            engine,
            settings,
            clock,
            events,
            settlements,
        }
    }

    /// Run cycles until the task is aborted.
    pub async fn run(self) {
        info!(
            "{}: commitment window scheduler started (buffer {}s)",
            self.pool.name, self.settings.commitment_window_buffer
        );

        let mut state = SchedulerState::IdleWaitingForWindow;
        let mut ended: Option<PendingEnded> = None;

        loop {
            let next = match state {
                SchedulerState::IdleWaitingForWindow => self.plan_cycle(&mut ended).await,
                SchedulerState::Armed {
                    fire_at,
                    update_interval_id,
                } => self.on_armed(&mut ended, fire_at, update_interval_id).await,
                SchedulerState::Computing { update_interval_id } => {
                    self.on_computing(&mut ended, update_interval_id).await
                }
                SchedulerState::WaitingForSettlementEvent => self.on_waiting(&mut ended).await,
            };
            debug!("{}: {:?} -> {:?}", self.pool.name, state, next);
            state = next;
        }
    }

    async fn plan_cycle(&self, ended: &mut Option<PendingEnded>) -> SchedulerState {
        let poll = &self.settings.poll_retry;
        let reads = async {
            tokio::try_join!(
                retry(poll, "lastPriceTimestamp", || self.ledger.last_price_timestamp(&self.pool)),
                retry(poll, "getAppropriateUpdateIntervalId", || {
                    self.ledger.appropriate_update_interval_id(&self.pool)
                }),
            )
        };

        let (last_price_timestamp, update_interval_id) = match self.with_ended_timer(ended, reads).await {
            Ok(values) => values,
            Err(e) => {
                error!("{}: failed to read commitment window inputs: {}", self.pool.name, e);
                return SchedulerState::WaitingForSettlementEvent;
            }
        };

        let plan = plan_window(&self.pool, last_price_timestamp, self.settings.commitment_window_buffer);
        let now = self.clock.now_unix();

        if now > plan.arm_at {
            debug!(
                "{}: too late to predict interval {} (now {}, arm time {})",
                self.pool.name, update_interval_id, now, plan.arm_at
            );
            if self.settings.events.is_enabled(EventKind::CommitmentWindowEnded) {
                if now > plan.window_end {
                    // commits already roll into the next interval, so the
                    // window that closed is the previous one
                    self.publish_ended(update_interval_id.saturating_sub(1));
                } else {
                    self.schedule_ended(ended, plan.window_end - now, update_interval_id);
                }
            }
            return SchedulerState::WaitingForSettlementEvent;
        }

        let delay = plan.arm_at - now;
        debug!(
            "{}: interval {} window ends at {}, predicting in {}s",
            self.pool.name, update_interval_id, plan.window_end, delay
        );
        SchedulerState::Armed {
            fire_at: Instant::now() + Duration::from_secs(delay),
            update_interval_id,
        }
    }

    async fn on_armed(
        &self,
        ended: &mut Option<PendingEnded>,
        fire_at: Instant,
        update_interval_id: u64,
    ) -> SchedulerState {
        self.with_ended_timer(ended, sleep_until(fire_at)).await;

        if self.settings.events.is_enabled(EventKind::CommitmentWindowEnded) {
            self.schedule_ended(ended, self.settings.commitment_window_buffer, update_interval_id);
        }

        if self.settings.events.is_enabled(EventKind::CommitmentWindowEnding) {
            SchedulerState::Computing { update_interval_id }
        } else {
            SchedulerState::WaitingForSettlementEvent
        }
    }

    async fn on_computing(&self, ended: &mut Option<PendingEnded>, update_interval_id: u64) -> SchedulerState {
        match self.with_ended_timer(ended, self.predict_if_open(update_interval_id)).await {
            Ok(Some(state)) => {
                info!(
                    "{}: commitment window ending for interval {} (expected skew {})",
                    self.pool.name, update_interval_id, state.expected_skew
                );
                self.publish(PoolEvent::CommitmentWindowEnding(Box::new(CommitmentWindowEnding {
                    update_interval_id,
                    state,
                })));
            }
            Ok(None) => {
                info!(
                    "{}: interval {} closed before the prediction was ready, not publishing",
                    self.pool.name, update_interval_id
                );
            }
            Err(e) => {
                error!(
                    "{}: state prediction for interval {} failed: {}",
                    self.pool.name, update_interval_id, e
                );
            }
        }
        SchedulerState::WaitingForSettlementEvent
    }

    async fn on_waiting(&self, ended: &mut Option<PendingEnded>) -> SchedulerState {
        let mut settlements = self.settlements.subscribe();
        let upkeep = self
            .with_ended_timer(ended, async move {
                match settlements.recv().await {
                    Ok(block_number) => Some(block_number),
                    Err(RecvError::Lagged(_)) => None,
                    // a sender lives in `self`
                    Err(RecvError::Closed) => std::future::pending().await,
                }
            })
            .await;

        debug!("{}: upkeep observed (block {:?}), re-arming", self.pool.name, upkeep);
        SchedulerState::IdleWaitingForWindow
    }

    /// Interval id checked before and after the prediction.
    async fn predict_if_open(&self, update_interval_id: u64) -> Result<Option<PredictedPoolState>> {
        let read_retry = &self.settings.read_retry;

        if !commitment_window_open(self.ledger.as_ref(), &self.pool, read_retry, update_interval_id).await? {
            return Ok(None);
        }

        let state = preview_state(
            self.ledger.as_ref(),
            &self.pool,
            &self.engine,
            read_retry,
            self.clock.now_unix(),
        )
        .await?;

        if !commitment_window_open(self.ledger.as_ref(), &self.pool, read_retry, update_interval_id).await? {
            return Ok(None);
        }

        Ok(Some(state))
    }

    /// Drive `fut` to completion, publishing ENDED whenever its deadline passes.
    async fn with_ended_timer<F: Future>(&self, ended: &mut Option<PendingEnded>, fut: F) -> F::Output {
        tokio::pin!(fut);
        loop {
            let pending = *ended;
            tokio::select! {
                output = &mut fut => return output,
                update_interval_id = ended_deadline(pending) => {
                    *ended = None;
                    self.publish_ended(update_interval_id);
                }
            }
        }
    }

    fn schedule_ended(&self, ended: &mut Option<PendingEnded>, delay_secs: u64, update_interval_id: u64) {
        if let Some(previous) = ended.take() {
            self.publish_ended(previous.update_interval_id);
        }
        *ended = Some(PendingEnded {
            at: Instant::now() + Duration::from_secs(delay_secs),
            update_interval_id,
        });
    }

    fn publish_ended(&self, update_interval_id: u64) {
        info!(
            "{}: commitment window ended for interval {}",
            self.pool.name, update_interval_id
        );
        self.publish(PoolEvent::CommitmentWindowEnded { update_interval_id });
    }

    fn publish(&self, event: PoolEvent) {
        if self.events.send(event).is_err() {
            debug!("{}: no event subscribers", self.pool.name);
        }
    }
}

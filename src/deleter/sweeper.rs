//! The Deleter
//!
//! Owns the liveness table and the two background loops that maintain it.
//!
//! ## Loops
//!
//! ```text
//!   record() ──> [ bounded mpsc queue ] ──> ingestion task ──┐
//!                                                            ▼
//!                                            Mutex<LivenessTable>
//!                                                            ▲
//!   interval tick ─────────────────────────> sweep task ─────┘
//!                                              │ evict_stale(now)
//!                                              │ evict_excess()
//!                                              ▼
//!                                          EvictHook(key)
//! ```
//!
//! The queue is the only backpressure: when it is full, `record` waits.
//! A sweep holds the table lock for its whole pass, so ingestion stalls
//! while it runs. Sweeps are expected to be rare compared to writes.
//!
//! ## Shutdown
//!
//! [`Deleter::stop`] flips a `watch` flag that both loops select on. The
//! ingestion loop then closes its receiver and drains whatever is already
//! queued, so nothing sent before `stop` is lost. `stop` returns once both
//! task handles have been joined.
//!
//! The loops only hold a weak reference to the deleter. Dropping the last
//! handle without calling `stop` drops the shutdown sender, and both loops
//! exit on their own. Events still queued at that point are discarded.

use super::config::{ConfigError, DeleterConfig};
use super::liveness::{LivenessTable, TimestampEvent};
use crate::clock::{duration_nanos, unix_nanos, Clock, SystemClock};
use crate::storage::Janitor;
use parking_lot::Mutex;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant, SystemTime};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval_at, MissedTickBehavior};
use tracing::{debug, info};

/// Called once for every key the deleter evicts.
///
/// Runs synchronously while the liveness table is locked. It must not call
/// back into the same deleter (`record`, `sweep`, `forget`, ...), or it will
/// deadlock.
pub type EvictHook<K> = Arc<dyn Fn(&K) + Send + Sync>;

/// Errors surfaced by the deleter's lifecycle and queue.
#[derive(Debug, Error)]
pub enum DeleterError {
    /// The configuration was rejected
    #[error("invalid deleter config: {0}")]
    Config(#[from] ConfigError),

    /// `start` was called on a deleter that was already started or stopped
    #[error("deleter already started")]
    AlreadyStarted,

    /// The deleter has been stopped and no longer accepts events
    #[error("deleter is stopped")]
    Closed,

    /// One of the background loops panicked or was cancelled
    #[error("deleter task failed: {0}")]
    Task(#[from] JoinError),
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries removed for being older than `max_age`
    pub stale: usize,
    /// Entries removed to bring the population back to `keep_num`
    pub excess: usize,
    /// Entries left in the table
    pub remaining: usize,
    /// Wall time spent sweeping
    pub took: Duration,
}

impl SweepReport {
    /// Total entries removed.
    pub fn removed(&self) -> usize {
        self.stale + self.excess
    }
}

/// Counters describing a deleter's lifetime activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleterStats {
    /// Keys currently tracked
    pub tracked: u64,
    /// Events folded into the table
    pub events: u64,
    /// Completed sweeps
    pub sweeps: u64,
    /// Keys evicted for age
    pub stale_evicted: u64,
    /// Keys evicted for count
    pub excess_evicted: u64,
}

/// Join handles for the two background loops.
#[derive(Debug)]
struct LoopHandles {
    ingest: JoinHandle<()>,
    sweep: JoinHandle<()>,
}

/// Tracks when keys were last touched and evicts the stale or surplus ones.
///
/// # Example
///
/// ```
/// use sweepkv::deleter::{Deleter, DeleterConfig};
/// use std::sync::Arc;
/// use std::time::{Duration, SystemTime};
///
/// # tokio_test::block_on(async {
/// let config = DeleterConfig::default()
///     .with_max_age(Duration::from_secs(60))
///     .with_keep_num(1_000);
/// let deleter = Arc::new(Deleter::<String>::new("sessions", config, None).unwrap());
///
/// deleter.start().unwrap();
/// deleter.record("alice".to_string(), SystemTime::now()).await.unwrap();
/// deleter.stop().await.unwrap();
///
/// assert_eq!(deleter.len(), 1);
/// # });
/// ```
pub struct Deleter<K> {
    /// Label used in log events
    name: String,

    config: DeleterConfig,

    table: Mutex<LivenessTable<K>>,

    evict_hook: Option<EvictHook<K>>,

    clock: Arc<dyn Clock>,

    events_tx: mpsc::Sender<TimestampEvent<K>>,

    /// Taken by `start`; `None` afterwards
    events_rx: Mutex<Option<mpsc::Receiver<TimestampEvent<K>>>>,

    shutdown_tx: watch::Sender<bool>,

    tasks: Mutex<Option<LoopHandles>>,

    /// Statistics: events folded into the table
    event_count: AtomicU64,

    /// Statistics: completed sweeps
    sweep_count: AtomicU64,

    /// Statistics: keys evicted for age
    stale_count: AtomicU64,

    /// Statistics: keys evicted for count
    excess_count: AtomicU64,
}

impl<K> fmt::Debug for Deleter<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deleter")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("has_evict_hook", &self.evict_hook.is_some())
            .field("event_count", &self.event_count.load(Ordering::Relaxed))
            .field("sweep_count", &self.sweep_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl<K> Deleter<K>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    /// Creates a stopped deleter.
    ///
    /// `evict_hook` is usually wired to the paired store's `delete`. Without
    /// one, evictions only drop the table entry.
    pub fn new(
        name: impl Into<String>,
        config: DeleterConfig,
        evict_hook: Option<EvictHook<K>>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::assemble(
            name.into(),
            config,
            evict_hook,
            Arc::new(SystemClock),
        ))
    }

    /// Builds a deleter from an already validated config.
    pub(crate) fn assemble(
        name: String,
        config: DeleterConfig,
        evict_hook: Option<EvictHook<K>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(config.buffer_size);
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            name,
            config,
            table: Mutex::new(LivenessTable::new()),
            evict_hook,
            clock,
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            shutdown_tx,
            tasks: Mutex::new(None),
            event_count: AtomicU64::new(0),
            sweep_count: AtomicU64::new(0),
            stale_count: AtomicU64::new(0),
            excess_count: AtomicU64::new(0),
        }
    }

    /// Replaces the time source used for age-based eviction.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The diagnostic label.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The configuration this deleter was built with.
    pub fn config(&self) -> &DeleterConfig {
        &self.config
    }

    /// Queues a liveness update for `key`, touched at `at`.
    ///
    /// Waits while the queue is full. Fails only after [`stop`](Self::stop).
    pub async fn record(&self, key: K, at: SystemTime) -> Result<(), DeleterError> {
        self.events_tx
            .send(TimestampEvent::at(key, at))
            .await
            .map_err(|_| DeleterError::Closed)
    }

    /// Blocking variant of [`record`](Self::record) for producers running on
    /// plain threads.
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous execution context.
    pub fn blocking_record(&self, key: K, at: SystemTime) -> Result<(), DeleterError> {
        self.events_tx
            .blocking_send(TimestampEvent::at(key, at))
            .map_err(|_| DeleterError::Closed)
    }

    /// Folds an event straight into the table, bypassing the queue.
    fn apply(&self, event: TimestampEvent<K>) {
        self.table.lock().apply(event);
        self.event_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Last-seen timestamp for `key`, in nanoseconds since the Unix epoch.
    pub fn last_seen(&self, key: &K) -> Option<i64> {
        self.table.lock().get(key)
    }

    /// Stops tracking `key` without invoking the eviction hook.
    pub fn forget(&self, key: &K) -> bool {
        self.table.lock().remove(key)
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.table.lock().len()
    }

    /// Returns true if no key is tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns lifetime statistics.
    pub fn stats(&self) -> DeleterStats {
        DeleterStats {
            tracked: self.len() as u64,
            events: self.event_count.load(Ordering::Relaxed),
            sweeps: self.sweep_count.load(Ordering::Relaxed),
            stale_evicted: self.stale_count.load(Ordering::Relaxed),
            excess_evicted: self.excess_count.load(Ordering::Relaxed),
        }
    }

    #[inline]
    fn notify_evicted(&self, key: &K) {
        if let Some(hook) = &self.evict_hook {
            hook(key);
        }
    }

    /// Evicts every key last touched before `now - max_age`.
    ///
    /// Scans the whole table under its lock. Returns the number evicted.
    pub fn evict_stale(&self, now: SystemTime) -> usize {
        let started = Instant::now();
        let threshold_ns = unix_nanos(now).saturating_sub(duration_nanos(self.config.max_age));

        let (removed, remaining) = {
            let mut table = self.table.lock();
            let removed = table.evict_stale(threshold_ns, |key| self.notify_evicted(key));
            (removed, table.len())
        };

        self.stale_count.fetch_add(removed as u64, Ordering::Relaxed);
        info!(
            deleter = %self.name,
            removed,
            remaining,
            max_age_ms = self.config.max_age.as_millis() as u64,
            took_us = started.elapsed().as_micros() as u64,
            "Evicted stale keys"
        );
        removed
    }

    /// Trims the table back to `keep_num` once it is 10% over.
    ///
    /// Returns the number evicted.
    pub fn evict_excess(&self) -> usize {
        let started = Instant::now();

        let (removed, remaining) = {
            let mut table = self.table.lock();
            let removed =
                table.evict_excess(self.config.keep_num, |key| self.notify_evicted(key));
            (removed, table.len())
        };

        if removed > 0 {
            self.excess_count.fetch_add(removed as u64, Ordering::Relaxed);
            info!(
                deleter = %self.name,
                removed,
                remaining,
                keep = self.config.keep_num,
                took_us = started.elapsed().as_micros() as u64,
                "Evicted keys over the retention target"
            );
        }
        removed
    }

    /// Runs one sweep now: age-based eviction, then count-based eviction.
    pub fn sweep(&self) -> SweepReport {
        let started = Instant::now();

        let stale = self.evict_stale(self.clock.now());
        let excess = self.evict_excess();

        self.sweep_count.fetch_add(1, Ordering::Relaxed);
        let report = SweepReport {
            stale,
            excess,
            remaining: self.len(),
            took: started.elapsed(),
        };
        debug!(
            deleter = %self.name,
            removed = report.removed(),
            remaining = report.remaining,
            took_us = report.took.as_micros() as u64,
            "Sweep complete"
        );
        report
    }

    /// Spawns the ingestion and sweep loops on the current Tokio runtime.
    ///
    /// A deleter can be started once.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn start(self: &Arc<Self>) -> Result<(), DeleterError> {
        let events = self
            .events_rx
            .lock()
            .take()
            .ok_or(DeleterError::AlreadyStarted)?;

        // The loops hold only a weak handle, so dropping the last `Arc`
        // closes the queue and the shutdown channel and both loops end.
        let ingest = tokio::spawn(Self::ingest_loop(
            Arc::downgrade(self),
            self.name.clone(),
            events,
            self.shutdown_tx.subscribe(),
        ));
        let sweep = tokio::spawn(Self::sweep_loop(
            Arc::downgrade(self),
            self.name.clone(),
            self.config.sweep_interval,
            self.shutdown_tx.subscribe(),
        ));
        *self.tasks.lock() = Some(LoopHandles { ingest, sweep });

        info!(
            deleter = %self.name,
            interval_ms = self.config.sweep_interval.as_millis() as u64,
            keep = self.config.keep_num,
            "Deleter started"
        );
        Ok(())
    }

    /// Stops both loops and waits for them to finish.
    ///
    /// Events already queued are applied before this returns; later calls
    /// to [`record`](Self::record) fail with [`DeleterError::Closed`].
    /// Meant to be called once. Calling it again after it has returned does
    /// nothing.
    pub async fn stop(&self) -> Result<(), DeleterError> {
        self.shutdown_tx.send_replace(true);

        let handles = self.tasks.lock().take();
        match handles {
            Some(LoopHandles { ingest, sweep }) => {
                let (ingested, swept) = tokio::join!(ingest, sweep);
                ingested?;
                swept?;
            }
            None => {
                // Never started: close the queue so producers see `Closed`.
                if let Some(mut events) = self.events_rx.lock().take() {
                    events.close();
                }
            }
        }

        info!(deleter = %self.name, tracked = self.len(), "Deleter stopped");
        Ok(())
    }

    /// Single consumer of the event queue.
    async fn ingest_loop(
        this: Weak<Self>,
        name: String,
        mut events: mpsc::Receiver<TimestampEvent<K>>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        debug!(deleter = %name, "Ingestion started");

        loop {
            tokio::select! {
                event = events.recv() => match (event, this.upgrade()) {
                    (Some(event), Some(deleter)) => deleter.apply(event),
                    _ => break,
                },
                result = shutdown_rx.wait_for(|stop| *stop) => {
                    if result.is_err() {
                        debug!(deleter = %name, "Deleter dropped without stop");
                    }
                    break;
                }
            }
        }

        // Refuse new events, then drain what was queued before the stop.
        events.close();
        let mut drained = 0u64;
        while let Some(event) = events.recv().await {
            let Some(deleter) = this.upgrade() else { break };
            deleter.apply(event);
            drained += 1;
        }

        debug!(deleter = %name, drained, "Ingestion finished");
    }

    /// Fires a sweep every `period` until shut down.
    async fn sweep_loop(
        this: Weak<Self>,
        name: String,
        period: Duration,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let mut ticker = interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(deleter = %name, "Sweeping started");

        loop {
            tokio::select! {
                _ = shutdown_rx.wait_for(|stop| *stop) => break,
                _ = ticker.tick() => match this.upgrade() {
                    Some(deleter) => {
                        deleter.sweep();
                    }
                    None => break,
                },
            }
        }

        debug!(deleter = %name, "Sweeping finished");
    }
}

impl<K> Janitor<K> for Deleter<K>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    async fn touch(&self, key: K, at: SystemTime) {
        if self.record(key, at).await.is_err() {
            debug!(deleter = %self.name, "Dropped liveness update after stop");
        }
    }
}

/// Stamps out deleters that share one configuration and clock.
///
/// Useful when several stores should age out entries the same way.
#[derive(Debug, Clone)]
pub struct DeleterProvider {
    config: DeleterConfig,
    clock: Arc<dyn Clock>,
}

impl DeleterProvider {
    /// Validates `config` once for every deleter this provider will build.
    pub fn new(config: DeleterConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            clock: Arc::new(SystemClock),
        })
    }

    /// Replaces the time source handed to new deleters.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The shared configuration.
    pub fn config(&self) -> &DeleterConfig {
        &self.config
    }

    /// The shared clock.
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Builds a stopped deleter.
    pub fn provide<K>(
        &self,
        name: impl Into<String>,
        evict_hook: Option<EvictHook<K>>,
    ) -> Deleter<K>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
    {
        Deleter::assemble(
            name.into(),
            self.config.clone(),
            evict_hook,
            Arc::clone(&self.clock),
        )
    }
}

//! Generic periodic buffer-then-flush scheduler.
//!
//! Every exporting store (counter snapshots, gauge samples, path entries)
//! owns one [`BatchFlusher`]: a dedicated named thread driving a
//! current-thread tokio runtime that wakes on a fixed period, drains its
//! [`BatchSource`] and hands the batch to a [`BatchSink`].
//!
//! A failing or panicking sink loses that one batch. The failure is logged
//! and counted in [`FlusherStats`]; the next tick runs as usual.
//!
//! # Lifecycle
//!
//! `Idle → Scheduled → (tick: Flushing → Scheduled)* → Stopped`
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use tracepulse_domain::PathTrackingEntry;
//! use tracepulse_infra::exporters::TracingExporter;
//! use tracepulse_infra::scheduling::{BatchBuffer, BatchFlusher, Stoppable};
//!
//! # fn example() -> Result<(), tracepulse_infra::scheduling::FlusherError> {
//! let buffer = Arc::new(BatchBuffer::<PathTrackingEntry>::new());
//! let flusher = BatchFlusher::<PathTrackingEntry>::new(
//!     "paths",
//!     Duration::from_secs(60),
//!     buffer.clone(),
//!     Arc::new(TracingExporter::new()),
//! );
//! flusher.start()?;
//! // ... application runs ...
//! flusher.stop()?;
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracepulse_core::guard::catch_panic;
use tracepulse_domain::constants::DEFAULT_FLUSH_JOIN_TIMEOUT_MS;
use tracepulse_domain::Result;
use tracing::{debug, error, info, instrument, warn};

use super::error::{FlusherError, FlusherResult};

/// Where a flusher takes its batches from.
pub trait BatchSource<T>: Send + Sync {
    /// Take everything pending, leaving the source empty.
    fn drain(&self) -> Vec<T>;
}

/// Backend receiving flushed batches.
pub trait BatchSink<T>: Send + Sync {
    /// # Errors
    /// Any error drops the batch; it is never retried.
    fn flush(&self, batch: Vec<T>) -> Result<()>;
}

/// Mutex-guarded buffer swapped for an empty one on every drain.
#[derive(Debug)]
pub struct BatchBuffer<T> {
    items: Mutex<Vec<T>>,
}

impl<T> Default for BatchBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> BatchBuffer<T> {
    pub fn new() -> Self {
        Self { items: Mutex::new(Vec::new()) }
    }

    pub fn push(&self, item: T) {
        self.items.lock().push(item);
    }

    pub fn extend(&self, items: impl IntoIterator<Item = T>) {
        self.items.lock().extend(items);
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

impl<T: Send> BatchSource<T> for BatchBuffer<T> {
    fn drain(&self) -> Vec<T> {
        std::mem::take(&mut *self.items.lock())
    }
}

/// Flusher lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum FlusherState {
    Idle = 0,
    Scheduled = 1,
    Flushing = 2,
    Stopped = 3,
}

impl FlusherState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Scheduled,
            2 => Self::Flushing,
            _ => Self::Stopped,
        }
    }
}

/// Counters describing what a flusher has done so far
#[derive(Debug, Default)]
pub struct FlusherStats {
    ticks: AtomicU64,
    flushed_items: AtomicU64,
    failed_flushes: AtomicU64,
    dropped_items: AtomicU64,
}

/// Point-in-time copy of [`FlusherStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FlusherStatsSnapshot {
    pub ticks: u64,
    pub flushed_items: u64,
    pub failed_flushes: u64,
    pub dropped_items: u64,
}

impl FlusherStats {
    pub fn snapshot(&self) -> FlusherStatsSnapshot {
        FlusherStatsSnapshot {
            ticks: self.ticks.load(Ordering::Acquire),
            flushed_items: self.flushed_items.load(Ordering::Acquire),
            failed_flushes: self.failed_flushes.load(Ordering::Acquire),
            dropped_items: self.dropped_items.load(Ordering::Acquire),
        }
    }

    fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::AcqRel);
    }

    fn record_flushed(&self, items: usize) {
        self.flushed_items.fetch_add(items as u64, Ordering::AcqRel);
    }

    fn record_failure(&self, items: usize) {
        self.failed_flushes.fetch_add(1, Ordering::AcqRel);
        self.dropped_items.fetch_add(items as u64, Ordering::AcqRel);
    }
}

/// Anything the agent has to stop on shutdown.
pub trait Stoppable: Send + Sync {
    fn name(&self) -> &str;

    /// Cancel, flush what is pending and wait for termination. Idempotent.
    ///
    /// # Errors
    /// Returns [`FlusherError::Timeout`] when termination takes longer than
    /// the configured bound.
    fn stop(&self) -> FlusherResult<()>;

    fn stats(&self) -> FlusherStatsSnapshot;
}

/// Shared between the flusher handle and its timer thread.
struct FlushContext<T> {
    name: String,
    source: Arc<dyn BatchSource<T>>,
    sink: Arc<dyn BatchSink<T>>,
    state: Arc<AtomicU8>,
    stats: Arc<FlusherStats>,
}

impl<T> FlushContext<T> {
    fn flush_once(&self) {
        self.stats.record_tick();
        let flushing = self
            .state
            .compare_exchange(
                FlusherState::Scheduled as u8,
                FlusherState::Flushing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();

        let batch = self.source.drain();
        let count = batch.len();
        if count > 0 {
            match catch_panic(|| self.sink.flush(batch)) {
                Ok(Ok(())) => {
                    self.stats.record_flushed(count);
                    debug!(flusher = %self.name, items = count, "Batch flushed");
                }
                Ok(Err(err)) => {
                    self.stats.record_failure(count);
                    error!(flusher = %self.name, items = count, error = %err, "Batch flush failed, dropping batch");
                }
                Err(panic) => {
                    self.stats.record_failure(count);
                    error!(flusher = %self.name, items = count, panic = %panic, "Batch sink panicked, dropping batch");
                }
            }
        }

        if flushing {
            // Fails harmlessly when stop() moved the state on meanwhile.
            let _ = self.state.compare_exchange(
                FlusherState::Flushing as u8,
                FlusherState::Scheduled as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            );
        }
    }
}

struct Worker {
    handle: JoinHandle<()>,
    done: Receiver<()>,
}

/// Periodic flusher owning one dedicated timer thread.
pub struct BatchFlusher<T> {
    context: Arc<FlushContext<T>>,
    period: Duration,
    join_timeout: Duration,
    cancellation_token: CancellationToken,
    worker: Mutex<Option<Worker>>,
}

impl<T: Send + 'static> BatchFlusher<T> {
    /// Create an idle flusher; call [`start`](Self::start) to schedule it.
    pub fn new(
        name: impl Into<String>,
        period: Duration,
        source: Arc<dyn BatchSource<T>>,
        sink: Arc<dyn BatchSink<T>>,
    ) -> Self {
        Self {
            context: Arc::new(FlushContext {
                name: name.into(),
                source,
                sink,
                state: Arc::new(AtomicU8::new(FlusherState::Idle as u8)),
                stats: Arc::new(FlusherStats::default()),
            }),
            period,
            join_timeout: Duration::from_millis(DEFAULT_FLUSH_JOIN_TIMEOUT_MS),
            cancellation_token: CancellationToken::new(),
            worker: Mutex::new(None),
        }
    }

    /// Bound on how long [`stop`](Self::stop) waits for the timer thread.
    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    pub fn state(&self) -> FlusherState {
        FlusherState::from_u8(self.context.state.load(Ordering::Acquire))
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Start the timer thread.
    ///
    /// # Errors
    /// Returns [`FlusherError::AlreadyRunning`] when already scheduled,
    /// [`FlusherError::Stopped`] after a stop, and
    /// [`FlusherError::SpawnFailed`] when the thread cannot be created.
    #[instrument(skip(self), fields(flusher = %self.context.name, period = ?self.period))]
    pub fn start(&self) -> FlusherResult<()> {
        let name = self.context.name.clone();
        if let Err(current) = self.context.state.compare_exchange(
            FlusherState::Idle as u8,
            FlusherState::Scheduled as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            return Err(match FlusherState::from_u8(current) {
                FlusherState::Stopped => FlusherError::Stopped { name },
                _ => FlusherError::AlreadyRunning { name },
            });
        }

        let (done_tx, done_rx) = mpsc::channel();
        let context = Arc::clone(&self.context);
        let cancel = self.cancellation_token.clone();
        let period = self.period;

        let spawned = thread::Builder::new().name(format!("tracepulse-{name}")).spawn(move || {
            match tokio::runtime::Builder::new_current_thread().enable_time().build() {
                Ok(runtime) => runtime.block_on(Self::flush_loop(&context, period, cancel)),
                Err(err) => {
                    error!(flusher = %context.name, error = %err, "Failed to build flusher runtime");
                }
            }
            // Receiver may be gone if stop() already timed out.
            let _ = done_tx.send(());
        });

        match spawned {
            Ok(handle) => {
                *self.worker.lock() = Some(Worker { handle, done: done_rx });
                info!("Batch flusher started");
                Ok(())
            }
            Err(err) => {
                self.context.state.store(FlusherState::Idle as u8, Ordering::Release);
                Err(FlusherError::SpawnFailed { name, reason: err.to_string() })
            }
        }
    }

    /// Flush pending items on the calling thread, outside the schedule.
    pub fn flush_now(&self) {
        self.context.flush_once();
    }

    pub fn stats(&self) -> FlusherStatsSnapshot {
        self.context.stats.snapshot()
    }

    async fn flush_loop(context: &FlushContext<T>, period: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(flusher = %context.name, "Flush loop cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    context.flush_once();
                }
            }
        }

        // Last chance for whatever was buffered since the final tick.
        context.flush_once();
    }

    fn stop_inner(&self) -> FlusherResult<()> {
        let previous = FlusherState::from_u8(
            self.context.state.swap(FlusherState::Stopped as u8, Ordering::AcqRel),
        );
        match previous {
            FlusherState::Stopped => return Ok(()),
            FlusherState::Idle => {
                // Never scheduled: flush leftovers inline.
                self.context.flush_once();
                return Ok(());
            }
            FlusherState::Scheduled | FlusherState::Flushing => {}
        }

        info!(flusher = %self.context.name, "Stopping batch flusher");
        self.cancellation_token.cancel();

        let Some(worker) = self.worker.lock().take() else {
            return Ok(());
        };
        match worker.done.recv_timeout(self.join_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if worker.handle.join().is_err() {
                    warn!(flusher = %self.context.name, "Flusher thread panicked");
                }
                info!(flusher = %self.context.name, "Batch flusher stopped");
                Ok(())
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    flusher = %self.context.name,
                    timeout = ?self.join_timeout,
                    "Flusher thread did not stop in time, detaching"
                );
                Err(FlusherError::Timeout {
                    name: self.context.name.clone(),
                    timeout: self.join_timeout,
                })
            }
        }
    }
}

impl<T: Send + 'static> Stoppable for BatchFlusher<T> {
    fn name(&self) -> &str {
        &self.context.name
    }

    fn stop(&self) -> FlusherResult<()> {
        self.stop_inner()
    }

    fn stats(&self) -> FlusherStatsSnapshot {
        self.context.stats.snapshot()
    }
}

impl<T> Drop for BatchFlusher<T> {
    fn drop(&mut self) {
        // Let a detached timer thread wind down instead of ticking forever.
        self.cancellation_token.cancel();
    }
}

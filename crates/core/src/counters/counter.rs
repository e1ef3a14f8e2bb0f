//! Concurrent counter and its read-only view

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracepulse_domain::{CounterSnapshot, Key, MetricData, OnlineStatistic, Result, Unit};

/// Read access shared by live counters and aggregated collector views.
pub trait CounterView: Send + Sync {
    fn key(&self) -> &Key;

    /// Copy of the current statistic.
    fn statistic(&self) -> OnlineStatistic;

    fn current_concurrency(&self) -> i32;

    fn max_concurrency(&self) -> i32;

    fn hits(&self) -> u64 {
        self.statistic().count()
    }

    fn sum(&self) -> f64 {
        self.statistic().sum()
    }

    fn mean(&self) -> f64 {
        self.statistic().mean()
    }

    fn min(&self) -> f64 {
        self.statistic().min()
    }

    fn max(&self) -> f64 {
        self.statistic().max()
    }

    fn variance(&self) -> f64 {
        self.statistic().variance()
    }

    fn standard_deviation(&self) -> f64 {
        self.statistic().stddev()
    }

    fn second_moment(&self) -> f64 {
        self.statistic().second_moment()
    }

    fn metric(&self, metric: MetricData) -> f64 {
        metric.value(&self.statistic(), self.current_concurrency(), self.max_concurrency())
    }

    /// Export this counter stamped with `marker`.
    fn snapshot(&self, marker: &str) -> CounterSnapshot {
        CounterSnapshot::new(
            self.key(),
            marker,
            &self.statistic(),
            self.current_concurrency(),
            self.max_concurrency(),
        )
    }
}

#[derive(Debug, Default)]
struct CounterState {
    statistic: OnlineStatistic,
    max_concurrency: i32,
}

/// Running statistic of one key plus its concurrency gauges.
///
/// Statistic and max-concurrency live behind one read/write lock; the
/// in-flight count is a plain atomic so entering and leaving a call never
/// waits on readers.
#[derive(Debug)]
pub struct Counter {
    key: Key,
    state: RwLock<CounterState>,
    concurrency: AtomicI32,
}

impl Counter {
    pub fn new(key: Key) -> Self {
        Self { key, state: RwLock::new(CounterState::default()), concurrency: AtomicI32::new(0) }
    }

    /// Add a sample expressed in this counter's unit.
    pub fn add(&self, value: f64) {
        self.state.write().statistic.add(value);
    }

    /// Add a sample expressed in `unit`, converting it first.
    ///
    /// # Errors
    /// Returns `IncompatibleUnit` when `unit` cannot be converted into the
    /// unit of this counter's role. Nothing is recorded in that case.
    pub fn add_with_unit(&self, value: f64, unit: &Unit) -> Result<()> {
        let converted = self.key.role().unit().convert(value, unit)?;
        self.add(converted);
        Ok(())
    }

    /// Raise max-concurrency to `concurrency` if it is higher.
    pub fn update_concurrency(&self, concurrency: i32) {
        let mut state = self.state.write();
        if concurrency > state.max_concurrency {
            state.max_concurrency = concurrency;
        }
    }

    /// Mark one more call in flight and return the new count.
    pub fn enter(&self) -> i32 {
        let current = self.concurrency.fetch_add(1, Ordering::AcqRel) + 1;
        self.update_concurrency(current);
        current
    }

    /// Mark one call as finished.
    pub fn exit(&self) {
        self.concurrency.fetch_sub(1, Ordering::AcqRel);
    }

    /// Replace the statistic with one received from elsewhere.
    pub fn update_from(&self, statistic: OnlineStatistic, concurrency: i32) {
        let mut state = self.state.write();
        state.statistic = statistic;
        if concurrency > state.max_concurrency {
            state.max_concurrency = concurrency;
        }
        self.concurrency.store(concurrency, Ordering::Release);
    }

    /// Forget every sample and the max-concurrency seen so far.
    ///
    /// Calls still in flight keep being counted.
    pub fn reset(&self) {
        let mut state = self.state.write();
        state.statistic.reset();
        state.max_concurrency = 0;
    }

    /// Time one call and record it on [`Stopwatch::stop`].
    pub fn start_stopwatch(self: &Arc<Self>) -> Stopwatch {
        self.enter();
        Stopwatch { counter: Arc::clone(self), started: Instant::now(), finished: false }
    }
}

impl CounterView for Counter {
    fn key(&self) -> &Key {
        &self.key
    }

    fn statistic(&self) -> OnlineStatistic {
        self.state.read().statistic
    }

    fn current_concurrency(&self) -> i32 {
        self.concurrency.load(Ordering::Acquire)
    }

    fn max_concurrency(&self) -> i32 {
        self.state.read().max_concurrency
    }
}

/// One in-flight timed call.
///
/// Dropping a stopwatch without stopping it releases its concurrency slot
/// and records nothing.
#[derive(Debug)]
pub struct Stopwatch {
    counter: Arc<Counter>,
    started: Instant,
    finished: bool,
}

impl Stopwatch {
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Record the elapsed time on the counter.
    ///
    /// # Errors
    /// Returns `IncompatibleUnit` when the counter does not measure time. The
    /// concurrency slot is released either way.
    pub fn stop(mut self) -> Result<Duration> {
        let elapsed = self.started.elapsed();
        self.finished = true;
        self.counter.exit();
        self.counter.add_with_unit(elapsed.as_nanos() as f64, &Unit::NANOSECOND)?;
        Ok(elapsed)
    }
}

impl Drop for Stopwatch {
    fn drop(&mut self) {
        if !self.finished {
            self.counter.exit();
        }
    }
}

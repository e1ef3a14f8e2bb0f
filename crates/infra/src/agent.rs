//! Process-scoped engine wiring
//!
//! An [`Agent`] owns the counter registry, the gauge store, the path tracker
//! and every background flusher built from one [`Config`]. It has an
//! explicit lifecycle: [`AgentBuilder::start`] spawns the flushers,
//! [`Agent::close`] stops them after a final flush.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use tracepulse_core::CallReference;
//! use tracepulse_domain::Config;
//! use tracepulse_infra::exporters::TracingExporter;
//! use tracepulse_infra::Agent;
//!
//! # fn example() -> tracepulse_domain::Result<()> {
//! let agent = Agent::builder(Config::default())
//!     .with_counter_exporter(Arc::new(TracingExporter::new()))
//!     .start()?;
//!
//! agent.tracker().track("OrderService", "checkout", CallReference::fresh(), || {
//!     // ... instrumented work ...
//! });
//!
//! agent.close()?;
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracepulse_core::{CounterRegistry, IdGenerator, PathTracker, PathTrackingListener, StoreMode};
use tracepulse_domain::constants::DEFAULT_EXECUTOR_SHUTDOWN_TIMEOUT_MS;
use tracepulse_domain::{
    Config, CounterSnapshot, GaugeSample, PathTrackingEntry, Result, TracePulseError,
};
use tracing::{error, info, instrument, warn};

use crate::scheduling::{BatchFlusher, BatchSink, FlusherStatsSnapshot, Stoppable, WorkerPoolExecutor};
use crate::stores::{
    BatchPathTrackingStore, CounterGaugeSource, CounterSnapshotSource, InMemoryGaugeDataStore,
    InMemoryPathTrackingStore,
};

const COUNTER_FLUSHER: &str = "counters";
const GAUGE_FLUSHER: &str = "counter-gauges";

/// Collects the optional collaborators of an [`Agent`].
#[must_use]
pub struct AgentBuilder {
    config: Config,
    listeners: Vec<Arc<dyn PathTrackingListener>>,
    counter_exporter: Option<Arc<dyn BatchSink<CounterSnapshot>>>,
    path_exporter: Option<Arc<dyn BatchSink<PathTrackingEntry>>>,
    id_generator: Option<Arc<dyn IdGenerator>>,
}

impl AgentBuilder {
    pub fn with_listener(mut self, listener: Arc<dyn PathTrackingListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Export counter snapshots every `counter.period_ms`.
    pub fn with_counter_exporter(mut self, exporter: Arc<dyn BatchSink<CounterSnapshot>>) -> Self {
        self.counter_exporter = Some(exporter);
        self
    }

    /// Export path entries every `path_tracking.period_ms` instead of
    /// keeping them in memory.
    pub fn with_path_exporter(mut self, exporter: Arc<dyn BatchSink<PathTrackingEntry>>) -> Self {
        self.path_exporter = Some(exporter);
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.id_generator = Some(ids);
        self
    }

    /// Build every component and start the background flushers.
    ///
    /// # Errors
    /// Returns `TracePulseError::Config` for an invalid configuration and
    /// `TracePulseError::Internal` when a flusher thread or the worker pool
    /// cannot be spawned. Anything already started is stopped again.
    #[instrument(skip(self), fields(node_id = %self.config.agent.node_id))]
    pub fn start(self) -> Result<Agent> {
        self.config.validate()?;
        let config = self.config;
        let node_id = config.agent.node_id.clone();

        let gauge_store = Arc::new(InMemoryGaugeDataStore::new(config.gauge.max_size));
        let registry = Arc::new(if config.counter.gauged {
            CounterRegistry::gauged(gauge_store.clone())
        } else {
            CounterRegistry::new()
        });

        let mut started = Started::default();

        if let Some(exporter) = self.counter_exporter {
            let source = CounterSnapshotSource::new(registry.clone(), node_id.clone())
                .clear_on_collect(config.counter.clear_on_collect);
            let flusher = BatchFlusher::<CounterSnapshot>::new(
                COUNTER_FLUSHER,
                config.counter.period(),
                Arc::new(source),
                exporter,
            );
            started.start_flusher(flusher)?;
        }

        if config.counter.gauged {
            let flusher = BatchFlusher::<GaugeSample>::new(
                GAUGE_FLUSHER,
                config.counter.gauge_period(),
                Arc::new(CounterGaugeSource::new(registry.clone())),
                gauge_store.clone(),
            );
            started.start_flusher(flusher)?;
        }

        let mut path_store = None;
        let mut tracker = if !config.path_tracking.store_enabled {
            PathTracker::without_store(node_id.clone())
        } else if let Some(exporter) = self.path_exporter {
            let store =
                Arc::new(BatchPathTrackingStore::new(config.path_tracking.period(), exporter));
            if let Err(err) = store.start() {
                started.rollback();
                return Err(err.into());
            }
            started.flushers.push(store.clone());
            PathTracker::new(node_id.clone(), store)
        } else {
            let store = Arc::new(InMemoryPathTrackingStore::new());
            path_store = Some(store.clone());
            PathTracker::new(node_id.clone(), store)
        };

        let mode =
            if config.path_tracking.single_store { StoreMode::Single } else { StoreMode::Buffered };
        tracker = tracker.with_mode(mode).with_listeners(self.listeners);
        if let Some(ids) = self.id_generator {
            tracker = tracker.with_id_generator(ids);
        }

        let mut executor = None;
        if config.path_tracking.use_executors {
            match WorkerPoolExecutor::new(config.path_tracking.executors) {
                Ok(pool) => {
                    let pool = Arc::new(pool);
                    tracker = tracker.with_executor(pool.clone());
                    executor = Some(pool);
                }
                Err(err) => {
                    started.rollback();
                    return Err(err.into());
                }
            }
        }

        info!(
            flushers = started.flushers.len(),
            gauged = config.counter.gauged,
            path_mode = ?tracker.mode(),
            executors = executor.is_some(),
            "Agent started"
        );

        Ok(Agent {
            config,
            registry,
            gauge_store,
            tracker: Arc::new(tracker),
            path_store,
            executor,
            flushers: started.flushers,
            closed: AtomicBool::new(false),
        })
    }
}

/// Flushers started so far, stopped again if a later step fails.
#[derive(Default)]
struct Started {
    flushers: Vec<Arc<dyn Stoppable>>,
}

impl Started {
    fn start_flusher<T: Send + 'static>(&mut self, flusher: BatchFlusher<T>) -> Result<()> {
        if let Err(err) = flusher.start() {
            self.rollback();
            return Err(err.into());
        }
        self.flushers.push(Arc::new(flusher));
        Ok(())
    }

    fn rollback(&mut self) {
        for flusher in self.flushers.drain(..) {
            if let Err(err) = flusher.stop() {
                warn!(flusher = flusher.name(), error = %err, "Failed to stop flusher during rollback");
            }
        }
    }
}

/// Running engine instance.
pub struct Agent {
    config: Config,
    registry: Arc<CounterRegistry>,
    gauge_store: Arc<InMemoryGaugeDataStore>,
    tracker: Arc<PathTracker>,
    path_store: Option<Arc<InMemoryPathTrackingStore>>,
    executor: Option<Arc<WorkerPoolExecutor>>,
    flushers: Vec<Arc<dyn Stoppable>>,
    closed: AtomicBool,
}

impl Agent {
    pub fn builder(config: Config) -> AgentBuilder {
        AgentBuilder {
            config,
            listeners: Vec::new(),
            counter_exporter: None,
            path_exporter: None,
            id_generator: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn node_id(&self) -> &str {
        &self.config.agent.node_id
    }

    pub fn registry(&self) -> &Arc<CounterRegistry> {
        &self.registry
    }

    pub fn gauge_store(&self) -> &Arc<InMemoryGaugeDataStore> {
        &self.gauge_store
    }

    pub fn tracker(&self) -> &Arc<PathTracker> {
        &self.tracker
    }

    /// Queryable path store; `None` when paths are exported or not stored.
    pub fn path_store(&self) -> Option<&Arc<InMemoryPathTrackingStore>> {
        self.path_store.as_ref()
    }

    pub fn flusher_stats(&self) -> Vec<(String, FlusherStatsSnapshot)> {
        self.flushers.iter().map(|f| (f.name().to_string(), f.stats())).collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Drain the worker pool, then stop every flusher with a final flush.
    ///
    /// Idempotent. Every component is stopped even when an earlier one
    /// fails.
    ///
    /// # Errors
    /// Returns the first shutdown failure.
    #[instrument(skip(self), fields(node_id = %self.config.agent.node_id))]
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        info!("Closing agent");

        let mut first_error: Option<TracePulseError> = None;
        if let Some(executor) = &self.executor {
            let timeout = Duration::from_millis(DEFAULT_EXECUTOR_SHUTDOWN_TIMEOUT_MS);
            if let Err(err) = executor.shutdown(timeout) {
                error!(error = %err, "Path flush executor shutdown failed");
                first_error.get_or_insert(err.into());
            }
        }
        for flusher in &self.flushers {
            if let Err(err) = flusher.stop() {
                error!(flusher = flusher.name(), error = %err, "Flusher shutdown failed");
                first_error.get_or_insert(err.into());
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => {
                info!("Agent closed");
                Ok(())
            }
        }
    }
}

impl Drop for Agent {
    fn drop(&mut self) {
        if !self.is_closed() {
            if let Err(err) = self.close() {
                warn!(error = %err, "Agent close on drop failed");
            }
        }
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("node_id", &self.node_id())
            .field("counters", &self.registry.len())
            .field("flushers", &self.flushers.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

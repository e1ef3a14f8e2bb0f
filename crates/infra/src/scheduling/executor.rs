//! Worker pool for root-completion flushes.
//!
//! Moves path persistence off application threads onto a small tokio
//! multi-thread runtime. Each task is a short blocking closure spawned
//! directly onto one of the pool's worker threads.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tokio::runtime::{Builder, Runtime};
use tracepulse_core::guard::catch_panic;
use tracepulse_core::FlushExecutor;
use tracepulse_domain::{Result, TracePulseError};
use tracing::{error, info, instrument, warn};

use super::error::{FlusherError, FlusherResult};

const THREAD_NAME: &str = "tracepulse-path-flush";

#[derive(Default)]
struct InFlight {
    count: AtomicUsize,
    lock: Mutex<()>,
    drained: Condvar,
}

impl InFlight {
    fn begin(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    fn finish(&self) {
        if self.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            let _guard = self.lock.lock();
            self.drained.notify_all();
        }
    }

    fn wait_drained(&self, deadline: Instant) -> bool {
        let mut guard = self.lock.lock();
        while self.count.load(Ordering::Acquire) > 0 {
            if self.drained.wait_until(&mut guard, deadline).timed_out() {
                return self.count.load(Ordering::Acquire) == 0;
            }
        }
        true
    }
}

/// Fixed-size worker pool implementing [`FlushExecutor`].
pub struct WorkerPoolExecutor {
    runtime: Mutex<Option<Runtime>>,
    in_flight: Arc<InFlight>,
    closed: AtomicBool,
    workers: usize,
}

impl WorkerPoolExecutor {
    /// # Errors
    /// Returns [`FlusherError::SpawnFailed`] when the runtime cannot be built.
    pub fn new(workers: usize) -> FlusherResult<Self> {
        let workers = workers.max(1);
        let runtime = Builder::new_multi_thread()
            .worker_threads(workers)
            .thread_name(THREAD_NAME)
            .build()
            .map_err(|err| FlusherError::SpawnFailed {
                name: THREAD_NAME.to_string(),
                reason: err.to_string(),
            })?;
        info!(workers, "Path flush executor started");
        Ok(Self {
            runtime: Mutex::new(Some(runtime)),
            in_flight: Arc::new(InFlight::default()),
            closed: AtomicBool::new(false),
            workers,
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.count.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stop accepting work, wait up to `timeout` for queued tasks, then
    /// release the worker threads. Idempotent.
    ///
    /// # Errors
    /// Returns [`FlusherError::Timeout`] when tasks are still running at the
    /// deadline; they are abandoned.
    #[instrument(skip(self))]
    pub fn shutdown(&self, timeout: Duration) -> FlusherResult<()> {
        {
            // Closing under the runtime lock orders us after any accepted task.
            let _runtime = self.runtime.lock();
            if self.closed.swap(true, Ordering::AcqRel) {
                return Ok(());
            }
        }
        let drained = self.in_flight.wait_drained(Instant::now() + timeout);
        if let Some(runtime) = self.runtime.lock().take() {
            runtime.shutdown_background();
        }
        if drained {
            info!("Path flush executor stopped");
            Ok(())
        } else {
            warn!(pending = self.in_flight(), "Path flush executor stopped with pending tasks");
            Err(FlusherError::Timeout { name: THREAD_NAME.to_string(), timeout })
        }
    }
}

impl FlushExecutor for WorkerPoolExecutor {
    fn execute(&self, task: Box<dyn FnOnce() + Send + 'static>) -> Result<()> {
        let runtime = self.runtime.lock();
        if self.is_closed() {
            return Err(TracePulseError::Internal("path flush executor is shut down".into()));
        }
        let Some(runtime) = runtime.as_ref() else {
            return Err(TracePulseError::Internal("path flush executor is shut down".into()));
        };

        self.in_flight.begin();
        let in_flight = Arc::clone(&self.in_flight);
        runtime.spawn(async move {
            if let Err(panic) = catch_panic(task) {
                error!(panic = %panic, "Path flush task panicked");
            }
            in_flight.finish();
        });
        Ok(())
    }
}

impl Drop for WorkerPoolExecutor {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.get_mut().take() {
            runtime.shutdown_background();
        }
    }
}

impl std::fmt::Debug for WorkerPoolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPoolExecutor")
            .field("workers", &self.workers)
            .field("in_flight", &self.in_flight())
            .field("closed", &self.is_closed())
            .finish()
    }
}

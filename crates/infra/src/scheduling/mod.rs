//! Background scheduling for exports and path flushes
//!
//! - [`BatchFlusher`]: one timer thread per exporting store, draining a
//!   buffer into a sink on a fixed period
//! - [`WorkerPoolExecutor`]: worker pool that takes completed paths off
//!   application threads
//!
//! Both follow the same lifecycle rules:
//! - Explicit start/stop, stop is idempotent
//! - Join handles kept for spawned threads, joins bounded by a timeout
//! - Cancellation token support
//! - Sink and task failures are logged and never propagate to callers

pub mod batch_flusher;
pub mod error;
pub mod executor;

pub use batch_flusher::{
    BatchBuffer, BatchFlusher, BatchSink, BatchSource, FlusherState, FlusherStats,
    FlusherStatsSnapshot, Stoppable,
};
pub use error::{FlusherError, FlusherResult};
pub use executor::WorkerPoolExecutor;

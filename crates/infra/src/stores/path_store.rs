//! Path tracking stores
//!
//! [`InMemoryPathTrackingStore`] keeps every path and answers queries;
//! [`BatchPathTrackingStore`] buffers entries and hands them to an exporter
//! once per period.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracepulse_core::{PathTrackingQuery, PathTrackingStore};
use tracepulse_domain::{PathCallInformation, PathTrackingEntry, Result};
use tracing::debug;

use crate::scheduling::{
    BatchBuffer, BatchFlusher, BatchSink, FlusherResult, FlusherStatsSnapshot, Stoppable,
};

/// Entries grouped by tracking id, in arrival order.
#[derive(Debug, Default)]
pub struct InMemoryPathTrackingStore {
    paths: DashMap<String, Vec<PathTrackingEntry>>,
}

impl InMemoryPathTrackingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct paths held.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl PathTrackingStore for InMemoryPathTrackingStore {
    fn store(&self, entry: PathTrackingEntry) -> Result<()> {
        self.paths.entry(entry.tracking_id.clone()).or_default().push(entry);
        Ok(())
    }

    fn store_batch(&self, entries: Vec<PathTrackingEntry>) -> Result<()> {
        for entry in entries {
            self.store(entry)?;
        }
        Ok(())
    }
}

impl PathTrackingQuery for InMemoryPathTrackingStore {
    fn retrieve(&self, tracking_id: &str) -> Vec<PathTrackingEntry> {
        self.paths.get(tracking_id).map(|entries| entries.clone()).unwrap_or_default()
    }

    fn retrieve_tracking_ids(&self, start: i64, end: i64) -> Vec<PathCallInformation> {
        let mut found: Vec<PathCallInformation> = self
            .paths
            .iter()
            .filter_map(|path| {
                // The outermost call starts first, whatever order entries arrived in.
                let first = path.value().iter().map(|entry| entry.start_time).min()?;
                (first > start && first < end).then(|| PathCallInformation {
                    tracking_id: path.key().clone(),
                    start_time: first,
                })
            })
            .collect();
        found.sort();
        found
    }

    fn clear_entries(&self) {
        debug!(paths = self.paths.len(), "Clearing stored paths");
        self.paths.clear();
    }
}

impl BatchSink<PathTrackingEntry> for InMemoryPathTrackingStore {
    fn flush(&self, batch: Vec<PathTrackingEntry>) -> Result<()> {
        self.store_batch(batch)
    }
}

/// Buffers path entries and exports them through a [`BatchFlusher`].
pub struct BatchPathTrackingStore {
    buffer: Arc<BatchBuffer<PathTrackingEntry>>,
    flusher: BatchFlusher<PathTrackingEntry>,
}

impl BatchPathTrackingStore {
    pub const FLUSHER_NAME: &'static str = "path-tracking";

    /// Create an unscheduled store; call [`start`](Self::start) to export
    /// periodically.
    pub fn new(period: Duration, exporter: Arc<dyn BatchSink<PathTrackingEntry>>) -> Self {
        let buffer = Arc::new(BatchBuffer::new());
        let flusher =
            BatchFlusher::<PathTrackingEntry>::new(Self::FLUSHER_NAME, period, buffer.clone(), exporter);
        Self { buffer, flusher }
    }

    /// # Errors
    /// See [`BatchFlusher::start`].
    pub fn start(&self) -> FlusherResult<()> {
        self.flusher.start()
    }

    /// Entries waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn flush_now(&self) {
        self.flusher.flush_now();
    }
}

impl PathTrackingStore for BatchPathTrackingStore {
    fn store(&self, entry: PathTrackingEntry) -> Result<()> {
        self.buffer.push(entry);
        Ok(())
    }

    fn store_batch(&self, entries: Vec<PathTrackingEntry>) -> Result<()> {
        self.buffer.extend(entries);
        Ok(())
    }
}

impl Stoppable for BatchPathTrackingStore {
    fn name(&self) -> &str {
        Self::FLUSHER_NAME
    }

    fn stop(&self) -> FlusherResult<()> {
        self.flusher.stop()
    }

    fn stats(&self) -> FlusherStatsSnapshot {
        self.flusher.stats()
    }
}

impl std::fmt::Debug for BatchPathTrackingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchPathTrackingStore")
            .field("pending", &self.pending())
            .field("state", &self.flusher.state())
            .finish()
    }
}

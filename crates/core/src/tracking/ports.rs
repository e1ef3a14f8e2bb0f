//! Port interfaces for path tracking
//!
//! These traits define the boundaries between the tracker and the
//! infrastructure that persists, queries and schedules path data.

use tracepulse_domain::{PathCallInformation, PathTrackingEntry, Result};
use uuid::Uuid;

/// Sink for completed path entries.
pub trait PathTrackingStore: Send + Sync {
    fn store(&self, entry: PathTrackingEntry) -> Result<()>;

    /// Store every entry of one completed path.
    fn store_batch(&self, entries: Vec<PathTrackingEntry>) -> Result<()> {
        for entry in entries {
            self.store(entry)?;
        }
        Ok(())
    }
}

/// Read side of a path store.
pub trait PathTrackingQuery: Send + Sync {
    /// Entries of one path in the order they completed.
    fn retrieve(&self, tracking_id: &str) -> Vec<PathTrackingEntry>;

    /// Paths whose first entry started strictly between `start` and `end`
    /// (nanoseconds since the Unix epoch).
    fn retrieve_tracking_ids(&self, start: i64, end: i64) -> Vec<PathCallInformation>;

    fn clear_entries(&self);
}

/// Work queue used to move root-completion flushes off the calling thread.
pub trait FlushExecutor: Send + Sync {
    /// # Errors
    /// Returns an error when the executor no longer accepts work.
    fn execute(&self, task: Box<dyn FnOnce() + Send + 'static>) -> Result<()>;
}

/// Source of path tracking ids.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// Time-ordered UUID v7 ids.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn next_id(&self) -> String {
        Uuid::now_v7().to_string()
    }
}

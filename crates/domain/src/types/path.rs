//! Call-path records

use std::cmp::Ordering;
use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Information captured when an instrumented method is entered.
///
/// Created once per call site invocation and shared by `Arc`; the tracker
/// compares these by pointer to recognise re-entries of the same call.
#[derive(Debug)]
pub struct PathTrackingInformation {
    class_name: String,
    method_name: String,
    start: Instant,
    start_epoch_nanos: i64,
    level: AtomicU32,
}

impl PathTrackingInformation {
    pub fn new(class_name: impl Into<String>, method_name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            class_name: class_name.into(),
            method_name: method_name.into(),
            start: Instant::now(),
            start_epoch_nanos: Utc::now().timestamp_nanos_opt().unwrap_or_default(),
            level: AtomicU32::new(0),
        })
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    /// Wall-clock start, nanoseconds since the Unix epoch.
    pub fn start_epoch_nanos(&self) -> i64 {
        self.start_epoch_nanos
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Nesting level assigned on entry; 0 until the tracker assigns one.
    pub fn level(&self) -> u32 {
        self.level.load(AtomicOrdering::Acquire)
    }

    pub fn set_level(&self, level: u32) {
        self.level.store(level, AtomicOrdering::Release);
    }
}

/// One completed call of a path trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathTrackingEntry {
    pub tracking_id: String,
    pub node_id: String,
    pub class_name: String,
    pub method_name: String,
    /// Nanoseconds since the Unix epoch.
    pub start_time: i64,
    /// Nanoseconds.
    pub execution_time: i64,
    pub level: u32,
}

impl PathTrackingEntry {
    pub fn end_time(&self) -> i64 {
        self.start_time.saturating_add(self.execution_time)
    }
}

/// Summary of one stored path: its id and the start of its first entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathCallInformation {
    pub tracking_id: String,
    pub start_time: i64,
}

impl Ord for PathCallInformation {
    fn cmp(&self, other: &Self) -> Ordering {
        self.start_time
            .cmp(&other.start_time)
            .then_with(|| self.tracking_id.cmp(&other.tracking_id))
    }
}

impl PartialOrd for PathCallInformation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

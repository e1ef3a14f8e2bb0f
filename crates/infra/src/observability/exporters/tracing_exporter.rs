//! Exporter writing batches to the log
//!
//! Each item becomes one `info!` event carrying its JSON form in the
//! `payload` field, so any `tracing` subscriber (stdout, JSON files, a
//! collector layer) can ship it on.

use serde::Serialize;
use tracepulse_domain::{CounterSnapshot, PathTrackingEntry, Result, TracePulseError};
use tracing::info;

use crate::scheduling::BatchSink;

/// Logs counter snapshots and path entries under the `tracepulse::export` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingExporter;

impl TracingExporter {
    pub fn new() -> Self {
        Self
    }

    fn payload<T: Serialize>(item: &T) -> Result<String> {
        serde_json::to_string(item).map_err(|err| TracePulseError::Export(err.to_string()))
    }
}

impl BatchSink<CounterSnapshot> for TracingExporter {
    fn flush(&self, batch: Vec<CounterSnapshot>) -> Result<()> {
        for snapshot in &batch {
            let payload = Self::payload(snapshot)?;
            info!(
                target: "tracepulse::export",
                kind = "counter",
                role = %snapshot.role,
                name = %snapshot.name,
                marker = %snapshot.marker,
                hits = snapshot.hits,
                payload = %payload,
                "Counter snapshot"
            );
        }
        Ok(())
    }
}

impl BatchSink<PathTrackingEntry> for TracingExporter {
    fn flush(&self, batch: Vec<PathTrackingEntry>) -> Result<()> {
        for entry in &batch {
            let payload = Self::payload(entry)?;
            info!(
                target: "tracepulse::export",
                kind = "path",
                tracking_id = %entry.tracking_id,
                level = entry.level,
                execution_time_ns = entry.execution_time,
                payload = %payload,
                "Path entry"
            );
        }
        Ok(())
    }
}

//! Batch exporters
//!
//! Exporters are [`BatchSink`](crate::scheduling::BatchSink) backends that
//! flushers hand counter snapshots and path entries to.

pub mod tracing_exporter;

pub use tracing_exporter::TracingExporter;

//! Store adapters implementing the core ports
//!
//! - In-memory gauge series for one node and for a collector
//! - In-memory and batching path tracking stores
//! - Batch sources reading counters and their derived gauges

pub mod collector_gauge_store;
pub mod gauge_store;
pub mod path_store;
pub mod sources;

pub use collector_gauge_store::InMemoryCollectorGaugeStore;
pub use gauge_store::InMemoryGaugeDataStore;
pub use path_store::{BatchPathTrackingStore, InMemoryPathTrackingStore};
pub use sources::{CounterGaugeSource, CounterSnapshotSource};

//! # TracePulse Core
//!
//! Measurement engine - no infrastructure dependencies.
//!
//! This crate contains:
//! - Concurrent counters, the local registry and the collector aggregator
//! - Counter-derived gauges
//! - The thread-scoped call-path tracker and its listener chain
//! - Port interfaces (traits) for stores, executors and id generation
//!
//! ## Architecture Principles
//! - Only depends on `tracepulse-domain`
//! - No scheduling, I/O or logging setup
//! - All external collaborators via traits

pub mod counters;
pub mod gauges;
pub mod guard;
pub mod tracking;

pub use counters::{
    AggregatedCounter, CollectorCounterStore, CollectorRegistry, Counter, CounterDataStore,
    CounterRegistry, CounterView, Stopwatch,
};
pub use gauges::{CollectorGaugeDataStore, CounterGauge, GaugeDataStore};
pub use tracking::{
    CallReference, FlushExecutor, IdGenerator, PathContext, PathTracker, PathTrackingListener,
    PathTrackingQuery, PathTrackingStore, StoreMode, TrackedCall, UuidIdGenerator,
};

//! Counters, the local registry and the collector-side aggregator

pub mod collector;
pub mod counter;
pub mod ports;
pub mod registry;

pub use collector::{AggregatedCounter, CollectorRegistry};
pub use counter::{Counter, CounterView, Stopwatch};
pub use ports::{CollectorCounterStore, CounterDataStore};
pub use registry::CounterRegistry;

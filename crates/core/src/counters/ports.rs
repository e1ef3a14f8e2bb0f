//! Port interfaces for counter storage
//!
//! The local registry implements these in memory; network-backed stores
//! implement them to push counters to a remote collector.

use std::sync::Arc;

use tracepulse_domain::{Key, OnlineStatistic};

use super::collector::AggregatedCounter;
use super::counter::Counter;

/// Storage of one counter per key.
pub trait CounterDataStore: Send + Sync {
    /// Existing counter for `key`, or a new one. Exactly one counter ever
    /// exists per key.
    fn get_or_create_counter(&self, key: &Key) -> Arc<Counter>;

    fn add_to_counter(&self, counter: &Counter, delta: f64) {
        counter.add(delta);
    }

    fn counters(&self) -> Vec<Arc<Counter>>;

    fn clear_counters(&self);
}

/// Storage of one counter per (key, reporting node).
pub trait CollectorCounterStore: Send + Sync {
    fn get_or_create_marker_counter(&self, key: &Key, marker: &str) -> Arc<Counter>;

    /// Merged view across every node that reported `key`.
    fn get_or_create_counter(&self, key: &Key) -> AggregatedCounter;

    /// Replace a node's counter state with a received statistic.
    fn update(&self, key: &Key, marker: &str, statistic: OnlineStatistic, concurrency: i32);

    fn markers(&self) -> Vec<String>;

    fn clear_counters(&self);
}

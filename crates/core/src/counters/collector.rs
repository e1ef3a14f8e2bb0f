//! Collector-side counters for multi-node deployments
//!
//! Every reporting node (marker) gets its own counter per key. Reading a key
//! without a marker produces an [`AggregatedCounter`] that merges the
//! statistics of all nodes on demand.

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracepulse_domain::{CounterSnapshot, Key, OnlineStatistic, Result, Role, TracePulseError, Unit};
use tracing::{debug, instrument};

use super::counter::{Counter, CounterView};
use super::ports::CollectorCounterStore;

type MarkerCounters = DashMap<String, Arc<Counter>>;

/// Read-only merged view of one key across nodes.
///
/// Holds the per-node counters, not copies: every getter reads the current
/// state. Each constituent is locked only while its own statistic is copied
/// and the merge happens outside any lock.
#[derive(Clone)]
pub struct AggregatedCounter {
    key: Key,
    counters: Arc<MarkerCounters>,
}

impl AggregatedCounter {
    fn new(key: Key, counters: Arc<MarkerCounters>) -> Self {
        Self { key, counters }
    }

    /// Markers contributing to this view.
    pub fn markers(&self) -> Vec<String> {
        self.counters.iter().map(|entry| entry.key().clone()).collect()
    }

    fn constituents(&self) -> Vec<Arc<Counter>> {
        self.counters.iter().map(|entry| Arc::clone(entry.value())).collect()
    }
}

impl CounterView for AggregatedCounter {
    fn key(&self) -> &Key {
        &self.key
    }

    fn statistic(&self) -> OnlineStatistic {
        let parts: Vec<OnlineStatistic> =
            self.constituents().iter().map(|counter| counter.statistic()).collect();
        OnlineStatistic::merged(&parts)
    }

    fn current_concurrency(&self) -> i32 {
        self.constituents().iter().map(|c| c.current_concurrency()).max().unwrap_or(0)
    }

    fn max_concurrency(&self) -> i32 {
        self.constituents().iter().map(|c| c.max_concurrency()).max().unwrap_or(0)
    }
}

impl std::fmt::Debug for AggregatedCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregatedCounter")
            .field("key", &self.key)
            .field("markers", &self.counters.len())
            .finish()
    }
}

/// Counters keyed by (key, marker).
#[derive(Default)]
pub struct CollectorRegistry {
    counters: DashMap<Key, Arc<MarkerCounters>>,
    markers: RwLock<BTreeSet<String>>,
}

impl CollectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn marker_counters(&self, key: &Key) -> Arc<MarkerCounters> {
        if let Some(existing) = self.counters.get(key) {
            return Arc::clone(existing.value());
        }
        Arc::clone(self.counters.entry(key.clone()).or_default().value())
    }

    fn remember_marker(&self, marker: &str) {
        if self.markers.read().contains(marker) {
            return;
        }
        self.markers.write().insert(marker.to_string());
    }

    /// Apply a snapshot pushed by a remote node.
    ///
    /// # Errors
    /// Returns `UnknownUnit` when the snapshot names a unit this process does
    /// not know.
    pub fn ingest(&self, snapshot: &CounterSnapshot) -> Result<()> {
        let unit = Unit::from_name(&snapshot.unit)?;
        if snapshot.marker.is_empty() {
            return Err(TracePulseError::UnsupportedValue(format!(
                "snapshot for {} has no marker",
                snapshot.name
            )));
        }
        let key = Key::new(Role::new(snapshot.role.clone(), unit), snapshot.name.clone());
        self.update(&key, &snapshot.marker, snapshot.statistic(), snapshot.concurrency);
        Ok(())
    }

    /// Counters reported by one node.
    pub fn counters_for_marker(&self, marker: &str) -> Vec<Arc<Counter>> {
        self.counters
            .iter()
            .filter_map(|entry| entry.value().get(marker).map(|c| Arc::clone(c.value())))
            .collect()
    }

    /// One merged view per known key.
    pub fn aggregated_counters(&self) -> Vec<AggregatedCounter> {
        self.counters
            .iter()
            .map(|entry| AggregatedCounter::new(entry.key().clone(), Arc::clone(entry.value())))
            .collect()
    }
}

impl CollectorCounterStore for CollectorRegistry {
    fn get_or_create_marker_counter(&self, key: &Key, marker: &str) -> Arc<Counter> {
        let per_marker = self.marker_counters(key);
        let counter = match per_marker.get(marker) {
            Some(existing) => Arc::clone(existing.value()),
            None => Arc::clone(
                per_marker
                    .entry(marker.to_string())
                    .or_insert_with(|| Arc::new(Counter::new(key.clone())))
                    .value(),
            ),
        };
        self.remember_marker(marker);
        counter
    }

    fn get_or_create_counter(&self, key: &Key) -> AggregatedCounter {
        AggregatedCounter::new(key.clone(), self.marker_counters(key))
    }

    fn update(&self, key: &Key, marker: &str, statistic: OnlineStatistic, concurrency: i32) {
        let counter = self.get_or_create_marker_counter(key, marker);
        counter.update_from(statistic, concurrency);
        debug!(key = %key, marker, hits = statistic.count(), "Counter updated from node");
    }

    fn markers(&self) -> Vec<String> {
        self.markers.read().iter().cloned().collect()
    }

    #[instrument(skip(self))]
    fn clear_counters(&self) {
        self.counters.clear();
        self.markers.write().clear();
    }
}

//! Batch sources reading live counters
//!
//! Counters and their derived gauges are not buffered: each flush tick reads
//! them directly from the registry.

use std::sync::Arc;

use chrono::Utc;
use tracepulse_core::{CounterDataStore, CounterRegistry, CounterView};
use tracepulse_domain::{CounterSnapshot, GaugeSample};
use tracing::debug;

use crate::scheduling::BatchSource;

/// Snapshots every counter of a store, stamped with this node's marker.
pub struct CounterSnapshotSource {
    store: Arc<dyn CounterDataStore>,
    marker: String,
    clear_on_collect: bool,
}

impl CounterSnapshotSource {
    pub fn new(store: Arc<dyn CounterDataStore>, marker: impl Into<String>) -> Self {
        Self { store, marker: marker.into(), clear_on_collect: false }
    }

    /// Reset each counter right after it has been snapshotted.
    pub fn clear_on_collect(mut self, clear: bool) -> Self {
        self.clear_on_collect = clear;
        self
    }
}

impl BatchSource<CounterSnapshot> for CounterSnapshotSource {
    fn drain(&self) -> Vec<CounterSnapshot> {
        let counters = self.store.counters();
        let snapshots: Vec<CounterSnapshot> = counters
            .iter()
            .filter(|counter| counter.hits() > 0 || counter.current_concurrency() > 0)
            .map(|counter| {
                let snapshot = counter.snapshot(&self.marker);
                if self.clear_on_collect {
                    counter.reset();
                }
                snapshot
            })
            .collect();
        debug!(counters = counters.len(), exported = snapshots.len(), "Collected counter snapshots");
        snapshots
    }
}

/// Samples the derived gauges of a gauged registry at the current time.
pub struct CounterGaugeSource {
    registry: Arc<CounterRegistry>,
}

impl CounterGaugeSource {
    pub fn new(registry: Arc<CounterRegistry>) -> Self {
        Self { registry }
    }
}

impl BatchSource<GaugeSample> for CounterGaugeSource {
    fn drain(&self) -> Vec<GaugeSample> {
        self.registry.sample_gauges(Utc::now().timestamp_millis())
    }
}

#[cfg(test)]
mod tests {
    use tracepulse_core::GaugeDataStore;
    use tracepulse_domain::{Key, Role};

    use super::*;
    use crate::stores::InMemoryGaugeDataStore;

    #[test]
    fn test_snapshots_skip_idle_counters() {
        let registry = Arc::new(CounterRegistry::new());
        let busy = registry.get_or_create_counter(&Key::new(Role::web(), "/busy"));
        registry.get_or_create_counter(&Key::new(Role::web(), "/idle"));
        busy.add(4.0);
        busy.add(6.0);

        let source = CounterSnapshotSource::new(registry.clone(), "node-1");
        let snapshots = source.drain();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].name, "/busy");
        assert_eq!(snapshots[0].marker, "node-1");
        assert_eq!(snapshots[0].hits, 2);

        // Without clearing, the next collect sees the same totals.
        assert_eq!(source.drain()[0].hits, 2);
    }

    #[test]
    fn test_clear_on_collect_resets_counters() {
        let registry = Arc::new(CounterRegistry::new());
        let counter = registry.get_or_create_counter(&Key::new(Role::jdbc(), "select"));
        counter.add(1.0);

        let source = CounterSnapshotSource::new(registry.clone(), "node").clear_on_collect(true);
        assert_eq!(source.drain().len(), 1);
        assert_eq!(counter.hits(), 0);
        assert!(source.drain().is_empty());
    }

    #[test]
    fn test_gauge_source_samples_derived_gauges() {
        let gauges = Arc::new(InMemoryGaugeDataStore::default());
        let registry = Arc::new(CounterRegistry::gauged(gauges.clone()));
        let counter = registry.get_or_create_counter(&Key::new(Role::web(), "/home"));
        counter.add(2.0);
        counter.add(3.0);

        let samples = CounterGaugeSource::new(registry).drain();
        assert_eq!(samples.len(), 3);
        let hits = samples.iter().find(|s| s.role.name().ends_with("-hits")).unwrap();
        assert_eq!(hits.value, 2.0);
        let sum = samples.iter().find(|s| s.role.name().ends_with("-sum")).unwrap();
        assert_eq!(sum.value, 5.0);
        assert_eq!(gauges.gauges().len(), 3);
    }
}

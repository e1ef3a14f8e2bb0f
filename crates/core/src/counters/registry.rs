//! Local counter registry

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracepulse_domain::{GaugeSample, Key};
use tracing::{debug, instrument};

use super::counter::{Counter, CounterView};
use super::ports::CounterDataStore;
use crate::gauges::{CounterGauge, GaugeDataStore, DERIVED_METRICS};

/// Thread-safe map from key to counter.
///
/// First access to a key inserts through the map's entry API, so concurrent
/// creators of the same key all receive the same instance while other keys
/// stay readable.
pub struct CounterRegistry {
    counters: DashMap<Key, Arc<Counter>>,
    gauge_store: Option<Arc<dyn GaugeDataStore>>,
    gauges: DashMap<Key, Vec<CounterGauge>>,
}

impl Default for CounterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterRegistry {
    pub fn new() -> Self {
        Self { counters: DashMap::new(), gauge_store: None, gauges: DashMap::new() }
    }

    /// Registry that derives sum/max/hits gauges for every new counter and
    /// registers them in `store`.
    pub fn gauged(store: Arc<dyn GaugeDataStore>) -> Self {
        Self { counters: DashMap::new(), gauge_store: Some(store), gauges: DashMap::new() }
    }

    pub fn is_gauged(&self) -> bool {
        self.gauge_store.is_some()
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    pub fn find(&self, key: &Key) -> Option<Arc<Counter>> {
        self.counters.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Every derived gauge currently registered.
    pub fn counter_gauges(&self) -> Vec<CounterGauge> {
        self.gauges.iter().flat_map(|entry| entry.value().clone()).collect()
    }

    /// Sample every derived gauge at `timestamp` (ms since epoch).
    pub fn sample_gauges(&self, timestamp: i64) -> Vec<GaugeSample> {
        self.gauges
            .iter()
            .flat_map(|entry| {
                entry.value().iter().map(|gauge| gauge.sample(timestamp)).collect::<Vec<_>>()
            })
            .collect()
    }

    fn register_gauges(&self, counter: &Arc<Counter>) {
        let Some(store) = &self.gauge_store else {
            return;
        };
        let gauges: Vec<CounterGauge> = DERIVED_METRICS
            .iter()
            .map(|metric| CounterGauge::new(Arc::clone(counter), *metric))
            .collect();
        for gauge in &gauges {
            store.create_or_noop_gauge(gauge.role());
        }
        debug!(key = %counter.key(), gauges = gauges.len(), "Registered counter gauges");
        self.gauges.insert(counter.key().clone(), gauges);
    }
}

impl CounterDataStore for CounterRegistry {
    fn get_or_create_counter(&self, key: &Key) -> Arc<Counter> {
        if let Some(existing) = self.counters.get(key) {
            return Arc::clone(existing.value());
        }

        let created = match self.counters.entry(key.clone()) {
            Entry::Occupied(entry) => return Arc::clone(entry.get()),
            Entry::Vacant(entry) => {
                Arc::clone(entry.insert(Arc::new(Counter::new(key.clone()))).value())
            }
        };
        // Outside the shard lock: the gauge store is an external component.
        self.register_gauges(&created);
        created
    }

    fn counters(&self) -> Vec<Arc<Counter>> {
        self.counters.iter().map(|entry| Arc::clone(entry.value())).collect()
    }

    #[instrument(skip(self), fields(counters = self.counters.len()))]
    fn clear_counters(&self) {
        if let Some(store) = &self.gauge_store {
            for entry in self.gauges.iter() {
                for gauge in entry.value() {
                    store.gauge_stopped(gauge.role());
                }
            }
        }
        self.gauges.clear();
        self.counters.clear();
        debug!("Counters cleared");
    }
}

//! Gauge series received from several reporting nodes

use std::collections::{BTreeMap, BTreeSet};

use dashmap::DashMap;
use parking_lot::RwLock;
use tracepulse_core::{CollectorGaugeDataStore, GaugeDataStore};
use tracepulse_domain::constants::DEFAULT_GAUGE_MAX_SIZE;
use tracepulse_domain::{Role, TimeRange};

use super::gauge_store::InMemoryGaugeDataStore;

/// One capped series per (role, marker).
#[derive(Debug)]
pub struct InMemoryCollectorGaugeStore {
    by_marker: DashMap<String, InMemoryGaugeDataStore>,
    markers: RwLock<BTreeSet<String>>,
    max_size: usize,
}

impl Default for InMemoryCollectorGaugeStore {
    fn default() -> Self {
        Self::new(DEFAULT_GAUGE_MAX_SIZE)
    }
}

impl InMemoryCollectorGaugeStore {
    pub fn new(max_size: usize) -> Self {
        Self { by_marker: DashMap::new(), markers: RwLock::new(BTreeSet::new()), max_size }
    }
}

impl CollectorGaugeDataStore for InMemoryCollectorGaugeStore {
    fn add_to_marker_gauge(&self, role: &Role, timestamp: i64, value: f64, marker: &str) {
        if !self.markers.read().contains(marker) {
            self.markers.write().insert(marker.to_string());
        }
        self.by_marker
            .entry(marker.to_string())
            .or_insert_with(|| InMemoryGaugeDataStore::new(self.max_size))
            .add_to_gauge(role, timestamp, value);
    }

    fn marker_gauge_values(
        &self,
        range: TimeRange,
        role: &Role,
        marker: &str,
    ) -> BTreeMap<i64, f64> {
        self.by_marker
            .get(marker)
            .map_or_else(BTreeMap::new, |store| store.gauge_values(range, role))
    }

    fn gauge_values(&self, range: TimeRange, role: &Role) -> BTreeMap<i64, f64> {
        let mut summed = BTreeMap::new();
        for store in self.by_marker.iter() {
            for (timestamp, value) in store.gauge_values(range, role) {
                *summed.entry(timestamp).or_insert(0.0) += value;
            }
        }
        summed
    }

    fn markers(&self) -> Vec<String> {
        self.markers.read().iter().cloned().collect()
    }
}

//! In-memory gauge series for a single node

use std::collections::BTreeMap;

use dashmap::DashMap;
use tracepulse_core::GaugeDataStore;
use tracepulse_domain::constants::DEFAULT_GAUGE_MAX_SIZE;
use tracepulse_domain::{GaugeSample, Result, Role, TimeRange};
use tracing::debug;

use crate::scheduling::BatchSink;

/// Time-ordered series per role, each capped at `max_size` points.
///
/// Adding to a full series evicts its oldest point first. Stopping a gauge
/// only hides it from [`find_gauge_role`](GaugeDataStore::find_gauge_role);
/// its recorded points stay queryable.
#[derive(Debug)]
pub struct InMemoryGaugeDataStore {
    series: DashMap<Role, BTreeMap<i64, f64>>,
    names: DashMap<String, Role>,
    max_size: usize,
}

impl Default for InMemoryGaugeDataStore {
    fn default() -> Self {
        Self::new(DEFAULT_GAUGE_MAX_SIZE)
    }
}

impl InMemoryGaugeDataStore {
    pub fn new(max_size: usize) -> Self {
        Self { series: DashMap::new(), names: DashMap::new(), max_size: max_size.max(1) }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Number of points currently held for `role`.
    pub fn len(&self, role: &Role) -> usize {
        self.series.get(role).map_or(0, |series| series.len())
    }
}

impl GaugeDataStore for InMemoryGaugeDataStore {
    fn create_or_noop_gauge(&self, role: &Role) {
        self.series.entry(role.clone()).or_default();
        self.names.insert(role.name().to_string(), role.clone());
    }

    fn add_to_gauge(&self, role: &Role, timestamp: i64, value: f64) {
        if value.is_nan() {
            debug!(gauge = %role, timestamp, "Skipping NaN gauge point");
            return;
        }
        let mut series = self.series.entry(role.clone()).or_insert_with(|| {
            debug!(gauge = %role, "Creating gauge series on first point");
            BTreeMap::new()
        });
        if !series.contains_key(&timestamp) {
            while series.len() >= self.max_size {
                series.pop_first();
            }
        }
        series.insert(timestamp, value);
    }

    fn gauge_values(&self, range: TimeRange, role: &Role) -> BTreeMap<i64, f64> {
        if range.start > range.end {
            return BTreeMap::new();
        }
        self.series.get(role).map_or_else(BTreeMap::new, |series| {
            series.range(range.start..=range.end).map(|(ts, value)| (*ts, *value)).collect()
        })
    }

    fn gauges(&self) -> Vec<Role> {
        let mut roles: Vec<Role> = self.series.iter().map(|entry| entry.key().clone()).collect();
        roles.sort();
        roles
    }

    fn find_gauge_role(&self, name: &str) -> Option<Role> {
        self.names.get(name).map(|role| role.value().clone())
    }

    fn gauge_stopped(&self, role: &Role) {
        self.names.remove(role.name());
    }
}

/// Gauge samples drained by a flusher land in the store.
impl BatchSink<GaugeSample> for InMemoryGaugeDataStore {
    fn flush(&self, batch: Vec<GaugeSample>) -> Result<()> {
        for sample in batch {
            self.add_to_gauge(&sample.role, sample.timestamp, sample.value);
        }
        Ok(())
    }
}

//! Port interfaces for gauge time series
//!
//! Timestamps are milliseconds since the Unix epoch.

use std::collections::BTreeMap;

use tracepulse_domain::{Role, TimeRange};

/// Storage of one time series per gauge role.
pub trait GaugeDataStore: Send + Sync {
    /// Register a series for `role`; no-op when it already exists.
    fn create_or_noop_gauge(&self, role: &Role);

    fn add_to_gauge(&self, role: &Role, timestamp: i64, value: f64);

    /// Points of `role` inside `range`, ordered by timestamp.
    fn gauge_values(&self, range: TimeRange, role: &Role) -> BTreeMap<i64, f64>;

    fn gauges(&self) -> Vec<Role>;

    fn find_gauge_role(&self, name: &str) -> Option<Role>;

    /// The series for `role` will receive no further points.
    fn gauge_stopped(&self, role: &Role);
}

/// Gauge storage fed by several reporting nodes.
pub trait CollectorGaugeDataStore: Send + Sync {
    fn add_to_marker_gauge(&self, role: &Role, timestamp: i64, value: f64, marker: &str);

    /// Points of one node's series inside `range`.
    fn marker_gauge_values(&self, range: TimeRange, role: &Role, marker: &str)
        -> BTreeMap<i64, f64>;

    /// Points of every node's series inside `range`, summed per timestamp.
    fn gauge_values(&self, range: TimeRange, role: &Role) -> BTreeMap<i64, f64>;

    fn markers(&self) -> Vec<String>;
}

//! Gauge time series and counter-derived gauges

pub mod counter_gauge;
pub mod ports;

pub use counter_gauge::{CounterGauge, DERIVED_METRICS};
pub use ports::{CollectorGaugeDataStore, GaugeDataStore};

//! Gauges derived from a counter's figures

use std::sync::Arc;

use tracepulse_domain::{GaugeSample, MetricData, Role, Unit};

use crate::counters::{Counter, CounterView};

/// Figures sampled for every counter of a gauged registry.
pub const DERIVED_METRICS: [MetricData; 3] = [MetricData::Sum, MetricData::Max, MetricData::Hits];

/// Periodically sampled view of one figure of a counter.
#[derive(Debug, Clone)]
pub struct CounterGauge {
    role: Role,
    counter: Arc<Counter>,
    metric: MetricData,
}

impl CounterGauge {
    /// Role names follow `<role>-<counter>-<metric>`.
    pub fn new(counter: Arc<Counter>, metric: MetricData) -> Self {
        let key = counter.key();
        let unit = match metric {
            MetricData::Hits | MetricData::Concurrency | MetricData::MaxConcurrency => Unit::UNARY,
            _ => key.role().unit().clone(),
        };
        let name = format!("{}-{}-{}", key.role().name(), key.name(), metric.name());
        Self { role: Role::new(name, unit), counter, metric }
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    pub fn counter(&self) -> &Arc<Counter> {
        &self.counter
    }

    /// Current value of the metric; `0.0` while the counter has no data.
    pub fn value(&self) -> f64 {
        let value = self.counter.metric(self.metric);
        if value.is_nan() {
            0.0
        } else {
            value
        }
    }

    pub fn sample(&self, timestamp: i64) -> GaugeSample {
        GaugeSample { role: self.role.clone(), timestamp, value: self.value() }
    }
}

#[cfg(test)]
mod tests {
    use tracepulse_domain::Key;

    use super::*;

    #[test]
    fn test_role_name_and_unit() {
        let counter = Arc::new(Counter::new(Key::new(Role::web(), "/home")));
        counter.add(3.0);
        counter.add(9.0);

        let sum = CounterGauge::new(Arc::clone(&counter), MetricData::Sum);
        let hits = CounterGauge::new(Arc::clone(&counter), MetricData::Hits);

        assert_eq!(sum.role().name(), "web-/home-sum");
        assert_eq!(sum.role().unit(), &Unit::NANOSECOND);
        assert_eq!(hits.role().unit(), &Unit::UNARY);
        assert_eq!(sum.value(), 12.0);
        assert_eq!(hits.sample(5).value, 2.0);
    }

    #[test]
    fn test_idle_counter_samples_zero() {
        let counter = Arc::new(Counter::new(Key::new(Role::web(), "/idle")));
        let max = CounterGauge::new(Arc::clone(&counter), MetricData::Max);

        assert!(counter.max().is_nan());
        assert_eq!(max.sample(1).value, 0.0);

        counter.add(7.0);
        counter.reset();
        assert_eq!(max.value(), 0.0);
    }
}

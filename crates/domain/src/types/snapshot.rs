//! Exported counter shape

use serde::{Deserialize, Serialize};

use super::role::Key;
use super::statistic::OnlineStatistic;

/// Point-in-time export of one counter.
///
/// Carries every field needed to rebuild the underlying statistic exactly so
/// that a collector can merge snapshots coming from different nodes. Values
/// that are undefined for an empty counter are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    pub name: String,
    pub role: String,
    pub unit: String,
    pub marker: String,
    pub hits: u64,
    pub sum: f64,
    pub mean: Option<f64>,
    pub variance: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub second_moment: f64,
    pub concurrency: i32,
    pub max_concurrency: i32,
}

fn defined(value: f64) -> Option<f64> {
    (!value.is_nan()).then_some(value)
}

impl CounterSnapshot {
    pub fn new(
        key: &Key,
        marker: impl Into<String>,
        statistic: &OnlineStatistic,
        concurrency: i32,
        max_concurrency: i32,
    ) -> Self {
        Self {
            name: key.name().to_string(),
            role: key.role().name().to_string(),
            unit: key.role().unit().name().to_string(),
            marker: marker.into(),
            hits: statistic.count(),
            sum: statistic.sum(),
            mean: defined(statistic.mean()),
            variance: defined(statistic.variance()),
            min: defined(statistic.min()),
            max: defined(statistic.max()),
            second_moment: statistic.second_moment(),
            concurrency,
            max_concurrency,
        }
    }

    /// Rebuild the statistic this snapshot was taken from.
    pub fn statistic(&self) -> OnlineStatistic {
        OnlineStatistic::from_parts(
            self.hits,
            self.mean.unwrap_or(f64::NAN),
            self.second_moment,
            self.min.unwrap_or(f64::NAN),
            self.max.unwrap_or(f64::NAN),
            self.sum,
        )
    }
}

/// One readable figure of a counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricData {
    Hits,
    Sum,
    Max,
    Min,
    Mean,
    Variance,
    StandardDeviation,
    Concurrency,
    MaxConcurrency,
}

impl MetricData {
    pub const ALL: [MetricData; 9] = [
        Self::Hits,
        Self::Sum,
        Self::Max,
        Self::Min,
        Self::Mean,
        Self::Variance,
        Self::StandardDeviation,
        Self::Concurrency,
        Self::MaxConcurrency,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Hits => "hits",
            Self::Sum => "sum",
            Self::Max => "max",
            Self::Min => "min",
            Self::Mean => "mean",
            Self::Variance => "variance",
            Self::StandardDeviation => "stddev",
            Self::Concurrency => "concurrency",
            Self::MaxConcurrency => "max_concurrency",
        }
    }

    /// Read this figure from a statistic and its concurrency gauges.
    pub fn value(&self, statistic: &OnlineStatistic, concurrency: i32, max_concurrency: i32) -> f64 {
        match self {
            Self::Hits => statistic.count() as f64,
            Self::Sum => statistic.sum(),
            Self::Max => statistic.max(),
            Self::Min => statistic.min(),
            Self::Mean => statistic.mean(),
            Self::Variance => statistic.variance(),
            Self::StandardDeviation => statistic.stddev(),
            Self::Concurrency => f64::from(concurrency),
            Self::MaxConcurrency => f64::from(max_concurrency),
        }
    }
}

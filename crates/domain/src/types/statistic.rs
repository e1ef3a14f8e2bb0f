//! Streaming summary statistics
//!
//! [`OnlineStatistic`] keeps count, sum, min, max, mean and the second
//! central moment of a stream of values. Mean and m2 are updated with
//! Welford's recurrence so long streams do not suffer the cancellation of the
//! naive sum-of-squares formula, and two partial summaries can be merged
//! exactly with the parallel-variance combination.

use serde::{Deserialize, Serialize};

/// Mergeable running summary of a stream of `f64` samples.
///
/// With no samples, mean/min/max/variance are `NaN`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OnlineStatistic {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
    sum: f64,
}

impl Default for OnlineStatistic {
    fn default() -> Self {
        Self::new()
    }
}

impl OnlineStatistic {
    pub const fn new() -> Self {
        Self { count: 0, mean: f64::NAN, m2: 0.0, min: f64::NAN, max: f64::NAN, sum: 0.0 }
    }

    /// Rebuild a statistic from exported fields.
    ///
    /// A zero `count` yields the empty statistic whatever the other values.
    pub fn from_parts(count: u64, mean: f64, m2: f64, min: f64, max: f64, sum: f64) -> Self {
        if count == 0 {
            return Self::new();
        }
        Self { count, mean, m2, min, max, sum }
    }

    /// Add one sample.
    pub fn add(&mut self, value: f64) {
        if self.count == 0 {
            self.mean = 0.0;
            self.m2 = 0.0;
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value;

        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    /// Fold `other` into this statistic as if its samples had been added here.
    pub fn merge(&mut self, other: &OnlineStatistic) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = *other;
            return;
        }

        let n_a = self.count as f64;
        let n_b = other.count as f64;
        let count = self.count + other.count;
        let n = count as f64;
        let delta = other.mean - self.mean;

        self.mean += delta * n_b / n;
        self.m2 += other.m2 + delta * delta * n_a * n_b / n;
        self.count = count;
        self.sum += other.sum;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// Combine any number of partial statistics.
    pub fn merged<'a, I>(parts: I) -> Self
    where
        I: IntoIterator<Item = &'a OnlineStatistic>,
    {
        parts.into_iter().fold(Self::new(), |mut acc, part| {
            acc.merge(part);
            acc
        })
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// Sum of squared deviations from the mean.
    pub fn second_moment(&self) -> f64 {
        self.m2
    }

    /// Population variance (`m2 / count`).
    pub fn variance(&self) -> f64 {
        if self.count == 0 {
            return f64::NAN;
        }
        // Rounding can leave m2 a hair below zero for constant streams.
        (self.m2 / self.count as f64).max(0.0)
    }

    pub fn stddev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

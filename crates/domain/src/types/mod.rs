//! Domain types and models

pub mod gauge;
pub mod path;
pub mod role;
pub mod snapshot;
pub mod statistic;
pub mod unit;

pub use gauge::{GaugeSample, TimeRange};
pub use path::{PathCallInformation, PathTrackingEntry, PathTrackingInformation};
pub use role::{Key, Role};
pub use snapshot::{CounterSnapshot, MetricData};
pub use statistic::OnlineStatistic;
pub use unit::Unit;

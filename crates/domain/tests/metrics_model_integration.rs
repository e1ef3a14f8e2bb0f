//! Integration tests for the metrics data model
//!
//! Exercises the value types the way a node and a collector use them
//! together: samples accumulate on one side, snapshots travel as JSON, and
//! statistics merge on the other side.

use tracepulse_domain::{
    Config, CounterSnapshot, Key, MetricData, OnlineStatistic, Role, TracePulseError, Unit,
};

fn accumulate(samples: &[f64]) -> OnlineStatistic {
    let mut stat = OnlineStatistic::new();
    for sample in samples {
        stat.add(*sample);
    }
    stat
}

/// Validates that snapshots carry enough to merge exactly after transport.
///
/// # Test Steps
/// 1. Two nodes accumulate latency samples for the same key
/// 2. Each serializes a snapshot to JSON
/// 3. The receiver parses both and rebuilds the statistics
/// 4. Verify the merge equals accumulating every sample in one place
#[test]
fn test_snapshots_merge_after_json_transport() {
    let key = Key::new(Role::new("http", Unit::MILLISECOND), "/orders");
    let node_samples = [vec![12.5, 30.0, 7.25, 18.0], vec![41.0, 3.5]];

    let wire: Vec<String> = node_samples
        .iter()
        .enumerate()
        .map(|(node, samples)| {
            let snapshot =
                CounterSnapshot::new(&key, format!("node-{node}"), &accumulate(samples), 0, 2);
            serde_json::to_string(&snapshot).unwrap()
        })
        .collect();

    let received: Vec<OnlineStatistic> = wire
        .iter()
        .map(|json| serde_json::from_str::<CounterSnapshot>(json).unwrap().statistic())
        .collect();
    let merged = OnlineStatistic::merged(&received);
    let direct = accumulate(&node_samples.concat());

    assert_eq!(merged.count(), direct.count());
    assert!((merged.mean() - direct.mean()).abs() < 1e-9);
    assert!((merged.variance() - direct.variance()).abs() < 1e-9);
    assert!((merged.sum() - direct.sum()).abs() < 1e-9);
    assert_eq!(merged.min(), 3.5);
    assert_eq!(merged.max(), 41.0);
}

/// Validates that an empty counter exports `None` for undefined figures and
/// rebuilds into an empty statistic.
#[test]
fn test_empty_snapshot_is_merge_identity() {
    let key = Key::new(Role::jdbc(), "select 1");
    let empty = CounterSnapshot::new(&key, "node", &OnlineStatistic::new(), 0, 0);
    let json = serde_json::to_value(&empty).unwrap();
    assert!(json["mean"].is_null());
    assert!(json["min"].is_null());

    let populated = accumulate(&[1.0, 2.0, 3.0]);
    let merged = OnlineStatistic::merged([&populated, &empty.statistic()]);
    assert_eq!(merged.count(), 3);
    assert_eq!(merged.mean(), populated.mean());
    assert_eq!(MetricData::Hits.value(&merged, 0, 0), 3.0);
}

/// Validates unit conversion within and across unit families.
#[test]
fn test_unit_families() {
    let ms = Unit::from_name("ms").unwrap();
    assert_eq!(ms.convert(2.0, &Unit::SECOND).unwrap(), 2_000.0);
    assert_eq!(Unit::KBYTE.convert(2_048.0, &Unit::BYTE).unwrap(), 2.0);
    assert_eq!(Unit::UNARY.convert(3.0, &Unit::KILO).unwrap(), 3_000.0);

    match Unit::BYTE.convert(1.0, &Unit::SECOND) {
        Err(TracePulseError::IncompatibleUnit { from, to }) => {
            assert_eq!(from, "s");
            assert_eq!(to, "b");
        }
        other => panic!("expected incompatible unit, got {other:?}"),
    }
    assert!(matches!(Unit::from_name("fortnight"), Err(TracePulseError::UnknownUnit(_))));
}

/// Validates a configuration document with every section present.
#[test]
fn test_full_config_document() {
    let config: Config = serde_json::from_str(
        r#"{
            "agent": { "node_id": "api-2" },
            "counter": { "gauged": true, "gauge_period_ms": 500, "period_ms": 10000, "clear_on_collect": true },
            "gauge": { "max_size": 20 },
            "path_tracking": { "store_enabled": false, "single_store": true, "use_executors": true, "executors": 3, "period_ms": 2000 },
            "logging": { "level": "debug", "json": true }
        }"#,
    )
    .unwrap();

    config.validate().unwrap();
    assert_eq!(config.counter.gauge_period().as_millis(), 500);
    assert_eq!(config.path_tracking.period().as_secs(), 2);
    assert!(!config.path_tracking.store_enabled);
}

//! Integration tests for the measurement engine
//!
//! Exercises counters, the collector aggregator and the path tracker together
//! from several application threads.

use std::sync::{Arc, Barrier};
use std::thread;

use parking_lot::Mutex;
use tracepulse_core::{
    CallReference, CollectorCounterStore, CollectorRegistry, CounterDataStore, CounterRegistry,
    CounterView, PathContext, PathTracker, PathTrackingListener, PathTrackingStore,
};
use tracepulse_domain::{Key, OnlineStatistic, PathTrackingEntry, Result, Role};

#[derive(Default)]
struct CollectingStore {
    paths: Mutex<Vec<Vec<PathTrackingEntry>>>,
}

impl PathTrackingStore for CollectingStore {
    fn store(&self, entry: PathTrackingEntry) -> Result<()> {
        self.paths.lock().push(vec![entry]);
        Ok(())
    }

    fn store_batch(&self, entries: Vec<PathTrackingEntry>) -> Result<()> {
        self.paths.lock().push(entries);
        Ok(())
    }
}

#[derive(Default)]
struct PathCounter {
    started: Mutex<usize>,
    ended: Mutex<usize>,
}

impl PathTrackingListener for PathCounter {
    fn priority(&self) -> Option<i32> {
        Some(0)
    }

    fn start_path(&self, _context: &PathContext) -> anyhow::Result<()> {
        *self.started.lock() += 1;
        Ok(())
    }

    fn end_path(&self, _context: &PathContext) -> anyhow::Result<()> {
        *self.ended.lock() += 1;
        Ok(())
    }
}

/// Validates that concurrent application threads each build their own paths.
///
/// # Test Steps
/// 1. Share one tracker between 8 threads
/// 2. Each thread runs 25 outer calls, each with two nested inner calls
/// 3. Verify one stored path per outer call with three entries each
/// 4. Confirm listeners saw exactly one start and one end per path
#[test]
fn test_concurrent_threads_build_isolated_paths() {
    let store = Arc::new(CollectingStore::default());
    let listener = Arc::new(PathCounter::default());
    let as_listener: Arc<dyn PathTrackingListener> = listener.clone();
    let tracker = Arc::new(PathTracker::new("node", store.clone()).with_listeners(vec![as_listener]));
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let tracker = Arc::clone(&tracker);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for call in 0..25 {
                    let service = format!("Service{worker}");
                    tracker.track(&service, "handle", CallReference::fresh(), || {
                        tracker.track("Repository", "load", CallReference::fresh(), || call);
                        tracker.track("Repository", "save", CallReference::fresh(), || call);
                    });
                }
                assert!(!tracker.is_tracking());
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let paths = store.paths.lock();
    assert_eq!(paths.len(), 200);
    for path in paths.iter() {
        assert_eq!(path.len(), 3);
        assert!(path.iter().all(|e| e.tracking_id == path[0].tracking_id));
        let levels: Vec<_> = path.iter().map(|e| e.level).collect();
        assert_eq!(levels, [2, 2, 1]);
        assert!(path[2].class_name.starts_with("Service"));
    }
    assert_eq!(*listener.started.lock(), 200);
    assert_eq!(*listener.ended.lock(), 200);
}

/// Validates counters and stopwatches under concurrent load.
///
/// # Test Steps
/// 1. 8 threads time 100 calls each on the same key through the registry
/// 2. Verify hits, in-flight concurrency back at zero and a positive max
#[test]
fn test_stopwatches_from_many_threads() {
    let registry = Arc::new(CounterRegistry::new());
    let key = Key::new(Role::performances(), "Service.handle");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let key = key.clone();
            thread::spawn(move || {
                let counter = registry.get_or_create_counter(&key);
                for _ in 0..100 {
                    let watch = counter.start_stopwatch();
                    std::hint::black_box(0u64);
                    watch.stop().unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let counter = registry.get_or_create_counter(&key);
    assert_eq!(counter.hits(), 800);
    assert_eq!(counter.current_concurrency(), 0);
    assert!(counter.max_concurrency() >= 1);
    assert!(counter.min() >= 0.0);
}

/// Validates the node-to-collector export path end to end.
///
/// # Test Steps
/// 1. Two nodes accumulate samples in their own registries
/// 2. Each exports snapshots stamped with its node id
/// 3. The collector ingests them and merges on read
/// 4. Verify the merge equals accumulating every sample in one place
#[test]
fn test_node_snapshots_merge_on_collector() {
    let key = Key::new(Role::web(), "/checkout");
    let node_samples = [vec![12.0, 15.5, 9.0, 30.25], vec![11.0, 44.0], vec![7.5]];

    let collector = CollectorRegistry::new();
    let mut everything = OnlineStatistic::new();
    for (node, samples) in node_samples.iter().enumerate() {
        let registry = CounterRegistry::new();
        let counter = registry.get_or_create_counter(&key);
        for sample in samples {
            counter.add(*sample);
            everything.add(*sample);
        }
        for counter in registry.counters() {
            collector.ingest(&counter.snapshot(&format!("node-{node}"))).unwrap();
        }
    }

    let merged = collector.get_or_create_counter(&key);
    assert_eq!(collector.markers().len(), 3);
    assert_eq!(merged.hits(), everything.count());
    assert!((merged.mean() - everything.mean()).abs() < 1e-9);
    assert!((merged.variance() - everything.variance()).abs() < 1e-9);
    assert_eq!(merged.min(), everything.min());
    assert_eq!(merged.max(), everything.max());
}

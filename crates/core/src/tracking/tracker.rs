//! Call-path tracker
//!
//! Reconstructs the tree of instrumented calls made by one thread. The
//! outermost call opens a path; every call inside it gets the next nesting
//! level and produces one [`PathTrackingEntry`] when it returns. When the
//! outermost call itself returns, the buffered entries are handed to the
//! store in one batch and the thread's path is discarded.
//!
//! ## Store modes
//! - `Buffered`: one store write per completed path
//! - `Single`: one store write per completed call
//! - `Disabled`: entries only reach listeners

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracepulse_domain::{PathTrackingEntry, PathTrackingInformation};
use tracing::{debug, error, warn};

use super::context::{self, CallReference, PathContext};
use super::listener::{ListenerChain, PathTrackingListener};
use super::ports::{FlushExecutor, IdGenerator, PathTrackingStore, UuidIdGenerator};
use crate::guard::catch_panic;

static NEXT_TRACKER_ID: AtomicU64 = AtomicU64::new(1);

/// How completed entries reach the path store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreMode {
    #[default]
    Buffered,
    Single,
    Disabled,
}

/// Thread-scoped call-path recorder.
pub struct PathTracker {
    id: u64,
    node_id: String,
    store: Option<Arc<dyn PathTrackingStore>>,
    mode: StoreMode,
    executor: Option<Arc<dyn FlushExecutor>>,
    listeners: ListenerChain,
    ids: Arc<dyn IdGenerator>,
}

impl PathTracker {
    /// Create a tracker writing completed paths to `store`.
    pub fn new(node_id: impl Into<String>, store: Arc<dyn PathTrackingStore>) -> Self {
        Self {
            id: NEXT_TRACKER_ID.fetch_add(1, Ordering::Relaxed),
            node_id: node_id.into(),
            store: Some(store),
            mode: StoreMode::Buffered,
            executor: None,
            listeners: ListenerChain::default(),
            ids: Arc::new(UuidIdGenerator),
        }
    }

    /// Create a tracker that only notifies listeners.
    pub fn without_store(node_id: impl Into<String>) -> Self {
        Self {
            id: NEXT_TRACKER_ID.fetch_add(1, Ordering::Relaxed),
            node_id: node_id.into(),
            store: None,
            mode: StoreMode::Disabled,
            executor: None,
            listeners: ListenerChain::default(),
            ids: Arc::new(UuidIdGenerator),
        }
    }

    pub fn with_mode(mut self, mode: StoreMode) -> Self {
        self.mode = if self.store.is_some() { mode } else { StoreMode::Disabled };
        self
    }

    /// Run root-completion flushes on `executor` instead of the calling
    /// thread.
    pub fn with_executor(mut self, executor: Arc<dyn FlushExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn with_listeners(mut self, listeners: Vec<Arc<dyn PathTrackingListener>>) -> Self {
        self.listeners = ListenerChain::new(listeners);
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn mode(&self) -> StoreMode {
        self.mode
    }

    pub fn listeners(&self) -> &ListenerChain {
        &self.listeners
    }

    /// Whether the calling thread is inside a path of this tracker.
    pub fn is_tracking(&self) -> bool {
        context::is_active(self.id)
    }

    /// Record entry into an instrumented call.
    pub fn start(
        &self,
        info: Arc<PathTrackingInformation>,
        reference: CallReference,
    ) -> TrackedCall<'_> {
        let mut context =
            context::take(self.id).unwrap_or_else(|| PathContext::new(self.ids.next_id()));

        let mut level = 0;
        if !context.has_started() {
            level = context.increment_level();
            info.set_level(level);
            context.begin(&info, reference);
        } else if !context.is_start(&info) {
            level = context.increment_level();
            info.set_level(level);
        }

        if level == 1 {
            self.listeners.start_path(&context);
        }
        context::put(self.id, context);
        self.listeners.enter_method(&info);

        TrackedCall { tracker: self, info, reference, stopped: false, _thread_bound: PhantomData }
    }

    /// Run `f` as one tracked call. The call is stopped even when `f`
    /// unwinds.
    pub fn track<R>(
        &self,
        class_name: &str,
        method_name: &str,
        reference: CallReference,
        f: impl FnOnce() -> R,
    ) -> R {
        let call = self.start(PathTrackingInformation::new(class_name, method_name), reference);
        let result = f();
        call.stop(reference);
        result
    }

    fn finish(
        &self,
        info: &Arc<PathTrackingInformation>,
        reference: CallReference,
    ) -> Option<PathTrackingEntry> {
        let execution_time = info.elapsed();
        let Some(mut context) = context::take(self.id) else {
            debug!(
                class = info.class_name(),
                method = info.method_name(),
                "Stop without an active path on this thread, ignoring"
            );
            return None;
        };

        if !context.is_start(info) {
            context.decrement_level();
        }
        self.listeners.exit_method(info);

        let entry = PathTrackingEntry {
            tracking_id: context.tracking_id().to_string(),
            node_id: self.node_id.clone(),
            class_name: info.class_name().to_string(),
            method_name: info.method_name().to_string(),
            start_time: info.start_epoch_nanos(),
            execution_time: i64::try_from(execution_time.as_nanos()).unwrap_or(i64::MAX),
            level: info.level(),
        };

        match (self.mode, &self.store) {
            (StoreMode::Single, Some(store)) => {
                persist(store.as_ref(), vec![entry.clone()], context.tracking_id());
            }
            (StoreMode::Buffered, Some(_)) => context.push(entry.clone()),
            _ => {}
        }

        if info.level() == 1 && context.is_start_reference(reference) {
            self.complete(context);
        } else {
            context::put(self.id, context);
        }
        Some(entry)
    }

    fn complete(&self, mut context: PathContext) {
        if let (StoreMode::Buffered, Some(store)) = (self.mode, &self.store) {
            let entries = if self.listeners.is_empty() {
                context.take_entries()
            } else {
                context.entries().to_vec()
            };
            self.flush(store, entries, context.tracking_id());
        }
        self.listeners.end_path(&context);
    }

    fn flush(&self, store: &Arc<dyn PathTrackingStore>, entries: Vec<PathTrackingEntry>, id: &str) {
        if entries.is_empty() {
            return;
        }
        let Some(executor) = &self.executor else {
            persist(store.as_ref(), entries, id);
            return;
        };

        let store = Arc::clone(store);
        let tracking_id = id.to_string();
        let count = entries.len();
        let task = Box::new(move || persist(store.as_ref(), entries, &tracking_id));
        if let Err(err) = executor.execute(task) {
            warn!(
                tracking_id = id,
                entries = count,
                error = %err,
                "Path flush rejected, dropping path"
            );
        }
    }
}

fn persist(store: &dyn PathTrackingStore, entries: Vec<PathTrackingEntry>, tracking_id: &str) {
    let count = entries.len();
    match catch_panic(|| store.store_batch(entries)) {
        Ok(Ok(())) => debug!(tracking_id, entries = count, "Path entries stored"),
        Ok(Err(err)) => {
            error!(tracking_id, entries = count, error = %err, "Failed to store path entries");
        }
        Err(panic) => {
            error!(tracking_id, entries = count, panic = %panic, "Path store panicked");
        }
    }
}

impl std::fmt::Debug for PathTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathTracker")
            .field("node_id", &self.node_id)
            .field("mode", &self.mode)
            .field("executor", &self.executor.is_some())
            .field("listeners", &self.listeners)
            .finish_non_exhaustive()
    }
}

/// Handle of one started call; stop it on the thread that started it.
///
/// Dropping the handle without [`TrackedCall::stop`] stops it with the
/// reference it was started with, so an unwinding call still closes its
/// path.
#[must_use = "a tracked call must be stopped to complete its path"]
pub struct TrackedCall<'a> {
    tracker: &'a PathTracker,
    info: Arc<PathTrackingInformation>,
    reference: CallReference,
    stopped: bool,
    _thread_bound: PhantomData<*const ()>,
}

impl TrackedCall<'_> {
    pub fn info(&self) -> &Arc<PathTrackingInformation> {
        &self.info
    }

    /// Record the call's return.
    ///
    /// Returns the entry built for this call, or `None` when this thread has
    /// no path in progress.
    pub fn stop(mut self, reference: CallReference) -> Option<PathTrackingEntry> {
        self.stopped = true;
        self.tracker.finish(&self.info, reference)
    }
}

impl Drop for TrackedCall<'_> {
    fn drop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.tracker.finish(&self.info, self.reference);
        }
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use tracepulse_domain::{Result, TracePulseError};

    use super::*;

    #[derive(Default)]
    struct MemoryStore {
        batches: Mutex<Vec<Vec<PathTrackingEntry>>>,
    }

    impl PathTrackingStore for MemoryStore {
        fn store(&self, entry: PathTrackingEntry) -> Result<()> {
            self.batches.lock().push(vec![entry]);
            Ok(())
        }

        fn store_batch(&self, entries: Vec<PathTrackingEntry>) -> Result<()> {
            self.batches.lock().push(entries);
            Ok(())
        }
    }

    struct BrokenStore;

    impl PathTrackingStore for BrokenStore {
        fn store(&self, _entry: PathTrackingEntry) -> Result<()> {
            Err(TracePulseError::Store("disk full".into()))
        }
    }

    #[derive(Default)]
    struct Events {
        log: Mutex<Vec<String>>,
    }

    impl PathTrackingListener for Events {
        fn start_path(&self, context: &PathContext) -> anyhow::Result<()> {
            self.log.lock().push(format!("start:{}", context.level()));
            Ok(())
        }

        fn enter_method(&self, info: &PathTrackingInformation) -> anyhow::Result<()> {
            self.log.lock().push(format!("enter:{}", info.method_name()));
            Ok(())
        }

        fn exit_method(&self, info: &PathTrackingInformation) -> anyhow::Result<()> {
            self.log.lock().push(format!("exit:{}", info.method_name()));
            Ok(())
        }

        fn end_path(&self, context: &PathContext) -> anyhow::Result<()> {
            self.log.lock().push(format!("end:{}", context.entries().len()));
            Ok(())
        }
    }

    fn tracker(store: &Arc<MemoryStore>) -> PathTracker {
        PathTracker::new("node-1", store.clone())
    }

    #[test]
    fn test_nested_calls_get_levels() {
        let store = Arc::new(MemoryStore::default());
        let tracker = tracker(&store);
        let outer_ref = CallReference::fresh();
        let inner_ref = CallReference::fresh();

        let outer = tracker.start(PathTrackingInformation::new("A", "run"), outer_ref);
        let inner = tracker.start(PathTrackingInformation::new("B", "run"), inner_ref);
        let inner_entry = inner.stop(inner_ref).unwrap();
        assert!(tracker.is_tracking());
        let outer_entry = outer.stop(outer_ref).unwrap();

        assert_eq!(inner_entry.level, 2);
        assert_eq!(outer_entry.level, 1);
        assert_eq!(inner_entry.tracking_id, outer_entry.tracking_id);
        assert_eq!(outer_entry.node_id, "node-1");
        assert!(!tracker.is_tracking());

        let batches = store.batches.lock();
        assert_eq!(batches.len(), 1);
        let classes: Vec<_> = batches[0].iter().map(|e| e.class_name.as_str()).collect();
        assert_eq!(classes, ["B", "A"]);
    }

    #[test]
    fn test_each_outer_call_flushes_its_own_path() {
        let store = Arc::new(MemoryStore::default());
        let tracker = tracker(&store);

        for _ in 0..2 {
            let foo = CallReference::fresh();
            tracker.track("Foo", "bar", foo, || {
                tracker.track("Foo", "baz", CallReference::fresh(), || ());
            });
        }

        let batches = store.batches.lock();
        assert_eq!(batches.len(), 2);
        for batch in batches.iter() {
            let levels: Vec<_> = batch.iter().map(|e| e.level).collect();
            assert_eq!(levels, [2, 1]);
        }
        assert_ne!(batches[0][0].tracking_id, batches[1][0].tracking_id);
    }

    #[test]
    fn test_sequential_inner_calls_share_one_flush() {
        let store = Arc::new(MemoryStore::default());
        let tracker = tracker(&store);

        tracker.track("Foo", "bar", CallReference::fresh(), || {
            tracker.track("Foo", "baz", CallReference::fresh(), || ());
            tracker.track("Foo", "baz", CallReference::fresh(), || ());
        });

        let batches = store.batches.lock();
        assert_eq!(batches.len(), 1);
        let levels: Vec<_> = batches[0].iter().map(|e| e.level).collect();
        assert_eq!(levels, [2, 2, 1]);
    }

    #[test]
    fn test_reentry_with_same_information_keeps_level() {
        let store = Arc::new(MemoryStore::default());
        let tracker = tracker(&store);
        let info = PathTrackingInformation::new("Foo", "recurse");
        let outer_ref = CallReference::fresh();
        let inner_ref = CallReference::fresh();

        let outer = tracker.start(Arc::clone(&info), outer_ref);
        let inner = tracker.start(Arc::clone(&info), inner_ref);
        let inner_entry = inner.stop(inner_ref).unwrap();
        // Same level as the root but not the root reference: path stays open.
        assert_eq!(inner_entry.level, 1);
        assert!(tracker.is_tracking());

        outer.stop(outer_ref).unwrap();
        assert!(!tracker.is_tracking());
        assert_eq!(store.batches.lock()[0].len(), 2);
    }

    #[test]
    fn test_stop_after_path_closed_is_noop() {
        let store = Arc::new(MemoryStore::default());
        let tracker = tracker(&store);
        let outer_ref = CallReference::fresh();
        let inner_ref = CallReference::fresh();

        let outer = tracker.start(PathTrackingInformation::new("A", "run"), outer_ref);
        let leaked = tracker.start(PathTrackingInformation::new("B", "run"), inner_ref);
        outer.stop(outer_ref).unwrap();

        assert!(leaked.stop(inner_ref).is_none());
        assert!(!tracker.is_tracking());
        assert_eq!(store.batches.lock().len(), 1);
    }

    #[test]
    fn test_panicking_call_still_closes_its_path() {
        let store = Arc::new(MemoryStore::default());
        let tracker = tracker(&store);

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            tracker.track("App", "handler", CallReference::fresh(), || {
                tracker.track("App", "query", CallReference::fresh(), || panic!("boom"));
            });
        }));
        assert!(outcome.is_err());
        assert!(!tracker.is_tracking());

        for _ in 0..3 {
            tracker.track("App", "next_request", CallReference::fresh(), || ());
        }

        let batches = store.batches.lock();
        assert_eq!(batches.len(), 4);
        let levels: Vec<_> = batches[0].iter().map(|e| e.level).collect();
        assert_eq!(levels, [2, 1]);
        assert!(batches[1..].iter().all(|b| b.len() == 1 && b[0].level == 1));
    }

    #[test]
    fn test_dropped_handle_stops_the_call() {
        let store = Arc::new(MemoryStore::default());
        let tracker = tracker(&store);
        let outer_ref = CallReference::fresh();

        let outer = tracker.start(PathTrackingInformation::new("A", "run"), outer_ref);
        drop(tracker.start(PathTrackingInformation::new("B", "run"), CallReference::fresh()));
        assert!(tracker.is_tracking());
        drop(outer);

        assert!(!tracker.is_tracking());
        let batches = store.batches.lock();
        let levels: Vec<_> = batches[0].iter().map(|e| e.level).collect();
        assert_eq!(levels, [2, 1]);
    }

    #[test]
    fn test_paths_are_thread_scoped() {
        let store = Arc::new(MemoryStore::default());
        let tracker = Arc::new(tracker(&store));
        let reference = CallReference::fresh();
        let call = tracker.start(PathTrackingInformation::new("Foo", "bar"), reference);

        let other = Arc::clone(&tracker);
        let seen_elsewhere = std::thread::spawn(move || other.is_tracking()).join().unwrap();
        assert!(!seen_elsewhere);

        assert!(call.stop(reference).is_some());
    }

    #[test]
    fn test_single_mode_writes_every_call() {
        let store = Arc::new(MemoryStore::default());
        let tracker = tracker(&store).with_mode(StoreMode::Single);

        tracker.track("A", "a", CallReference::fresh(), || {
            tracker.track("B", "b", CallReference::fresh(), || ());
        });

        let batches = store.batches.lock();
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| b.len() == 1));
    }

    #[test]
    fn test_disabled_mode_only_notifies_listeners() {
        let events = Arc::new(Events::default());
        let listener: Arc<dyn PathTrackingListener> = events.clone();
        let tracker = PathTracker::without_store("n").with_listeners(vec![listener]);

        tracker.track("A", "outer", CallReference::fresh(), || {
            tracker.track("B", "inner", CallReference::fresh(), || ());
        });

        assert_eq!(
            *events.log.lock(),
            ["start:1", "enter:outer", "enter:inner", "exit:inner", "exit:outer", "end:0"]
        );
    }

    #[test]
    fn test_listener_sees_buffered_entries_at_end() {
        let store = Arc::new(MemoryStore::default());
        let events = Arc::new(Events::default());
        let listener: Arc<dyn PathTrackingListener> = events.clone();
        let tracker = tracker(&store).with_listeners(vec![listener]);

        tracker.track("A", "outer", CallReference::fresh(), || {
            tracker.track("B", "inner", CallReference::fresh(), || ());
        });

        assert_eq!(events.log.lock().last().map(String::as_str), Some("end:2"));
        assert_eq!(store.batches.lock()[0].len(), 2);
    }

    #[test]
    fn test_store_failure_does_not_break_caller() {
        let tracker = PathTracker::new("n", Arc::new(BrokenStore));
        let value = tracker.track("A", "a", CallReference::fresh(), || 42);
        assert_eq!(value, 42);
        assert!(!tracker.is_tracking());
    }

    #[test]
    fn test_executor_receives_flush() {
        struct Inline {
            submitted: Mutex<usize>,
        }

        impl FlushExecutor for Inline {
            fn execute(&self, task: Box<dyn FnOnce() + Send + 'static>) -> Result<()> {
                *self.submitted.lock() += 1;
                task();
                Ok(())
            }
        }

        let store = Arc::new(MemoryStore::default());
        let executor = Arc::new(Inline { submitted: Mutex::new(0) });
        let tracker = tracker(&store).with_executor(executor.clone());

        tracker.track("A", "a", CallReference::fresh(), || ());
        assert_eq!(*executor.submitted.lock(), 1);
        assert_eq!(store.batches.lock().len(), 1);
    }

    #[test]
    fn test_trackers_do_not_share_paths() {
        let first_store = Arc::new(MemoryStore::default());
        let second_store = Arc::new(MemoryStore::default());
        let first = tracker(&first_store);
        let second = tracker(&second_store);

        first.track("A", "a", CallReference::fresh(), || {
            second.track("B", "b", CallReference::fresh(), || ());
        });

        assert_eq!(first_store.batches.lock()[0].len(), 1);
        assert_eq!(second_store.batches.lock()[0][0].level, 1);
    }
}

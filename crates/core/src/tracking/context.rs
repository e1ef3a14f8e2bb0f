//! Thread-scoped path state

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracepulse_domain::{PathTrackingEntry, PathTrackingInformation};

/// Opaque identity of one instrumented call, compared by equality only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallReference(Identity);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Identity {
    Address(usize),
    Token(u64),
}

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

impl CallReference {
    /// Identity of the object a call was made on.
    pub fn of<T: ?Sized>(target: &T) -> Self {
        Self(Identity::Address(target as *const T as *const () as usize))
    }

    /// A reference equal to no other, for calls without a receiver.
    pub fn fresh() -> Self {
        Self(Identity::Token(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed)))
    }
}

/// State of the path currently being recorded on one thread.
#[derive(Debug)]
pub struct PathContext {
    tracking_id: String,
    level: u32,
    start_information: Option<Arc<PathTrackingInformation>>,
    start_reference: Option<CallReference>,
    entries: Vec<PathTrackingEntry>,
}

impl PathContext {
    pub(crate) fn new(tracking_id: String) -> Self {
        Self {
            tracking_id,
            level: 0,
            start_information: None,
            start_reference: None,
            entries: Vec::new(),
        }
    }

    pub fn tracking_id(&self) -> &str {
        &self.tracking_id
    }

    /// Current nesting depth.
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Information of the outermost call of this path.
    pub fn start_information(&self) -> Option<&Arc<PathTrackingInformation>> {
        self.start_information.as_ref()
    }

    /// Entries buffered so far, in completion order.
    pub fn entries(&self) -> &[PathTrackingEntry] {
        &self.entries
    }

    pub(crate) fn begin(&mut self, info: &Arc<PathTrackingInformation>, reference: CallReference) {
        self.start_information = Some(Arc::clone(info));
        self.start_reference = Some(reference);
    }

    pub(crate) fn is_start(&self, info: &Arc<PathTrackingInformation>) -> bool {
        self.start_information.as_ref().is_some_and(|start| Arc::ptr_eq(start, info))
    }

    pub(crate) fn is_start_reference(&self, reference: CallReference) -> bool {
        self.start_reference == Some(reference)
    }

    pub(crate) fn has_started(&self) -> bool {
        self.start_information.is_some()
    }

    pub(crate) fn increment_level(&mut self) -> u32 {
        self.level += 1;
        self.level
    }

    pub(crate) fn decrement_level(&mut self) {
        self.level = self.level.saturating_sub(1);
    }

    pub(crate) fn push(&mut self, entry: PathTrackingEntry) {
        self.entries.push(entry);
    }

    pub(crate) fn take_entries(&mut self) -> Vec<PathTrackingEntry> {
        std::mem::take(&mut self.entries)
    }
}

thread_local! {
    // One slot per tracker so independent trackers on a thread never share
    // a path.
    static CONTEXTS: RefCell<HashMap<u64, PathContext>> = RefCell::new(HashMap::new());
}

/// Remove this thread's context for `tracker`.
///
/// The context is taken out while a tracker works on it so that listener
/// callbacks may re-enter the tracker without a live borrow.
pub(crate) fn take(tracker: u64) -> Option<PathContext> {
    CONTEXTS.with(|contexts| contexts.borrow_mut().remove(&tracker))
}

pub(crate) fn put(tracker: u64, context: PathContext) {
    CONTEXTS.with(|contexts| {
        contexts.borrow_mut().insert(tracker, context);
    });
}

pub(crate) fn is_active(tracker: u64) -> bool {
    CONTEXTS.with(|contexts| contexts.borrow().contains_key(&tracker))
}

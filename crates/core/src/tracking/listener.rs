//! Path tracking listeners and their fixed notification order

use std::sync::Arc;

use tracepulse_domain::PathTrackingInformation;
use tracing::{error, warn};

use super::context::PathContext;
use crate::guard::catch_panic;

/// Observer of path tracking events.
///
/// Every callback defaults to a no-op. Errors and panics are logged by the
/// tracker and never reach the instrumented call.
pub trait PathTrackingListener: Send + Sync {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Lower priorities run first; listeners without one run last.
    fn priority(&self) -> Option<i32> {
        None
    }

    fn start_path(&self, _context: &PathContext) -> anyhow::Result<()> {
        Ok(())
    }

    fn enter_method(&self, _info: &PathTrackingInformation) -> anyhow::Result<()> {
        Ok(())
    }

    fn exit_method(&self, _info: &PathTrackingInformation) -> anyhow::Result<()> {
        Ok(())
    }

    fn end_path(&self, _context: &PathContext) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Listeners sorted once by ascending priority.
#[derive(Clone, Default)]
pub struct ListenerChain {
    listeners: Vec<Arc<dyn PathTrackingListener>>,
}

impl ListenerChain {
    pub fn new(mut listeners: Vec<Arc<dyn PathTrackingListener>>) -> Self {
        // Stable: equal priorities keep registration order.
        listeners.sort_by_key(|listener| match listener.priority() {
            Some(priority) => (false, priority),
            None => (true, 0),
        });
        Self { listeners }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.listeners.iter().map(|listener| listener.name().to_string()).collect()
    }

    pub(crate) fn start_path(&self, context: &PathContext) {
        self.notify("start_path", |listener| listener.start_path(context));
    }

    pub(crate) fn enter_method(&self, info: &PathTrackingInformation) {
        self.notify("enter_method", |listener| listener.enter_method(info));
    }

    pub(crate) fn exit_method(&self, info: &PathTrackingInformation) {
        self.notify("exit_method", |listener| listener.exit_method(info));
    }

    pub(crate) fn end_path(&self, context: &PathContext) {
        self.notify("end_path", |listener| listener.end_path(context));
    }

    fn notify<F>(&self, event: &'static str, mut call: F)
    where
        F: FnMut(&dyn PathTrackingListener) -> anyhow::Result<()>,
    {
        for listener in &self.listeners {
            match catch_panic(|| call(listener.as_ref())) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(listener = listener.name(), event, error = %err, "Path listener failed");
                }
                Err(panic) => {
                    error!(listener = listener.name(), event, panic = %panic, "Path listener panicked");
                }
            }
        }
    }
}

impl std::fmt::Debug for ListenerChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerChain").field("listeners", &self.names()).finish()
    }
}

//! Call-path tracking

pub mod context;
pub mod listener;
pub mod ports;
pub mod tracker;

pub use context::{CallReference, PathContext};
pub use listener::{ListenerChain, PathTrackingListener};
pub use ports::{FlushExecutor, IdGenerator, PathTrackingQuery, PathTrackingStore, UuidIdGenerator};
pub use tracker::{PathTracker, StoreMode, TrackedCall};

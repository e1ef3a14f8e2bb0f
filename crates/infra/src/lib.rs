//! # TracePulse Infrastructure
//!
//! Runtime adapters for the core engine ports.
//!
//! This crate contains:
//! - Periodic batch flushers and the path-flush worker pool
//! - In-memory gauge and path tracking stores
//! - Exporters and logging initialisation
//! - Configuration loading (JSON/TOML files plus environment overrides)
//! - The [`Agent`] wiring everything with an explicit start/close lifecycle
//!
//! ## Architecture
//! - Implements traits defined in `tracepulse-core`
//! - Depends on `tracepulse-domain` and `tracepulse-core`
//! - Owns every thread the engine spawns

pub mod agent;
pub mod config;
pub mod observability;
pub mod scheduling;
pub mod stores;

pub use agent::{Agent, AgentBuilder};
pub use observability::{exporters, init_tracing};

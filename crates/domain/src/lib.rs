//! # TracePulse Domain
//!
//! Value types shared by every TracePulse crate.
//!
//! This crate contains:
//! - Units, roles and counter keys
//! - The mergeable online statistic and the counter export shape
//! - Call-path and gauge records
//! - Configuration structures, constants and the domain error type
//!
//! ## Architecture
//! - No dependencies on other TracePulse crates
//! - Only external dependencies allowed

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

pub use config::*;
pub use errors::*;
pub use types::*;

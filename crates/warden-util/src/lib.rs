//! Shared utilities for warden
//!
//! This crate provides:
//! - ID types (CategoryId, UserId, RuleId)
//! - Time utilities (mock-aware wall clock, local day/minute decomposition)
//! - The minute-of-week bitmask used for blocked time areas
//! - Error types
//! - Default paths for the config file

mod bitmask;
mod error;
mod ids;
mod paths;
mod time;

pub use bitmask::*;
pub use error::*;
pub use ids::*;
pub use paths::*;
pub use time::*;

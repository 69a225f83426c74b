//! Shared types for warden
//!
//! This crate defines the stable vocabulary between the policy core and
//! its consumers:
//! - Blocking reasons and levels
//! - Battery status reported by the host
//! - Usage counting slots
//! - Serializable evaluation report views

mod report;
mod types;

pub use report::*;
pub use types::*;

/// Current report format version
pub const API_VERSION: u32 = 1;

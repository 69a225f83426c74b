//! Host provider trait interfaces for warden
//!
//! This crate defines the interface between the policy loop and the
//! platform it runs on: where the current time, battery state and network
//! identity come from, and how a network identity is compared against the
//! fingerprints a category declares. It contains no platform code itself.

mod mock;
mod traits;

pub use mock::*;
pub use traits::*;

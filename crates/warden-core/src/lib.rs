//! Policy core for warden
//!
//! This crate decides whether the foreground app must be blocked and for how
//! long that answer stays correct:
//! - Foreground app classification ([`AppBaseHandling`])
//! - Per-category gates: battery, temporary block, network, blocked time
//!   areas, time limit rules, session durations ([`CategoryItselfHandling`])
//! - Remaining quota and session duration evaluation
//! - A cache that keeps results until the window they declare runs out
//!
//! Nothing in here performs I/O, mutates the snapshot it reads, or sleeps.
//! Callers are told the next instant at which a result may change.

mod app_handling;
mod cache;
mod category_handling;
mod engine;
mod remaining_time;
mod session_duration;

#[cfg(test)]
mod test_util;

pub use app_handling::*;
pub use cache::*;
pub use category_handling::*;
pub use engine::*;
pub use remaining_time::*;
pub use session_duration::*;

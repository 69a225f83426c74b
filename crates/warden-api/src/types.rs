//! Shared types for the warden policy core

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a foreground app is (or is not) blocked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockingReason {
    None,
    /// Battery below the category's minimum level
    BatteryLimit,
    TemporarilyBlocked,
    /// The category only allows use on specific networks
    MissingRequiredNetwork,
    /// Inside a blocked time area
    BlockedAtThisTime,
    TimeOver,
    /// Default quota exhausted, but extra time could be used later in the slot
    TimeOverExtraTimeCanBeUsedLater,
    SessionDurationLimit,
    NotificationsAreBlocked,
    /// The app has no category and there is no default category
    NotPartOfAnCategory,
}

impl BlockingReason {
    pub fn is_blocking(&self) -> bool {
        !matches!(self, BlockingReason::None)
    }

    pub fn description(&self) -> &'static str {
        match self {
            BlockingReason::None => "not blocked",
            BlockingReason::BatteryLimit => "battery level too low",
            BlockingReason::TemporarilyBlocked => "category is temporarily blocked",
            BlockingReason::MissingRequiredNetwork => "not connected to an allowed network",
            BlockingReason::BlockedAtThisTime => "blocked at this time",
            BlockingReason::TimeOver => "time limit reached",
            BlockingReason::TimeOverExtraTimeCanBeUsedLater => {
                "time limit reached, extra time can be used later"
            }
            BlockingReason::SessionDurationLimit => "session duration limit reached",
            BlockingReason::NotificationsAreBlocked => "notifications are blocked",
            BlockingReason::NotPartOfAnCategory => "app is not part of a category",
        }
    }
}

impl fmt::Display for BlockingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Granularity at which an app was matched to its category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockingLevel {
    App,
    Activity,
}

/// Battery state reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatteryStatus {
    /// Charge level in percent (0..=100)
    pub level: i32,
    pub charging: bool,
}

impl BatteryStatus {
    pub fn new(level: i32, charging: bool) -> Self {
        Self { level, charging }
    }
}

impl Default for BatteryStatus {
    /// A device without a battery reports itself as full and charging.
    fn default() -> Self {
        Self {
            level: 100,
            charging: true,
        }
    }
}

/// A rule shape against which session duration usage is accumulated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionDurationLimitSlot {
    pub start_minute_of_day: u16,
    pub end_minute_of_day: u16,
    pub max_session_duration: i64,
    pub session_pause_duration: i64,
}

/// A partial-day slot that needs its own used-time row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AdditionalCountingSlot {
    pub start_minute_of_day: u16,
    pub end_minute_of_day: u16,
}

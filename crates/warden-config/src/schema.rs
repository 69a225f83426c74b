//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Service loop settings
    #[serde(default)]
    pub service: RawServiceConfig,

    /// Settings of the supervised device
    #[serde(default)]
    pub device: RawDeviceConfig,

    /// The supervised user
    pub user: RawUser,

    /// Categories with their rules and recorded usage
    #[serde(default)]
    pub categories: Vec<RawCategory>,
}

/// Service-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// Upper bound for the sleep between two evaluations (default: 60)
    pub poll_interval_seconds: Option<u64>,
}

/// Device-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawDeviceConfig {
    /// Package name of the agent itself; always allowed
    pub own_package_name: Option<String>,

    /// Match `package:activity` assignments before app-level ones
    #[serde(default)]
    pub enable_activity_level_blocking: bool,

    /// Packages allowed until the next config change
    #[serde(default)]
    pub temporarily_allowed_apps: Vec<String>,

    /// Packages never blocked (launcher, system shell, ...)
    #[serde(default)]
    pub ignored_apps: Vec<String>,

    /// `package:activity` pairs never blocked
    #[serde(default)]
    pub ignored_activities: Vec<String>,
}

/// Raw user definition
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawUser {
    pub id: String,

    #[serde(default)]
    pub name: String,

    /// IANA timezone name, e.g. "Europe/Berlin"
    pub timezone: String,

    /// Epoch milliseconds until which all limits are lifted
    #[serde(default)]
    pub disable_limits_until: i64,

    /// Category used for apps without an assignment
    pub category_for_not_assigned_apps: Option<String>,
}

/// Raw category definition
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawCategory {
    /// Unique stable ID
    pub id: String,

    /// Display title
    #[serde(default)]
    pub title: String,

    /// Parent category; limits of all ancestors apply too
    pub parent: Option<String>,

    /// Blocked time areas as weekly windows
    #[serde(default)]
    pub blocked_times: Vec<RawTimeWindow>,

    /// Blocked time areas as compact minute-of-week ranges ("start,end,...")
    pub blocked_minutes: Option<String>,

    /// Minimum battery level in percent while charging
    #[serde(default)]
    pub min_battery_level_while_charging: i32,

    /// Minimum battery level in percent while not charging
    #[serde(default)]
    pub min_battery_level_mobile: i32,

    #[serde(default)]
    pub temporarily_blocked: bool,

    /// Epoch milliseconds; 0 blocks until unblocked manually
    #[serde(default)]
    pub temporarily_blocked_end_time: i64,

    /// Epoch milliseconds until which limits of this category are lifted
    #[serde(default)]
    pub disable_limits_until: i64,

    /// Extra time in seconds
    #[serde(default)]
    pub extra_time_seconds: u64,

    /// Day of epoch the extra time is valid for; unset = any day
    pub extra_time_day: Option<i64>,

    #[serde(default)]
    pub block_all_notifications: bool,

    /// Time limit rules
    #[serde(default)]
    pub rules: Vec<RawRule>,

    /// Recorded usage
    #[serde(default)]
    pub used_times: Vec<RawUsedTime>,

    /// Recorded sessions
    #[serde(default)]
    pub session_durations: Vec<RawSessionDuration>,

    /// Allowed networks; empty = any network
    #[serde(default)]
    pub networks: Vec<RawNetwork>,

    /// Assigned packages, or `package:activity` pairs
    #[serde(default)]
    pub apps: Vec<String>,
}

/// Time window
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawTimeWindow {
    /// Days of week: "weekdays", "weekends", "all", or list like ["mon", "tue", "wed"]
    pub days: RawDays,

    /// Start time (HH:MM format)
    pub start: String,

    /// End time (HH:MM format), exclusive; may be before start to cross midnight
    pub end: String,
}

/// Days specification
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RawDays {
    Preset(String),
    List(Vec<String>),
}

impl Default for RawDays {
    fn default() -> Self {
        RawDays::Preset("all".into())
    }
}

/// Time limit rule
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawRule {
    /// Stable ID; generated from the category and position if absent
    pub id: Option<String>,

    #[serde(default)]
    pub days: RawDays,

    /// First minute of the slot (HH:MM)
    #[serde(default = "default_slot_start")]
    pub start: String,

    /// Last minute of the slot, inclusive (HH:MM)
    #[serde(default = "default_slot_end")]
    pub end: String,

    /// Quota in seconds; 0 blocks the slot entirely
    pub max_seconds: u64,

    #[serde(default)]
    pub apply_to_extra_time: bool,

    /// Maximum session length in seconds; 0 disables session limits
    #[serde(default)]
    pub session_duration_seconds: u64,

    /// Pause in seconds that ends a session
    #[serde(default)]
    pub session_pause_seconds: u64,
}

/// Recorded usage for one day and slot
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawUsedTime {
    pub day_of_epoch: i64,

    #[serde(default = "default_slot_start")]
    pub start: String,

    #[serde(default = "default_slot_end")]
    pub end: String,

    pub used_millis: i64,
}

/// Recorded session for one rule shape
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawSessionDuration {
    #[serde(default = "default_slot_start")]
    pub start: String,

    #[serde(default = "default_slot_end")]
    pub end: String,

    pub max_session_duration_millis: i64,

    pub session_pause_millis: i64,

    /// Epoch milliseconds of the last counted usage
    pub last_usage: i64,

    pub last_session_duration_millis: i64,
}

/// Allowed network
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawNetwork {
    pub id: String,

    /// Fingerprint compared against the current network id
    pub hashed_network_id: String,
}

fn default_slot_start() -> String {
    "00:00".to_string()
}

fn default_slot_end() -> String {
    "23:59".to_string()
}

//! Time utilities for warden
//!
//! Policy evaluation works on epoch milliseconds. Everything that depends on
//! the calendar (day of week, minute of day, day of epoch) is derived from
//! those milliseconds in the supervised user's timezone via [`LocalTime`].
//!
//! # Mock Time for Development
//!
//! In debug builds, the `WARDEN_MOCK_TIME` environment variable can be set
//! to override the system time for all time-sensitive operations. This is useful
//! for testing blocked time areas and daily quotas.
//!
//! Format: `YYYY-MM-DD HH:MM:SS` (e.g., `2025-12-25 14:30:00`)
//!
//! Example:
//! ```bash
//! WARDEN_MOCK_TIME="2025-12-25 14:30:00" wardend --once --app com.example.game
//! ```

use chrono::{DateTime, Datelike, Local, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::OnceLock;
use std::time::Duration;

use crate::{MINUTES_PER_WEEK, Result, WardenError};

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "WARDEN_MOCK_TIME";

/// Number of minutes in a day
pub const MINUTES_PER_DAY: u16 = 24 * 60;

/// Last valid minute of a day (23:59)
pub const MAX_MINUTE_OF_DAY: u16 = MINUTES_PER_DAY - 1;

/// Days between 0001-01-01 (CE day 1) and 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i64 = 719_163;

/// Cached mock time offset from the real time when the process started.
/// This allows mock time to advance naturally.
static MOCK_TIME_OFFSET: OnceLock<Option<chrono::Duration>> = OnceLock::new();

/// Initialize the mock time offset based on the environment variable.
/// Returns the offset between mock time and real time at process start.
#[allow(clippy::disallowed_methods)] // This is the internal implementation that wraps Local::now()
fn get_mock_time_offset() -> Option<chrono::Duration> {
    *MOCK_TIME_OFFSET.get_or_init(|| {
        #[cfg(debug_assertions)]
        {
            if let Ok(mock_time_str) = std::env::var(MOCK_TIME_ENV_VAR) {
                if let Ok(naive_dt) = NaiveDateTime::parse_from_str(&mock_time_str, "%Y-%m-%d %H:%M:%S") {
                    if let Some(mock_dt) = Local.from_local_datetime(&naive_dt).single() {
                        let real_now = chrono::Local::now();
                        let offset = mock_dt.signed_duration_since(real_now);
                        tracing::info!(
                            mock_time = %mock_time_str,
                            offset_secs = offset.num_seconds(),
                            "Mock time enabled"
                        );
                        return Some(offset);
                    } else {
                        tracing::warn!(
                            mock_time = %mock_time_str,
                            "Failed to convert mock time to local timezone"
                        );
                    }
                } else {
                    tracing::warn!(
                        mock_time = %mock_time_str,
                        expected_format = "%Y-%m-%d %H:%M:%S",
                        "Invalid mock time format"
                    );
                }
            }
            None
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    })
}

/// Returns whether mock time is currently active.
pub fn is_mock_time_active() -> bool {
    get_mock_time_offset().is_some()
}

/// Get the current local time, respecting mock time settings in debug builds.
#[allow(clippy::disallowed_methods)] // This is the wrapper that provides mock time support
pub fn now() -> DateTime<Local> {
    let real_now = chrono::Local::now();

    if let Some(offset) = get_mock_time_offset() {
        real_now + offset
    } else {
        real_now
    }
}

/// Current time as epoch milliseconds, respecting mock time.
pub fn now_millis() -> i64 {
    now().timestamp_millis()
}

/// Parse an IANA timezone name such as `Europe/Berlin`.
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>().map_err(|_| WardenError::timezone(name))
}

pub fn is_valid_minute_of_day(minute: u16) -> bool {
    minute <= MAX_MINUTE_OF_DAY
}

/// Format a minute of day as `H:MM`, or `???` when out of range.
pub fn format_minute_of_day(minute: u16) -> String {
    if !is_valid_minute_of_day(minute) {
        return "???".to_string();
    }

    format!("{}:{:02}", minute / 60, minute % 60)
}

/// Format epoch milliseconds in the given timezone for log output.
pub fn format_timestamp(timestamp: i64, tz: Tz) -> String {
    utc_from_millis(timestamp)
        .with_timezone(&tz)
        .format("%Y-%m-%d %H:%M:%S %Z")
        .to_string()
}

fn utc_from_millis(timestamp: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(timestamp).unwrap_or_default()
}

/// Resolve a local wall-clock time to epoch milliseconds.
///
/// Ambiguous times (DST fold) resolve to the earlier instant. Times inside a
/// DST gap are moved forward by the gap's hour.
fn local_to_millis(tz: Tz, naive: NaiveDateTime) -> i64 {
    if let Some(dt) = tz.from_local_datetime(&naive).earliest() {
        return dt.timestamp_millis();
    }

    let shifted = naive + chrono::Duration::hours(1);
    tz.from_local_datetime(&shifted)
        .earliest()
        .map(|dt| dt.timestamp_millis())
        .unwrap_or_else(|| naive.and_utc().timestamp_millis())
}

/// Like [`local_to_millis`], but an ambiguous time resolves to the first
/// instant strictly after `after`.
fn local_to_millis_after(tz: Tz, naive: NaiveDateTime, after: i64) -> i64 {
    match tz.from_local_datetime(&naive) {
        LocalResult::Ambiguous(earliest, latest) if earliest.timestamp_millis() <= after => {
            latest.timestamp_millis()
        }
        _ => local_to_millis(tz, naive),
    }
}

/// A timestamp decomposed into the calendar fields policy evaluation needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalTime {
    /// The original epoch milliseconds
    pub timestamp: i64,
    /// Local calendar date
    pub date: NaiveDate,
    /// 0 = Monday ... 6 = Sunday
    pub day_of_week: u8,
    /// Days since 1970-01-01 of the local date
    pub day_of_epoch: i64,
    /// 0..=1439
    pub minute_of_day: u16,
}

impl LocalTime {
    pub fn at(timestamp: i64, tz: Tz) -> Self {
        let local = utc_from_millis(timestamp).with_timezone(&tz);
        let date = local.date_naive();

        Self {
            timestamp,
            date,
            day_of_week: day_index(date.weekday()),
            day_of_epoch: date.num_days_from_ce() as i64 - UNIX_EPOCH_DAYS_FROM_CE,
            minute_of_day: (local.hour() * 60 + local.minute()) as u16,
        }
    }

    /// Minute of the week, 0 = Monday 00:00
    pub fn minute_of_week(&self) -> usize {
        self.day_of_week as usize * MINUTES_PER_DAY as usize + self.minute_of_day as usize
    }

    /// Day of epoch of the Monday starting this week
    pub fn first_day_of_week_as_epoch_day(&self) -> i64 {
        self.day_of_epoch - self.day_of_week as i64
    }

    /// Epoch milliseconds of the given minute of the same local day.
    ///
    /// Inside a DST fold the first occurrence after this timestamp wins.
    pub fn millis_at_minute_of_day(&self, minute: u16, tz: Tz) -> i64 {
        let time = NaiveTime::from_hms_opt((minute / 60) as u32, (minute % 60) as u32, 0)
            .unwrap_or(NaiveTime::MIN);
        local_to_millis_after(tz, self.date.and_time(time), self.timestamp)
    }

    /// Epoch milliseconds of the next local midnight.
    pub fn start_of_next_day_millis(&self, tz: Tz) -> i64 {
        match self.date.succ_opt() {
            Some(next) => local_to_millis(tz, next.and_time(NaiveTime::MIN)),
            None => i64::MAX,
        }
    }
}

/// Convert a chrono weekday into the 0 = Monday index used by day masks.
pub fn day_index(weekday: Weekday) -> u8 {
    weekday.num_days_from_monday() as u8
}

/// Wall-clock time of day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WallClock {
    pub hour: u8,
    pub minute: u8,
}

impl WallClock {
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self { hour, minute })
        } else {
            None
        }
    }

    pub fn from_minute_of_day(minute: u16) -> Option<Self> {
        if !is_valid_minute_of_day(minute) {
            return None;
        }
        Self::new((minute / 60) as u8, (minute % 60) as u8)
    }

    pub fn from_naive_time(time: NaiveTime) -> Self {
        Self {
            hour: time.hour() as u8,
            minute: time.minute() as u8,
        }
    }

    pub fn as_minute_of_day(&self) -> u16 {
        self.hour as u16 * 60 + self.minute as u16
    }
}

impl std::fmt::Display for WallClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl PartialOrd for WallClock {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for WallClock {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_minute_of_day().cmp(&other.as_minute_of_day())
    }
}

/// Days of the week mask, bit 0 = Monday
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct DaysOfWeek(u8);

impl DaysOfWeek {
    pub const MONDAY: u8 = 1 << 0;
    pub const TUESDAY: u8 = 1 << 1;
    pub const WEDNESDAY: u8 = 1 << 2;
    pub const THURSDAY: u8 = 1 << 3;
    pub const FRIDAY: u8 = 1 << 4;
    pub const SATURDAY: u8 = 1 << 5;
    pub const SUNDAY: u8 = 1 << 6;

    pub const WEEKDAYS: DaysOfWeek = DaysOfWeek(
        Self::MONDAY | Self::TUESDAY | Self::WEDNESDAY | Self::THURSDAY | Self::FRIDAY,
    );
    pub const WEEKENDS: DaysOfWeek = DaysOfWeek(Self::SATURDAY | Self::SUNDAY);
    pub const ALL_DAYS: DaysOfWeek = DaysOfWeek(0x7F);
    pub const NONE: DaysOfWeek = DaysOfWeek(0);

    pub fn new(mask: u8) -> Self {
        Self(mask & 0x7F)
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    /// Check a day by its 0 = Monday index
    pub fn contains_day(&self, day_of_week: u8) -> bool {
        day_of_week < 7 && (self.0 & (1 << day_of_week)) != 0
    }

    pub fn contains(&self, weekday: Weekday) -> bool {
        self.contains_day(day_index(weekday))
    }

    pub fn count(&self) -> u32 {
        self.0.count_ones()
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for DaysOfWeek {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// A recurring weekly time window, e.g. weekdays 20:00 - 07:00
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub days: DaysOfWeek,
    pub start: WallClock,
    pub end: WallClock,
}

impl TimeWindow {
    pub fn new(days: DaysOfWeek, start: WallClock, end: WallClock) -> Self {
        Self { days, start, end }
    }

    /// Check if the given local time falls within this window
    pub fn contains(&self, local: &LocalTime) -> bool {
        let minute = local.minute_of_week();
        self.minute_ranges_in_week()
            .iter()
            .any(|range| range.contains(&minute))
    }

    /// Minute-of-week ranges (end exclusive) covered by this window.
    ///
    /// A window crossing midnight starts on each listed day and continues
    /// into the following day; Sunday wraps to Monday.
    pub fn minute_ranges_in_week(&self) -> Vec<Range<usize>> {
        let day_len = MINUTES_PER_DAY as usize;
        let start = self.start.as_minute_of_day() as usize;
        let end = self.end.as_minute_of_day() as usize;
        let mut ranges = Vec::new();

        for day in 0..7u8 {
            if !self.days.contains_day(day) {
                continue;
            }
            let day_start = day as usize * day_len;

            if start <= end {
                if start < end {
                    ranges.push(day_start + start..day_start + end);
                }
            } else {
                ranges.push(day_start + start..day_start + day_len);
                let next_day_start = (day_start + day_len) % MINUTES_PER_WEEK;
                if end > 0 {
                    ranges.push(next_day_start..next_day_start + end);
                }
            }
        }

        ranges
    }
}

/// Helper to format durations in human-readable form
pub fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Format a millisecond amount; negative values are shown as zero.
pub fn format_millis(millis: i64) -> String {
    format_duration(Duration::from_millis(millis.max(0) as u64))
}

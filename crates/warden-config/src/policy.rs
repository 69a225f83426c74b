//! Validated snapshot structures

use crate::model::{
    CategoryApp, CategoryConfig, CategoryNetworkId, CategoryRelatedData, DEFAULT_OWN_PACKAGE_NAME,
    DeviceRelatedData, SessionDurationRecord, TimeLimitRule, UsedTimeItem, UserConfig,
    UserRelatedData,
};
use crate::schema::{
    RawCategory, RawConfig, RawDeviceConfig, RawRule, RawServiceConfig, RawSessionDuration,
    RawTimeWindow, RawUsedTime, RawUser,
};
use crate::validation::{parse_days, parse_minute_of_day, parse_time};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use warden_util::{
    CategoryId, DaysOfWeek, MAX_MINUTE_OF_DAY, MinuteOfWeekBitmask, RuleId, TimeWindow, UserId,
    WallClock, parse_timezone,
};

/// Default upper bound for the sleep between evaluations
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Validated snapshot ready for use by the policy core
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub service: ServiceConfig,
    pub device: DeviceRelatedData,
    pub user: Arc<UserRelatedData>,
}

impl Snapshot {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            service: ServiceConfig::from_raw(raw.service),
            device: convert_device(raw.device),
            user: Arc::new(convert_user(raw.user, raw.categories)),
        }
    }

    /// Get category by ID
    pub fn get_category(&self, id: &str) -> Option<&Arc<CategoryRelatedData>> {
        self.user.category(id)
    }
}

/// Service loop configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub poll_interval: Duration,
}

impl ServiceConfig {
    fn from_raw(raw: RawServiceConfig) -> Self {
        Self {
            poll_interval: raw
                .poll_interval_seconds
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_POLL_INTERVAL),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

// Conversion helpers

fn convert_device(raw: RawDeviceConfig) -> DeviceRelatedData {
    DeviceRelatedData {
        own_package_name: raw
            .own_package_name
            .unwrap_or_else(|| DEFAULT_OWN_PACKAGE_NAME.to_string()),
        enable_activity_level_blocking: raw.enable_activity_level_blocking,
        temporarily_allowed_apps: raw.temporarily_allowed_apps.into_iter().collect(),
        ignored_apps: raw.ignored_apps.into_iter().collect(),
        ignored_activities: raw.ignored_activities.into_iter().collect(),
    }
}

fn convert_user(raw: RawUser, categories: Vec<RawCategory>) -> UserRelatedData {
    let timezone = parse_timezone(&raw.timezone).unwrap_or(chrono_tz::UTC);

    let mut data = UserRelatedData::new(UserConfig {
        id: UserId::new(raw.id),
        name: raw.name,
        timezone,
        disable_limits_until: raw.disable_limits_until,
        category_for_not_assigned_apps: raw.category_for_not_assigned_apps.map(CategoryId::new),
    });

    let mut category_apps = HashMap::new();
    for raw_category in categories {
        let category_id = CategoryId::new(raw_category.id.clone());

        for package_name in &raw_category.apps {
            category_apps.insert(
                package_name.clone(),
                CategoryApp {
                    package_name: package_name.clone(),
                    category_id: category_id.clone(),
                },
            );
        }

        data.categories
            .insert(category_id, Arc::new(convert_category(raw_category)));
    }
    data.category_apps = category_apps;

    data
}

fn convert_category(raw: RawCategory) -> CategoryRelatedData {
    let id = CategoryId::new(raw.id);

    let category = CategoryConfig {
        id: id.clone(),
        title: raw.title,
        parent_category_id: raw.parent.map(CategoryId::new),
        blocked_minutes_in_week: convert_blocked_minutes(&raw.blocked_times, raw.blocked_minutes.as_deref()),
        min_battery_level_while_charging: raw.min_battery_level_while_charging,
        min_battery_level_mobile: raw.min_battery_level_mobile,
        temporarily_blocked: raw.temporarily_blocked,
        temporarily_blocked_end_time: raw.temporarily_blocked_end_time,
        disable_limits_until: raw.disable_limits_until,
        extra_time_millis: seconds_to_millis(raw.extra_time_seconds),
        extra_time_day: raw.extra_time_day,
        block_all_notifications: raw.block_all_notifications,
    };

    let rules = raw
        .rules
        .into_iter()
        .enumerate()
        .map(|(index, rule)| convert_rule(rule, &id, index))
        .collect();
    let used_times = raw
        .used_times
        .into_iter()
        .map(|used| convert_used_time(used, &id))
        .collect();
    let session_durations = raw
        .session_durations
        .into_iter()
        .map(|session| convert_session_duration(session, &id))
        .collect();
    let networks = raw
        .networks
        .into_iter()
        .map(|network| CategoryNetworkId {
            item_id: network.id,
            hashed_network_id: network.hashed_network_id,
        })
        .collect();

    CategoryRelatedData {
        category,
        rules,
        used_times,
        session_durations,
        networks,
    }
}

fn convert_blocked_minutes(windows: &[RawTimeWindow], compact: Option<&str>) -> MinuteOfWeekBitmask {
    let base = compact
        .and_then(|data| MinuteOfWeekBitmask::parse_compact(data).ok())
        .unwrap_or_default();

    let ranges = windows
        .iter()
        .map(convert_time_window)
        .flat_map(|window| window.minute_ranges_in_week());

    ranges.fold(base, |mask, range| match mask.with_range(range) {
        Ok(updated) => updated,
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring invalid blocked time range");
            mask
        }
    })
}

fn convert_time_window(raw: &RawTimeWindow) -> TimeWindow {
    let days_mask = parse_days(&raw.days).unwrap_or(0x7F);
    let (start_h, start_m) = parse_time(&raw.start).unwrap_or((0, 0));
    let (end_h, end_m) = parse_time(&raw.end).unwrap_or((0, 0));

    TimeWindow {
        days: DaysOfWeek::new(days_mask),
        start: WallClock { hour: start_h, minute: start_m },
        end: WallClock { hour: end_h, minute: end_m },
    }
}

fn convert_rule(raw: RawRule, category_id: &CategoryId, index: usize) -> TimeLimitRule {
    let (start, end) = convert_slot(&raw.start, &raw.end);

    TimeLimitRule {
        id: RuleId::new(
            raw.id
                .unwrap_or_else(|| format!("{}-rule-{}", category_id, index)),
        ),
        category_id: category_id.clone(),
        day_mask: DaysOfWeek::new(parse_days(&raw.days).unwrap_or(0x7F)),
        start_minute_of_day: start,
        end_minute_of_day: end,
        maximum_time_millis: seconds_to_millis(raw.max_seconds),
        apply_to_extra_time_usage: raw.apply_to_extra_time,
        session_duration_millis: seconds_to_millis(raw.session_duration_seconds),
        session_pause_millis: seconds_to_millis(raw.session_pause_seconds),
    }
}

fn convert_used_time(raw: RawUsedTime, category_id: &CategoryId) -> UsedTimeItem {
    let (start, end) = convert_slot(&raw.start, &raw.end);

    UsedTimeItem {
        day_of_epoch: raw.day_of_epoch,
        start_minute_of_day: start,
        end_minute_of_day: end,
        category_id: category_id.clone(),
        used_millis: raw.used_millis,
    }
}

fn convert_session_duration(raw: RawSessionDuration, category_id: &CategoryId) -> SessionDurationRecord {
    let (start, end) = convert_slot(&raw.start, &raw.end);

    SessionDurationRecord {
        category_id: category_id.clone(),
        max_session_duration: raw.max_session_duration_millis,
        session_pause_duration: raw.session_pause_millis,
        start_minute_of_day: start,
        end_minute_of_day: end,
        last_usage: raw.last_usage,
        last_session_duration: raw.last_session_duration_millis,
    }
}

fn convert_slot(start: &str, end: &str) -> (u16, u16) {
    (
        parse_minute_of_day(start).unwrap_or(0),
        parse_minute_of_day(end).unwrap_or(MAX_MINUTE_OF_DAY),
    )
}

fn seconds_to_millis(secs: u64) -> i64 {
    i64::try_from(secs)
        .ok()
        .and_then(|s| s.checked_mul(1000))
        .unwrap_or(i64::MAX)
}

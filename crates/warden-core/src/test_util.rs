//! Fixture builders shared by the unit tests

use chrono::TimeZone;
use chrono_tz::Tz;
use std::sync::Arc;
use warden_config::{
    CategoryConfig, CategoryRelatedData, TimeLimitRule, UsedTimeItem, UserConfig, UserRelatedData,
};
use warden_util::{CategoryId, DaysOfWeek, LocalTime, RuleId, UserId};

pub const TZ: Tz = chrono_tz::Europe::Berlin;

/// Local wall-clock time in [`TZ`] as epoch millis
pub fn millis(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> i64 {
    TZ.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .unwrap()
        .timestamp_millis()
}

/// Monday, 2025-12-29 at the given time
pub fn monday(hour: u32, minute: u32) -> i64 {
    millis(2025, 12, 29, hour, minute)
}

pub fn day_of_epoch(timestamp: i64) -> i64 {
    LocalTime::at(timestamp, TZ).day_of_epoch
}

pub fn rule(category: &str, days: u8, start: u16, end: u16, max_millis: i64) -> TimeLimitRule {
    TimeLimitRule {
        id: RuleId::new(format!("{}-{}-{}-{}", category, days, start, end)),
        category_id: CategoryId::new(category),
        day_mask: DaysOfWeek::new(days),
        start_minute_of_day: start,
        end_minute_of_day: end,
        maximum_time_millis: max_millis,
        apply_to_extra_time_usage: false,
        session_duration_millis: 0,
        session_pause_millis: 0,
    }
}

pub fn used(category: &str, day_of_epoch: i64, start: u16, end: u16, used_millis: i64) -> UsedTimeItem {
    UsedTimeItem {
        day_of_epoch,
        start_minute_of_day: start,
        end_minute_of_day: end,
        category_id: CategoryId::new(category),
        used_millis,
    }
}

pub fn category(id: &str) -> CategoryRelatedData {
    CategoryRelatedData::new(CategoryConfig::new(id))
}

pub fn child_category(id: &str, parent: &str) -> CategoryRelatedData {
    let mut config = CategoryConfig::new(id);
    config.parent_category_id = Some(CategoryId::new(parent));
    CategoryRelatedData::new(config)
}

pub fn user_config() -> UserConfig {
    UserConfig {
        id: UserId::new("child"),
        name: "Child".into(),
        timezone: TZ,
        disable_limits_until: 0,
        category_for_not_assigned_apps: None,
    }
}

pub fn user_with(categories: Vec<CategoryRelatedData>) -> UserRelatedData {
    let mut data = UserRelatedData::new(user_config());
    for c in categories {
        data.categories.insert(c.id().clone(), Arc::new(c));
    }
    data
}

pub fn shared_user(categories: Vec<CategoryRelatedData>) -> Arc<UserRelatedData> {
    Arc::new(user_with(categories))
}

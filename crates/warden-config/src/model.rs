//! Immutable snapshot of the user, category and device data the policy
//! core evaluates against.
//!
//! All timestamps are epoch milliseconds. Minutes of day are 0..=1439.

use chrono_tz::Tz;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use warden_util::{CategoryId, DaysOfWeek, MAX_MINUTE_OF_DAY, MinuteOfWeekBitmask, RuleId, UserId};

/// Assignment key for system image apps without an explicit assignment
pub const NOT_ASSIGNED_SYSTEM_IMAGE_APP: &str = ".dummy.system_image";

/// A quota or blocked slot on selected days
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeLimitRule {
    pub id: RuleId,
    pub category_id: CategoryId,
    pub day_mask: DaysOfWeek,
    pub start_minute_of_day: u16,
    /// Inclusive
    pub end_minute_of_day: u16,
    /// 0 turns the slot into a blocked time area
    pub maximum_time_millis: i64,
    pub apply_to_extra_time_usage: bool,
    pub session_duration_millis: i64,
    pub session_pause_millis: i64,
}

impl TimeLimitRule {
    pub fn applies_to_whole_day(&self) -> bool {
        self.start_minute_of_day == 0 && self.end_minute_of_day == MAX_MINUTE_OF_DAY
    }

    pub fn session_duration_limit_enabled(&self) -> bool {
        self.session_duration_millis > 0 && self.session_pause_millis > 0
    }

    pub fn applies_to_multiple_days(&self) -> bool {
        self.day_mask.count() > 1
    }

    /// A rule without quota blocks its slot
    pub fn is_blocked_time_area(&self) -> bool {
        self.maximum_time_millis == 0
    }

    pub fn applies_at(&self, day_of_week: u8, minute_of_day: u16) -> bool {
        self.day_mask.contains_day(day_of_week)
            && self.start_minute_of_day <= minute_of_day
            && minute_of_day <= self.end_minute_of_day
    }

    pub fn has_same_slot(&self, start_minute_of_day: u16, end_minute_of_day: u16) -> bool {
        self.start_minute_of_day == start_minute_of_day && self.end_minute_of_day == end_minute_of_day
    }
}

/// Recorded usage of one category on one day, for one slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsedTimeItem {
    pub day_of_epoch: i64,
    pub start_minute_of_day: u16,
    pub end_minute_of_day: u16,
    pub category_id: CategoryId,
    pub used_millis: i64,
}

/// Rolling session state for one rule shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDurationRecord {
    pub category_id: CategoryId,
    pub max_session_duration: i64,
    pub session_pause_duration: i64,
    pub start_minute_of_day: u16,
    pub end_minute_of_day: u16,
    pub last_usage: i64,
    pub last_session_duration: i64,
}

impl SessionDurationRecord {
    /// Whether this record was written for the given rule
    pub fn matches_rule(&self, rule: &TimeLimitRule) -> bool {
        self.start_minute_of_day == rule.start_minute_of_day
            && self.end_minute_of_day == rule.end_minute_of_day
            && self.max_session_duration == rule.session_duration_millis
            && self.session_pause_duration == rule.session_pause_millis
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryConfig {
    pub id: CategoryId,
    pub title: String,
    pub parent_category_id: Option<CategoryId>,
    pub blocked_minutes_in_week: MinuteOfWeekBitmask,
    pub min_battery_level_while_charging: i32,
    pub min_battery_level_mobile: i32,
    pub temporarily_blocked: bool,
    /// 0 = until unblocked manually
    pub temporarily_blocked_end_time: i64,
    pub disable_limits_until: i64,
    pub extra_time_millis: i64,
    /// `None` = valid on any day
    pub extra_time_day: Option<i64>,
    pub block_all_notifications: bool,
}

impl CategoryConfig {
    pub fn new(id: impl Into<CategoryId>) -> Self {
        let id = id.into();
        Self {
            title: id.to_string(),
            id,
            parent_category_id: None,
            blocked_minutes_in_week: MinuteOfWeekBitmask::empty(),
            min_battery_level_while_charging: 0,
            min_battery_level_mobile: 0,
            temporarily_blocked: false,
            temporarily_blocked_end_time: 0,
            disable_limits_until: 0,
            extra_time_millis: 0,
            extra_time_day: None,
            block_all_notifications: false,
        }
    }

    pub fn extra_time_for_day(&self, day_of_epoch: i64) -> i64 {
        match self.extra_time_day {
            None => self.extra_time_millis,
            Some(day) if day == day_of_epoch => self.extra_time_millis,
            Some(_) => 0,
        }
    }
}

/// Network a category may be used on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryNetworkId {
    pub item_id: String,
    pub hashed_network_id: String,
}

/// A category with everything needed to evaluate it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRelatedData {
    pub category: CategoryConfig,
    pub rules: Vec<TimeLimitRule>,
    pub used_times: Vec<UsedTimeItem>,
    pub session_durations: Vec<SessionDurationRecord>,
    pub networks: Vec<CategoryNetworkId>,
}

impl CategoryRelatedData {
    pub fn new(category: CategoryConfig) -> Self {
        Self {
            category,
            rules: Vec::new(),
            used_times: Vec::new(),
            session_durations: Vec::new(),
            networks: Vec::new(),
        }
    }

    pub fn id(&self) -> &CategoryId {
        &self.category.id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserConfig {
    pub id: UserId,
    pub name: String,
    pub timezone: Tz,
    pub disable_limits_until: i64,
    pub category_for_not_assigned_apps: Option<CategoryId>,
}

/// App (or `package:activity`) assigned to a category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryApp {
    pub package_name: String,
    pub category_id: CategoryId,
}

impl CategoryApp {
    pub fn specifies_activity(&self) -> bool {
        self.package_name.contains(':')
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserRelatedData {
    pub user: UserConfig,
    pub categories: HashMap<CategoryId, Arc<CategoryRelatedData>>,
    /// Keyed by package name or `package:activity`
    pub category_apps: HashMap<String, CategoryApp>,
}

impl UserRelatedData {
    pub fn new(user: UserConfig) -> Self {
        Self {
            user,
            categories: HashMap::new(),
            category_apps: HashMap::new(),
        }
    }

    pub fn category(&self, id: &str) -> Option<&Arc<CategoryRelatedData>> {
        self.categories.get(id)
    }

    pub fn find_category_app(&self, package_name: &str) -> Option<&CategoryApp> {
        self.category_apps.get(package_name)
    }

    /// The category followed by its ancestors, each at most once.
    /// Empty if the start category does not exist.
    pub fn category_with_parent_categories(&self, start: &CategoryId) -> Vec<CategoryId> {
        let mut result = Vec::new();
        let mut seen = HashSet::new();
        let mut current = self.categories.get(start);

        while let Some(data) = current {
            if !seen.insert(data.id()) {
                break;
            }
            result.push(data.id().clone());
            current = data
                .category
                .parent_category_id
                .as_ref()
                .and_then(|parent| self.categories.get(parent));
        }

        result
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRelatedData {
    pub own_package_name: String,
    pub enable_activity_level_blocking: bool,
    pub temporarily_allowed_apps: HashSet<String>,
    pub ignored_apps: HashSet<String>,
    /// `package:activity`
    pub ignored_activities: HashSet<String>,
}

impl DeviceRelatedData {
    pub fn is_ignored_activity(&self, package_name: &str, activity_name: &str) -> bool {
        self.ignored_activities
            .contains(&format!("{}:{}", package_name, activity_name))
    }
}

impl Default for DeviceRelatedData {
    fn default() -> Self {
        Self {
            own_package_name: DEFAULT_OWN_PACKAGE_NAME.to_string(),
            enable_activity_level_blocking: false,
            temporarily_allowed_apps: HashSet::new(),
            ignored_apps: HashSet::new(),
            ignored_activities: HashSet::new(),
        }
    }
}

pub const DEFAULT_OWN_PACKAGE_NAME: &str = "warden";

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserConfig {
        UserConfig {
            id: UserId::new("child"),
            name: "Child".into(),
            timezone: chrono_tz::UTC,
            disable_limits_until: 0,
            category_for_not_assigned_apps: None,
        }
    }

    fn category(id: &str, parent: Option<&str>) -> Arc<CategoryRelatedData> {
        let mut config = CategoryConfig::new(id);
        config.parent_category_id = parent.map(CategoryId::new);
        Arc::new(CategoryRelatedData::new(config))
    }

    fn user_with(categories: Vec<Arc<CategoryRelatedData>>) -> UserRelatedData {
        let mut data = UserRelatedData::new(user());
        for c in categories {
            data.categories.insert(c.id().clone(), c);
        }
        data
    }

    #[test]
    fn parent_chain_is_leaf_to_root() {
        let data = user_with(vec![
            category("leaf", Some("parent")),
            category("parent", Some("root")),
            category("root", None),
        ]);

        assert_eq!(
            data.category_with_parent_categories(&CategoryId::new("leaf")),
            vec![CategoryId::new("leaf"), CategoryId::new("parent"), CategoryId::new("root")]
        );
    }

    #[test]
    fn parent_chain_terminates_on_cycle() {
        let data = user_with(vec![category("a", Some("b")), category("b", Some("a"))]);

        assert_eq!(
            data.category_with_parent_categories(&CategoryId::new("a")),
            vec![CategoryId::new("a"), CategoryId::new("b")]
        );
    }

    #[test]
    fn parent_chain_of_unknown_category_is_empty() {
        let data = user_with(vec![category("a", Some("missing"))]);

        assert!(data.category_with_parent_categories(&CategoryId::new("x")).is_empty());
        assert_eq!(
            data.category_with_parent_categories(&CategoryId::new("a")),
            vec![CategoryId::new("a")]
        );
    }

    #[test]
    fn extra_time_only_on_its_day() {
        let mut config = CategoryConfig::new("games");
        config.extra_time_millis = 1000;

        assert_eq!(config.extra_time_for_day(5), 1000);

        config.extra_time_day = Some(5);
        assert_eq!(config.extra_time_for_day(5), 1000);
        assert_eq!(config.extra_time_for_day(6), 0);
    }

    #[test]
    fn rule_derived_flags() {
        let rule = TimeLimitRule {
            id: RuleId::new("r"),
            category_id: CategoryId::new("games"),
            day_mask: DaysOfWeek::ALL_DAYS,
            start_minute_of_day: 0,
            end_minute_of_day: MAX_MINUTE_OF_DAY,
            maximum_time_millis: 0,
            apply_to_extra_time_usage: false,
            session_duration_millis: 1000,
            session_pause_millis: 0,
        };

        assert!(rule.applies_to_whole_day());
        assert!(rule.applies_to_multiple_days());
        assert!(rule.is_blocked_time_area());
        assert!(!rule.session_duration_limit_enabled());
        assert!(rule.applies_at(6, MAX_MINUTE_OF_DAY));
    }

    #[test]
    fn activity_assignments_are_detected() {
        let app = CategoryApp {
            package_name: "com.example:com.example.Main".into(),
            category_id: CategoryId::new("games"),
        };
        assert!(app.specifies_activity());
    }
}

//! Per-category policy gates
//!
//! [`CategoryItselfHandling::calculate`] evaluates every gate of one
//! category for one moment and records the window (time, battery level,
//! charging state, network) in which the result stays correct, so that
//! [`CategoryItselfHandling::is_valid`] can tell whether it can be reused.

use std::collections::BTreeSet;
use std::sync::Arc;
use warden_api::{AdditionalCountingSlot, BatteryStatus, BlockingReason, SessionDurationLimitSlot};
use warden_config::{CategoryRelatedData, UserRelatedData};
use warden_host_api::NetworkIdMatcher;
use warden_util::{LocalTime, MAX_MINUTE_OF_DAY, MINUTES_PER_DAY, MinuteOfWeekBitmask};

use crate::{
    RemainingTime, next_session_change, remaining_session_duration, remaining_time,
    rules_related_to_day, session_duration_slots_to_count,
};

/// Smallest validity window of a result, in milliseconds
pub const MIN_VALIDITY_MILLIS: i64 = 100;

/// Immutable evaluation result of one category
#[derive(Debug, Clone)]
pub struct CategoryItselfHandling {
    /// Usage should be added to the category
    pub should_count_time: bool,
    /// Added usage consumes extra time
    pub should_count_extra_time: bool,
    /// Milliseconds that can be added before the result changes; `i64::MAX` if unlimited
    pub max_time_to_add: i64,
    pub session_duration_slots_to_count: BTreeSet<SessionDurationLimitSlot>,
    pub additional_time_counting_slots: BTreeSet<AdditionalCountingSlot>,
    pub are_limits_temporarily_disabled: bool,

    pub ok_by_battery: bool,
    pub ok_by_temp_blocking: bool,
    pub ok_by_network_id: bool,
    pub ok_by_blocked_time_areas: bool,
    pub ok_by_time_limit_rules: bool,
    pub ok_by_session_duration_limits: bool,
    pub block_all_notifications: bool,

    pub remaining_time: Option<RemainingTime>,
    /// Extra time granted for today, whether or not it is usable right now
    pub extra_time: i64,
    pub remaining_session_duration: Option<i64>,

    pub depends_on_min_time: i64,
    pub depends_on_max_time: i64,
    pub depends_on_battery_charging: bool,
    pub depends_on_min_battery_level: i32,
    pub depends_on_max_battery_level: i32,
    pub depends_on_network_id: bool,

    created_with_category_related_data: Arc<CategoryRelatedData>,
    created_with_user_related_data: Arc<UserRelatedData>,
    created_with_battery_status: BatteryStatus,
    created_with_network_id: Option<String>,
}

impl CategoryItselfHandling {
    pub fn calculate(
        category_related_data: &Arc<CategoryRelatedData>,
        user: &Arc<UserRelatedData>,
        battery: BatteryStatus,
        now: i64,
        network_id: Option<&str>,
        matcher: &dyn NetworkIdMatcher,
    ) -> Self {
        let category = &category_related_data.category;
        let timezone = user.user.timezone;
        let local = LocalTime::at(now, timezone);
        let minute_of_week = local.minute_of_week();
        let minute_of_day = local.minute_of_day;
        let day_of_week = local.day_of_week;

        // Battery
        let min_required_battery_level = if battery.charging {
            category.min_battery_level_while_charging
        } else {
            category.min_battery_level_mobile
        };
        let ok_by_battery = battery.level >= min_required_battery_level;
        let depends_on_battery_charging =
            category.min_battery_level_while_charging != category.min_battery_level_mobile;
        let (depends_on_min_battery_level, depends_on_max_battery_level) = if ok_by_battery {
            (min_required_battery_level, i32::MAX)
        } else {
            (i32::MIN, min_required_battery_level - 1)
        };

        // Temporary block
        let ok_by_temp_blocking = !category.temporarily_blocked
            || (category.temporarily_blocked_end_time != 0 && category.temporarily_blocked_end_time < now);
        let max_time_by_temp_blocking = if ok_by_temp_blocking || category.temporarily_blocked_end_time == 0 {
            i64::MAX
        } else {
            category.temporarily_blocked_end_time
        };

        // Temporarily disabled limits
        let disable_limits_until = user.user.disable_limits_until.max(category.disable_limits_until);
        let are_limits_temporarily_disabled = now < disable_limits_until;
        let max_time_by_disabled_limits = if are_limits_temporarily_disabled {
            disable_limits_until
        } else {
            i64::MAX
        };

        // Network
        let depends_on_network_id = !category_related_data.networks.is_empty();
        let ok_by_network_id = if category_related_data.networks.is_empty() || are_limits_temporarily_disabled {
            true
        } else {
            match network_id {
                None => false,
                Some(raw) => category_related_data
                    .networks
                    .iter()
                    .any(|network| matcher.matches(&network.hashed_network_id, raw)),
            }
        };

        // Rules
        let all_related_rules = if are_limits_temporarily_disabled {
            Vec::new()
        } else {
            rules_related_to_day(day_of_week, minute_of_day, &category_related_data.rules)
        };
        let regular_related_rules: Vec<_> = all_related_rules
            .iter()
            .copied()
            .filter(|rule| !rule.is_blocked_time_area())
            .collect();
        let has_blocked_time_area_rule = all_related_rules.iter().any(|rule| rule.is_blocked_time_area());

        // Blocked time areas
        let blocked_minutes = &category.blocked_minutes_in_week;
        let ok_by_blocked_time_areas = are_limits_temporarily_disabled
            || (!blocked_minutes.test(minute_of_week) && !has_blocked_time_area_rule);
        let blocked_area_change_minute = next_blocked_area_change_today(blocked_minutes, minute_of_week);

        let extra_time = category.extra_time_for_day(local.day_of_epoch).max(0);
        let remaining_time = remaining_time(
            day_of_week,
            minute_of_day,
            &category_related_data.used_times,
            regular_related_rules.iter().copied(),
            extra_time,
            local.first_day_of_week_as_epoch_day(),
        );

        let remaining_session_duration = remaining_session_duration(
            regular_related_rules.iter().copied(),
            &category_related_data.session_durations,
            day_of_week,
            minute_of_day,
            now,
        );

        let ok_by_time_limit_rules = regular_related_rules.is_empty()
            || remaining_time.is_some_and(|remaining| remaining.has_remaining_time());

        // The result changes when a related slot ends, a later slot starts or
        // a blocked time area begins or ends; otherwise at the next day.
        let slot_end_minute = all_related_rules
            .iter()
            .map(|rule| rule.end_minute_of_day as u32 + 1)
            .min();
        let later_slot_start_minute = category_related_data
            .rules
            .iter()
            .filter(|rule| rule.day_mask.contains_day(day_of_week) && rule.start_minute_of_day > minute_of_day)
            .map(|rule| rule.start_minute_of_day as u32)
            .min();
        let change_minute = [slot_end_minute, later_slot_start_minute, blocked_area_change_minute]
            .into_iter()
            .flatten()
            .min();
        let max_time_by_rules = match change_minute {
            Some(minute) if minute <= MAX_MINUTE_OF_DAY as u32 => {
                local.millis_at_minute_of_day(minute as u16, timezone)
            }
            _ => local.start_of_next_day_millis(timezone),
        };

        let max_time_by_session_durations =
            next_session_change(&category_related_data.session_durations, now).unwrap_or(i64::MAX);

        let ok_by_session_duration_limits = remaining_session_duration.is_none_or(|remaining| remaining > 0);

        let depends_on_max_time = max_time_by_temp_blocking
            .min(max_time_by_disabled_limits)
            .min(max_time_by_rules)
            .min(max_time_by_session_durations)
            .max(now.saturating_add(MIN_VALIDITY_MILLIS));

        // Usage hints
        let should_count_time = !regular_related_rules.is_empty();
        let should_count_extra_time = remaining_time.is_some_and(|remaining| remaining.using_extra_time());
        let session_duration_slots_to_count =
            session_duration_slots_to_count(regular_related_rules.iter().copied(), remaining_session_duration);

        let max_time_to_add_by_regular_time = match remaining_time {
            Some(remaining) if should_count_time => {
                if should_count_extra_time {
                    remaining.including_extra_time
                } else {
                    remaining.default
                }
            }
            _ => i64::MAX,
        };
        let max_time_to_add = max_time_to_add_by_regular_time.min(remaining_session_duration.unwrap_or(i64::MAX));

        let additional_time_counting_slots = if should_count_time {
            regular_related_rules
                .iter()
                .filter(|rule| !rule.applies_to_whole_day())
                .map(|rule| AdditionalCountingSlot {
                    start_minute_of_day: rule.start_minute_of_day,
                    end_minute_of_day: rule.end_minute_of_day,
                })
                .collect()
        } else {
            BTreeSet::new()
        };

        let handling = Self {
            should_count_time,
            should_count_extra_time,
            max_time_to_add,
            session_duration_slots_to_count,
            additional_time_counting_slots,
            are_limits_temporarily_disabled,
            ok_by_battery,
            ok_by_temp_blocking,
            ok_by_network_id,
            ok_by_blocked_time_areas,
            ok_by_time_limit_rules,
            ok_by_session_duration_limits,
            block_all_notifications: category.block_all_notifications,
            remaining_time,
            extra_time,
            remaining_session_duration,
            depends_on_min_time: now,
            depends_on_max_time,
            depends_on_battery_charging,
            depends_on_min_battery_level,
            depends_on_max_battery_level,
            depends_on_network_id,
            created_with_category_related_data: Arc::clone(category_related_data),
            created_with_user_related_data: Arc::clone(user),
            created_with_battery_status: battery,
            created_with_network_id: network_id.map(str::to_string),
        };

        tracing::trace!(
            category_id = %category.id,
            reason = ?handling.activity_blocking_reason(),
            valid_until = handling.depends_on_max_time,
            "Category evaluated"
        );

        handling
    }

    /// All gates except the network gate pass
    pub fn ok_basic(&self) -> bool {
        self.ok_by_battery
            && self.ok_by_temp_blocking
            && self.ok_by_blocked_time_areas
            && self.ok_by_time_limit_rules
            && self.ok_by_session_duration_limits
    }

    pub fn ok_all(&self) -> bool {
        self.ok_basic() && self.ok_by_network_id
    }

    pub fn should_block_activities(&self) -> bool {
        !self.ok_all()
    }

    pub fn should_block_at_system_level(&self) -> bool {
        !self.ok_basic()
    }

    pub fn activity_blocking_reason(&self) -> BlockingReason {
        if !self.ok_by_battery {
            BlockingReason::BatteryLimit
        } else if !self.ok_by_temp_blocking {
            BlockingReason::TemporarilyBlocked
        } else if !self.ok_by_network_id {
            BlockingReason::MissingRequiredNetwork
        } else {
            self.time_blocking_reason()
        }
    }

    /// Like [`Self::activity_blocking_reason`], without the network gate
    pub fn system_level_blocking_reason(&self) -> BlockingReason {
        if !self.ok_by_battery {
            BlockingReason::BatteryLimit
        } else if !self.ok_by_temp_blocking {
            BlockingReason::TemporarilyBlocked
        } else {
            self.time_blocking_reason()
        }
    }

    fn time_blocking_reason(&self) -> BlockingReason {
        if !self.ok_by_blocked_time_areas {
            BlockingReason::BlockedAtThisTime
        } else if !self.ok_by_time_limit_rules {
            // extra time is left but the rules capping it are used up; this
            // means extra time was granted today, not that it is still reachable
            if self.extra_time > 0 || self.remaining_time.is_some_and(|remaining| remaining.has_remaining_time()) {
                BlockingReason::TimeOverExtraTimeCanBeUsedLater
            } else {
                BlockingReason::TimeOver
            }
        } else if !self.ok_by_session_duration_limits {
            BlockingReason::SessionDurationLimit
        } else {
            BlockingReason::None
        }
    }

    /// Whether this result still holds for the given inputs
    pub fn is_valid(
        &self,
        category_related_data: &Arc<CategoryRelatedData>,
        user: &Arc<UserRelatedData>,
        battery: BatteryStatus,
        now: i64,
        network_id: Option<&str>,
    ) -> bool {
        if !same_data(category_related_data, &self.created_with_category_related_data)
            || !same_data(user, &self.created_with_user_related_data)
        {
            return false;
        }

        if now < self.depends_on_min_time || now > self.depends_on_max_time {
            return false;
        }

        if self.depends_on_battery_charging && battery.charging != self.created_with_battery_status.charging {
            return false;
        }

        if battery.level < self.depends_on_min_battery_level || battery.level > self.depends_on_max_battery_level {
            return false;
        }

        if self.depends_on_network_id && network_id != self.created_with_network_id.as_deref() {
            return false;
        }

        true
    }

    pub fn created_with_category_related_data(&self) -> &Arc<CategoryRelatedData> {
        &self.created_with_category_related_data
    }

    pub fn created_with_user_related_data(&self) -> &Arc<UserRelatedData> {
        &self.created_with_user_related_data
    }
}

fn same_data<T: PartialEq>(a: &Arc<T>, b: &Arc<T>) -> bool {
    Arc::ptr_eq(a, b) || **a == **b
}

/// Minute of today at which blocked time area membership flips, if it does today
fn next_blocked_area_change_today(mask: &MinuteOfWeekBitmask, minute_of_week: usize) -> Option<u32> {
    let day_length = MINUTES_PER_DAY as usize;
    let change = if mask.test(minute_of_week) {
        Some(mask.next_clear(minute_of_week))
    } else {
        mask.next_set(minute_of_week)
    };

    change
        .filter(|minute| minute / day_length == minute_of_week / day_length)
        .map(|minute| (minute % day_length) as u32)
}

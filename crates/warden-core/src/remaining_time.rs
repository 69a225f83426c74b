//! Remaining quota of the time limit rules that apply right now

use warden_config::{TimeLimitRule, UsedTimeItem};

/// Remaining quota in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemainingTime {
    pub including_extra_time: i64,
    pub default: i64,
}

impl RemainingTime {
    /// Panics if a value is negative or extra time would reduce the quota.
    pub fn new(including_extra_time: i64, default: i64) -> Self {
        assert!(
            including_extra_time >= 0 && default >= 0,
            "remaining time must not be negative"
        );
        assert!(
            including_extra_time >= default,
            "remaining time including extra time must not be below the default"
        );

        Self {
            including_extra_time,
            default,
        }
    }

    pub fn has_remaining_time(&self) -> bool {
        self.including_extra_time > 0
    }

    /// The default quota is used up and extra time is being consumed
    pub fn using_extra_time(&self) -> bool {
        self.including_extra_time > 0 && self.default == 0
    }

    /// Component-wise minimum; `None` means unlimited
    pub fn min(a: Option<Self>, b: Option<Self>) -> Option<Self> {
        match (a, b) {
            (None, other) | (other, None) => other,
            (Some(a), Some(b)) => Some(Self::new(
                a.including_extra_time.min(b.including_extra_time),
                a.default.min(b.default),
            )),
        }
    }
}

/// Rules whose day mask contains `day_of_week` and whose slot contains `minute_of_day`
pub fn rules_related_to_day<'a>(
    day_of_week: u8,
    minute_of_day: u16,
    rules: impl IntoIterator<Item = &'a TimeLimitRule>,
) -> Vec<&'a TimeLimitRule> {
    rules
        .into_iter()
        .filter(|rule| rule.applies_at(day_of_week, minute_of_day))
        .collect()
}

/// Remaining quota for the given moment, or `None` if no rule applies.
///
/// Used time is summed over the current week (starting at
/// `first_day_of_week_as_epoch_day`) for each day in a rule's mask and the
/// rule's exact slot. The tightest rule governs.
///
/// Panics if `extra_time` is negative.
pub fn remaining_time<'a>(
    day_of_week: u8,
    minute_of_day: u16,
    used_times: &[UsedTimeItem],
    rules: impl IntoIterator<Item = &'a TimeLimitRule>,
    extra_time: i64,
    first_day_of_week_as_epoch_day: i64,
) -> Option<RemainingTime> {
    assert!(extra_time >= 0, "extra time must not be negative");

    let related = rules_related_to_day(day_of_week, minute_of_day, rules);
    let without_extra_time = remaining_for_rules(used_times, &related, false, first_day_of_week_as_epoch_day);
    let with_extra_time = remaining_for_rules(used_times, &related, true, first_day_of_week_as_epoch_day);

    match (without_extra_time, with_extra_time) {
        (None, _) => None,
        (Some(without), Some(with)) => {
            // Rules that apply to extra time cap how much of it can be used
            let additional = with - without;
            assert!(additional >= 0, "rules for extra time must not reduce the quota");

            Some(RemainingTime::new(
                without + extra_time.min(additional),
                without,
            ))
        }
        (Some(without), None) => Some(RemainingTime::new(
            without.saturating_add(extra_time),
            without,
        )),
    }
}

fn remaining_for_rules(
    used_times: &[UsedTimeItem],
    rules: &[&TimeLimitRule],
    assume_maximal_extra_time: bool,
    first_day_of_week_as_epoch_day: i64,
) -> Option<i64> {
    let last_day_of_week = first_day_of_week_as_epoch_day + 6;

    rules
        .iter()
        .filter(|rule| !assume_maximal_extra_time || rule.apply_to_extra_time_usage)
        .map(|rule| {
            let used: i64 = used_times
                .iter()
                .filter(|item| {
                    (first_day_of_week_as_epoch_day..=last_day_of_week).contains(&item.day_of_epoch)
                })
                .filter(|item| {
                    let day_of_week = (item.day_of_epoch - first_day_of_week_as_epoch_day) as u8;
                    rule.day_mask.contains_day(day_of_week)
                })
                .filter(|item| rule.has_same_slot(item.start_minute_of_day, item.end_minute_of_day))
                .map(|item| item.used_millis)
                .fold(0, i64::saturating_add);

            (rule.maximum_time_millis - used).max(0)
        })
        .min()
}

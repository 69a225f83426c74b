//! Remaining session duration
//!
//! A session limit allows at most `session_duration` of continuous use; a
//! pause of at least `session_pause` starts a new session.

use std::collections::BTreeSet;
use warden_api::SessionDurationLimitSlot;
use warden_config::{SessionDurationRecord, TimeLimitRule};

/// Remaining milliseconds of the current session, or `None` if no session
/// limited rule applies at the given moment.
pub fn remaining_session_duration<'a>(
    rules: impl IntoIterator<Item = &'a TimeLimitRule>,
    records: &[SessionDurationRecord],
    day_of_week: u8,
    minute_of_day: u16,
    now: i64,
) -> Option<i64> {
    rules
        .into_iter()
        .filter(|rule| rule.session_duration_limit_enabled())
        .filter(|rule| rule.applies_at(day_of_week, minute_of_day))
        .map(|rule| {
            records
                .iter()
                .find(|record| {
                    record.matches_rule(rule) && record.last_usage.saturating_add(record.session_pause_duration) > now
                })
                .map(|record| record.max_session_duration.saturating_sub(record.last_session_duration).max(0))
                .unwrap_or(rule.session_duration_millis)
        })
        .min()
}

/// Slots usage should be added to for session tracking.
///
/// `rules` are the rules that apply right now. Nothing is counted once the
/// session is used up.
pub fn session_duration_slots_to_count<'a>(
    rules: impl IntoIterator<Item = &'a TimeLimitRule>,
    remaining: Option<i64>,
) -> BTreeSet<SessionDurationLimitSlot> {
    if remaining.is_some_and(|r| r <= 0) {
        return BTreeSet::new();
    }

    rules
        .into_iter()
        .filter(|rule| rule.session_duration_limit_enabled())
        .map(|rule| SessionDurationLimitSlot {
            start_minute_of_day: rule.start_minute_of_day,
            end_minute_of_day: rule.end_minute_of_day,
            max_session_duration: rule.session_duration_millis,
            session_pause_duration: rule.session_pause_millis,
        })
        .collect()
}

/// Earliest future moment at which a recorded session resets or runs out
pub fn next_session_change(records: &[SessionDurationRecord], now: i64) -> Option<i64> {
    records
        .iter()
        .flat_map(|record| {
            [
                record.last_usage.saturating_add(record.session_pause_duration),
                record
                    .last_usage
                    .saturating_add(record.max_session_duration.saturating_sub(record.last_session_duration)),
            ]
        })
        .filter(|t| *t > now)
        .min()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::rule;
    use warden_util::{CategoryId, DaysOfWeek, MAX_MINUTE_OF_DAY};

    const MINUTE: i64 = 60_000;
    const NOW: i64 = 1_000_000_000;

    fn session_rule(duration: i64, pause: i64) -> TimeLimitRule {
        let mut r = rule("games", DaysOfWeek::ALL_DAYS.bits(), 0, MAX_MINUTE_OF_DAY, 120 * MINUTE);
        r.session_duration_millis = duration;
        r.session_pause_millis = pause;
        r
    }

    fn record(rule: &TimeLimitRule, last_usage: i64, last_session_duration: i64) -> SessionDurationRecord {
        SessionDurationRecord {
            category_id: CategoryId::new("games"),
            max_session_duration: rule.session_duration_millis,
            session_pause_duration: rule.session_pause_millis,
            start_minute_of_day: rule.start_minute_of_day,
            end_minute_of_day: rule.end_minute_of_day,
            last_usage,
            last_session_duration,
        }
    }

    #[test]
    fn no_session_rules() {
        let rules = vec![session_rule(0, 0)];
        assert_eq!(remaining_session_duration(&rules, &[], 0, 600, NOW), None);
        assert!(session_duration_slots_to_count(&rules, None).is_empty());
    }

    #[test]
    fn without_record_full_duration_is_available() {
        let rules = vec![session_rule(30 * MINUTE, 10 * MINUTE)];
        assert_eq!(remaining_session_duration(&rules, &[], 0, 600, NOW), Some(30 * MINUTE));
    }

    #[test]
    fn running_session_is_deducted() {
        let rules = vec![session_rule(30 * MINUTE, 10 * MINUTE)];
        let records = vec![record(&rules[0], NOW - MINUTE, 20 * MINUTE)];

        assert_eq!(
            remaining_session_duration(&rules, &records, 0, 600, NOW),
            Some(10 * MINUTE)
        );
    }

    #[test]
    fn session_resets_after_pause() {
        let rules = vec![session_rule(30 * MINUTE, 10 * MINUTE)];
        let records = vec![record(&rules[0], NOW - 10 * MINUTE, 30 * MINUTE)];

        assert_eq!(
            remaining_session_duration(&rules, &records, 0, 600, NOW),
            Some(30 * MINUTE)
        );
    }

    #[test]
    fn overused_session_is_clamped() {
        let rules = vec![session_rule(30 * MINUTE, 10 * MINUTE)];
        let records = vec![record(&rules[0], NOW - MINUTE, 45 * MINUTE)];

        assert_eq!(remaining_session_duration(&rules, &records, 0, 600, NOW), Some(0));
        assert!(session_duration_slots_to_count(&rules, Some(0)).is_empty());
    }

    #[test]
    fn record_for_other_rule_shape_is_ignored() {
        let rules = vec![session_rule(30 * MINUTE, 10 * MINUTE)];
        let other = session_rule(20 * MINUTE, 10 * MINUTE);
        let records = vec![record(&other, NOW - MINUTE, 20 * MINUTE)];

        assert_eq!(
            remaining_session_duration(&rules, &records, 0, 600, NOW),
            Some(30 * MINUTE)
        );
    }

    #[test]
    fn slots_cover_session_rules() {
        let rules = vec![session_rule(30 * MINUTE, 10 * MINUTE), session_rule(0, 0)];
        let slots = session_duration_slots_to_count(&rules, Some(MINUTE));

        assert_eq!(slots.len(), 1);
        let slot = slots.iter().next().unwrap();
        assert_eq!(slot.max_session_duration, 30 * MINUTE);
        assert_eq!(slot.session_pause_duration, 10 * MINUTE);
    }

    #[test]
    fn next_change_is_earliest_future_bound() {
        let rule = session_rule(30 * MINUTE, 10 * MINUTE);
        let records = vec![record(&rule, NOW - MINUTE, 25 * MINUTE)];

        // pause ends at +9min, session runs out at +4min
        assert_eq!(next_session_change(&records, NOW), Some(NOW + 4 * MINUTE));

        let stale = vec![record(&rule, NOW - 60 * MINUTE, 25 * MINUTE)];
        assert_eq!(next_session_change(&stale, NOW), None);
    }

    #[test]
    fn huge_pause_saturates() {
        let rules = vec![session_rule(30 * MINUTE, i64::MAX)];
        let records = vec![record(&rules[0], NOW, 5 * MINUTE)];

        assert_eq!(
            remaining_session_duration(&rules, &records, 0, 600, NOW),
            Some(25 * MINUTE)
        );
        assert_eq!(next_session_change(&records, NOW), Some(NOW + 25 * MINUTE));
    }
}

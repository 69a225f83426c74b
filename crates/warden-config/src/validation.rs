//! Configuration validation

use crate::schema::{RawCategory, RawConfig, RawDays, RawRule, RawTimeWindow};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use warden_util::{MinuteOfWeekBitmask, parse_timezone};

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Category '{category_id}': {message}")]
    CategoryError { category_id: String, message: String },

    #[error("Duplicate category ID: {0}")]
    DuplicateCategoryId(String),

    #[error("Category '{category_id}' has unknown parent '{parent}'")]
    UnknownParent { category_id: String, parent: String },

    #[error("Parent categories form a cycle starting at '{0}'")]
    ParentCycle(String),

    #[error("Invalid time format '{value}': {message}")]
    InvalidTimeFormat { value: String, message: String },

    #[error("Invalid day specification: {0}")]
    InvalidDaySpec(String),

    #[error("Unknown timezone: {0}")]
    InvalidTimezone(String),

    #[error("{context} refers to unknown category '{category_id}'")]
    UnknownCategory { context: String, category_id: String },

    #[error("App '{0}' is assigned to more than one category")]
    DuplicateAppAssignment(String),

    #[error("Global config error: {0}")]
    GlobalError(String),
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if parse_timezone(&config.user.timezone).is_err() {
        errors.push(ValidationError::InvalidTimezone(config.user.timezone.clone()));
    }

    if config.user.id.is_empty() {
        errors.push(ValidationError::GlobalError("user id cannot be empty".into()));
    }

    if config.service.poll_interval_seconds == Some(0) {
        errors.push(ValidationError::GlobalError(
            "poll_interval_seconds must be greater than 0".into(),
        ));
    }

    // Check for duplicate category IDs
    let mut seen_ids = HashSet::new();
    for category in &config.categories {
        if !seen_ids.insert(category.id.as_str()) {
            errors.push(ValidationError::DuplicateCategoryId(category.id.clone()));
        }
    }

    if let Some(default_category) = &config.user.category_for_not_assigned_apps
        && !seen_ids.contains(default_category.as_str())
    {
        errors.push(ValidationError::UnknownCategory {
            context: "category_for_not_assigned_apps".into(),
            category_id: default_category.clone(),
        });
    }

    for category in &config.categories {
        errors.extend(validate_category(category));

        if let Some(parent) = &category.parent
            && !seen_ids.contains(parent.as_str())
        {
            errors.push(ValidationError::UnknownParent {
                category_id: category.id.clone(),
                parent: parent.clone(),
            });
        }
    }

    errors.extend(find_parent_cycles(config));

    // An app may only be assigned once
    let mut assigned = HashSet::new();
    for app in config.categories.iter().flat_map(|c| &c.apps) {
        if !assigned.insert(app.as_str()) {
            errors.push(ValidationError::DuplicateAppAssignment(app.clone()));
        }
    }

    errors
}

fn find_parent_cycles(config: &RawConfig) -> Vec<ValidationError> {
    let parents: HashMap<&str, &str> = config
        .categories
        .iter()
        .filter_map(|c| c.parent.as_deref().map(|p| (c.id.as_str(), p)))
        .collect();

    let mut errors = Vec::new();
    let mut reported = HashSet::new();

    for category in &config.categories {
        let mut visited = HashSet::new();
        let mut current = category.id.as_str();

        while let Some(parent) = parents.get(current) {
            if !visited.insert(current) {
                // Report each cycle once, by its smallest member
                let mut cycle_start = current;
                let mut node = *parent;
                while node != current {
                    cycle_start = cycle_start.min(node);
                    node = parents.get(node).copied().unwrap_or(current);
                }
                if reported.insert(cycle_start) {
                    errors.push(ValidationError::ParentCycle(cycle_start.to_string()));
                }
                break;
            }
            current = parent;
        }
    }

    errors
}

fn validate_category(category: &RawCategory) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let category_error = |message: String| ValidationError::CategoryError {
        category_id: category.id.clone(),
        message,
    };

    if category.id.is_empty() {
        errors.push(ValidationError::GlobalError("category id cannot be empty".into()));
    }

    for (name, level) in [
        ("min_battery_level_while_charging", category.min_battery_level_while_charging),
        ("min_battery_level_mobile", category.min_battery_level_mobile),
    ] {
        if !(0..=100).contains(&level) {
            errors.push(category_error(format!("{} must be 0-100, got {}", name, level)));
        }
    }

    if category.temporarily_blocked_end_time < 0 || category.disable_limits_until < 0 {
        errors.push(category_error("timestamps cannot be negative".into()));
    }

    for window in &category.blocked_times {
        errors.extend(validate_time_window(window, &category.id));
    }

    if let Some(compact) = &category.blocked_minutes
        && let Err(e) = MinuteOfWeekBitmask::parse_compact(compact)
    {
        errors.push(category_error(e.to_string()));
    }

    for rule in &category.rules {
        errors.extend(validate_rule(rule, &category.id));
    }

    for used in &category.used_times {
        errors.extend(validate_slot(&used.start, &used.end));
        if used.used_millis < 0 {
            errors.push(category_error("used_millis cannot be negative".into()));
        }
    }

    for session in &category.session_durations {
        errors.extend(validate_slot(&session.start, &session.end));
        if session.max_session_duration_millis < 0
            || session.session_pause_millis < 0
            || session.last_session_duration_millis < 0
        {
            errors.push(category_error("session durations cannot be negative".into()));
        }
    }

    let mut network_ids = HashSet::new();
    for network in &category.networks {
        if network.hashed_network_id.is_empty() {
            errors.push(category_error(format!(
                "network '{}' has an empty hashed_network_id",
                network.id
            )));
        }
        if !network_ids.insert(network.id.as_str()) {
            errors.push(category_error(format!("duplicate network id '{}'", network.id)));
        }
    }

    for app in &category.apps {
        if app.is_empty() || app.starts_with(':') || app.ends_with(':') {
            errors.push(category_error(format!("invalid app assignment '{}'", app)));
        }
    }

    errors
}

fn validate_rule(rule: &RawRule, category_id: &str) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Err(e) = parse_days(&rule.days) {
        errors.push(ValidationError::InvalidDaySpec(format!(
            "category '{}': {}",
            category_id, e
        )));
    }

    errors.extend(validate_slot(&rule.start, &rule.end));

    // Session limits need both a duration and a pause
    if (rule.session_duration_seconds == 0) != (rule.session_pause_seconds == 0) {
        errors.push(ValidationError::CategoryError {
            category_id: category_id.to_string(),
            message: "session_duration_seconds and session_pause_seconds must both be set or both be 0"
                .into(),
        });
    }

    errors
}

/// Validate an inclusive HH:MM - HH:MM slot
fn validate_slot(start: &str, end: &str) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let start_minute = parse_minute_of_day(start).map_err(|message| {
        errors.push(ValidationError::InvalidTimeFormat {
            value: start.to_string(),
            message,
        })
    });
    let end_minute = parse_minute_of_day(end).map_err(|message| {
        errors.push(ValidationError::InvalidTimeFormat {
            value: end.to_string(),
            message,
        })
    });

    if let (Ok(start_minute), Ok(end_minute)) = (start_minute, end_minute)
        && start_minute > end_minute
    {
        errors.push(ValidationError::InvalidTimeFormat {
            value: format!("{}-{}", start, end),
            message: "slot start must not be after its end".into(),
        });
    }

    errors
}

fn validate_time_window(window: &RawTimeWindow, category_id: &str) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    // Validate days
    if let Err(e) = parse_days(&window.days) {
        errors.push(ValidationError::CategoryError {
            category_id: category_id.to_string(),
            message: e,
        });
    }

    // Validate start time
    if let Err(e) = parse_time(&window.start) {
        errors.push(ValidationError::InvalidTimeFormat {
            value: window.start.clone(),
            message: e,
        });
    }

    // Validate end time
    if let Err(e) = parse_time(&window.end) {
        errors.push(ValidationError::InvalidTimeFormat {
            value: window.end.clone(),
            message: e,
        });
    }

    errors
}

/// Parse HH:MM time format
pub fn parse_time(s: &str) -> Result<(u8, u8), String> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 2 {
        return Err("Expected HH:MM format".into());
    }

    let hour: u8 = parts[0]
        .parse()
        .map_err(|_| "Invalid hour".to_string())?;
    let minute: u8 = parts[1]
        .parse()
        .map_err(|_| "Invalid minute".to_string())?;

    if hour >= 24 {
        return Err("Hour must be 0-23".into());
    }
    if minute >= 60 {
        return Err("Minute must be 0-59".into());
    }

    Ok((hour, minute))
}

/// Parse HH:MM into a minute of day
pub fn parse_minute_of_day(s: &str) -> Result<u16, String> {
    let (hour, minute) = parse_time(s)?;
    Ok(hour as u16 * 60 + minute as u16)
}

/// Parse days specification
pub fn parse_days(days: &RawDays) -> Result<u8, String> {
    match days {
        RawDays::Preset(preset) => match preset.to_lowercase().as_str() {
            "all" | "every" | "daily" => Ok(0x7F),
            "weekdays" => Ok(0x1F), // Mon-Fri
            "weekends" => Ok(0x60), // Sat-Sun
            other => Err(format!("Unknown day preset: {}", other)),
        },
        RawDays::List(list) => {
            let mut mask = 0u8;
            for day in list {
                let bit = match day.to_lowercase().as_str() {
                    "mon" | "monday" => 1 << 0,
                    "tue" | "tuesday" => 1 << 1,
                    "wed" | "wednesday" => 1 << 2,
                    "thu" | "thursday" => 1 << 3,
                    "fri" | "friday" => 1 << 4,
                    "sat" | "saturday" => 1 << 5,
                    "sun" | "sunday" => 1 << 6,
                    other => return Err(format!("Unknown day: {}", other)),
                };
                mask |= bit;
            }
            Ok(mask)
        }
    }
}

//! Integration tests for wardend
//!
//! These tests run configuration files through the blocking engine with a
//! mock host, the way the service does each cycle.

use std::io::Write;
use std::sync::Arc;
use warden_api::{BatteryStatus, BlockingReason, EvaluationReportView, HandlingKind};
use warden_config::{Snapshot, load_config, parse_config};
use warden_core::{BlockingEngine, EvaluationContext, EvaluationReport, ForegroundApp};
use warden_host_api::{BatteryMonitor, Clock, ExactNetworkIdMatcher, MockHost, NetworkMonitor};

/// Monday, 2025-12-29 00:00 UTC
const MONDAY: i64 = 1_766_966_400_000;
const MONDAY_EPOCH_DAY: i64 = 20_451;
const MINUTE: i64 = 60_000;
const HOUR: i64 = 60 * MINUTE;

fn config(used_millis: i64) -> String {
    format!(
        r#"
        config_version = 1

        [service]
        poll_interval_seconds = 30

        [device]
        ignored_apps = ["com.example.launcher"]

        [user]
        id = "child"
        name = "Child"
        timezone = "UTC"

        [[categories]]
        id = "all"
        title = "Everything"
        min_battery_level_mobile = 20

        [[categories.blocked_times]]
        days = "all"
        start = "21:00"
        end = "07:00"

        [[categories]]
        id = "games"
        parent = "all"
        apps = ["com.example.game"]

        [[categories.rules]]
        days = ["mon", "tue", "wed", "thu", "fri"]
        max_seconds = 1800

        [[categories.used_times]]
        day_of_epoch = {MONDAY_EPOCH_DAY}
        used_millis = {used_millis}

        [[categories]]
        id = "school"
        apps = ["com.example.homework"]

        [[categories.networks]]
        id = "school-wifi"
        hashed_network_id = "school-net"
        "#
    )
}

fn evaluate(engine: &mut BlockingEngine, snapshot: &Snapshot, host: &MockHost, apps: &[ForegroundApp]) -> EvaluationReport {
    let network_id = host.network_id().unwrap();
    let ctx = EvaluationContext {
        user: &snapshot.user,
        device: &snapshot.device,
        battery: host.battery_status().unwrap(),
        now: host.now_millis(),
        network_id: network_id.as_deref(),
        pause_foreground_app_loop: false,
        pause_counting: false,
    };
    engine.evaluate(&ctx, apps)
}

fn engine() -> BlockingEngine {
    BlockingEngine::new(Arc::new(ExactNetworkIdMatcher))
}

#[test]
fn test_config_loading() {
    let snapshot = parse_config(&config(0)).unwrap();

    assert_eq!(snapshot.user.categories.len(), 3);
    assert_eq!(snapshot.service.poll_interval.as_secs(), 30);
    let games = snapshot.get_category("games").unwrap();
    assert_eq!(games.rules.len(), 1);
    assert_eq!(games.rules[0].maximum_time_millis, 30 * MINUTE);
}

#[test]
fn test_quota_lifecycle() {
    let host = MockHost::new(MONDAY + 10 * HOUR);
    let apps = [ForegroundApp::new("com.example.game")];
    let mut engine = engine();

    let snapshot = parse_config(&config(0)).unwrap();
    let report = evaluate(&mut engine, &snapshot, &host, &apps);
    assert!(!report.any_blocked());
    assert_eq!(report.max_time_to_add, 30 * MINUTE);
    assert!(report.categories_to_count.contains("games"));
    // the blocked window of the parent starts at 21:00
    assert_eq!(report.reevaluate_at, Some(MONDAY + 21 * HOUR));

    // usage recorded by the host, then a new snapshot
    let snapshot = parse_config(&config(30 * MINUTE)).unwrap();
    host.advance(30 * MINUTE);
    let report = evaluate(&mut engine, &snapshot, &host, &apps);
    let decision = &report.decisions[0];
    assert_eq!(decision.reason, BlockingReason::TimeOver);
    assert_eq!(decision.blocking_category.as_ref().unwrap().as_str(), "games");
    assert!(report.categories_to_count.contains("games"));
    assert_eq!(report.max_time_to_add, 0);
}

#[test]
fn test_blocked_time_window() {
    let host = MockHost::new(MONDAY + 22 * HOUR);
    let snapshot = parse_config(&config(0)).unwrap();
    let mut engine = engine();

    let report = evaluate(&mut engine, &snapshot, &host, &[ForegroundApp::new("com.example.game")]);
    let decision = &report.decisions[0];
    assert_eq!(decision.reason, BlockingReason::BlockedAtThisTime);
    assert_eq!(decision.blocking_category.as_ref().unwrap().as_str(), "all");
    // the window continues into Tuesday, so the result holds until midnight
    assert_eq!(report.reevaluate_at, Some(MONDAY + 24 * HOUR));

    host.set_time(MONDAY + 24 * HOUR + 7 * HOUR);
    let report = evaluate(&mut engine, &snapshot, &host, &[ForegroundApp::new("com.example.game")]);
    assert!(!report.any_blocked());
}

#[test]
fn test_battery_limit_of_parent() {
    let host = MockHost::new(MONDAY + 10 * HOUR).with_battery(BatteryStatus::new(10, false));
    let snapshot = parse_config(&config(0)).unwrap();
    let mut engine = engine();
    let apps = [ForegroundApp::new("com.example.game")];

    let report = evaluate(&mut engine, &snapshot, &host, &apps);
    assert_eq!(report.decisions[0].reason, BlockingReason::BatteryLimit);

    host.set_battery(BatteryStatus::new(10, true));
    let report = evaluate(&mut engine, &snapshot, &host, &apps);
    assert!(!report.any_blocked());
}

#[test]
fn test_network_requirement() {
    let host = MockHost::new(MONDAY + 10 * HOUR);
    let snapshot = parse_config(&config(0)).unwrap();
    let mut engine = engine();
    let apps = [ForegroundApp::new("com.example.homework")];

    let report = evaluate(&mut engine, &snapshot, &host, &apps);
    assert_eq!(report.decisions[0].reason, BlockingReason::MissingRequiredNetwork);

    host.set_network(Some("school-net".into()));
    let report = evaluate(&mut engine, &snapshot, &host, &apps);
    assert!(!report.any_blocked());
}

#[test]
fn test_ignored_and_unassigned_apps() {
    let host = MockHost::new(MONDAY + 10 * HOUR);
    let snapshot = parse_config(&config(0)).unwrap();
    let mut engine = engine();
    let apps = [
        ForegroundApp::new("com.example.launcher"),
        ForegroundApp::new("com.example.unknown"),
        ForegroundApp::idle(),
    ];

    let report = evaluate(&mut engine, &snapshot, &host, &apps);
    let kinds: Vec<HandlingKind> = report.decisions.iter().map(|d| d.handling.kind()).collect();
    assert_eq!(
        kinds,
        vec![HandlingKind::Whitelist, HandlingKind::BlockDueToNoCategory, HandlingKind::Idle]
    );
    assert_eq!(report.decisions[1].reason, BlockingReason::NotPartOfAnCategory);
}

#[test]
fn test_report_view_round_trip() {
    let host = MockHost::new(MONDAY + 10 * HOUR);
    let snapshot = parse_config(&config(0)).unwrap();
    let report = evaluate(&mut engine(), &snapshot, &host, &[ForegroundApp::new("com.example.game")]);

    let json = serde_json::to_string(&report.to_view()).unwrap();
    let view: EvaluationReportView = serde_json::from_str(&json).unwrap();

    assert_eq!(view.evaluated_at, MONDAY + 10 * HOUR);
    assert_eq!(view.apps[0].handling, HandlingKind::UseCategories);
    assert_eq!(view.max_time_to_add, Some(30 * MINUTE));
    assert!(!view.any_blocked());
}

#[test]
fn test_load_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{}", config(0)).unwrap();

    let snapshot = load_config(file.path()).unwrap();
    assert_eq!(snapshot.user.user.id.as_str(), "child");
}

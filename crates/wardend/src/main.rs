//! wardend - The warden background service
//!
//! Wires together:
//! - Configuration loading and reload on SIGHUP
//! - Host providers (clock, sysfs battery, network identity)
//! - The blocking engine
//!
//! Each cycle evaluates the foreground apps and then sleeps until the
//! earliest instant at which a decision may change, capped by the poll
//! interval.

mod battery;

use anyhow::{Context, Result};
use clap::Parser;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use warden_api::{BatteryStatus, BlockingReason};
use warden_config::{Snapshot, load_config};
use warden_core::{BlockingEngine, EvaluationContext, EvaluationReport, ForegroundApp};
use warden_host_api::{
    BatteryMonitor, Clock, ExactNetworkIdMatcher, FixedNetworkMonitor, NetworkMonitor, SystemClock,
};
use warden_util::{default_config_path, format_millis, format_timestamp};

use crate::battery::SysfsBattery;

/// wardend - Foreground app blocking service
#[derive(Parser, Debug)]
#[command(name = "wardend")]
#[command(about = "Decides whether foreground apps must be blocked", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/warden/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Package name of a foreground app; may be repeated
    #[arg(short, long = "app")]
    apps: Vec<String>,

    /// Activity of the first foreground app
    #[arg(long)]
    activity: Option<String>,

    /// Identity of the current network (or set WARDEN_NETWORK_ID env var)
    #[arg(short, long, env = "WARDEN_NETWORK_ID")]
    network_id: Option<String>,

    /// Treat the foreground apps as part of the system image
    #[arg(long)]
    system_image_app: bool,

    /// Evaluate once, print the report as JSON and exit
    #[arg(long)]
    once: bool,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Log as JSON lines
    #[arg(long)]
    json_logs: bool,
}

impl Args {
    fn foreground_apps(&self) -> Vec<ForegroundApp> {
        let mut apps: Vec<ForegroundApp> = self
            .apps
            .iter()
            .map(|package| ForegroundApp {
                package_name: Some(package.clone()),
                activity_name: None,
                is_system_image_app: self.system_image_app,
            })
            .collect();

        if let (Some(first), Some(activity)) = (apps.first_mut(), self.activity.as_ref()) {
            first.activity_name = Some(activity.clone());
        }

        if apps.is_empty() {
            apps.push(ForegroundApp::idle());
        }

        apps
    }
}

/// Main service state
struct Service {
    config_path: PathBuf,
    snapshot: Snapshot,
    engine: BlockingEngine,
    clock: Arc<dyn Clock>,
    battery: Arc<dyn BatteryMonitor>,
    network: Arc<dyn NetworkMonitor>,
    apps: Vec<ForegroundApp>,
    last_battery: BatteryStatus,
    /// Blocking reason per package from the previous cycle
    last_reasons: BTreeMap<String, BlockingReason>,
}

impl Service {
    fn new(args: &Args) -> Result<Self> {
        let snapshot = load_config(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?;

        info!(
            config_path = %args.config.display(),
            user = %snapshot.user.user.id,
            category_count = snapshot.user.categories.len(),
            "Configuration loaded"
        );

        Ok(Self {
            config_path: args.config.clone(),
            snapshot,
            engine: BlockingEngine::new(Arc::new(ExactNetworkIdMatcher)),
            clock: Arc::new(SystemClock),
            battery: Arc::new(SysfsBattery::new()),
            network: Arc::new(FixedNetworkMonitor(args.network_id.clone())),
            apps: args.foreground_apps(),
            last_battery: BatteryStatus::default(),
            last_reasons: BTreeMap::new(),
        })
    }

    fn reload(&mut self) -> Result<()> {
        let snapshot = load_config(&self.config_path)
            .with_context(|| format!("Failed to reload config from {:?}", self.config_path))?;

        info!(category_count = snapshot.user.categories.len(), "Configuration reloaded");

        self.snapshot = snapshot;
        self.engine.clear_cache();
        Ok(())
    }

    fn evaluate(&mut self) -> EvaluationReport {
        let now = self.clock.now_millis();

        match self.battery.battery_status() {
            Ok(status) => self.last_battery = status,
            Err(e) => warn!(error = %e, "Failed to read battery, using last known status"),
        }

        let network_id = self.network.network_id().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to read network identity");
            None
        });

        let ctx = EvaluationContext {
            user: &self.snapshot.user,
            device: &self.snapshot.device,
            battery: self.last_battery,
            now,
            network_id: network_id.as_deref(),
            pause_foreground_app_loop: false,
            pause_counting: false,
        };

        let report = self.engine.evaluate(&ctx, &self.apps);
        self.log_changes(&report);
        report
    }

    fn log_changes(&mut self, report: &EvaluationReport) {
        let reasons: BTreeMap<String, BlockingReason> = report
            .decisions
            .iter()
            .filter_map(|d| d.app.package_name.clone().map(|package| (package, d.reason)))
            .collect();

        for (package, reason) in &reasons {
            if self.last_reasons.get(package) == Some(reason) {
                continue;
            }

            if reason.is_blocking() {
                info!(package = %package, reason = %reason, "App blocked");
            } else {
                info!(package = %package, "App allowed");
            }
        }

        let max_time_to_add = if report.max_time_to_add == i64::MAX {
            "unlimited".to_string()
        } else {
            format_millis(report.max_time_to_add)
        };
        debug!(
            cached = self.engine.cached_categories(),
            counting = report.categories_to_count.len(),
            max_time_to_add = %max_time_to_add,
            "Evaluation done"
        );

        self.last_reasons = reasons;
    }

    /// Time until the next evaluation
    fn next_wakeup(&self, report: &EvaluationReport) -> Duration {
        let now = self.clock.now_millis();
        let poll_until = now.saturating_add(self.snapshot.service.poll_interval.as_millis() as i64);
        let until = report.reevaluate_at.map_or(poll_until, |at| at.min(poll_until));

        if let Some(at) = report.reevaluate_at {
            debug!(
                reevaluate_at = %format_timestamp(at, self.snapshot.user.user.timezone),
                "Next change"
            );
        }

        Duration::from_millis(until.saturating_sub(now).max(0) as u64)
    }

    async fn run(mut self) -> Result<()> {
        let mut sigterm = signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
        let mut sigint = signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;
        let mut sighup = signal(SignalKind::hangup()).context("Failed to create SIGHUP handler")?;

        info!(apps = self.apps.len(), "Service running");

        loop {
            let report = self.evaluate();
            let wait = self.next_wakeup(&report);

            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }

                // SIGHUP - reload configuration, keep the old one on failure
                _ = sighup.recv() => {
                    info!("Received SIGHUP, reloading configuration");
                    if let Err(e) = self.reload() {
                        warn!(error = ?e, "Keeping previous configuration");
                    }
                }

                _ = tokio::time::sleep(wait) => {}
            }
        }

        info!("Shutdown complete");
        Ok(())
    }
}

fn init_logging(args: &Args) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    // stdout is reserved for the --once report
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    if args.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args);

    info!(version = env!("CARGO_PKG_VERSION"), "wardend starting");

    let mut service = Service::new(&args)?;

    if args.once {
        let report = service.evaluate();
        let json = serde_json::to_string_pretty(&report.to_view()).context("Failed to serialize report")?;
        println!("{}", json);
        return Ok(());
    }

    service.run().await
}

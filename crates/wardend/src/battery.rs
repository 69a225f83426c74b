//! Battery monitoring via sysfs

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use warden_api::BatteryStatus;
use warden_host_api::{BatteryMonitor, HostError, HostResult};

const POWER_SUPPLY_DIR: &str = "/sys/class/power_supply";

/// Reads the first `BAT*` supply below a power supply directory
///
/// A machine without a battery reports itself as full and charging, so
/// battery limits never apply to it.
#[derive(Debug, Clone)]
pub struct SysfsBattery {
    root: PathBuf,
}

impl SysfsBattery {
    pub fn new() -> Self {
        Self::with_root(POWER_SUPPLY_DIR)
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn find_battery(&self) -> HostResult<Option<PathBuf>> {
        if !self.root.exists() {
            return Ok(None);
        }

        let mut batteries: Vec<PathBuf> = fs::read_dir(&self.root)?
            .flatten()
            .filter(|entry| entry.file_name().to_string_lossy().starts_with("BAT"))
            .map(|entry| entry.path())
            .collect();
        batteries.sort();

        Ok(batteries.into_iter().next())
    }
}

impl Default for SysfsBattery {
    fn default() -> Self {
        Self::new()
    }
}

impl BatteryMonitor for SysfsBattery {
    fn battery_status(&self) -> HostResult<BatteryStatus> {
        match self.find_battery()? {
            Some(path) => read_battery_info(&path),
            None => {
                debug!(root = %self.root.display(), "No battery found");
                Ok(BatteryStatus::default())
            }
        }
    }
}

fn read_battery_info(path: &Path) -> HostResult<BatteryStatus> {
    let capacity_path = path.join("capacity");
    let capacity = fs::read_to_string(&capacity_path)?;
    let level: i32 = capacity.trim().parse().map_err(|_| HostError::Malformed {
        source_name: capacity_path.display().to_string(),
        value: capacity.trim().to_string(),
    })?;

    // "Full" means plugged in as well
    let status = fs::read_to_string(path.join("status"))?;
    let charging = status.trim().eq_ignore_ascii_case("charging") || status.trim().eq_ignore_ascii_case("full");

    Ok(BatteryStatus::new(level.clamp(0, 100), charging))
}

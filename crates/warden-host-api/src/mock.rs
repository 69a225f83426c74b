//! Mock host providers for testing

use std::sync::{Arc, Mutex};
use warden_api::BatteryStatus;

use crate::{BatteryMonitor, Clock, HostError, HostResult, NetworkMonitor};

#[derive(Debug, Clone)]
struct MockState {
    now: i64,
    battery: BatteryStatus,
    network_id: Option<String>,
}

/// Mock host with settable time, battery and network
///
/// Clones share state, so a test can keep one handle and pass another to
/// the code under test.
#[derive(Debug, Clone)]
pub struct MockHost {
    state: Arc<Mutex<MockState>>,

    /// Configure battery reads to fail
    pub fail_battery: Arc<Mutex<bool>>,
}

impl MockHost {
    pub fn new(now: i64) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                now,
                battery: BatteryStatus::default(),
                network_id: None,
            })),
            fail_battery: Arc::new(Mutex::new(false)),
        }
    }

    pub fn with_battery(self, battery: BatteryStatus) -> Self {
        self.set_battery(battery);
        self
    }

    pub fn with_network(self, network_id: impl Into<String>) -> Self {
        self.set_network(Some(network_id.into()));
        self
    }

    pub fn set_time(&self, now: i64) {
        self.state.lock().unwrap().now = now;
    }

    /// Move the clock forward (or backward, for negative values)
    pub fn advance(&self, millis: i64) {
        self.state.lock().unwrap().now += millis;
    }

    pub fn set_battery(&self, battery: BatteryStatus) {
        self.state.lock().unwrap().battery = battery;
    }

    pub fn set_network(&self, network_id: Option<String>) {
        self.state.lock().unwrap().network_id = network_id;
    }

    pub fn set_fail_battery(&self, fail: bool) {
        *self.fail_battery.lock().unwrap() = fail;
    }
}

impl Clock for MockHost {
    fn now_millis(&self) -> i64 {
        self.state.lock().unwrap().now
    }
}

impl BatteryMonitor for MockHost {
    fn battery_status(&self) -> HostResult<BatteryStatus> {
        if *self.fail_battery.lock().unwrap() {
            return Err(HostError::Unavailable("Mock battery failure".into()));
        }
        Ok(self.state.lock().unwrap().battery)
    }
}

impl NetworkMonitor for MockHost {
    fn network_id(&self) -> HostResult<Option<String>> {
        Ok(self.state.lock().unwrap().network_id.clone())
    }
}

//! Host provider traits

use thiserror::Error;
use warden_api::BatteryStatus;

/// Errors from host provider operations
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed value from {source_name}: {value}")]
    Malformed { source_name: String, value: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type HostResult<T> = Result<T, HostError>;

/// Source of the current time
pub trait Clock: Send + Sync {
    /// Epoch milliseconds
    fn now_millis(&self) -> i64;
}

/// Wall clock, honoring `WARDEN_MOCK_TIME` in debug builds
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        warden_util::now_millis()
    }
}

pub trait BatteryMonitor: Send + Sync {
    fn battery_status(&self) -> HostResult<BatteryStatus>;
}

pub trait NetworkMonitor: Send + Sync {
    /// Raw identity of the current network, `None` when offline
    fn network_id(&self) -> HostResult<Option<String>>;
}

/// Network identity that never changes, e.g. given on the command line
#[derive(Debug, Clone, Default)]
pub struct FixedNetworkMonitor(pub Option<String>);

impl NetworkMonitor for FixedNetworkMonitor {
    fn network_id(&self) -> HostResult<Option<String>> {
        Ok(self.0.clone())
    }
}

/// Compares a declared network fingerprint against a raw network id
pub trait NetworkIdMatcher: Send + Sync {
    fn matches(&self, declared: &str, raw: &str) -> bool;
}

impl<F> NetworkIdMatcher for F
where
    F: Fn(&str, &str) -> bool + Send + Sync,
{
    fn matches(&self, declared: &str, raw: &str) -> bool {
        self(declared, raw)
    }
}

/// Declared fingerprints are the raw ids themselves
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactNetworkIdMatcher;

impl NetworkIdMatcher for ExactNetworkIdMatcher {
    fn matches(&self, declared: &str, raw: &str) -> bool {
        declared == raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_matcher() {
        assert!(ExactNetworkIdMatcher.matches("home", "home"));
        assert!(!ExactNetworkIdMatcher.matches("home", "school"));
    }

    #[test]
    fn closures_are_matchers() {
        let matcher = |declared: &str, raw: &str| declared.eq_ignore_ascii_case(raw);
        assert!(NetworkIdMatcher::matches(&matcher, "HOME", "home"));
    }

    #[test]
    fn fixed_network_monitor() {
        let monitor = FixedNetworkMonitor(Some("home".into()));
        assert_eq!(monitor.network_id().unwrap().as_deref(), Some("home"));
        assert_eq!(FixedNetworkMonitor::default().network_id().unwrap(), None);
    }

    #[test]
    fn system_clock_is_after_2020() {
        assert!(SystemClock.now_millis() > 1_577_836_800_000);
    }
}

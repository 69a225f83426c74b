//! Error types for warden

use thiserror::Error;

/// Core error type for warden utility operations
#[derive(Debug, Error)]
pub enum WardenError {
    #[error("Invalid minute-of-week bitmask: {0}")]
    InvalidBitmask(String),

    #[error("Unknown timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid minute of day: {0}")]
    InvalidMinuteOfDay(u32),
}

impl WardenError {
    pub fn bitmask(msg: impl Into<String>) -> Self {
        Self::InvalidBitmask(msg.into())
    }

    pub fn timezone(name: impl Into<String>) -> Self {
        Self::InvalidTimezone(name.into())
    }
}

pub type Result<T> = std::result::Result<T, WardenError>;

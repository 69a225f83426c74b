//! Configuration parsing and validation for warden
//!
//! Supports TOML configuration with:
//! - Versioned schema
//! - User, device and category definitions
//! - Time limit rules, blocked time areas and allowed networks
//! - Recorded usage and sessions
//! - Validation with clear error messages
//!
//! A loaded [`Snapshot`] is the immutable data the policy core evaluates.

mod model;
mod policy;
mod schema;
mod validation;

pub use model::*;
pub use policy::*;
pub use schema::*;
pub use validation::*;

use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<ValidationError> },

    #[error("Unsupported config version: {0}")]
    UnsupportedVersion(u32),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Load and validate configuration from a TOML file
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<Snapshot> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from a TOML string
pub fn parse_config(content: &str) -> ConfigResult<Snapshot> {
    let raw: RawConfig = toml::from_str(content)?;

    if raw.config_version != CURRENT_CONFIG_VERSION {
        return Err(ConfigError::UnsupportedVersion(raw.config_version));
    }

    let errors = validate_config(&raw);
    if !errors.is_empty() {
        return Err(ConfigError::ValidationFailed { errors });
    }

    let snapshot = Snapshot::from_raw(raw);
    tracing::debug!(
        user = %snapshot.user.user.id,
        categories = snapshot.user.categories.len(),
        assignments = snapshot.user.category_apps.len(),
        "Config parsed"
    );

    Ok(snapshot)
}

/// Current supported config version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

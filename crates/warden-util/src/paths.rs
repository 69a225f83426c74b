//! Default paths for warden components
//!
//! The configuration file is looked up in this order:
//! 1. `$WARDEN_CONFIG` (if set)
//! 2. `$XDG_CONFIG_HOME/warden/config.toml` (if XDG_CONFIG_HOME is set)
//! 3. `~/.config/warden/config.toml`
//! 4. `/etc/warden/config.toml`

use std::path::PathBuf;

/// Environment variable for overriding the config path
pub const WARDEN_CONFIG_ENV: &str = "WARDEN_CONFIG";

/// Application subdirectory name
const APP_DIR: &str = "warden";

const CONFIG_FILENAME: &str = "config.toml";

pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(WARDEN_CONFIG_ENV) {
        return PathBuf::from(path);
    }

    config_path_without_env()
}

/// Get the config path without checking the WARDEN_CONFIG env var.
pub fn config_path_without_env() -> PathBuf {
    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(config_home).join(APP_DIR).join(CONFIG_FILENAME);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join(CONFIG_FILENAME);
    }

    system_config_path()
}

pub fn system_config_path() -> PathBuf {
    PathBuf::from("/etc").join(APP_DIR).join(CONFIG_FILENAME)
}

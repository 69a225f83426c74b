//! Config validation CLI tool
//!
//! Validates a warden configuration file and reports any errors.

use std::path::PathBuf;
use std::process::ExitCode;
use warden_config::ConfigError;
use warden_util::{default_config_path, format_millis, format_minute_of_day};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a warden configuration file.");
            eprintln!();
            eprintln!("If no path is provided, uses: {}", default_path.display());
            eprintln!();
            eprintln!("Example:");
            eprintln!("  validate-config {}", default_path.display());
            eprintln!("  validate-config config.example.toml");
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match warden_config::load_config(&config_path) {
        Ok(snapshot) => {
            let user = &snapshot.user;
            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", warden_config::CURRENT_CONFIG_VERSION);
            println!("  User: {} ({})", user.user.id, user.user.timezone);
            println!("  Categories: {}", user.categories.len());
            println!("  App assignments: {}", user.category_apps.len());

            if !user.categories.is_empty() {
                let mut categories: Vec<_> = user.categories.values().collect();
                categories.sort_by(|a, b| a.id().cmp(b.id()));

                println!();
                println!("Categories:");
                for data in categories {
                    let parent = data
                        .category
                        .parent_category_id
                        .as_ref()
                        .map(|p| format!(" (parent: {})", p))
                        .unwrap_or_default();
                    println!("  - {}{}: {}", data.id(), parent, data.category.title);

                    for rule in &data.rules {
                        let limit = if rule.is_blocked_time_area() {
                            "blocked".to_string()
                        } else {
                            format_millis(rule.maximum_time_millis)
                        };
                        println!(
                            "      rule {} [days {:07b}] {}-{}: {}",
                            rule.id,
                            rule.day_mask.bits(),
                            format_minute_of_day(rule.start_minute_of_day),
                            format_minute_of_day(rule.end_minute_of_day),
                            limit
                        );
                    }
                }
            }

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver,
                        warden_config::CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}

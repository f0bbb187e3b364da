mod config;
pub mod migrations;
pub mod schedule_db;

pub use config::{Config, DisplayConfig, TrackerConfig};
pub use schedule_db::ScheduleDb;

use std::path::PathBuf;

/// Returns `~/.config/cadence[-dev]/` based on CADENCE_ENV.
///
/// Set CADENCE_ENV=dev to use a development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("CADENCE_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("cadence-dev")
    } else {
        base_dir.join("cadence")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

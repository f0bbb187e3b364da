pub mod conflicts;
pub mod config;
pub mod event;
pub mod habit;
pub mod task;
pub mod timer;

use cadence_core::Config;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

pub(crate) type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Print a value as JSON, honoring the display config.
pub(crate) fn print_json<T: Serialize>(value: &T) -> CliResult {
    let config = Config::load().unwrap_or_default();
    let out = if config.display.pretty_json {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{out}");
    Ok(())
}

/// Parse a `HH:MM` time-of-day argument.
pub(crate) fn parse_time(s: &str) -> Result<NaiveTime, Box<dyn std::error::Error>> {
    Ok(NaiveTime::parse_from_str(s, "%H:%M")?)
}

/// Parse a `YYYY-MM-DD` date argument, defaulting to today.
pub(crate) fn parse_date_or_today(
    s: Option<&str>,
) -> Result<NaiveDate, Box<dyn std::error::Error>> {
    match s {
        Some(s) => Ok(NaiveDate::parse_from_str(s, "%Y-%m-%d")?),
        None => Ok(Utc::now().date_naive()),
    }
}

/// Parse an RFC3339 instant argument.
pub(crate) fn parse_instant(s: &str) -> Result<DateTime<Utc>, Box<dyn std::error::Error>> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}

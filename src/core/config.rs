//! # Configuration
//!
//! Environment-driven settings, loaded once in `main` after `.env`.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

use anyhow::{anyhow, Context, Result};
use chrono::{FixedOffset, NaiveTime};
use std::str::FromStr;
use std::time::Duration;

use crate::features::reminders::delivery::RetryPolicy;
use crate::features::reminders::resolver::ResolverPolicy;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_path: String,
    pub log_level: String,
    /// Timezone expressions are resolved in
    pub utc_offset: FixedOffset,
    /// Hour used when an expression names a day but no time
    pub default_hour: u32,
    /// Reference hour from which a bare 1-11 hour means p.m.
    pub evening_split_hour: u32,
    pub delivery_max_attempts: u32,
    pub delivery_base_backoff_ms: u64,
    pub delivery_timeout_secs: u64,
    /// Owner scope of reminders created from the console
    pub console_owner: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; missing keys take their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let text = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let config = Config {
            database_path: text("DATABASE_PATH", "reminders.db"),
            log_level: text("LOG_LEVEL", "info"),
            utc_offset: parse_utc_offset(&text("REMINDER_UTC_OFFSET", "-03:00"))
                .context("Invalid REMINDER_UTC_OFFSET")?,
            default_hour: parse_var(&lookup, "REMINDER_DEFAULT_HOUR", 9)?,
            evening_split_hour: parse_var(&lookup, "REMINDER_EVENING_SPLIT_HOUR", 12)?,
            delivery_max_attempts: parse_var(&lookup, "DELIVERY_MAX_ATTEMPTS", 5)?,
            delivery_base_backoff_ms: parse_var(&lookup, "DELIVERY_BASE_BACKOFF_MS", 1000)?,
            delivery_timeout_secs: parse_var(&lookup, "DELIVERY_TIMEOUT_SECS", 30)?,
            console_owner: text("CONSOLE_OWNER", "console"),
        };

        if config.default_hour > 23 {
            return Err(anyhow!("REMINDER_DEFAULT_HOUR must be 0-23, got {}", config.default_hour));
        }
        if config.evening_split_hour > 24 {
            return Err(anyhow!(
                "REMINDER_EVENING_SPLIT_HOUR must be 0-24, got {}",
                config.evening_split_hour
            ));
        }
        if config.delivery_max_attempts == 0 {
            return Err(anyhow!("DELIVERY_MAX_ATTEMPTS must be at least 1"));
        }
        if config.console_owner.trim().is_empty() {
            return Err(anyhow!("CONSOLE_OWNER must not be empty"));
        }

        Ok(config)
    }

    pub fn resolver_policy(&self) -> ResolverPolicy {
        ResolverPolicy {
            default_time: NaiveTime::from_hms_opt(self.default_hour, 0, 0)
                .unwrap_or(ResolverPolicy::default().default_time),
            evening_split_hour: self.evening_split_hour,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.delivery_max_attempts,
            base_backoff: Duration::from_millis(self.delivery_base_backoff_ms),
            attempt_timeout: Duration::from_secs(self.delivery_timeout_secs),
            ..RetryPolicy::default()
        }
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("Invalid {key} value {raw:?}: {e}")),
        None => Ok(default),
    }
}

/// Parse `+HH:MM`, `-HH:MM`, `+HH`, `Z` or `UTC`
pub fn parse_utc_offset(raw: &str) -> Result<FixedOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).ok_or_else(|| anyhow!("UTC offset out of range"));
    }

    let (sign, rest) = match raw.chars().next() {
        Some('+') => (1, &raw[1..]),
        Some('-') => (-1, &raw[1..]),
        _ => return Err(anyhow!("Offset {raw:?} must start with + or -")),
    };
    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h, m),
        None => (rest, "0"),
    };
    let hours: i32 = hours
        .parse()
        .map_err(|_| anyhow!("Invalid hours in offset {raw:?}"))?;
    let minutes: i32 = minutes
        .parse()
        .map_err(|_| anyhow!("Invalid minutes in offset {raw:?}"))?;
    if hours > 14 || minutes > 59 {
        return Err(anyhow!("Offset {raw:?} out of range"));
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .ok_or_else(|| anyhow!("Offset {raw:?} out of range"))
}

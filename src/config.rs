//! Service configuration parsed from environment variables.
//!
//! Every knob has a default so the service starts with no environment at all
//! (in-memory storage, one-second dashboard poll, 1–3 s auto-replies).

use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
/// Same order of magnitude as a browser storage area.
pub const DEFAULT_STORAGE_QUOTA_BYTES: usize = 5 * 1024 * 1024;
pub const DEFAULT_ADMIN_POLL_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_AUTO_REPLY_MIN_DELAY_MS: u64 = 1000;
pub const DEFAULT_AUTO_REPLY_MAX_DELAY_MS: u64 = 3000;
pub const DEFAULT_JOB_IMAGE_LIMIT: usize = 3;
pub const DEFAULT_COMPARE_LIMIT: usize = 3;
pub const DEFAULT_ACTIVITY_LOG_LIMIT: usize = 100;
pub const DEFAULT_IMAGE_MAX_DIMENSION: u32 = 1200;
pub const DEFAULT_IMAGE_QUALITY: u8 = 80;
pub const DEFAULT_NOTIFY_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("AUTO_REPLY_MIN_DELAY_MS ({min}) must not exceed AUTO_REPLY_MAX_DELAY_MS ({max})")]
    DelayRange { min: u64, max: u64 },
    #[error("{key} must be greater than zero")]
    Zero { key: &'static str },
    #[error("IMAGE_QUALITY must be between 1 and 100, got {0}")]
    ImageQuality(u8),
}

/// Auto-responder knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoReplyConfig {
    pub enabled: bool,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

/// Image pipeline knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageConfig {
    /// Maximum images stored per job.
    pub per_job_limit: usize,
    /// Longest edge after compression, in pixels.
    pub max_dimension: u32,
    /// JPEG quality, 1..=100.
    pub quality: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    /// `None` runs the service on the in-memory storage area.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    /// Byte quota for the in-memory storage area. `0` disables the quota.
    pub storage_quota_bytes: usize,
    pub admin_poll_interval: Duration,
    pub auto_reply: AutoReplyConfig,
    pub images: ImageConfig,
    pub compare_limit: usize,
    pub activity_log_limit: usize,
    pub notify_channel_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_url: None,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            storage_quota_bytes: DEFAULT_STORAGE_QUOTA_BYTES,
            admin_poll_interval: Duration::from_millis(DEFAULT_ADMIN_POLL_INTERVAL_MS),
            auto_reply: AutoReplyConfig {
                enabled: true,
                min_delay: Duration::from_millis(DEFAULT_AUTO_REPLY_MIN_DELAY_MS),
                max_delay: Duration::from_millis(DEFAULT_AUTO_REPLY_MAX_DELAY_MS),
            },
            images: ImageConfig {
                per_job_limit: DEFAULT_JOB_IMAGE_LIMIT,
                max_dimension: DEFAULT_IMAGE_MAX_DIMENSION,
                quality: DEFAULT_IMAGE_QUALITY,
            },
            compare_limit: DEFAULT_COMPARE_LIMIT,
            activity_log_limit: DEFAULT_ACTIVITY_LOG_LIMIT,
            notify_channel_capacity: DEFAULT_NOTIFY_CHANNEL_CAPACITY,
        }
    }
}

impl AppConfig {
    /// Build typed config from environment variables.
    ///
    /// Optional:
    /// - `PORT`: default 3000
    /// - `DATABASE_URL`: Postgres storage area; in-memory when absent
    /// - `DB_MAX_CONNECTIONS`: default 5
    /// - `STORAGE_QUOTA_BYTES`: in-memory quota, default 5 MiB
    /// - `ADMIN_POLL_INTERVAL_MS`: default 1000
    /// - `AUTO_REPLY_ENABLED`, `AUTO_REPLY_MIN_DELAY_MS`, `AUTO_REPLY_MAX_DELAY_MS`
    /// - `JOB_IMAGE_LIMIT`, `IMAGE_MAX_DIMENSION`, `IMAGE_QUALITY`
    /// - `COMPARE_LIMIT`, `ACTIVITY_LOG_LIMIT`, `NOTIFY_CHANNEL_CAPACITY`
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` when values contradict each other.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading values through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` when values contradict each other.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let parse = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        let min_delay_ms = parse_or(&parse, "AUTO_REPLY_MIN_DELAY_MS", DEFAULT_AUTO_REPLY_MIN_DELAY_MS);
        let max_delay_ms = parse_or(&parse, "AUTO_REPLY_MAX_DELAY_MS", DEFAULT_AUTO_REPLY_MAX_DELAY_MS);
        if min_delay_ms > max_delay_ms {
            return Err(ConfigError::DelayRange { min: min_delay_ms, max: max_delay_ms });
        }

        let poll_ms = parse_or(&parse, "ADMIN_POLL_INTERVAL_MS", DEFAULT_ADMIN_POLL_INTERVAL_MS);
        if poll_ms == 0 {
            return Err(ConfigError::Zero { key: "ADMIN_POLL_INTERVAL_MS" });
        }

        let notify_channel_capacity = parse_or(&parse, "NOTIFY_CHANNEL_CAPACITY", DEFAULT_NOTIFY_CHANNEL_CAPACITY);
        if notify_channel_capacity == 0 {
            return Err(ConfigError::Zero { key: "NOTIFY_CHANNEL_CAPACITY" });
        }

        let quality = parse_or(&parse, "IMAGE_QUALITY", DEFAULT_IMAGE_QUALITY);
        if !(1..=100).contains(&quality) {
            return Err(ConfigError::ImageQuality(quality));
        }

        let enabled = parse("AUTO_REPLY_ENABLED").map_or(true, |v| parse_bool(&v));

        Ok(Self {
            port: parse_or(&parse, "PORT", DEFAULT_PORT),
            database_url: parse("DATABASE_URL"),
            db_max_connections: parse_or(&parse, "DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
            storage_quota_bytes: parse_or(&parse, "STORAGE_QUOTA_BYTES", DEFAULT_STORAGE_QUOTA_BYTES),
            admin_poll_interval: Duration::from_millis(poll_ms),
            auto_reply: AutoReplyConfig {
                enabled,
                min_delay: Duration::from_millis(min_delay_ms),
                max_delay: Duration::from_millis(max_delay_ms),
            },
            images: ImageConfig {
                per_job_limit: parse_or(&parse, "JOB_IMAGE_LIMIT", DEFAULT_JOB_IMAGE_LIMIT),
                max_dimension: parse_or(&parse, "IMAGE_MAX_DIMENSION", DEFAULT_IMAGE_MAX_DIMENSION),
                quality,
            },
            compare_limit: parse_or(&parse, "COMPARE_LIMIT", DEFAULT_COMPARE_LIMIT),
            activity_log_limit: parse_or(&parse, "ACTIVITY_LOG_LIMIT", DEFAULT_ACTIVITY_LOG_LIMIT),
            notify_channel_capacity,
        })
    }
}

/// Parse `key` or fall back to `default` when missing or malformed.
fn parse_or<T>(parse: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    parse(key).and_then(|v| v.parse::<T>().ok()).unwrap_or(default)
}

fn parse_bool(raw: &str) -> bool {
    !matches!(raw.to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off")
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

//! Configuration structures.
//!
//! Loaded by the infrastructure layer from environment variables or a
//! JSON/TOML file; every section has sane defaults so partial files parse.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_HOLD_MINUTES, DEFAULT_RATE_MAX_REQUESTS, DEFAULT_RATE_WINDOW_SECS,
    DEFAULT_REMINDER_LEASE_TTL_MINUTES,
};

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub reminders: ReminderConfig,
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
}

/// SQLite document store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "slotbook.db".into(), pool_size: 4 }
    }
}

/// HTTP email delivery endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// Full URL of the JSON send endpoint.
    pub endpoint: String,
    pub api_key: Option<String>,
    pub sender_name: String,
    pub sender_email: String,
    pub timeout_seconds: u64,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8025/send".into(),
            api_key: None,
            sender_name: "Slotbook".into(),
            sender_email: "no-reply@slotbook.local".into(),
            timeout_seconds: 10,
        }
    }
}

/// Sliding-window rate limiter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub window_seconds: u64,
    pub max_requests: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { window_seconds: DEFAULT_RATE_WINDOW_SECS, max_requests: DEFAULT_RATE_MAX_REQUESTS }
    }
}

/// Look-ahead window and schedule for one reminder kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderWindowConfig {
    /// Window start, minutes from "now" at sweep time.
    pub start_offset_minutes: i64,
    /// Window end, minutes from "now" at sweep time.
    pub end_offset_minutes: i64,
    /// Six-field cron expression driving the sweep.
    pub cron_expression: String,
}

/// Reminder sweeper settings, one window per reminder kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderConfig {
    pub twenty_four_hour: ReminderWindowConfig,
    pub three_hour: ReminderWindowConfig,
    /// Age after which a stale `sending` lease is treated as abandoned.
    pub lease_ttl_minutes: i64,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            twenty_four_hour: ReminderWindowConfig {
                start_offset_minutes: 23 * 60,
                end_offset_minutes: 24 * 60,
                cron_expression: "0 0 * * * *".into(), // hourly
            },
            three_hour: ReminderWindowConfig {
                start_offset_minutes: 2 * 60,
                end_offset_minutes: 3 * 60,
                cron_expression: "0 */15 * * * *".into(), // every 15 minutes
            },
            lease_ttl_minutes: DEFAULT_REMINDER_LEASE_TTL_MINUTES,
        }
    }
}

/// Background maintenance settings (expired-hold GC, limiter eviction).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceConfig {
    pub cron_expression: String,
    /// Grace period before an expired, unused hold is purged.
    pub hold_grace_minutes: i64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            cron_expression: "0 */10 * * * *".into(), // every 10 minutes
            hold_grace_minutes: DEFAULT_HOLD_MINUTES,
        }
    }
}

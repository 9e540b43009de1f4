//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If incomplete, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `SLOTBOOK_DB_PATH`: Database file path (required)
//! - `SLOTBOOK_DB_POOL_SIZE`: Connection pool size (required)
//! - `SLOTBOOK_EMAIL_ENDPOINT`: Email send endpoint URL (required)
//! - `SLOTBOOK_EMAIL_API_KEY`: Bearer token for the email endpoint
//! - `SLOTBOOK_EMAIL_SENDER_NAME` / `SLOTBOOK_EMAIL_SENDER_EMAIL`: from header
//! - `SLOTBOOK_RATE_WINDOW_SECS` / `SLOTBOOK_RATE_MAX_REQUESTS`: limiter
//!
//! Reminder and maintenance settings keep their defaults in env mode; use a
//! config file to override them.
//!
//! ## File Locations
//! The loader probes `./config.{json,toml}`, `./slotbook.{json,toml}`, the
//! parent directories (two levels), and paths relative to the executable.

use std::path::{Path, PathBuf};

use slotbook_domain::{Config, DatabaseConfig, EmailConfig, Result, SlotbookError};

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `SlotbookError::Config` if configuration cannot be loaded from
/// either source.
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// # Errors
/// Returns `SlotbookError::Config` if required variables are missing or
/// have invalid values.
pub fn load_from_env() -> Result<Config> {
    let db_path = env_var("SLOTBOOK_DB_PATH")?;
    let db_pool_size = env_var("SLOTBOOK_DB_POOL_SIZE").and_then(|s| {
        s.parse::<u32>().map_err(|e| SlotbookError::Config(format!("Invalid pool size: {}", e)))
    })?;

    let email_endpoint = env_var("SLOTBOOK_EMAIL_ENDPOINT")?;
    let email_api_key = std::env::var("SLOTBOOK_EMAIL_API_KEY").ok();

    let email_defaults = EmailConfig::default();
    let sender_name =
        std::env::var("SLOTBOOK_EMAIL_SENDER_NAME").unwrap_or(email_defaults.sender_name);
    let sender_email =
        std::env::var("SLOTBOOK_EMAIL_SENDER_EMAIL").unwrap_or(email_defaults.sender_email);

    let mut config = Config {
        database: DatabaseConfig { path: db_path, pool_size: db_pool_size },
        email: EmailConfig {
            endpoint: email_endpoint,
            api_key: email_api_key,
            sender_name,
            sender_email,
            timeout_seconds: email_defaults.timeout_seconds,
        },
        ..Config::default()
    };

    if let Some(window) = env_u64("SLOTBOOK_RATE_WINDOW_SECS")? {
        config.rate_limit.window_seconds = window;
    }
    if let Some(max) = env_u64("SLOTBOOK_RATE_MAX_REQUESTS")? {
        config.rate_limit.max_requests = max;
    }

    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `SlotbookError::Config` if no file is found or parsing fails.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(SlotbookError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            SlotbookError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| SlotbookError::Config(format!("Failed to read config file: {}", e)))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| SlotbookError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| SlotbookError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(SlotbookError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(vec![
            cwd.join("config.json"),
            cwd.join("config.toml"),
            cwd.join("slotbook.json"),
            cwd.join("slotbook.toml"),
            cwd.join("../config.json"),
            cwd.join("../config.toml"),
            cwd.join("../../config.json"),
            cwd.join("../../config.toml"),
        ]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(vec![
                exe_dir.join("config.json"),
                exe_dir.join("config.toml"),
                exe_dir.join("slotbook.json"),
                exe_dir.join("slotbook.toml"),
            ]);
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

/// Get required environment variable
fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        SlotbookError::Config(format!("Missing required environment variable: {}", key))
    })
}

/// Parse an optional numeric environment variable
fn env_u64(key: &str) -> Result<Option<u64>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<u64>()
            .map(Some)
            .map_err(|e| SlotbookError::Config(format!("Invalid value for {key}: {e}"))),
        Err(_) => Ok(None),
    }
}

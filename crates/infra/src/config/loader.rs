//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. If `POMOSYNC_DB_PATH` is set, the configuration is built from
//!    environment variables (every other variable is optional)
//! 2. Otherwise the loader searches the standard locations for a config file
//! 3. With no file either, built-in defaults are used
//!
//! ## Environment Variables
//! - `POMOSYNC_DB_PATH`: Database file path
//! - `POMOSYNC_DB_POOL_SIZE`: Connection pool size
//! - `POMOSYNC_DB_BUSY_TIMEOUT_MS`: SQLite busy timeout
//! - `POMOSYNC_SCHEDULER_ENABLED`: Whether the reminder worker runs
//! - `POMOSYNC_SCHEDULER_POLL_INTERVAL`: Poll interval in seconds
//! - `POMOSYNC_SCHEDULER_BATCH_SIZE`: Reminders per pass
//! - `POMOSYNC_SCHEDULER_DELIVERY_TIMEOUT`: Delivery timeout in seconds
//! - `POMOSYNC_SCHEDULER_LEASE`: Claim lease in seconds
//! - `POMOSYNC_WEBHOOK_URL`: Reminder webhook endpoint
//! - `POMOSYNC_SINGLE_ACTIVE_SESSION`: Enforce one open session per owner
//! - `POMOSYNC_RECORD_CONFLICTS`: Persist rejected writes
//! - `POMOSYNC_LOG_LEVEL`: Default log filter
//! - `POMOSYNC_LOG_JSON`: Emit JSON logs
//!
//! ## File Locations
//! `config.{json,toml}` and `pomosync.{json,toml}` in the working directory
//! and its two parents, then the same names next to the executable.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use pomosync_domain::{
    Config, DatabaseConfig, LoggingConfig, PomoSyncError, Result, SchedulerConfig,
    SyncPolicyConfig,
};

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `PomoSyncError::Config` if an environment value is malformed or a
/// config file exists but cannot be parsed.
pub fn load() -> Result<Config> {
    if std::env::var_os("POMOSYNC_DB_PATH").is_some() {
        let config = load_from_env()?;
        tracing::info!("Configuration loaded from environment variables");
        return Ok(config);
    }

    match find_config_file() {
        Some(path) => load_from_file(Some(path)),
        None => {
            tracing::info!("No config file found, using defaults");
            Ok(Config::default())
        }
    }
}

/// Load configuration from environment variables
///
/// `POMOSYNC_DB_PATH` is required; everything else falls back to defaults.
///
/// # Errors
/// Returns `PomoSyncError::Config` if the path is missing, a numeric value
/// does not parse, or the scheduler lease does not outlive the delivery
/// timeout.
pub fn load_from_env() -> Result<Config> {
    let db_defaults = DatabaseConfig::default();
    let scheduler_defaults = SchedulerConfig::default();
    let sync_defaults = SyncPolicyConfig::default();
    let logging_defaults = LoggingConfig::default();

    let config = Config {
        database: DatabaseConfig {
            path: env_var("POMOSYNC_DB_PATH")?,
            pool_size: env_parse("POMOSYNC_DB_POOL_SIZE", db_defaults.pool_size)?,
            busy_timeout_ms: env_parse("POMOSYNC_DB_BUSY_TIMEOUT_MS", db_defaults.busy_timeout_ms)?,
        },
        scheduler: SchedulerConfig {
            enabled: env_bool("POMOSYNC_SCHEDULER_ENABLED", scheduler_defaults.enabled),
            poll_interval_secs: env_parse(
                "POMOSYNC_SCHEDULER_POLL_INTERVAL",
                scheduler_defaults.poll_interval_secs,
            )?,
            batch_size: env_parse("POMOSYNC_SCHEDULER_BATCH_SIZE", scheduler_defaults.batch_size)?,
            delivery_timeout_secs: env_parse(
                "POMOSYNC_SCHEDULER_DELIVERY_TIMEOUT",
                scheduler_defaults.delivery_timeout_secs,
            )?,
            lease_secs: env_parse("POMOSYNC_SCHEDULER_LEASE", scheduler_defaults.lease_secs)?,
            webhook_url: std::env::var("POMOSYNC_WEBHOOK_URL").ok().filter(|url| !url.is_empty()),
        },
        sync: SyncPolicyConfig {
            enforce_single_active_session: env_bool(
                "POMOSYNC_SINGLE_ACTIVE_SESSION",
                sync_defaults.enforce_single_active_session,
            ),
            record_conflicts: env_bool("POMOSYNC_RECORD_CONFLICTS", sync_defaults.record_conflicts),
        },
        logging: LoggingConfig {
            level: std::env::var("POMOSYNC_LOG_LEVEL").unwrap_or(logging_defaults.level),
            json: env_bool("POMOSYNC_LOG_JSON", logging_defaults.json),
        },
    };
    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, searches the standard locations. JSON and TOML are
/// supported, detected by file extension.
///
/// # Errors
/// Returns `PomoSyncError::Config` if the file is missing, unreadable or
/// malformed.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(PomoSyncError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => find_config_file().ok_or_else(|| {
            PomoSyncError::Config("No config file found in any of the standard locations".into())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| PomoSyncError::Config(format!("Failed to read config file: {}", e)))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| PomoSyncError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| PomoSyncError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(PomoSyncError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// First existing config file among the standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    const NAMES: [&str; 4] = ["config.json", "config.toml", "pomosync.json", "pomosync.toml"];

    let mut roots = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        roots.extend([cwd.clone(), cwd.join(".."), cwd.join("../..")]);
    }
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            roots.push(exe_dir.to_path_buf());
        }
    }

    roots
        .iter()
        .flat_map(|root| NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.exists())
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        PomoSyncError::Config(format!("Missing required environment variable: {}", key))
    })
}

/// Parse an optional variable, falling back to `default` when unset.
fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| PomoSyncError::Config(format!("Invalid value for {key}: {e}"))),
        Err(_) => Ok(default),
    }
}

/// Accepts `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive).
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

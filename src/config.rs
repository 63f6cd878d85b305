//! Chat server configuration.
//!
//! Configuration is loaded from environment variables. Room passwords are
//! redacted in Debug output.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::actor::RoomSettings;

/// Default server bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8900";

/// Default keep-alive ping interval in seconds.
pub const DEFAULT_KEEPALIVE_SECONDS: u64 = 30;

/// Default idle timeout in seconds (5 hours).
pub const DEFAULT_IDLE_TIMEOUT_SECONDS: u64 = 5 * 60 * 60;

/// Default per-delivery wait in seconds.
pub const DEFAULT_DELIVERY_TIMEOUT_SECONDS: u64 = 5;

/// Name of the room created when none are configured.
pub const DEFAULT_ROOM_NAME: &str = "default";

/// A room to create at startup.
#[derive(Clone, PartialEq, Eq)]
pub struct RoomConfig {
    pub name: String,
    /// Empty for a public room.
    pub password: String,
}

impl fmt::Debug for RoomConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let password = if self.password.is_empty() {
            ""
        } else {
            "[REDACTED]"
        };
        f.debug_struct("RoomConfig")
            .field("name", &self.name)
            .field("password", &password)
            .finish()
    }
}

/// Chat server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listener address (default: "127.0.0.1:8900").
    pub bind_address: String,

    /// Path of the account file (`<secret> <name>` per line).
    pub user_file: PathBuf,

    /// Rooms to create; empty means one implicit public room.
    pub rooms: Vec<RoomConfig>,

    /// Directory for per-room audit files.
    pub log_dir: PathBuf,

    /// Interval between keep-alive pings on idle connections.
    pub keepalive: Duration,

    /// How long a connection may go without traffic before it is dropped.
    pub idle_timeout: Duration,

    /// Longest a single delivery may wait on a slow recipient.
    pub delivery_timeout: Duration,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid duration configuration: {0}")]
    InvalidDuration(String),

    #[error("Invalid room configuration: {0}")]
    InvalidRoom(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("CHAT_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let user_file = vars
            .get("CHAT_USER_FILE")
            .filter(|path| !path.is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| ConfigError::MissingEnvVar("CHAT_USER_FILE".to_string()))?;

        let rooms = match vars.get("CHAT_ROOMS") {
            Some(spec) => parse_rooms(spec)?,
            None => Vec::new(),
        };

        let log_dir = vars
            .get("CHAT_LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        let keepalive = parse_seconds(vars, "CHAT_KEEPALIVE_SECONDS", DEFAULT_KEEPALIVE_SECONDS)?;
        let idle_timeout =
            parse_seconds(vars, "CHAT_IDLE_TIMEOUT_SECONDS", DEFAULT_IDLE_TIMEOUT_SECONDS)?;
        let delivery_timeout = parse_seconds(
            vars,
            "CHAT_DELIVERY_TIMEOUT_SECONDS",
            DEFAULT_DELIVERY_TIMEOUT_SECONDS,
        )?;

        Ok(Config {
            bind_address,
            user_file,
            rooms,
            log_dir,
            keepalive,
            idle_timeout,
            delivery_timeout,
        })
    }

    /// Settings handed to every room actor.
    pub fn room_settings(&self) -> RoomSettings {
        RoomSettings {
            log_dir: self.log_dir.clone(),
            delivery_timeout: self.delivery_timeout,
            ..RoomSettings::default()
        }
    }
}

/// Parse `name[:password]` entries separated by `;`.
fn parse_rooms(spec: &str) -> Result<Vec<RoomConfig>, ConfigError> {
    spec.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (name, password) = match entry.split_once(':') {
                Some((name, password)) => (name.trim(), password),
                None => (entry, ""),
            };
            if name.is_empty() {
                return Err(ConfigError::InvalidRoom(format!(
                    "CHAT_ROOMS entry '{}' has no room name",
                    entry
                )));
            }
            Ok(RoomConfig {
                name: name.to_string(),
                password: password.to_string(),
            })
        })
        .collect()
}

fn parse_seconds(
    vars: &HashMap<String, String>,
    key: &str,
    default: u64,
) -> Result<Duration, ConfigError> {
    let Some(value_str) = vars.get(key) else {
        return Ok(Duration::from_secs(default));
    };

    let value: u64 = value_str.parse().map_err(|e| {
        ConfigError::InvalidDuration(format!(
            "{} must be a valid integer, got '{}': {}",
            key, value_str, e
        ))
    })?;

    if value == 0 {
        return Err(ConfigError::InvalidDuration(format!(
            "{} must be positive, got {}",
            key, value
        )));
    }

    Ok(Duration::from_secs(value))
}

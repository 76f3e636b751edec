//! Configuration types for the registry service
//!
//! All settings have defaults matching the well-known locations the companion
//! application expects, and can be overridden through environment variables.
//!
//! | Variable | Default |
//! |---|---|
//! | `DDNS_DATABASE_PATH` | `config.db` |
//! | `DDNS_SOCKET_PATH` | `../frontend/connection` |
//! | `DDNS_PIPE_NAME` | `\\.\pipe\goddns` |
//! | `DDNS_TCP_ADDR` | `127.0.0.1:65000` |
//! | `DDNS_COMPANION_DIR` | `../frontend` |
//! | `DDNS_COMPANION_PROGRAM` | `nwjs-sdk/nw.exe` (Windows), `nwjs-sdk/nw` |
//! | `DDNS_COMPANION_ENABLED` | `true` |
//! | `DDNS_FAVICON_PATH` | `../frontend/goddns.ico` |
//! | `DDNS_SHUTDOWN_GRACE_SECS` | `5` |
//! | `DDNS_LOG_LEVEL` | `info` |

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Main service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Path of the sqlite database
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Listener settings
    #[serde(default)]
    pub transport: TransportConfig,

    /// Companion application settings
    #[serde(default)]
    pub companion: CompanionConfig,

    /// Icon served at `/favicon.ico`
    #[serde(default = "default_favicon_path")]
    pub favicon_path: PathBuf,

    /// How long in-flight requests get to finish on shutdown (in seconds)
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,

    /// Log level name
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl ServiceConfig {
    /// Create a configuration with all defaults
    pub fn new() -> Self {
        Self {
            database_path: default_database_path(),
            transport: TransportConfig::default(),
            companion: CompanionConfig::default(),
            favicon_path: default_favicon_path(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
            log_level: default_log_level(),
        }
    }

    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new();

        if let Some(path) = lookup("DDNS_DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("DDNS_SOCKET_PATH") {
            config.transport.socket_path = PathBuf::from(path);
        }
        if let Some(name) = lookup("DDNS_PIPE_NAME") {
            config.transport.pipe_name = name;
        }
        if let Some(addr) = lookup("DDNS_TCP_ADDR") {
            config.transport.tcp_addr = addr
                .parse()
                .map_err(|e| Error::config(format!("DDNS_TCP_ADDR '{}' is invalid: {}", addr, e)))?;
        }
        if let Some(dir) = lookup("DDNS_COMPANION_DIR") {
            config.companion.dir = PathBuf::from(dir);
        }
        if let Some(program) = lookup("DDNS_COMPANION_PROGRAM") {
            config.companion.program = PathBuf::from(program);
        }
        if let Some(enabled) = lookup("DDNS_COMPANION_ENABLED") {
            config.companion.enabled = parse_bool("DDNS_COMPANION_ENABLED", &enabled)?;
        }
        if let Some(path) = lookup("DDNS_FAVICON_PATH") {
            config.favicon_path = PathBuf::from(path);
        }
        if let Some(secs) = lookup("DDNS_SHUTDOWN_GRACE_SECS") {
            config.shutdown_grace_secs = secs.parse().map_err(|_| {
                Error::config(format!("DDNS_SHUTDOWN_GRACE_SECS '{}' is not a number", secs))
            })?;
        }
        if let Some(level) = lookup("DDNS_LOG_LEVEL") {
            config.log_level = level;
        }

        config.companion.dir = absolutize(&config.companion.dir)?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(Error::config("DDNS_DATABASE_PATH cannot be empty"));
        }

        self.transport.validate()?;

        if !(1..=300).contains(&self.shutdown_grace_secs) {
            return Err(Error::config(format!(
                "DDNS_SHUTDOWN_GRACE_SECS must be between 1 and 300 seconds. Got: {}",
                self.shutdown_grace_secs
            )));
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(Error::config(format!(
                    "DDNS_LOG_LEVEL '{}' is not valid. \
                    Valid levels: trace, debug, info, warn, error",
                    self.log_level
                )));
            }
        }

        Ok(())
    }

    /// Shutdown grace period
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Filesystem socket used where named pipes are unavailable
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// Named pipe used on Windows
    #[serde(default = "default_pipe_name")]
    pub pipe_name: String,

    /// Loopback address of the optional TCP listener
    #[serde(default = "default_tcp_addr")]
    pub tcp_addr: SocketAddr,
}

impl TransportConfig {
    /// Validate the listener configuration
    pub fn validate(&self) -> Result<()> {
        if self.socket_path.as_os_str().is_empty() {
            return Err(Error::config("DDNS_SOCKET_PATH cannot be empty"));
        }
        if self.pipe_name.is_empty() {
            return Err(Error::config("DDNS_PIPE_NAME cannot be empty"));
        }
        if !self.tcp_addr.ip().is_loopback() {
            return Err(Error::config(format!(
                "DDNS_TCP_ADDR must be a loopback address. Got: {}",
                self.tcp_addr
            )));
        }
        Ok(())
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            pipe_name: default_pipe_name(),
            tcp_addr: default_tcp_addr(),
        }
    }
}

/// Companion application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanionConfig {
    /// Working directory of the companion
    #[serde(default = "default_companion_dir")]
    pub dir: PathBuf,

    /// Executable, relative to `dir`
    #[serde(default = "default_companion_program")]
    pub program: PathBuf,

    /// Whether to launch it at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Default for CompanionConfig {
    fn default() -> Self {
        Self {
            dir: default_companion_dir(),
            program: default_companion_program(),
            enabled: default_enabled(),
        }
    }
}

fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir()
        .map_err(|e| Error::config(format!("Cannot resolve {}: {}", path.display(), e)))?;
    Ok(cwd.join(path))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::config(format!("{} '{}' is not a boolean", key, value))),
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from("config.db")
}

fn default_socket_path() -> PathBuf {
    PathBuf::from("../frontend/connection")
}

fn default_pipe_name() -> String {
    r"\\.\pipe\goddns".to_string()
}

fn default_tcp_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 65000))
}

fn default_companion_dir() -> PathBuf {
    PathBuf::from("../frontend")
}

fn default_companion_program() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from("nwjs-sdk/nw.exe")
    } else {
        PathBuf::from("nwjs-sdk/nw")
    }
}

fn default_favicon_path() -> PathBuf {
    PathBuf::from("../frontend/goddns.ico")
}

fn default_enabled() -> bool {
    true
}

fn default_shutdown_grace_secs() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = ServiceConfig::from_lookup(lookup_from(&[])).unwrap();

        config.validate().unwrap();
        assert_eq!(config.transport.tcp_addr.port(), 65000);
        assert_eq!(config.shutdown_grace(), Duration::from_secs(5));
        assert!(config.companion.dir.is_absolute());
        assert!(config.companion.enabled);
    }

    #[test]
    fn test_env_overrides() {
        let config = ServiceConfig::from_lookup(lookup_from(&[
            ("DDNS_DATABASE_PATH", "/var/lib/ddns/config.db"),
            ("DDNS_TCP_ADDR", "127.0.0.1:7000"),
            ("DDNS_COMPANION_ENABLED", "no"),
            ("DDNS_SHUTDOWN_GRACE_SECS", "10"),
        ]))
        .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/var/lib/ddns/config.db"));
        assert_eq!(config.transport.tcp_addr.port(), 7000);
        assert!(!config.companion.enabled);
        assert_eq!(config.shutdown_grace_secs, 10);
    }

    #[test]
    fn test_unparsable_values_rejected() {
        assert!(ServiceConfig::from_lookup(lookup_from(&[("DDNS_TCP_ADDR", "localhost")])).is_err());
        assert!(
            ServiceConfig::from_lookup(lookup_from(&[("DDNS_COMPANION_ENABLED", "maybe")])).is_err()
        );
        assert!(
            ServiceConfig::from_lookup(lookup_from(&[("DDNS_SHUTDOWN_GRACE_SECS", "soon")])).is_err()
        );
    }

    #[test]
    fn test_non_loopback_tcp_rejected() {
        let config =
            ServiceConfig::from_lookup(lookup_from(&[("DDNS_TCP_ADDR", "0.0.0.0:65000")])).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_grace_period_range() {
        let mut config = ServiceConfig::new();
        config.shutdown_grace_secs = 0;
        assert!(config.validate().is_err());

        config.shutdown_grace_secs = 301;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = ServiceConfig::new();
        config.log_level = "verbose".to_string();
        assert!(config.validate().is_err());
    }
}

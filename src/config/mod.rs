//! Configuration management for dbdump
//!
//! Configuration is assembled from several sources. Precedence, highest to
//! lowest:
//! 1. Command-line arguments
//! 2. Environment variables (`DBDUMP_*`)
//! 3. Configuration file (TOML)
//! 4. Default values

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::dump::coordinator::DEFAULT_DOWNLOAD_URL;
use crate::dump::orchestrator::DEFAULT_STDERR_TAIL;
use crate::dump::request::{ConnectionParams, is_valid_charset};
use crate::error::{ConfigError, Result};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Database connection defaults
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Dump engine settings
    #[serde(default)]
    pub dump: DumpConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Connection-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// `host[:port]`
    #[serde(default = "default_address")]
    pub address: String,

    #[serde(default = "default_user")]
    pub user: String,

    #[serde(default)]
    pub password: String,

    #[serde(default = "default_charset")]
    pub charset: String,

    /// Database used when none is given on the command line
    #[serde(default)]
    pub database: String,
}

/// Dump engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpConfig {
    /// Dump utility, looked up on `PATH` unless absolute
    #[serde(default = "default_program")]
    pub program: PathBuf,

    /// Overrides the OS temp dir as root of `dbmanager/cache`
    #[serde(default)]
    pub temp_root: Option<PathBuf>,

    /// Stderr lines kept per pass for error reports
    #[serde(default = "default_stderr_tail_lines")]
    pub stderr_tail_lines: usize,

    /// Advertised location of background archives
    #[serde(default = "default_download_url")]
    pub download_url: String,

    /// Strip AUTO_INCREMENT counters from file-backed structure dumps
    #[serde(default = "default_reset_auto_increment")]
    pub reset_auto_increment: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Enable timestamps in logs
    #[serde(default = "default_log_timestamps")]
    pub timestamps: bool,
}

/// Log level options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

// Default value functions
fn default_address() -> String {
    "127.0.0.1:3306".to_string()
}

fn default_user() -> String {
    "root".to_string()
}

fn default_charset() -> String {
    "utf8mb4".to_string()
}

fn default_program() -> PathBuf {
    PathBuf::from("mysqldump")
}

fn default_stderr_tail_lines() -> usize {
    DEFAULT_STDERR_TAIL
}

fn default_download_url() -> String {
    DEFAULT_DOWNLOAD_URL.to_string()
}

fn default_reset_auto_increment() -> bool {
    true
}

fn default_log_level() -> LogLevel {
    LogLevel::Warn
}

fn default_log_timestamps() -> bool {
    true
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            user: default_user(),
            password: String::new(),
            charset: default_charset(),
            database: String::new(),
        }
    }
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            temp_root: None,
            stderr_tail_lines: default_stderr_tail_lines(),
            download_url: default_download_url(),
            reset_auto_increment: default_reset_auto_increment(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            timestamps: default_log_timestamps(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path.display().to_string()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Load configuration from file and environment
    ///
    /// An explicit `path` must exist. Without one the default path is used
    /// when present, and defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default = Self::default_path();
                if default.exists() {
                    Self::from_file(default)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply `DBDUMP_*` overrides through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("DBDUMP_PROGRAM") {
            self.dump.program = PathBuf::from(v);
        }
        if let Some(v) = lookup("DBDUMP_TEMP_ROOT") {
            self.dump.temp_root = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("DBDUMP_HOST") {
            self.connection.address = v;
        }
        if let Some(v) = lookup("DBDUMP_USER") {
            self.connection.user = v;
        }
        if let Some(v) = lookup("DBDUMP_PASSWORD") {
            self.connection.password = v;
        }
        if let Some(v) = lookup("DBDUMP_DATABASE") {
            self.connection.database = v;
        }
        if let Some(v) = lookup("DBDUMP_CHARSET") {
            self.connection.charset = v;
        }
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".dbdump")
            .join("config.toml")
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !is_valid_charset(&self.connection.charset) {
            return Err(ConfigError::InvalidValue {
                field: "connection.charset".to_string(),
                value: self.connection.charset.clone(),
            }
            .into());
        }
        if self.dump.stderr_tail_lines == 0 {
            return Err(ConfigError::InvalidValue {
                field: "dump.stderr_tail_lines".to_string(),
                value: "0".to_string(),
            }
            .into());
        }
        if self.dump.program.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "dump.program".to_string(),
                value: String::new(),
            }
            .into());
        }
        Ok(())
    }

    /// Root under which `dbmanager/cache` lives
    pub fn temp_root(&self) -> PathBuf {
        self.dump
            .temp_root
            .as_deref()
            .map(|p| crate::utils::fs::expand_home(&p.to_string_lossy()))
            .unwrap_or_else(std::env::temp_dir)
    }

    /// Render the effective configuration with the password masked
    pub fn to_toml_string(&self) -> Result<String> {
        let mut shown = self.clone();
        if !shown.connection.password.is_empty() {
            shown.connection.password = "********".to_string();
        }
        toml::to_string_pretty(&shown).map_err(|e| ConfigError::Generic(e.to_string()).into())
    }
}

impl ConnectionConfig {
    /// Connection parameters for `database`
    pub fn params(&self, database: &str) -> ConnectionParams {
        ConnectionParams::from_address(&self.address, &self.user, &self.password, &self.charset, database)
    }
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.connection.address, "127.0.0.1:3306");
        assert_eq!(config.connection.charset, "utf8mb4");
        assert_eq!(config.dump.program, PathBuf::from("mysqldump"));
        assert_eq!(config.dump.stderr_tail_lines, 1000);
        assert!(config.dump.reset_auto_increment);
        assert_eq!(config.logging.level, LogLevel::Warn);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config = Config::from_toml_str(
            r#"
            [connection]
            address = "db.internal:3307"
            database = "shop"

            [dump]
            reset_auto_increment = false
            "#,
        )
        .unwrap();

        assert_eq!(config.connection.address, "db.internal:3307");
        assert_eq!(config.connection.user, "root");
        assert!(!config.dump.reset_auto_increment);
        assert_eq!(config.dump.download_url, DEFAULT_DOWNLOAD_URL);

        let params = config.connection.params("shop");
        assert_eq!(params.host, "db.internal");
        assert_eq!(params.port, "3307");
    }

    #[test]
    fn test_invalid_toml() {
        let err = Config::from_toml_str("[connection\naddress = 1").unwrap_err();
        assert!(matches!(err, crate::error::DumpError::Config(ConfigError::InvalidFormat(_))));
    }

    #[test]
    fn test_missing_explicit_file() {
        let tmp = tempfile::tempdir().unwrap();
        let err = Config::load(Some(tmp.path().join("nope.toml").as_path())).unwrap_err();
        assert!(matches!(err, crate::error::DumpError::Config(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("DBDUMP_PROGRAM", "/usr/local/bin/mysqldump"),
            ("DBDUMP_HOST", "10.0.0.5"),
            ("DBDUMP_DATABASE", "billing"),
            ("DBDUMP_CHARSET", "latin1"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.dump.program, PathBuf::from("/usr/local/bin/mysqldump"));
        assert_eq!(config.connection.address, "10.0.0.5");
        assert_eq!(config.connection.database, "billing");
        assert_eq!(config.connection.charset, "latin1");
        assert_eq!(config.connection.user, "root");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.connection.charset = "utf9".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.dump.stderr_tail_lines = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_to_toml_masks_password() {
        let mut config = Config::default();
        config.connection.password = "hunter2".to_string();
        let rendered = config.to_toml_string().unwrap();
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("********"));

        let reparsed = Config::from_toml_str(&rendered).unwrap();
        assert_eq!(reparsed.connection.address, config.connection.address);
    }

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(LogLevel::Debug.to_tracing_level(), tracing::Level::DEBUG);
        assert_eq!(LogLevel::Error.to_tracing_level(), tracing::Level::ERROR);
    }
}

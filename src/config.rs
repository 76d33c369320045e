//! Configuration file parser for ~/.config/podsync/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are silently ignored by serde (with `deny_unknown_fields` off),
//! though we log a warning when the file contains potential typos.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    /// A value parsed but cannot be used.
    #[error("Invalid config value: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database location. Defaults to `podsync.db` next to the config file.
    pub database_path: Option<PathBuf>,

    /// Minutes between background episode updates.
    pub update_interval_minutes: u64,

    /// Only run background updates while a network connection is up.
    pub require_network: bool,

    /// Only run background updates while the machine is charging.
    pub require_charging: bool,

    /// Seconds between constraint re-checks while an update is waiting to run.
    pub constraint_poll_seconds: u64,

    pub http: HttpConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            update_interval_minutes: 60,
            require_network: true,
            require_charging: true,
            constraint_poll_seconds: 60,
            http: HttpConfig::default(),
        }
    }
}

/// Timeouts and limits for feed requests.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub write_timeout_secs: u64,
    /// Largest feed body accepted, in bytes.
    pub max_feed_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            read_timeout_secs: 30,
            write_timeout_secs: 30,
            max_feed_bytes: 10 * 1024 * 1024,
        }
    }
}

impl HttpConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }
}

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // SEC-014: Check file size before reading to prevent memory exhaustion
        // from a maliciously large or corrupted config file.
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        // Parse the TOML content first as a raw table to detect unknown keys
        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = [
                "database_path",
                "update_interval_minutes",
                "require_network",
                "require_charging",
                "constraint_poll_seconds",
                "http",
            ];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        tracing::info!(
            path = %path.display(),
            interval_minutes = config.update_interval_minutes,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Rejects values that would make the updater spin or never finish a request.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.update_interval_minutes == 0 {
            return Err(ConfigError::Invalid(
                "update_interval_minutes must be at least 1".into(),
            ));
        }
        if self.constraint_poll_seconds == 0 {
            return Err(ConfigError::Invalid(
                "constraint_poll_seconds must be at least 1".into(),
            ));
        }
        let http = &self.http;
        if http.connect_timeout_secs == 0 || http.read_timeout_secs == 0 || http.write_timeout_secs == 0
        {
            return Err(ConfigError::Invalid("http timeouts must be at least 1 second".into()));
        }
        if http.max_feed_bytes == 0 {
            return Err(ConfigError::Invalid("http.max_feed_bytes must be positive".into()));
        }
        Ok(())
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_minutes * 60)
    }

    pub fn constraint_poll(&self) -> Duration {
        Duration::from_secs(self.constraint_poll_seconds)
    }

    /// Database file to open: the configured path, or `podsync.db` in `config_dir`.
    pub fn database_path(&self, config_dir: &Path) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| config_dir.join("podsync.db"))
    }
}

// ============================================================================
// Tests
// ============================================================================

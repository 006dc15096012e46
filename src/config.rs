//! Configuration management for Zevermon
//!
//! This module handles loading, validation, and management of the application
//! configuration from YAML files. The inverter list doubles as the registry of
//! configured devices: the registration flow appends entries and saves the
//! file back.

use crate::error::{Result, ZevermonError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Inclusive lower bound for the per-inverter poll interval, in seconds
pub const MIN_POLL_INTERVAL_SECS: u64 = 10;

/// Inclusive upper bound for the per-inverter poll interval, in seconds
pub const MAX_POLL_INTERVAL_SECS: u64 = 3600;

/// Poll interval assigned to newly registered inverters
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Configured inverters; one entry per physical device
    pub inverters: Vec<InverterEntry>,

    /// Device transport configuration
    pub device: DeviceConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Web server binding configuration
    pub web: WebConfig,
}

/// One configured inverter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InverterEntry {
    /// Host address of the inverter's local web interface
    pub host: String,

    /// Serial number resolved from the device at registration time
    pub serial_number: String,

    /// Poll interval in seconds, inclusive range [10, 3600]
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Whether the power on/off controls may be invoked for this inverter.
    /// Off by default; flipping a breaker-sized switch should be opt-in.
    #[serde(default)]
    pub allow_power_control: bool,
}

/// Device transport parameters shared by all inverters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Per-call timeout in seconds for status and control requests
    pub timeout_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Path to log file; empty disables file logging
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

/// Web server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// Bind address
    pub host: String,

    /// TCP port
    pub port: u16,
}

impl Default for InverterEntry {
    fn default() -> Self {
        Self {
            host: String::new(),
            serial_number: String::new(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            allow_power_control: false,
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self { timeout_secs: 5 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            file: "/tmp/zevermon.log".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8091,
        }
    }
}

impl InverterEntry {
    /// Poll interval as a [`Duration`]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl DeviceConfig {
    /// Per-call timeout as a [`Duration`]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the default locations
    pub fn load() -> Result<Self> {
        let default_paths = ["zevermon.yaml", "/etc/zevermon/config.yaml"];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        // Fall back to default configuration
        Ok(Config::default())
    }

    /// On-disk location used when persisting configuration changes.
    ///
    /// Picks the first default path that exists, or the working-directory
    /// file when none does yet.
    pub fn resolve_path() -> PathBuf {
        let default_paths = ["zevermon.yaml", "/etc/zevermon/config.yaml"];

        for path in &default_paths {
            if Path::new(path).exists() {
                return PathBuf::from(path);
            }
        }

        PathBuf::from("zevermon.yaml")
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Look up a configured inverter by serial number
    pub fn entry(&self, serial: &str) -> Option<&InverterEntry> {
        self.inverters.iter().find(|e| e.serial_number == serial)
    }

    /// Mutable lookup of a configured inverter by serial number
    pub fn entry_mut(&mut self, serial: &str) -> Option<&mut InverterEntry> {
        self.inverters.iter_mut().find(|e| e.serial_number == serial)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        for entry in &self.inverters {
            if entry.host.is_empty() {
                return Err(ZevermonError::validation(
                    "inverters.host",
                    "Host cannot be empty",
                ));
            }
            if entry.serial_number.is_empty() {
                return Err(ZevermonError::validation(
                    "inverters.serial_number",
                    "Serial number cannot be empty",
                ));
            }
            validate_poll_interval(Some(entry.poll_interval_secs))?;
        }

        // Serial numbers are the registry key; collisions would shadow entries
        for (i, entry) in self.inverters.iter().enumerate() {
            if self.inverters[..i]
                .iter()
                .any(|other| other.serial_number == entry.serial_number)
            {
                return Err(ZevermonError::validation(
                    "inverters.serial_number",
                    "Duplicate serial number in configuration",
                ));
            }
        }

        if self.device.timeout_secs == 0 {
            return Err(ZevermonError::validation(
                "device.timeout_secs",
                "Timeout must be greater than 0",
            ));
        }

        if self.web.port == 0 {
            return Err(ZevermonError::validation(
                "web.port",
                "Port must be greater than 0",
            ));
        }

        Ok(())
    }
}

/// Validate a poll interval against the inclusive [10, 3600] second range.
///
/// `None` means the caller did not supply a value at all, which is rejected
/// the same way an out-of-range value is: with a field-level error.
pub fn validate_poll_interval(value: Option<u64>) -> Result<u64> {
    match value {
        None => Err(ZevermonError::validation(
            "poll_interval_secs",
            "A poll interval is required",
        )),
        Some(v) if (MIN_POLL_INTERVAL_SECS..=MAX_POLL_INTERVAL_SECS).contains(&v) => Ok(v),
        Some(_) => Err(ZevermonError::validation(
            "poll_interval_secs",
            "Poll interval must be between 10 and 3600 seconds",
        )),
    }
}

//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section and field is optional; an empty file yields the defaults.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;

use crate::calibration::CalibrationProfile;
use crate::error::{FusionError, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub serial: SerialConfig,
    pub pointer: PointerConfig,
    pub discovery: DiscoveryConfig,
    pub logging: LoggingConfig,
}

/// Serial ranging device configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    /// Device paths tried in order until one opens
    #[serde(default = "default_serial_candidates")]
    pub candidates: Vec<String>,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

/// Pointer (mouse) configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PointerConfig {
    /// Calibration registry key
    #[serde(default = "default_pointer_profile")]
    pub profile: String,

    /// Overrides the profile's device path
    #[serde(default)]
    pub path: Option<String>,

    /// Fail startup when the pointer device cannot be opened
    #[serde(default = "default_pointer_required")]
    pub required: bool,
}

/// Peer discovery configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DiscoveryConfig {
    /// UDP port the telemetry sink listens on
    #[serde(default = "default_discovery_port")]
    pub port: u16,

    /// Scan `.255` of the local /24 as well
    #[serde(default)]
    pub include_broadcast: bool,

    #[serde(default = "default_nmap_path")]
    pub nmap_path: String,

    /// Skips local address detection; set it when several LANs are attached
    /// or detection picks the wrong interface
    #[serde(default)]
    pub local_address: Option<Ipv4Addr>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Enables a daily-rolling log file in this directory
    #[serde(default)]
    pub log_dir: Option<String>,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            candidates: default_serial_candidates(),
            baud_rate: default_baud_rate(),
        }
    }
}

impl Default for PointerConfig {
    fn default() -> Self {
        Self {
            profile: default_pointer_profile(),
            path: None,
            required: default_pointer_required(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            port: default_discovery_port(),
            include_broadcast: false,
            nmap_path: default_nmap_path(),
            local_address: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: None,
        }
    }
}

// Default value functions
fn default_serial_candidates() -> Vec<String> {
    [
        "/dev/ttyACM0",
        "/dev/ttyACM1",
        "/dev/ttyACM2",
        "/dev/ttyUSB0",
        "/dev/ttyUSB1",
        "/dev/ttyUSB2",
    ]
    .iter()
    .map(|path| path.to_string())
    .collect()
}
fn default_baud_rate() -> u32 { 9600 }

fn default_pointer_profile() -> String { "zebronics".to_string() }
fn default_pointer_required() -> bool { true }

fn default_discovery_port() -> u16 { 1234 }
fn default_nmap_path() -> String { "nmap".to_string() }

fn default_log_level() -> String { "info".to_string() }

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use range_fusion::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolves the configured pointer calibration profile.
    ///
    /// # Errors
    ///
    /// Returns `UnknownProfile` if the key is not registered.
    pub fn pointer_profile(&self) -> Result<CalibrationProfile> {
        CalibrationProfile::lookup(&self.pointer.profile)
    }

    /// Device file to read pointer records from.
    pub fn pointer_path(&self) -> Result<String> {
        match &self.pointer.path {
            Some(path) => Ok(path.clone()),
            None => Ok(self.pointer_profile()?.path().to_string()),
        }
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.serial.candidates.is_empty() {
            return Err(invalid("serial candidates cannot be empty"));
        }

        if self.serial.candidates.iter().any(|path| path.is_empty()) {
            return Err(invalid("serial candidate paths cannot be empty"));
        }

        if self.serial.baud_rate == 0 {
            return Err(invalid("baud_rate must be greater than 0"));
        }

        if CalibrationProfile::lookup(&self.pointer.profile).is_err() {
            let known: Vec<_> = CalibrationProfile::registered().collect();
            return Err(invalid(format!(
                "pointer profile '{}' is unknown (expected one of: {})",
                self.pointer.profile,
                known.join(", ")
            )));
        }

        if matches!(&self.pointer.path, Some(path) if path.is_empty()) {
            return Err(invalid("pointer path cannot be empty when set"));
        }

        if self.discovery.port == 0 {
            return Err(invalid("discovery port must be between 1 and 65535"));
        }

        if self.discovery.nmap_path.is_empty() {
            return Err(invalid("nmap_path cannot be empty"));
        }

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(invalid(format!(
                "log level must be one of: {}",
                LOG_LEVELS.join(", ")
            )));
        }

        Ok(())
    }
}

fn invalid(msg: impl std::fmt::Display) -> FusionError {
    FusionError::Config(toml::de::Error::custom(msg))
}

//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::backend::Qos;
use crate::codec::protocol::{
    required_document_nodes, DeviceConfig, DEFAULT_MAX_DOCUMENT_NODES, DEFAULT_MAX_PER_MESSAGE,
    SAMPLE_BUFFER_CAPACITY,
};
use crate::error::{Result, TrackerError};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceSection,
    #[serde(default)]
    pub codec: CodecConfig,
    #[serde(default)]
    pub reporting: ReportingConfig,
    #[serde(default)]
    pub backend: BackendConfig,
}

/// Initial configuration mirror, reported in full on the first cycle
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DeviceSection {
    #[serde(default = "default_gps_timeout")]
    pub gps_timeout: u32,

    #[serde(default = "default_active")]
    pub active: bool,

    #[serde(default = "default_active_wait")]
    pub active_wait: u32,

    #[serde(default = "default_passive_wait")]
    pub passive_wait: u32,

    #[serde(default = "default_movement_timeout")]
    pub movement_timeout: u32,

    #[serde(default = "default_accel_threshold")]
    pub accel_threshold: u32,

    #[serde(default = "default_app_version")]
    pub app_version: String,
}

/// Document construction limits
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CodecConfig {
    #[serde(default = "default_max_per_message")]
    pub max_per_message: usize,

    #[serde(default = "default_max_document_nodes")]
    pub max_document_nodes: usize,
}

/// Reporting cadence
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ReportingConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Include the static modem section every N cycles
    #[serde(default = "default_static_modem_every")]
    pub static_modem_every: u32,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Transport settings
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BackendConfig {
    #[serde(default = "default_client_id")]
    pub client_id: String,

    #[serde(default)]
    pub qos: Qos,
}

// Default value functions
fn default_gps_timeout() -> u32 { 60 }
fn default_active() -> bool { true }
fn default_active_wait() -> u32 { 60 }
fn default_passive_wait() -> u32 { 60 }
fn default_movement_timeout() -> u32 { 3600 }
fn default_accel_threshold() -> u32 { 100 }
fn default_app_version() -> String { env!("CARGO_PKG_VERSION").to_string() }

fn default_max_per_message() -> usize { DEFAULT_MAX_PER_MESSAGE }
fn default_max_document_nodes() -> usize { DEFAULT_MAX_DOCUMENT_NODES }

fn default_interval_ms() -> u64 { 60_000 }
fn default_static_modem_every() -> u32 { 10 }
fn default_log_level() -> String { "info".to_string() }

fn default_client_id() -> String { "tracker".to_string() }

impl Default for DeviceSection {
    fn default() -> Self {
        Self {
            gps_timeout: default_gps_timeout(),
            active: default_active(),
            active_wait: default_active_wait(),
            passive_wait: default_passive_wait(),
            movement_timeout: default_movement_timeout(),
            accel_threshold: default_accel_threshold(),
            app_version: default_app_version(),
        }
    }
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_per_message: default_max_per_message(),
            max_document_nodes: default_max_document_nodes(),
        }
    }
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            static_modem_every: default_static_modem_every(),
            log_level: default_log_level(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            client_id: default_client_id(),
            qos: Qos::default(),
        }
    }
}

impl DeviceSection {
    /// Initial value of the configuration mirror
    pub fn initial_config(&self) -> DeviceConfig {
        DeviceConfig {
            gps_timeout: self.gps_timeout,
            active: self.active,
            active_wait: self.active_wait,
            passive_wait: self.passive_wait,
            movement_timeout: self.movement_timeout,
            accel_threshold: self.accel_threshold,
        }
    }
}

fn invalid(msg: &str) -> TrackerError {
    TrackerError::Config(toml::de::Error::custom(msg))
}

impl Config {
    /// Load configuration from a TOML file
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
    /// use tracker_sync::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.codec.max_per_message == 0 || self.codec.max_per_message > SAMPLE_BUFFER_CAPACITY {
            return Err(invalid(&format!(
                "max_per_message must be between 1 and {}",
                SAMPLE_BUFFER_CAPACITY
            )));
        }

        // Every document of a cycle, including a full batch, has to fit
        let required = required_document_nodes(self.codec.max_per_message);
        if self.codec.max_document_nodes < required {
            return Err(invalid(&format!(
                "max_document_nodes must be at least {} for max_per_message = {}",
                required, self.codec.max_per_message
            )));
        }

        if self.reporting.interval_ms < 1_000 || self.reporting.interval_ms > 86_400_000 {
            return Err(invalid("interval_ms must be between 1000 and 86400000"));
        }

        if self.reporting.static_modem_every == 0 {
            return Err(invalid("static_modem_every must be greater than 0"));
        }

        if !["trace", "debug", "info", "warn", "error"].contains(&self.reporting.log_level.as_str()) {
            return Err(invalid(
                "log_level must be one of: trace, debug, info, warn, error",
            ));
        }

        if self.backend.client_id.is_empty() {
            return Err(invalid("client_id cannot be empty"));
        }

        if self.device.app_version.is_empty() {
            return Err(invalid("app_version cannot be empty"));
        }

        Ok(())
    }
}

/*!
 * Configuration management for Brickwire.
 *
 * This module loads the tunables of the serial link and the polling loop from
 * defaults, an optional file and environment variables.
 */
use std::path::Path;
use std::time::Duration;

use config::{Config as ConfigLib, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Number of physical targets sharing the serial bus
pub const LINK_TARGETS: usize = 2;

/// Core configuration for Brickwire
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Serial link configuration
    #[serde(default)]
    pub link: LinkConfig,

    /// Polling configuration
    #[serde(default)]
    pub polling: PollingConfig,

    /// Serial port configuration
    #[serde(default)]
    pub serial: SerialConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Serial link configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Bus addresses of the two link targets
    #[serde(default = "default_addresses")]
    pub addresses: [u8; LINK_TARGETS],

    /// Send/receive attempts per transaction
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    /// Response timeout for the sensor setup message
    #[serde(default = "default_setup_timeout_ms")]
    pub setup_timeout_ms: u64,

    /// Response timeout for the per-cycle value exchange
    #[serde(default = "default_values_timeout_ms")]
    pub values_timeout_ms: u64,

    /// Response timeout for short commands such as the watchdog setting
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
}

/// Polling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Delay between value exchanges in milliseconds; zero or less disables polling
    #[serde(default = "default_update_delay_ms")]
    pub update_delay_ms: i64,
}

/// Serial port configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Serial device path
    #[serde(default = "default_serial_device")]
    pub device: String,

    /// Baud rate
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            addresses: default_addresses(),
            max_attempts: default_max_attempts(),
            setup_timeout_ms: default_setup_timeout_ms(),
            values_timeout_ms: default_values_timeout_ms(),
            command_timeout_ms: default_command_timeout_ms(),
        }
    }
}

impl LinkConfig {
    /// Response timeout for the sensor setup message
    pub fn setup_timeout(&self) -> Duration {
        Duration::from_millis(self.setup_timeout_ms)
    }

    /// Response timeout for the value exchange
    pub fn values_timeout(&self) -> Duration {
        Duration::from_millis(self.values_timeout_ms)
    }

    /// Response timeout for short commands
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            update_delay_ms: default_update_delay_ms(),
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            device: default_serial_device(),
            baud_rate: default_baud_rate(),
        }
    }
}

impl Config {
    /// Check values that would make the link unusable
    pub fn validate(&self) -> Result<()> {
        if self.link.max_attempts == 0 {
            return Err(Error::config("link.max_attempts must be at least 1"));
        }
        if self.link.addresses[0] == self.link.addresses[1] {
            return Err(Error::config(format!(
                "link.addresses must be distinct, got {:?}",
                self.link.addresses
            )));
        }
        Ok(())
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_addresses() -> [u8; LINK_TARGETS] {
    [1, 2]
}

fn default_max_attempts() -> usize {
    5
}

fn default_setup_timeout_ms() -> u64 {
    2500
}

fn default_values_timeout_ms() -> u64 {
    50
}

fn default_command_timeout_ms() -> u64 {
    100
}

fn default_update_delay_ms() -> i64 {
    100
}

fn default_serial_device() -> String {
    "/dev/ttyAMA0".to_string()
}

fn default_baud_rate() -> u32 {
    500_000
}

/// A builder for creating a configuration
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_file: Option<String>,
    environment_prefix: Option<String>,
    override_with: Option<Config>,
}

impl ConfigBuilder {
    /// Create a new ConfigBuilder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the config file path
    pub fn with_config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Set the environment variable prefix for configuration
    pub fn with_environment_prefix<S: AsRef<str>>(mut self, prefix: S) -> Self {
        self.environment_prefix = Some(prefix.as_ref().to_string());
        self
    }

    /// Override with an existing config
    pub fn override_with(mut self, config: Config) -> Self {
        self.override_with = Some(config);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<Config> {
        let mut config_builder = ConfigLib::builder();

        let default_config = Config::default();
        config_builder = config_builder.add_source(
            ConfigLib::try_from(&default_config)
                .map_err(|e| Error::config(format!("Failed to create default config: {}", e)))?,
        );

        if let Some(config_file) = self.config_file {
            let path = Path::new(&config_file);
            if path.exists() {
                debug!("Loading configuration from {}", config_file);
                config_builder = config_builder.add_source(File::with_name(&config_file));
            } else {
                debug!("Configuration file {} does not exist, using defaults", config_file);
            }
        }

        if let Some(prefix) = self.environment_prefix {
            debug!("Loading configuration from environment variables with prefix {}", prefix);
            config_builder = config_builder.add_source(
                Environment::with_prefix(&prefix)
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let config_lib = config_builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build configuration: {}", e)))?;

        let mut config: Config = config_lib
            .try_deserialize()
            .map_err(|e| Error::config(format!("Failed to deserialize configuration: {}", e)))?;

        if let Some(override_config) = self.override_with {
            config = override_config;
        }

        config.validate()?;
        info!("Configuration loaded successfully");
        Ok(config)
    }
}

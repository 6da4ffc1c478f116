use config::{Config, ConfigError, File};
use log::{LevelFilter, SetLoggerError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::device::SimulatorConfig;
use crate::journal::Journal;

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct StgConfig {
    pub device: DeviceConfig,
    pub logging: LoggingConfig,
    pub simulator: SimulatorConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DeviceConfig {
    /// Serial number to select; the first attached device when absent
    pub serial_number: Option<u64>,
    /// Reset the trigger map to diagonal form on connect
    pub diagonalize_on_connect: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub log_level: String,
    /// Write a command journal when set
    pub journal_path: Option<PathBuf>,
    pub journal_buffer_size: usize,
    pub journal_as_json: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            serial_number: None,
            diagonalize_on_connect: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            journal_path: None,
            journal_buffer_size: 32,
            journal_as_json: false,
        }
    }
}

impl LoggingConfig {
    pub fn journal(&self) -> Option<Journal> {
        self.journal_path
            .as_ref()
            .map(|path| Journal::new(path, self.journal_buffer_size, self.journal_as_json))
    }
}

/// Load configuration from file with layered fallbacks
pub fn load_config(config_path: Option<&Path>) -> Result<StgConfig, ConfigError> {
    let mut builder = Config::builder().add_source(Config::try_from(&StgConfig::default())?);

    if let Some(path) = config_path {
        if path.exists() {
            builder = builder.add_source(File::from(path));
        } else {
            return Err(ConfigError::Message(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
    } else if Path::new("stg.toml").exists() {
        builder = builder.add_source(File::with_name("stg.toml"));
    }

    let config = builder.build()?;
    config.try_deserialize::<StgConfig>()
}

/// Load configuration, falling back to defaults on any error
pub fn load_config_or_default(config_path: Option<&Path>) -> StgConfig {
    match load_config(config_path) {
        Ok(config) => {
            log::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            log::warn!("Failed to load config ({}), using defaults", e);
            StgConfig::default()
        }
    }
}

/// Parse a level name, `None` if it is not one of trace/debug/info/warn/error/off
pub fn parse_level(log_level: &str) -> Option<LevelFilter> {
    match log_level.to_lowercase().as_str() {
        "trace" => Some(LevelFilter::Trace),
        "debug" => Some(LevelFilter::Debug),
        "info" => Some(LevelFilter::Info),
        "warn" => Some(LevelFilter::Warn),
        "error" => Some(LevelFilter::Error),
        "off" => Some(LevelFilter::Off),
        _ => None,
    }
}

/// Install `env_logger` at the given level with millisecond timestamps.
///
/// Fails if a logger is already installed for this process.
pub fn initialize_logging(log_level: &str) -> Result<(), SetLoggerError> {
    let level = parse_level(log_level).unwrap_or_else(|| {
        eprintln!("Warning: Invalid log level '{log_level}', using 'info'");
        LevelFilter::Info
    });

    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp_millis()
        .try_init()
}

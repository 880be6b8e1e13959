//! Configuration file support for xbfwup.
//!
//! Configuration is loaded from multiple sources with the following priority (highest first):
//! 1. Command-line arguments
//! 2. Environment variables (XBFWUP_*)
//! 3. Local config file (./xbfwup.toml)
//! 4. Global config file (~/.config/xbfwup/config.toml)
//!
//! Arguments and environment are resolved by clap; this module covers the
//! two files.

use directories::ProjectDirs;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Local configuration file name.
pub const LOCAL_CONFIG_FILE: &str = "xbfwup.toml";

/// Connection configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Serial device (e.g., "/dev/ttyUSB0" or "COM3").
    pub serial: Option<String>,
    /// Application baud rate.
    pub baud: Option<u32>,
}

/// Bootloader configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BootloaderConfig {
    /// Bootloader baud rate.
    pub baud: Option<u32>,
    /// Prompt probes before giving up.
    pub probe_attempts: Option<usize>,
    /// Bound, in seconds, on waits that are otherwise unbounded.
    pub wait_limit_secs: Option<u64>,
    /// Skip AT command mode by default.
    #[serde(default)]
    pub recovery: bool,
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Connection settings.
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Bootloader settings.
    #[serde(default)]
    pub bootloader: BootloaderConfig,
}

impl Config {
    /// Load configuration from all available sources.
    pub fn load() -> Self {
        let mut config = Self::default();

        // Load global config
        if let Some(global_path) = Self::global_config_path() {
            if let Some(global_config) = Self::load_from_file(&global_path) {
                debug!("Loaded global config from {}", global_path.display());
                config.merge(global_config);
            }
        }

        // Load local config (overrides global)
        if let Some(local_config) = Self::load_from_file(Path::new(LOCAL_CONFIG_FILE)) {
            debug!("Loaded local config from {LOCAL_CONFIG_FILE}");
            config.merge(local_config);
        }

        config
    }

    /// Load configuration from a specific file path (--config flag).
    pub fn load_from_path(path: &Path) -> Self {
        if let Some(config) = Self::load_from_file(path) {
            debug!("Loaded config from {}", path.display());
            config
        } else {
            warn!(
                "Could not load config from {}, using defaults",
                path.display()
            );
            Self::default()
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => Some(config),
                Err(e) => {
                    warn!("Failed to parse config file {}: {}", path.display(), e);
                    None
                },
            },
            Err(e) => {
                warn!("Failed to read config file {}: {}", path.display(), e);
                None
            },
        }
    }

    /// Get the global configuration directory.
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "xbfwup").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the global configuration file path.
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Merge another config into this one.
    fn merge(&mut self, other: Self) {
        if other.connection.serial.is_some() {
            self.connection.serial = other.connection.serial;
        }
        if other.connection.baud.is_some() {
            self.connection.baud = other.connection.baud;
        }

        if other.bootloader.baud.is_some() {
            self.bootloader.baud = other.bootloader.baud;
        }
        if other.bootloader.probe_attempts.is_some() {
            self.bootloader.probe_attempts = other.bootloader.probe_attempts;
        }
        if other.bootloader.wait_limit_secs.is_some() {
            self.bootloader.wait_limit_secs = other.bootloader.wait_limit_secs;
        }
        if other.bootloader.recovery {
            self.bootloader.recovery = true;
        }
    }
}

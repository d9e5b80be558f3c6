//! Configuration module
//!
//! Handles device, motion and logging settings

mod settings;

pub use settings::{AppConfig, DeviceConfig, LoggingConfig};

use directories::ProjectDirs;
use std::path::PathBuf;

/// Get the application configuration directory
pub fn config_dir() -> Option<PathBuf> {
    ProjectDirs::from("com", "makcu", "Makcu").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the application data directory
pub fn data_dir() -> Option<PathBuf> {
    ProjectDirs::from("com", "makcu", "Makcu").map(|dirs| dirs.data_dir().to_path_buf())
}

/// Get the log directory
pub fn log_dir() -> Option<PathBuf> {
    data_dir().map(|d| d.join("logs"))
}

/// Default config file location
pub fn config_file() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

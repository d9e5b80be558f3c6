//! Application settings

use crate::core::discovery::DEFAULT_SIGNATURE;
use crate::core::logger::LogFormat;
use crate::core::protocol::{MotionProfile, BOOTSTRAP_BAUD, OPERATING_BAUD};
use crate::core::session::SessionConfig;
use crate::core::transport::{duration_millis, TransportError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Device discovery and line settings
    pub device: DeviceConfig,
    /// Move command parameters
    pub motion: MotionProfile,
    /// Wire trace settings
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load config from the default location, or defaults if absent
    pub fn load() -> Result<Self, TransportError> {
        match super::config_file() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load config from a specific file
    pub fn load_from(path: &Path) -> Result<Self, TransportError> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| TransportError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Save config to a specific file
    pub fn save_to(&self, path: &Path) -> Result<(), TransportError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| TransportError::Config(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Session settings derived from this config
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            signature: self.device.signature.clone(),
            port: self.device.port.clone(),
            bootstrap_baud: self.device.bootstrap_baud,
            operating_baud: self.device.operating_baud,
            read_timeout: self.device.read_timeout,
            poll_interval: self.device.poll_interval,
            motion: self.motion,
        }
    }
}

/// Device settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Hardware id substring identifying the controller
    pub signature: String,
    /// Fixed port; discovery is skipped when set
    pub port: Option<String>,
    /// Handshake baud rate
    pub bootstrap_baud: u32,
    /// Baud rate after the handshake
    pub operating_baud: u32,
    /// Serial read timeout (ms)
    #[serde(rename = "read_timeout_ms", with = "duration_millis")]
    pub read_timeout: Duration,
    /// Listener idle sleep (ms)
    #[serde(rename = "poll_interval_ms", with = "duration_millis")]
    pub poll_interval: Duration,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            signature: DEFAULT_SIGNATURE.to_string(),
            port: None,
            bootstrap_baud: BOOTSTRAP_BAUD,
            operating_baud: OPERATING_BAUD,
            read_timeout: Duration::from_millis(100),
            poll_interval: Duration::from_millis(1),
        }
    }
}

/// Wire trace settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Trace file; tracing is off when unset
    pub wire_log: Option<PathBuf>,
    /// Trace format
    pub format: LogFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_session_defaults() {
        let config = AppConfig::default().session_config();
        let defaults = SessionConfig::default();
        assert_eq!(config.signature, defaults.signature);
        assert_eq!(config.bootstrap_baud, 115_200);
        assert_eq!(config.operating_baud, 4_000_000);
        assert_eq!(config.read_timeout, defaults.read_timeout);
        assert_eq!(config.motion, MotionProfile::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [device]
            port = "/dev/ttyACM3"
            poll_interval_ms = 5

            [motion]
            ctrl_y = 70
            "#,
        )
        .unwrap();

        assert_eq!(config.device.port.as_deref(), Some("/dev/ttyACM3"));
        assert_eq!(config.device.poll_interval, Duration::from_millis(5));
        assert_eq!(config.device.signature, DEFAULT_SIGNATURE);
        assert_eq!(config.motion.ctrl_y, 70);
        assert_eq!(config.motion.duration, 10);
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.logging.format = LogFormat::Hex;
        config.logging.wire_log = Some(dir.path().join("wire.hex"));
        config.save_to(&path).unwrap();

        assert_eq!(AppConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_bad_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[device]\nbootstrap_baud = \"fast\"\n").unwrap();

        assert!(matches!(
            AppConfig::load_from(&path),
            Err(TransportError::Config(_))
        ));
    }
}

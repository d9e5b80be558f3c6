//! CLI Exit Codes
//!
//! Standard exit codes for CLI operations and automation.

use crate::core::transport::TransportError;
use std::process::ExitCode;

/// Exit code constants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCodes;

impl ExitCodes {
    /// Success
    pub const SUCCESS: u8 = 0;

    /// General error
    pub const ERROR: u8 = 1;

    /// Invalid arguments
    pub const INVALID_ARGS: u8 = 2;

    /// Connection failed
    pub const CONNECTION_FAILED: u8 = 3;

    /// Permission denied
    pub const PERMISSION_DENIED: u8 = 7;

    /// Configuration error
    pub const CONFIG_ERROR: u8 = 8;

    /// User cancelled
    pub const CANCELLED: u8 = 11;

    /// Device not found
    pub const DEVICE_NOT_FOUND: u8 = 12;

    /// Listener lost the line
    pub const CHANNEL_LOST: u8 = 13;
}

/// CLI operation result
#[derive(Debug)]
pub enum CliResult {
    /// Success with optional message
    Success(Option<String>),

    /// Error with code and message
    Error(u8, String),
}

impl CliResult {
    /// Plain success
    pub fn success() -> Self {
        Self::Success(None)
    }

    /// Success with a message for the user
    pub fn success_with_message(msg: impl Into<String>) -> Self {
        Self::Success(Some(msg.into()))
    }

    /// Error with an explicit code
    pub fn error(code: u8, msg: impl Into<String>) -> Self {
        Self::Error(code, msg.into())
    }

    /// Get exit code
    pub fn code(&self) -> u8 {
        match self {
            Self::Success(_) => ExitCodes::SUCCESS,
            Self::Error(code, _) => *code,
        }
    }

    /// Get message
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success(Some(msg)) | Self::Error(_, msg) => Some(msg),
            Self::Success(None) => None,
        }
    }

    /// Convert to `ExitCode`
    pub fn to_exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }

    /// Is success?
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

impl From<&TransportError> for CliResult {
    fn from(err: &TransportError) -> Self {
        let code = match err {
            TransportError::DeviceNotFound(_) => ExitCodes::DEVICE_NOT_FOUND,
            TransportError::Connection(io) if io.kind() == std::io::ErrorKind::PermissionDenied => {
                ExitCodes::PERMISSION_DENIED
            }
            TransportError::Connection(_) => ExitCodes::CONNECTION_FAILED,
            TransportError::ChannelRead(_) => ExitCodes::CHANNEL_LOST,
            TransportError::Config(_) => ExitCodes::CONFIG_ERROR,
            TransportError::Io(_) => ExitCodes::ERROR,
        };
        Self::Error(code, err.to_string())
    }
}

impl From<TransportError> for CliResult {
    fn from(err: TransportError) -> Self {
        Self::from(&err)
    }
}

/// Exit code description
pub fn exit_code_description(code: u8) -> &'static str {
    match code {
        0 => "Success",
        1 => "General error",
        2 => "Invalid arguments",
        3 => "Connection failed",
        7 => "Permission denied",
        8 => "Configuration error",
        11 => "Operation cancelled",
        12 => "Device not found",
        13 => "Channel lost",
        _ => "Unknown error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_result() {
        let success = CliResult::success();
        assert!(success.is_success());
        assert_eq!(success.code(), 0);
        assert_eq!(success.message(), None);

        let error = CliResult::error(3, "Connection failed");
        assert!(!error.is_success());
        assert_eq!(error.code(), 3);
        assert_eq!(error.message(), Some("Connection failed"));
    }

    #[test]
    fn test_from_transport_error() {
        let result = CliResult::from(TransportError::DeviceNotFound("VID:PID=1A86:55D3".into()));
        assert_eq!(result.code(), ExitCodes::DEVICE_NOT_FOUND);
        assert!(result.message().unwrap().contains("1A86:55D3"));

        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "no access");
        let result = CliResult::from(TransportError::Connection(denied));
        assert_eq!(result.code(), ExitCodes::PERMISSION_DENIED);

        let broken = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        let result = CliResult::from(TransportError::Connection(broken));
        assert_eq!(result.code(), ExitCodes::CONNECTION_FAILED);
        assert_eq!(exit_code_description(result.code()), "Connection failed");
    }
}

//! Error module for hookrelay
//!
//! This module defines the error types and codes used by the relay outside of
//! the bus itself. The bus never fails; it only reports delivery outcomes.

use thiserror::Error;
use std::fmt;

/// Error code for failures at the process and transport boundaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Startup errors (0x0001-0x0100)
    ConfigInvalid = 0x0001,
    BindFailed = 0x0002,

    // Runtime errors (0x0101-0x0200)
    ServeFailed = 0x0101,
    BodyReadFailed = 0x0102,
    SinkWriteFailed = 0x0103,
}

impl ErrorCode {
    /// Numeric value of the code
    pub fn as_u16(&self) -> u16 {
        *self as u16
    }

    /// Whether the error happens before the relay starts serving
    pub fn is_startup(&self) -> bool {
        self.as_u16() <= 0x0100
    }

    /// Get a human-readable description of the error code
    pub fn description(&self) -> &'static str {
        match self {
            Self::ConfigInvalid => "Invalid configuration",
            Self::BindFailed => "Failed to bind listen address",
            Self::ServeFailed => "HTTP server stopped with an error",
            Self::BodyReadFailed => "Failed to read request body",
            Self::SinkWriteFailed => "Failed to write payload to sink",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ConfigInvalid => "CONFIG_INVALID",
            Self::BindFailed => "BIND_FAILED",
            Self::ServeFailed => "SERVE_FAILED",
            Self::BodyReadFailed => "BODY_READ_FAILED",
            Self::SinkWriteFailed => "SINK_WRITE_FAILED",
        };
        write!(f, "{} (0x{:04X})", name, self.as_u16())
    }
}

/// Main error type for hookrelay
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("{code}: {message}")]
    Standard {
        code: ErrorCode,
        message: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),
}

impl RelayError {
    /// Create a new standard error with the given code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Standard {
            code,
            message: message.into(),
        }
    }

    /// Get the error code. Parse failures count as invalid configuration.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Standard { code, .. } => Some(*code),
            Self::Config(_) => Some(ErrorCode::ConfigInvalid),
            Self::Io(_) => None,
        }
    }
}

/// Result type alias for hookrelay operations
pub type Result<T> = std::result::Result<T, RelayError>;

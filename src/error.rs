//! Error types and handling for Zevermon
//!
//! This module defines the error types used throughout the application,
//! providing consistent error handling and reporting.

use thiserror::Error;

/// Result type alias for Zevermon operations
pub type Result<T> = std::result::Result<T, ZevermonError>;

/// Main error type for Zevermon
#[derive(Debug, Error)]
pub enum ZevermonError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// The inverter did not answer within the per-call deadline
    #[error("Timeout error: {message}")]
    Timeout { message: String },

    /// The inverter answered, but the payload was malformed or unexpected
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// Any other failure surfacing from the device transport
    #[error("Device error: {message}")]
    Device { message: String },

    /// Registration hit an inverter that is already configured
    #[error("Duplicate inverter: {message}")]
    Duplicate { message: String },

    /// The entry has no usable data yet; setup must not complete
    #[error("Not ready: {message}")]
    NotReady { message: String },

    /// A steady-state poll failed; the previous snapshot stays in place
    #[error("Update failed: {message}")]
    UpdateFailed { message: String },
}

impl ZevermonError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        ZevermonError::Config {
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        ZevermonError::Io {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        ZevermonError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        ZevermonError::Timeout {
            message: message.into(),
        }
    }

    /// Create a new protocol error
    pub fn protocol<S: Into<String>>(message: S) -> Self {
        ZevermonError::Protocol {
            message: message.into(),
        }
    }

    /// Create a new device error
    pub fn device<S: Into<String>>(message: S) -> Self {
        ZevermonError::Device {
            message: message.into(),
        }
    }

    /// Create a new duplicate-registration error
    pub fn duplicate<S: Into<String>>(message: S) -> Self {
        ZevermonError::Duplicate {
            message: message.into(),
        }
    }

    /// Create a new not-ready error
    pub fn not_ready<S: Into<String>>(message: S) -> Self {
        ZevermonError::NotReady {
            message: message.into(),
        }
    }

    /// Create a new update-failed error
    pub fn update_failed<S: Into<String>>(message: S) -> Self {
        ZevermonError::UpdateFailed {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for ZevermonError {
    fn from(err: std::io::Error) -> Self {
        ZevermonError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for ZevermonError {
    fn from(err: serde_yaml::Error) -> Self {
        ZevermonError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ZevermonError {
    fn from(err: serde_json::Error) -> Self {
        ZevermonError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for ZevermonError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ZevermonError::timeout(err.to_string())
        } else {
            ZevermonError::device(err.to_string())
        }
    }
}

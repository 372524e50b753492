//! Error types for GPIO backend operations.
//!
//! This module defines error types specific to line claiming, output control
//! and edge-notification registration.

use crate::traits::LineId;

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur during GPIO backend operations.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Line is already claimed by another consumer.
    #[error("Line {line} busy")]
    LineBusy { line: LineId },

    /// Line was never claimed, or does not exist on this chip.
    #[error("Unknown line {line}")]
    UnknownLine { line: LineId },

    /// Output operation on a line claimed as input.
    #[error("Line {line} is not an output")]
    NotOutput { line: LineId },

    /// Backend-specific failure.
    #[error("Backend error: {message}")]
    Backend { message: String },

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HardwareError {
    /// Create a new backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}

impl From<HardwareError> for sonar_core::Error {
    fn from(error: HardwareError) -> Self {
        sonar_core::Error::gpio(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_busy_error() {
        let error = HardwareError::LineBusy { line: LineId(17) };
        assert_eq!(error.to_string(), "Line 17 busy");
    }

    #[test]
    fn test_backend_error() {
        let error = HardwareError::backend("chip closed");
        assert!(matches!(error, HardwareError::Backend { .. }));
        assert_eq!(error.to_string(), "Backend error: chip closed");
    }

    #[test]
    fn test_conversion_to_core_error() {
        let error: sonar_core::Error = HardwareError::NotOutput { line: LineId(4) }.into();
        assert!(matches!(error, sonar_core::Error::Gpio { .. }));
        assert_eq!(error.to_string(), "GPIO error: Line 4 is not an output");
    }
}

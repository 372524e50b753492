use thiserror::Error;

/// errno values reported by [`Error::errno`].
pub mod errno {
    pub const EIO: i32 = 5;
    pub const EACCES: i32 = 13;
    pub const EBUSY: i32 = 16;
    pub const ENODEV: i32 = 19;
    pub const EINVAL: i32 = 22;
    /// Kernel-internal "restart the system call" code.
    pub const ERESTARTSYS: i32 = 512;
}

#[derive(Error, Debug)]
pub enum Error {
    // Access errors
    #[error("Invalid channel: {id}")]
    InvalidChannel { id: u8 },

    #[error("Channel {channel} already opened")]
    AlreadyOpen { channel: u8 },

    #[error("Invalid size: expected {expected} bytes, got {actual}")]
    InvalidSize { expected: usize, actual: usize },

    // Measurement errors
    #[error("Consecutive calls: {elapsed_ns}ns since last measurement, minimum is {min_interval_ns}ns")]
    TooFrequent { elapsed_ns: u64, min_interval_ns: u64 },

    #[error("Channel {channel} timed out after {timeout_us}us without echo")]
    HardwareTimeout { channel: u8, timeout_us: u64 },

    #[error("Transfer fault: result needs {required} bytes, buffer holds {available}")]
    TransferFault { required: usize, available: usize },

    #[error("Interrupted while waiting for the measurement gate")]
    Interrupted,

    // Hardware errors
    #[error("GPIO error: {message}")]
    Gpio { message: String },

    #[error("Initialization failed: {message}")]
    InitializationFailed { message: String },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl Error {
    pub fn gpio(message: impl Into<String>) -> Self {
        Self::Gpio {
            message: message.into(),
        }
    }

    pub fn initialization_failed(message: impl Into<String>) -> Self {
        Self::InitializationFailed {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// errno-style code for this error, as a character device would report it.
    pub fn errno(&self) -> i32 {
        match self {
            Self::InvalidChannel { .. } | Self::InvalidSize { .. } | Self::Config { .. } => {
                errno::EINVAL
            }
            Self::AlreadyOpen { .. } | Self::TooFrequent { .. } => errno::EBUSY,
            Self::HardwareTimeout { .. } | Self::Gpio { .. } => errno::EIO,
            Self::TransferFault { .. } => errno::EACCES,
            Self::Interrupted => errno::ERESTARTSYS,
            Self::InitializationFailed { .. } => errno::ENODEV,
        }
    }

    /// Whether repeating the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TooFrequent { .. } | Self::HardwareTimeout { .. } | Self::Interrupted
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Error::InvalidChannel { id: 5 }, errno::EINVAL)]
    #[case(Error::AlreadyOpen { channel: 0 }, errno::EBUSY)]
    #[case(Error::InvalidSize { expected: 8, actual: 4 }, errno::EINVAL)]
    #[case(Error::TooFrequent { elapsed_ns: 200_000, min_interval_ns: 600_000 }, errno::EBUSY)]
    #[case(Error::HardwareTimeout { channel: 1, timeout_us: 62_500 }, errno::EIO)]
    #[case(Error::TransferFault { required: 8, available: 2 }, errno::EACCES)]
    #[case(Error::Interrupted, errno::ERESTARTSYS)]
    #[case(Error::gpio("line 17 gone"), errno::EIO)]
    #[case(Error::initialization_failed("line 4 busy"), errno::ENODEV)]
    fn test_errno_mapping(#[case] error: Error, #[case] expected: i32) {
        assert_eq!(error.errno(), expected);
    }

    #[test]
    fn test_retryable_errors() {
        assert!(Error::Interrupted.is_retryable());
        assert!(
            Error::TooFrequent {
                elapsed_ns: 1,
                min_interval_ns: 600_000
            }
            .is_retryable()
        );
        assert!(
            Error::HardwareTimeout {
                channel: 0,
                timeout_us: 62_500
            }
            .is_retryable()
        );
        assert!(!Error::InvalidChannel { id: 2 }.is_retryable());
        assert!(!Error::AlreadyOpen { channel: 0 }.is_retryable());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::InvalidSize {
                expected: 8,
                actual: 4
            }
            .to_string(),
            "Invalid size: expected 8 bytes, got 4"
        );
        assert_eq!(
            Error::HardwareTimeout {
                channel: 0,
                timeout_us: 62_500
            }
            .to_string(),
            "Channel 0 timed out after 62500us without echo"
        );
    }
}

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(
        "Invalid BSR file {}: {size} bytes holds no complete {record_bytes}-byte record",
        path.display()
    )]
    Format {
        path: PathBuf,
        size: u64,
        record_bytes: usize,
    },

    #[error("Channel {channel} unavailable (file has {channels} channels)")]
    ChannelUnavailable { channel: usize, channels: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Render failed for channel(s) {failed:?}")]
    PartialFailure { failed: Vec<usize> },

    #[error("Computation superseded or interrupted")]
    Cancelled,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, Error>;

pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const INVALID_ARGUMENTS: i32 = 2;
    pub const FORMAT_ERROR: i32 = 3;
    pub const CHANNEL_UNAVAILABLE: i32 = 4;
    pub const IO_ERROR: i32 = 5;
    pub const PARTIAL_FAILURE: i32 = 6;
    pub const INTERRUPTED: i32 = 130;
}

impl Error {
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Format { .. } => exit_code::FORMAT_ERROR,
            Error::ChannelUnavailable { .. } => exit_code::CHANNEL_UNAVAILABLE,
            Error::Io(_) => exit_code::IO_ERROR,
            Error::PartialFailure { .. } => exit_code::PARTIAL_FAILURE,
            Error::Cancelled => exit_code::INTERRUPTED,
            Error::InvalidArgument(_) => exit_code::INVALID_ARGUMENTS,
        }
    }

    /// Whether repeating the same read may succeed (e.g. a device came back).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let err = Error::ChannelUnavailable {
            channel: 7,
            channels: 4,
        };
        assert_eq!(err.exit_code(), exit_code::CHANNEL_UNAVAILABLE);
        assert!(!err.is_retryable());

        let err = Error::from(std::io::Error::other("device removed"));
        assert_eq!(err.exit_code(), exit_code::IO_ERROR);
        assert!(err.is_retryable());
    }
}

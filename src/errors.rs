// SPDX-License-Identifier: MPL-2.0

//! Error types for the recording pipeline

use std::fmt;

use crate::capture::types::Channel;

/// Result type alias for recording operations
pub type RecordingResult<T> = Result<T, RecordingError>;

/// Result type alias for persistence operations
pub type PersistResult<T> = Result<T, PersistError>;

/// Errors raised by the recorder and muxer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordingError {
    /// The session already started; configuration is frozen
    AlreadyStarted,
    /// The muxer cannot accept this channel's format; the channel is omitted
    ConfigurationUnsupported { channel: Channel, reason: String },
    /// The writer entered a failure state mid-stream
    WriterFailure(String),
}

/// Errors raised while handing a finished file to durable storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistError {
    /// Storage access was not granted
    PermissionDenied,
    /// Moving the file into the library failed
    IoFailure(String),
}

impl fmt::Display for RecordingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordingError::AlreadyStarted => write!(f, "Recording already started"),
            RecordingError::ConfigurationUnsupported { channel, reason } => {
                write!(f, "Unsupported {} configuration: {}", channel, reason)
            }
            RecordingError::WriterFailure(msg) => write!(f, "Writer failure: {}", msg),
        }
    }
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistError::PermissionDenied => write!(f, "Storage access denied"),
            PersistError::IoFailure(msg) => write!(f, "Storage I/O failure: {}", msg),
        }
    }
}

impl std::error::Error for RecordingError {}
impl std::error::Error for PersistError {}

impl From<std::io::Error> for PersistError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::PermissionDenied {
            PersistError::PermissionDenied
        } else {
            PersistError::IoFailure(err.to_string())
        }
    }
}

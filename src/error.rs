//! Error types for scanplay operations

use thiserror::Error;

/// Result type alias using scanplay's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for scanplay operations
#[derive(Error, Debug)]
pub enum Error {
    /// Scanner input device is missing or could not be opened
    #[error("Input device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Reading from the input device failed
    #[error("Input read error: {0}")]
    Input(String),

    /// No media file matches the scanned reference
    #[error("No media found for reference '{0}'")]
    MediaNotFound(String),

    /// A playback command was issued with no engine session running
    #[error("No active playback session")]
    NoActiveSession,

    /// The playback engine failed to start or its control channel never became ready
    #[error("Engine launch failed: {0}")]
    EngineLaunch(String),

    /// Control-channel failure while talking to a live engine session
    #[error("Engine IPC error: {0}")]
    Ipc(String),

    /// A `CMD:` token carried an unrecognized command name
    #[error("Unknown command: {0}")]
    InvalidCommand(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Ipc(format!("JSON error: {}", e))
    }
}

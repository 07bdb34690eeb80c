use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Shutdown requested")]
    ShutdownRequested,

    #[error("Fatal error, cannot recover: {0}")]
    Fatal(String),
}

/// Errors raised by the platform media devices (microphone, speaker).
///
/// Device errors never tear the session down on their own; they are
/// surfaced to the user and the session stays in whatever connected
/// mode it was in. Retrying is the user's call.
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Microphone access denied")]
    MicrophoneAccessDenied,

    #[error("Microphone not found: {name:?}")]
    MicrophoneNotFound { name: Option<String> },

    #[error("Microphone disconnected")]
    MicrophoneDisconnected,

    #[error("Unsupported capture format: {format}")]
    FormatNotSupported { format: String },

    #[error("Speaker unavailable: {0}")]
    SpeakerUnavailable(String),
}

impl AppError {
    /// Whether the session can keep making progress after this error.
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Device(_) | AppError::Config(_) => true,
            AppError::Transport(_) | AppError::ShutdownRequested | AppError::Fatal(_) => false,
        }
    }
}

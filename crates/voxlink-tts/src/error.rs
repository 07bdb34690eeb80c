use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error("Audio decode failed ({format}): {detail}")]
    DecodeFailed { format: String, detail: String },

    #[error("Playback failed to start: {0}")]
    StartFailed(String),

    #[error("Synthesis failed: {0}")]
    SynthesisFailed(String),

    #[error("Playback was cancelled")]
    Cancelled,
}

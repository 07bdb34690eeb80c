use thiserror::Error;

/// One recognized span inside a recognizer result batch.
#[derive(Debug, Clone)]
pub struct RecognizedSegment {
    pub text: String,
    pub is_final: bool,
}

/// Raw events as the underlying recognizer reports them.
#[derive(Debug, Clone)]
pub enum RecognizerEvent {
    /// One result callback worth of segments, finals and interims mixed.
    Result { segments: Vec<RecognizedSegment> },
    /// Recognizer-reported error. `no-speech` is expected noise and is
    /// swallowed by the adapter.
    Error { code: String, message: String },
    /// The recognizer's stream ended. The adapter decides whether to
    /// restart it.
    Ended,
}

/// Normalized transcript events consumed by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptEvent {
    /// Transient display value; never drives orchestration.
    Interim { text: String },
    /// All final segments of one result batch, concatenated and trimmed.
    Final { text: String },
}

#[derive(Error, Debug)]
pub enum RecognizerError {
    #[error("Recognizer failed to start: {0}")]
    StartFailed(String),

    #[error("Recognizer failed to stop: {0}")]
    StopFailed(String),

    #[error("Recognizer unavailable: {0}")]
    Unavailable(String),
}

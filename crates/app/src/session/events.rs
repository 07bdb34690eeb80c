use voxlink_capture::AudioChunk;
use voxlink_endpoint::EndpointEvent;
use voxlink_stt::TranscriptEvent;
use voxlink_transport::TransportEvent;
use voxlink_tts::PlaybackOutcome;

use super::Mode;

/// User-initiated actions, delivered through the same ordered queue as
/// everything else.
#[derive(Debug, Clone)]
pub enum SessionCommand {
    StartListening,
    StopListening,
    /// Typed fallback input, sent as a `text` request.
    SendText(String),
    /// End the call: graceful `end_call`, teardown, loop exit.
    Hangup,
}

/// The single ordered event stream the orchestrator consumes. Every
/// platform callback is funneled into one of these, which is what makes
/// the state machine testable without live devices.
#[derive(Debug)]
pub enum SessionEvent {
    Command(SessionCommand),
    /// The underlying channel finished opening.
    ChannelOpened,
    Chunk(AudioChunk),
    Endpoint(EndpointEvent),
    Transcript(TranscriptEvent),
    Transport(TransportEvent),
    /// The post-flush grace period elapsed.
    FlushSettled,
    PlaybackFinished(PlaybackOutcome),
}

/// Who said a conversation line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone)]
pub struct ConversationEntry {
    pub speaker: Speaker,
    pub text: String,
    pub timestamp_ms: u64,
}

/// Everything the display layer needs; rendering is out of scope here.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    ModeChanged(Mode),
    /// Transient recognizer text; display only, never drives state.
    InterimTranscript(String),
    UserUtterance(String),
    AssistantResponse(String),
    Status(String),
    Error(String),
}

//! The session orchestrator: one event loop that owns the conversation
//! state machine and drives every side effect (capture pause/resume,
//! recognizer pause/resume, endpoint muting, playback, outbound sends).

pub mod endpoint_task;
pub mod events;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use voxlink_capture::{AnalysisFrame, AudioChunk, CapturePipeline};
use voxlink_endpoint::EndpointEvent;
use voxlink_protocol::OutboundMessage;
use voxlink_stt::{RecognitionHandle, RestartGate, TranscriptEvent};
use voxlink_telemetry::SessionMetrics;
use voxlink_transport::TransportEvent;
use voxlink_tts::{PlaybackController, PlaybackOutcome, PlaybackRequest};

use crate::config::SessionConfig;

pub use events::{ConversationEntry, SessionCommand, SessionEvent, Speaker, UiEvent};

const CONVERSATION_LOG_CAP: usize = 256;

/// Conversation mode. Recording, awaiting, and speaking are exclusive
/// values of one enum rather than independent booleans, so an illegal
/// overlap (user and assistant audio at once) is unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Idle,
    Connecting,
    Ready,
    Listening,
    /// An utterance boundary was detected and the accumulated audio is
    /// being finalized. Remembers whether a text request was already in
    /// flight so the post-flush mode is restored correctly.
    Flushing { awaiting_response: bool },
    AwaitingResponse,
    Speaking,
    Error,
}

impl Mode {
    /// Modes in which microphone input is still being accepted.
    pub fn is_listening_eligible(&self) -> bool {
        matches!(
            self,
            Mode::Listening | Mode::Flushing { .. } | Mode::AwaitingResponse
        )
    }

    pub fn is_connected(&self) -> bool {
        !matches!(self, Mode::Idle | Mode::Connecting | Mode::Error)
    }
}

/// The single live conversation context. Created on connect, dropped on
/// hangup; all per-call mutable state lives here.
struct Session {
    client_id: String,
    mode: Mode,
    /// Monotonic logical timestamp for outbound messages.
    logical_clock: u64,
    /// Not-yet-finalized chunks for the current utterance, contiguous
    /// and ordered by capture timestamp.
    accumulated: Vec<AudioChunk>,
    mic_enabled: bool,
    pending_response: Option<PlaybackRequest>,
    /// Set when an utterance boundary lands while the assistant is
    /// speaking; the flush runs as soon as playback finishes.
    flush_deferred: bool,
}

impl Session {
    fn new(client_id: String) -> Self {
        Self {
            client_id,
            mode: Mode::Connecting,
            logical_clock: 0,
            accumulated: Vec::new(),
            mic_enabled: false,
            pending_response: None,
            flush_deferred: false,
        }
    }

    fn next_timestamp(&mut self) -> u64 {
        let now = chrono::Utc::now().timestamp_millis() as u64;
        self.logical_clock = now.max(self.logical_clock + 1);
        self.logical_clock
    }
}

/// Everything the orchestrator needs injected. All device-facing pieces
/// are capability providers, so tests run the full machine with fakes.
pub struct SessionDeps {
    pub capture: CapturePipeline,
    pub recognition: RecognitionHandle,
    pub gate: Arc<RestartGate>,
    pub playback: Arc<PlaybackController>,
    pub outbound_tx: mpsc::Sender<OutboundMessage>,
    pub ui_tx: mpsc::Sender<UiEvent>,
    pub endpoint_muted: Arc<AtomicBool>,
    pub metrics: Arc<SessionMetrics>,
    pub chunk_tx: mpsc::Sender<AudioChunk>,
    pub analysis_tx: broadcast::Sender<AnalysisFrame>,
    pub conversation: Arc<RwLock<Vec<ConversationEntry>>>,
    pub config: SessionConfig,
}

/// Cloneable front door: commands and externally produced events all
/// enter through the same ordered queue.
#[derive(Clone)]
pub struct SessionHandle {
    events_tx: mpsc::Sender<SessionEvent>,
}

impl SessionHandle {
    pub fn sender(&self) -> mpsc::Sender<SessionEvent> {
        self.events_tx.clone()
    }

    pub async fn start_listening(&self) {
        self.command(SessionCommand::StartListening).await;
    }

    pub async fn stop_listening(&self) {
        self.command(SessionCommand::StopListening).await;
    }

    pub async fn send_text(&self, text: String) {
        self.command(SessionCommand::SendText(text)).await;
    }

    pub async fn hangup(&self) {
        self.command(SessionCommand::Hangup).await;
    }

    async fn command(&self, cmd: SessionCommand) {
        if self.events_tx.send(SessionEvent::Command(cmd)).await.is_err() {
            warn!(target: "session", "session loop already gone");
        }
    }
}

pub struct SessionOrchestrator {
    session: Session,
    events_rx: mpsc::Receiver<SessionEvent>,
    events_tx: mpsc::Sender<SessionEvent>,
    capture: CapturePipeline,
    recognition: RecognitionHandle,
    gate: Arc<RestartGate>,
    playback: Arc<PlaybackController>,
    outbound_tx: mpsc::Sender<OutboundMessage>,
    ui_tx: mpsc::Sender<UiEvent>,
    endpoint_muted: Arc<AtomicBool>,
    metrics: Arc<SessionMetrics>,
    chunk_tx: mpsc::Sender<AudioChunk>,
    analysis_tx: broadcast::Sender<AnalysisFrame>,
    conversation: Arc<RwLock<Vec<ConversationEntry>>>,
    config: SessionConfig,
}

impl SessionOrchestrator {
    pub fn new(client_id: String, deps: SessionDeps) -> (Self, SessionHandle) {
        let (events_tx, events_rx) = mpsc::channel(256);
        let orchestrator = Self {
            session: Session::new(client_id),
            events_rx,
            events_tx: events_tx.clone(),
            capture: deps.capture,
            recognition: deps.recognition,
            gate: deps.gate,
            playback: deps.playback,
            outbound_tx: deps.outbound_tx,
            ui_tx: deps.ui_tx,
            endpoint_muted: deps.endpoint_muted,
            metrics: deps.metrics,
            chunk_tx: deps.chunk_tx,
            analysis_tx: deps.analysis_tx,
            conversation: deps.conversation,
            config: deps.config,
        };
        (orchestrator, SessionHandle { events_tx })
    }

    pub async fn run(mut self) {
        info!(
            target: "session",
            client_id = %self.session.client_id,
            "session loop started"
        );

        while let Some(event) = self.events_rx.recv().await {
            if !self.handle_event(event).await {
                break;
            }
        }

        self.teardown().await;
        self.gate.set_live(false);
        self.recognition.shutdown().await;
        info!(target: "session", "session loop stopped");
    }

    async fn handle_event(&mut self, event: SessionEvent) -> bool {
        match event {
            SessionEvent::Command(cmd) => return self.handle_command(cmd).await,
            SessionEvent::ChannelOpened => {
                if self.session.mode == Mode::Connecting {
                    self.set_mode(Mode::Ready).await;
                    self.emit_ui(UiEvent::Status("connected".into())).await;
                }
            }
            SessionEvent::Chunk(chunk) => self.handle_chunk(chunk).await,
            SessionEvent::Endpoint(ev) => self.handle_endpoint(ev).await,
            SessionEvent::Transcript(ev) => self.handle_transcript(ev).await,
            SessionEvent::Transport(ev) => self.handle_transport(ev).await,
            SessionEvent::FlushSettled => self.handle_flush_settled().await,
            SessionEvent::PlaybackFinished(outcome) => self.handle_playback_finished(outcome).await,
        }
        true
    }

    async fn handle_command(&mut self, cmd: SessionCommand) -> bool {
        match cmd {
            SessionCommand::StartListening => self.start_listening().await,
            SessionCommand::StopListening => self.stop_session().await,
            SessionCommand::SendText(text) => self.send_typed_text(text).await,
            SessionCommand::Hangup => {
                let timestamp = self.session.next_timestamp();
                self.send_outbound(OutboundMessage::EndCall { timestamp }).await;
                self.stop_session().await;
                self.set_mode(Mode::Idle).await;
                return false;
            }
        }
        true
    }

    async fn start_listening(&mut self) {
        match self.session.mode {
            Mode::Ready => {}
            Mode::Listening => return, // already listening, no-op
            other => {
                debug!(target: "session", ?other, "ignoring start while not ready");
                return;
            }
        }

        if let Err(e) = self
            .capture
            .start(self.chunk_tx.clone(), self.analysis_tx.clone())
        {
            // Device errors stay in Ready: report and let the user retry.
            warn!(target: "session", "microphone acquisition failed: {}", e);
            self.push_conversation(Speaker::System, format!("Microphone unavailable: {}", e));
            self.emit_ui(UiEvent::Error(format!("microphone unavailable: {}", e)))
                .await;
            return;
        }

        self.session.mic_enabled = true;
        self.endpoint_muted.store(false, Ordering::SeqCst);
        self.recognition.start().await;
        self.set_mode(Mode::Listening).await;
    }

    /// User-initiated stop from any state: tear everything down and
    /// settle in Ready (or stay in Error).
    async fn stop_session(&mut self) {
        self.session.mic_enabled = false;
        self.teardown().await;
        self.session.accumulated.clear();
        self.session.pending_response = None;
        self.session.flush_deferred = false;
        if self.session.mode != Mode::Error {
            self.set_mode(Mode::Ready).await;
        }
    }

    async fn teardown(&mut self) {
        if self.capture.is_running() {
            self.capture.stop().await;
        }
        self.recognition.pause().await;
        self.endpoint_muted.store(true, Ordering::SeqCst);
        self.playback.cancel().await;
        self.gate.set_assistant_speaking(false);
        self.metrics.set_assistant_speaking(false);
        self.metrics.set_user_speaking(false);
    }

    async fn send_typed_text(&mut self, text: String) {
        let text = text.trim().to_string();
        if text.is_empty() {
            return;
        }
        if !self.session.mode.is_connected() {
            self.emit_ui(UiEvent::Error("not connected".into())).await;
            return;
        }

        self.push_conversation(Speaker::User, text.clone());
        self.emit_ui(UiEvent::UserUtterance(text.clone())).await;
        let timestamp = self.session.next_timestamp();
        self.send_outbound(OutboundMessage::Text { text, timestamp })
            .await;

        match self.session.mode {
            Mode::Listening | Mode::Ready => self.set_mode(Mode::AwaitingResponse).await,
            Mode::Flushing { .. } => {
                self.session.mode = Mode::Flushing {
                    awaiting_response: true,
                };
            }
            _ => {}
        }
    }

    async fn handle_chunk(&mut self, chunk: AudioChunk) {
        if !self.session.mode.is_listening_eligible() {
            debug!(target: "session", "dropping chunk outside listening window");
            return;
        }

        let timestamp = self.session.next_timestamp();
        let message = OutboundMessage::AudioChunk {
            audio: chunk.data.to_vec(),
            format: chunk.encoding.as_str().to_string(),
            timestamp,
        };
        // Retained in the accumulation buffer and streamed out at the
        // same time; both views cover the same utterance window.
        self.session.accumulated.push(chunk);
        self.metrics.increment_chunks_sent();
        self.send_outbound(message).await;
    }

    async fn handle_endpoint(&mut self, event: EndpointEvent) {
        match event {
            EndpointEvent::SpeechStarted { rms } => {
                debug!(target: "session", rms, "user speech started");
                self.metrics.set_user_speaking(true);
            }
            EndpointEvent::SilenceConfirmed { .. } => {
                self.metrics.set_user_speaking(false);
                self.begin_flush().await;
            }
        }
    }

    async fn begin_flush(&mut self) {
        let awaiting_response = match self.session.mode {
            Mode::Listening => false,
            Mode::AwaitingResponse => true,
            // The boundary landed after playback already started; the
            // buffered audio is flushed once the assistant finishes.
            Mode::Speaking if !self.session.accumulated.is_empty() => {
                self.session.flush_deferred = true;
                return;
            }
            // A flush already in flight, or a mode where flushing makes
            // no sense: the re-entrancy guard is the mode itself.
            _ => {
                debug!(target: "session", mode = ?self.session.mode, "suppressing flush");
                return;
            }
        };

        if self.session.accumulated.is_empty() {
            debug!(target: "session", "silence confirmed with empty buffer, nothing to flush");
            return;
        }

        self.set_mode(Mode::Flushing { awaiting_response }).await;
        // Pausing flushes the in-flight partial chunk; the grace period
        // gives it time to land in the queue before we finalize.
        self.capture.pause().await;

        let events_tx = self.events_tx.clone();
        let grace = Duration::from_millis(self.config.flush_grace_ms);
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let _ = events_tx.send(SessionEvent::FlushSettled).await;
        });
    }

    async fn handle_flush_settled(&mut self) {
        let awaiting_response = match self.session.mode {
            Mode::Flushing { awaiting_response } => awaiting_response,
            // Stale timer after a stop or error; nothing to do.
            _ => return,
        };

        let audio: Vec<u8> = self
            .session
            .accumulated
            .iter()
            .flat_map(|c| c.data.iter().copied())
            .collect();
        let format = self
            .session
            .accumulated
            .first()
            .map(|c| c.encoding.as_str().to_string())
            .unwrap_or_else(|| "pcm_s16le".to_string());
        self.session.accumulated.clear();

        let timestamp = self.session.next_timestamp();
        info!(target: "session", bytes = audio.len(), "flushing utterance audio");
        self.send_outbound(OutboundMessage::AudioComplete {
            audio,
            format,
            timestamp,
        })
        .await;
        self.metrics.increment_flushes();

        if self.session.mic_enabled {
            self.capture.resume().await;
            if awaiting_response {
                self.set_mode(Mode::AwaitingResponse).await;
            } else {
                self.set_mode(Mode::Listening).await;
            }
        } else {
            self.set_mode(Mode::Ready).await;
        }

        // Tie-break: a response that arrived mid-flush plays only now,
        // after the utterance data is safely out.
        if let Some(pending) = self.session.pending_response.take() {
            self.start_speaking(pending).await;
        }
    }

    async fn handle_transcript(&mut self, event: TranscriptEvent) {
        match event {
            TranscriptEvent::Interim { text } => {
                self.emit_ui(UiEvent::InterimTranscript(text)).await;
            }
            TranscriptEvent::Final { text } => {
                self.metrics.increment_final_transcripts();
                self.push_conversation(Speaker::User, text.clone());
                self.emit_ui(UiEvent::UserUtterance(text.clone())).await;

                // The transcript channel is independent of the audio
                // flush: send immediately.
                let timestamp = self.session.next_timestamp();
                self.send_outbound(OutboundMessage::Text { text, timestamp })
                    .await;

                match self.session.mode {
                    Mode::Listening => self.set_mode(Mode::AwaitingResponse).await,
                    Mode::Flushing { .. } => {
                        self.session.mode = Mode::Flushing {
                            awaiting_response: true,
                        };
                    }
                    _ => {}
                }
            }
        }
    }

    async fn handle_transport(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Inbound(message) => self.handle_inbound(message).await,
            TransportEvent::Closed => {
                warn!(target: "session", "voice channel closed");
                self.teardown().await;
                self.session.accumulated.clear();
                self.session.pending_response = None;
                self.session.flush_deferred = false;
                self.set_mode(Mode::Error).await;
                self.push_conversation(Speaker::System, "Connection lost".into());
                self.emit_ui(UiEvent::Error("connection lost".into())).await;
            }
        }
    }

    async fn handle_inbound(&mut self, message: voxlink_protocol::InboundMessage) {
        use voxlink_protocol::InboundMessage;

        match message {
            InboundMessage::Connection { message, .. } => {
                self.emit_ui(UiEvent::Status(message)).await;
            }
            InboundMessage::Transcription { text } => {
                // Server-side ASR echo of the user's utterance.
                self.push_conversation(Speaker::User, text.clone());
                self.emit_ui(UiEvent::UserUtterance(text)).await;
            }
            InboundMessage::Processing { message } => {
                self.emit_ui(UiEvent::Status(
                    message.unwrap_or_else(|| "Thinking...".into()),
                ))
                .await;
            }
            InboundMessage::Response {
                text,
                audio,
                audio_format,
                ..
            } => {
                self.metrics.increment_responses();
                self.push_conversation(Speaker::Assistant, text.clone());
                self.emit_ui(UiEvent::AssistantResponse(text.clone())).await;

                let request = PlaybackRequest {
                    audio,
                    format: audio_format,
                    text,
                };

                match self.session.mode {
                    Mode::Flushing { .. } | Mode::Speaking => {
                        // Flush first (data must not be lost), or wait
                        // out the current playback.
                        self.session.pending_response = Some(request);
                    }
                    Mode::Listening | Mode::AwaitingResponse => {
                        if self.session.accumulated.is_empty() {
                            self.start_speaking(request).await;
                        } else {
                            // The response raced the silence boundary:
                            // captured audio is still buffered, so the
                            // flush goes first and playback follows it.
                            self.session.pending_response = Some(request);
                            self.begin_flush().await;
                        }
                    }
                    _ => {
                        // Stopped or disconnected: display only, never
                        // play (the session is not Speaking-eligible).
                        debug!(
                            target: "session",
                            mode = ?self.session.mode,
                            "response received outside a live turn; not playing"
                        );
                    }
                }
            }
            InboundMessage::Error { message } => {
                // Surfaced, but deliberately not a mode change.
                self.push_conversation(Speaker::System, message.clone());
                self.emit_ui(UiEvent::Error(message)).await;
            }
            InboundMessage::Pong { timestamp } => {
                debug!(target: "session", ?timestamp, "pong");
            }
        }
    }

    async fn start_speaking(&mut self, request: PlaybackRequest) {
        // Recognition is paused before any audio starts so the
        // recognizer never hears the assistant.
        self.recognition.pause().await;
        self.endpoint_muted.store(true, Ordering::SeqCst);
        self.gate.set_assistant_speaking(true);
        self.metrics.set_assistant_speaking(true);
        self.set_mode(Mode::Speaking).await;

        let playback = self.playback.clone();
        let events_tx = self.events_tx.clone();
        tokio::spawn(async move {
            let outcome = playback.play(request).await;
            let _ = events_tx.send(SessionEvent::PlaybackFinished(outcome)).await;
        });
    }

    async fn handle_playback_finished(&mut self, outcome: PlaybackOutcome) {
        self.gate.set_assistant_speaking(false);
        self.metrics.set_assistant_speaking(false);

        if let PlaybackOutcome::Failed { reason } = &outcome {
            // Handled failure: the conversation proceeds exactly as on
            // success.
            self.metrics.increment_playback_failures();
            self.push_conversation(Speaker::System, format!("Playback failed: {}", reason));
            self.emit_ui(UiEvent::Error(format!("playback failed: {}", reason)))
                .await;
        }

        if self.session.mode != Mode::Speaking {
            // Stopped (or errored) while audio was playing; flags are
            // already settled.
            return;
        }

        if self.session.mic_enabled {
            self.endpoint_muted.store(false, Ordering::SeqCst);
            self.recognition.start().await;
            self.set_mode(Mode::Listening).await;
        } else {
            self.set_mode(Mode::Ready).await;
        }

        if self.session.flush_deferred {
            self.session.flush_deferred = false;
            self.begin_flush().await;
        }
        if matches!(self.session.mode, Mode::Flushing { .. }) {
            // A deferred flush is now in flight; any pending response
            // replays once it settles.
            return;
        }

        if let Some(pending) = self.session.pending_response.take() {
            self.start_speaking(pending).await;
        }
    }

    async fn send_outbound(&mut self, message: OutboundMessage) {
        if self.session.mode == Mode::Error {
            warn!(target: "session", "channel closed, rejecting outbound send");
            return;
        }
        if self.outbound_tx.send(message).await.is_err() {
            warn!(target: "session", "transport adapter gone, dropping outbound message");
        }
    }

    async fn set_mode(&mut self, mode: Mode) {
        if self.session.mode == mode {
            return;
        }
        info!(
            target: "session",
            "Mode transition: {:?} -> {:?}",
            self.session.mode,
            mode
        );
        self.session.mode = mode;
        self.gate
            .set_listening_eligible(mode.is_listening_eligible());
        self.emit_ui(UiEvent::ModeChanged(mode)).await;
    }

    fn push_conversation(&mut self, speaker: Speaker, text: String) {
        let timestamp_ms = chrono::Utc::now().timestamp_millis() as u64;
        let mut log = self.conversation.write();
        if log.len() >= CONVERSATION_LOG_CAP {
            log.remove(0);
        }
        log.push(ConversationEntry {
            speaker,
            text,
            timestamp_ms,
        });
    }

    async fn emit_ui(&mut self, event: UiEvent) {
        if self.ui_tx.send(event).await.is_err() {
            debug!(target: "session", "no ui listener");
        }
    }
}

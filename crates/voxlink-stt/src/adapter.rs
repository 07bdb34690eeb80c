use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::types::{RecognizerEvent, TranscriptEvent};
use crate::SpeechRecognizer;

/// Shared flags the orchestrator keeps current so the adapter can
/// decide whether an end-of-stream should restart the recognizer.
///
/// `live` is the cooperative-cancellation flag: once cleared, callbacks
/// that fire after teardown are inert.
pub struct RestartGate {
    live: AtomicBool,
    listening_eligible: AtomicBool,
    assistant_speaking: AtomicBool,
}

impl Default for RestartGate {
    fn default() -> Self {
        Self {
            live: AtomicBool::new(true),
            listening_eligible: AtomicBool::new(false),
            assistant_speaking: AtomicBool::new(false),
        }
    }
}

impl RestartGate {
    pub fn set_live(&self, live: bool) {
        self.live.store(live, Ordering::SeqCst);
    }

    pub fn set_listening_eligible(&self, eligible: bool) {
        self.listening_eligible.store(eligible, Ordering::SeqCst);
    }

    pub fn set_assistant_speaking(&self, speaking: bool) {
        self.assistant_speaking.store(speaking, Ordering::SeqCst);
    }

    pub fn should_restart(&self) -> bool {
        self.live.load(Ordering::SeqCst)
            && self.listening_eligible.load(Ordering::SeqCst)
            && !self.assistant_speaking.load(Ordering::SeqCst)
    }

    pub fn assistant_speaking(&self) -> bool {
        self.assistant_speaking.load(Ordering::SeqCst)
    }
}

enum RecognitionCommand {
    Start,
    Pause,
    Shutdown,
}

/// Handle to the running adapter task.
pub struct RecognitionHandle {
    cmd_tx: mpsc::Sender<RecognitionCommand>,
    task: JoinHandle<()>,
}

impl RecognitionHandle {
    pub async fn start(&self) {
        self.send(RecognitionCommand::Start).await;
    }

    /// Pause recognition (used while the assistant is speaking). The
    /// adapter task stays alive and can be started again.
    pub async fn pause(&self) {
        self.send(RecognitionCommand::Pause).await;
    }

    pub async fn shutdown(self) {
        self.send(RecognitionCommand::Shutdown).await;
        let _ = self.task.await;
    }

    async fn send(&self, cmd: RecognitionCommand) {
        if self.cmd_tx.send(cmd).await.is_err() {
            warn!(target: "stt", "recognition adapter already gone");
        }
    }
}

/// Normalizes a continuous recognizer's stream into orchestrator
/// events: finals concatenated per result batch and trimmed, interims
/// passed through for display, `no-speech` errors swallowed, and
/// end-of-stream restarts gated on session state.
pub struct RecognitionAdapter {
    recognizer: Box<dyn SpeechRecognizer>,
    raw_rx: mpsc::Receiver<RecognizerEvent>,
    event_tx: mpsc::Sender<TranscriptEvent>,
    gate: Arc<RestartGate>,
    started: bool,
}

impl RecognitionAdapter {
    pub fn spawn(
        recognizer: Box<dyn SpeechRecognizer>,
        raw_rx: mpsc::Receiver<RecognizerEvent>,
        event_tx: mpsc::Sender<TranscriptEvent>,
        gate: Arc<RestartGate>,
    ) -> RecognitionHandle {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let adapter = Self {
            recognizer,
            raw_rx,
            event_tx,
            gate,
            started: false,
        };
        let task = tokio::spawn(adapter.run(cmd_rx));
        RecognitionHandle { cmd_tx, task }
    }

    async fn run(mut self, mut cmd_rx: mpsc::Receiver<RecognitionCommand>) {
        info!(target: "stt", "recognition adapter started");

        loop {
            tokio::select! {
                Some(cmd) = cmd_rx.recv() => {
                    match cmd {
                        RecognitionCommand::Start => self.start_recognizer().await,
                        RecognitionCommand::Pause => self.pause_recognizer().await,
                        RecognitionCommand::Shutdown => break,
                    }
                }
                maybe_event = self.raw_rx.recv() => {
                    match maybe_event {
                        Some(event) => self.handle_raw(event).await,
                        None => {
                            info!(target: "stt", "recognizer event stream closed");
                            break;
                        }
                    }
                }
            }
        }

        self.pause_recognizer().await;
        info!(target: "stt", "recognition adapter stopped");
    }

    async fn start_recognizer(&mut self) {
        // Double start is a no-op, not a fault.
        if self.started {
            return;
        }
        match self.recognizer.start().await {
            Ok(()) => {
                self.started = true;
                debug!(target: "stt", "recognizer started");
            }
            Err(e) => warn!(target: "stt", "recognizer start failed: {}", e),
        }
    }

    async fn pause_recognizer(&mut self) {
        if !self.started {
            return;
        }
        if let Err(e) = self.recognizer.stop().await {
            warn!(target: "stt", "recognizer stop failed: {}", e);
        }
        self.started = false;
        debug!(target: "stt", "recognizer paused");
    }

    async fn handle_raw(&mut self, event: RecognizerEvent) {
        match event {
            RecognizerEvent::Result { segments } => {
                let mut final_text = String::new();
                let mut interim_text = String::new();
                for seg in &segments {
                    if seg.is_final {
                        final_text.push_str(&seg.text);
                    } else {
                        interim_text.push_str(&seg.text);
                    }
                }

                if !interim_text.is_empty() {
                    let _ = self
                        .event_tx
                        .send(TranscriptEvent::Interim { text: interim_text })
                        .await;
                }

                let final_text = final_text.trim();
                if !final_text.is_empty() {
                    debug!(target: "stt", "finalized utterance: {:?}", final_text);
                    let _ = self
                        .event_tx
                        .send(TranscriptEvent::Final {
                            text: final_text.to_string(),
                        })
                        .await;
                }
            }
            RecognizerEvent::Error { code, message } => {
                if code == "no-speech" {
                    debug!(target: "stt", "recognizer reported no speech, ignoring");
                } else {
                    warn!(target: "stt", code, message, "recognizer error");
                }
            }
            RecognizerEvent::Ended => {
                self.started = false;
                if self.gate.should_restart() {
                    debug!(target: "stt", "recognizer ended, restarting");
                    self.start_recognizer().await;
                } else {
                    debug!(
                        target: "stt",
                        "recognizer ended, not restarting (ineligible or assistant speaking)"
                    );
                }
            }
        }
    }
}

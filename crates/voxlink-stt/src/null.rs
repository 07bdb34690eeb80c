use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::types::{RecognizerError, RecognizerEvent};
use crate::SpeechRecognizer;

/// Recognizer that never produces events. Used when no local speech
/// engine is available; the remote service still transcribes the
/// streamed audio and echoes it back.
pub struct NullRecognizer {
    active: bool,
    // Held so the adapter's event stream stays open.
    _event_tx: mpsc::Sender<RecognizerEvent>,
}

impl NullRecognizer {
    pub fn new() -> (Self, mpsc::Receiver<RecognizerEvent>) {
        let (event_tx, event_rx) = mpsc::channel(1);
        (
            Self {
                active: false,
                _event_tx: event_tx,
            },
            event_rx,
        )
    }
}

#[async_trait]
impl SpeechRecognizer for NullRecognizer {
    async fn start(&mut self) -> Result<(), RecognizerError> {
        self.active = true;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), RecognizerError> {
        self.active = false;
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{AudioSink, SpeechSynthesizer};

/// What to play for one assistant response.
#[derive(Debug, Clone)]
pub struct PlaybackRequest {
    pub audio: Option<Vec<u8>>,
    pub format: Option<String>,
    pub text: String,
}

/// Exactly one of these comes back per invocation. A failure is a
/// handled outcome, not a fault; the conversation moves on either way.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackOutcome {
    Completed,
    Failed { reason: String },
}

/// Plays one response: binary audio if present, otherwise synthesized
/// text. Any synthesis still in progress from an earlier response is
/// cancelled before the new one starts.
pub struct PlaybackController {
    sink: Arc<dyn AudioSink>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
}

impl PlaybackController {
    pub fn new(sink: Arc<dyn AudioSink>, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        Self { sink, synthesizer }
    }

    /// Cancel any in-flight synthesis without starting new playback.
    /// Used on session stop.
    pub async fn cancel(&self) {
        self.synthesizer.cancel().await;
    }

    pub async fn play(&self, request: PlaybackRequest) -> PlaybackOutcome {
        self.synthesizer.cancel().await;

        match (&request.audio, &request.text) {
            (Some(audio), _) if !audio.is_empty() => {
                let format = request.format.as_deref().unwrap_or("mp3");
                debug!(
                    target: "tts",
                    bytes = audio.len(),
                    format,
                    "playing binary audio response"
                );
                match self.sink.play(audio, format).await {
                    Ok(()) => PlaybackOutcome::Completed,
                    Err(e) => {
                        warn!(target: "tts", "audio playback failed: {}", e);
                        PlaybackOutcome::Failed {
                            reason: e.to_string(),
                        }
                    }
                }
            }
            (_, text) if !text.is_empty() => {
                debug!(target: "tts", chars = text.len(), "synthesizing text response");
                match self.synthesizer.speak(text).await {
                    Ok(()) => PlaybackOutcome::Completed,
                    Err(e) => {
                        warn!(target: "tts", "synthesis failed: {}", e);
                        PlaybackOutcome::Failed {
                            reason: e.to_string(),
                        }
                    }
                }
            }
            _ => {
                info!(target: "tts", "nothing to play for response");
                PlaybackOutcome::Completed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlaybackError;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Log {
        played: Vec<(usize, String)>,
        spoken: Vec<String>,
        cancels: u32,
        fail_sink: bool,
        fail_speak: bool,
    }

    struct FakeSink(Arc<Mutex<Log>>);

    #[async_trait]
    impl AudioSink for FakeSink {
        async fn play(&self, data: &[u8], format: &str) -> Result<(), PlaybackError> {
            let mut log = self.0.lock();
            if log.fail_sink {
                return Err(PlaybackError::DecodeFailed {
                    format: format.to_string(),
                    detail: "bad payload".into(),
                });
            }
            log.played.push((data.len(), format.to_string()));
            Ok(())
        }
    }

    struct FakeSynth(Arc<Mutex<Log>>);

    #[async_trait]
    impl SpeechSynthesizer for FakeSynth {
        async fn speak(&self, text: &str) -> Result<(), PlaybackError> {
            let mut log = self.0.lock();
            if log.fail_speak {
                return Err(PlaybackError::SynthesisFailed("engine gone".into()));
            }
            log.spoken.push(text.to_string());
            Ok(())
        }

        async fn cancel(&self) {
            self.0.lock().cancels += 1;
        }
    }

    fn controller(log: Arc<Mutex<Log>>) -> PlaybackController {
        PlaybackController::new(Arc::new(FakeSink(log.clone())), Arc::new(FakeSynth(log)))
    }

    #[tokio::test]
    async fn audio_takes_precedence_over_text() {
        let log = Arc::new(Mutex::new(Log::default()));
        let c = controller(log.clone());

        let outcome = c
            .play(PlaybackRequest {
                audio: Some(vec![1, 2, 3]),
                format: Some("mp3".into()),
                text: "should not be spoken".into(),
            })
            .await;

        assert_eq!(outcome, PlaybackOutcome::Completed);
        let l = log.lock();
        assert_eq!(l.played, vec![(3, "mp3".to_string())]);
        assert!(l.spoken.is_empty());
    }

    #[tokio::test]
    async fn missing_audio_falls_back_to_synthesis() {
        let log = Arc::new(Mutex::new(Log::default()));
        let c = controller(log.clone());

        let outcome = c
            .play(PlaybackRequest {
                audio: None,
                format: None,
                text: "hello there".into(),
            })
            .await;

        assert_eq!(outcome, PlaybackOutcome::Completed);
        let l = log.lock();
        assert!(l.played.is_empty());
        assert_eq!(l.spoken, vec!["hello there".to_string()]);
    }

    #[tokio::test]
    async fn decode_failure_is_a_handled_outcome() {
        let log = Arc::new(Mutex::new(Log {
            fail_sink: true,
            ..Default::default()
        }));
        let c = controller(log.clone());

        let outcome = c
            .play(PlaybackRequest {
                audio: Some(vec![0xff; 16]),
                format: Some("mp3".into()),
                text: "fallback text".into(),
            })
            .await;

        // Exactly one of audio/synthesis runs; a decode failure does
        // not cascade into speaking the text.
        assert!(matches!(outcome, PlaybackOutcome::Failed { .. }));
        assert!(log.lock().spoken.is_empty());
    }

    #[tokio::test]
    async fn previous_synthesis_is_cancelled_first() {
        let log = Arc::new(Mutex::new(Log::default()));
        let c = controller(log.clone());

        c.play(PlaybackRequest {
            audio: None,
            format: None,
            text: "one".into(),
        })
        .await;
        c.play(PlaybackRequest {
            audio: None,
            format: None,
            text: "two".into(),
        })
        .await;

        assert_eq!(log.lock().cancels, 2);
    }

    #[tokio::test]
    async fn empty_request_resolves_cleanly() {
        let log = Arc::new(Mutex::new(Log::default()));
        let c = controller(log);

        let outcome = c
            .play(PlaybackRequest {
                audio: None,
                format: None,
                text: String::new(),
            })
            .await;
        assert_eq!(outcome, PlaybackOutcome::Completed);
    }

    #[tokio::test]
    async fn synthesis_failure_is_reported_not_raised() {
        let log = Arc::new(Mutex::new(Log {
            fail_speak: true,
            ..Default::default()
        }));
        let c = controller(log);

        let outcome = c
            .play(PlaybackRequest {
                audio: None,
                format: None,
                text: "doomed".into(),
            })
            .await;
        assert!(matches!(outcome, PlaybackOutcome::Failed { .. }));
    }
}

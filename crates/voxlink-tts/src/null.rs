use async_trait::async_trait;
use std::time::Duration;

use crate::error::PlaybackError;
use crate::{AudioSink, SpeechSynthesizer};

/// Sink that discards audio after a token delay. Lets the runtime run
/// end-to-end on hosts with no output device.
pub struct NullSink;

#[async_trait]
impl AudioSink for NullSink {
    async fn play(&self, data: &[u8], format: &str) -> Result<(), PlaybackError> {
        tracing::info!(target: "tts", bytes = data.len(), format, "null sink consumed audio");
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok(())
    }
}

/// Synthesizer that logs instead of speaking.
pub struct NullSynthesizer;

#[async_trait]
impl SpeechSynthesizer for NullSynthesizer {
    async fn speak(&self, text: &str) -> Result<(), PlaybackError> {
        tracing::info!(target: "tts", chars = text.len(), "null synthesizer consumed text");
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok(())
    }

    async fn cancel(&self) {}
}

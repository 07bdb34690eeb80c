//! Assistant-speech output for Voxlink.
//!
//! Both ways of producing sound are capability providers: an
//! [`AudioSink`] that decodes and plays a binary payload, and a
//! [`SpeechSynthesizer`] that speaks raw text. The
//! [`controller::PlaybackController`] picks exactly one per response
//! and always reports exactly one outcome.

pub mod controller;
pub mod error;
pub mod null;

pub use controller::{PlaybackController, PlaybackOutcome, PlaybackRequest};
pub use error::PlaybackError;
pub use null::{NullSink, NullSynthesizer};

use async_trait::async_trait;

/// Decode-and-play capability for synthesized audio payloads.
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Play the payload to completion. Returns once the audio has
    /// finished (or failed to decode/start).
    async fn play(&self, data: &[u8], format: &str) -> Result<(), PlaybackError>;
}

/// Text-to-speech capability used when a response carries no audio.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Speak the text to completion.
    async fn speak(&self, text: &str) -> Result<(), PlaybackError>;

    /// Cancel any synthesis currently in progress. Must be safe to call
    /// when nothing is speaking.
    async fn cancel(&self);
}

//! Speech recognition seam for Voxlink.
//!
//! The external recognizer is a capability provider behind the
//! [`SpeechRecognizer`] trait; [`adapter::RecognitionAdapter`] turns its
//! raw streaming results into the single finalized-utterance events the
//! session orchestrator consumes.

pub mod adapter;
pub mod null;
pub mod types;

pub use adapter::{RecognitionAdapter, RecognitionHandle, RestartGate};
pub use null::NullRecognizer;
pub use types::{RecognizedSegment, RecognizerError, RecognizerEvent, TranscriptEvent};

use async_trait::async_trait;

/// Continuous, interim-enabled external recognizer.
///
/// Implementations deliver [`RecognizerEvent`]s on the channel agreed at
/// construction time. `start` on an already-running recognizer and
/// `stop` on a stopped one must be no-ops.
#[async_trait]
pub trait SpeechRecognizer: Send {
    async fn start(&mut self) -> Result<(), RecognizerError>;
    async fn stop(&mut self) -> Result<(), RecognizerError>;
    fn is_active(&self) -> bool;
}

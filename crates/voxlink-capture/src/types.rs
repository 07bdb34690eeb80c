use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Encoding tag carried on every chunk and on the wire `format` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioEncoding {
    /// Raw little-endian 16-bit PCM, the native capture encoding.
    PcmS16le,
    Wav,
    Webm,
    Mp3,
}

impl AudioEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioEncoding::PcmS16le => "pcm_s16le",
            AudioEncoding::Wav => "wav",
            AudioEncoding::Webm => "webm",
            AudioEncoding::Mp3 => "mp3",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "pcm_s16le" => Some(AudioEncoding::PcmS16le),
            "wav" => Some(AudioEncoding::Wav),
            "webm" => Some(AudioEncoding::Webm),
            "mp3" => Some(AudioEncoding::Mp3),
            _ => None,
        }
    }
}

/// One time-sliced segment of captured audio.
///
/// The payload is shared: the same chunk is handed to the transport for
/// an outbound `audio_chunk` send and retained in the session's
/// accumulation buffer until the utterance is flushed.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub data: Arc<[u8]>,
    /// Milliseconds since capture started, derived from samples emitted
    /// so buffered chunks stay contiguous and ordered.
    pub captured_at_ms: u64,
    pub encoding: AudioEncoding,
}

impl AudioChunk {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Small frame of normalized samples fanned out for endpoint analysis.
#[derive(Debug, Clone)]
pub struct AnalysisFrame {
    pub samples: Arc<[f32]>,
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("No input device available: {name:?}")]
    DeviceNotFound { name: Option<String> },

    #[error("Device enumeration failed: {0}")]
    DeviceEnumeration(String),

    #[error("Unsupported capture format: {format}")]
    FormatNotSupported { format: String },

    #[error("Build stream error: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("Play stream error: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("Capture pipeline is already running")]
    AlreadyRunning,

    #[error("Capture pipeline is not running")]
    NotRunning,
}

impl From<CaptureError> for voxlink_foundation::DeviceError {
    fn from(e: CaptureError) -> Self {
        match e {
            CaptureError::DeviceNotFound { name } => {
                voxlink_foundation::DeviceError::MicrophoneNotFound { name }
            }
            CaptureError::FormatNotSupported { format } => {
                voxlink_foundation::DeviceError::FormatNotSupported { format }
            }
            other => {
                tracing::debug!(target: "capture", detail = %other, "device error detail");
                voxlink_foundation::DeviceError::MicrophoneAccessDenied
            }
        }
    }
}

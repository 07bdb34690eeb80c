use clap::Parser;
use serde::{Deserialize, Serialize};

use voxlink_capture::{CaptureConfig, DeviceRequest, SlicerConfig};
use voxlink_endpoint::EndpointConfig;

/// Orchestrator tunables not owned by any one component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Grace period after an utterance boundary before the accumulated
    /// audio is finalized, letting in-flight chunks land first.
    pub flush_grace_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { flush_grace_ms: 100 }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "voxlink", about = "Voice calling client")]
pub struct Cli {
    /// Voice service endpoint; the client id is appended to the path.
    #[arg(long, env = "VOXLINK_SERVER", default_value = "ws://127.0.0.1:8000/ws/voice")]
    pub server: String,

    /// Input device name (substring match). Default device when omitted.
    #[arg(short = 'D', long)]
    pub device: Option<String>,

    /// RMS level above which audio counts as speech.
    #[arg(long, default_value_t = 0.01)]
    pub rms_threshold: f32,

    /// Silence duration that ends an utterance, in milliseconds.
    #[arg(long, default_value_t = 1500)]
    pub silence_hold_ms: u64,

    /// Capture slice duration, in milliseconds.
    #[arg(long, default_value_t = 250)]
    pub chunk_interval_ms: u64,

    /// Disable keep-alive pings.
    #[arg(long)]
    pub no_ping: bool,

    /// Start listening immediately instead of waiting for a command.
    #[arg(long)]
    pub auto_listen: bool,
}

impl Cli {
    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            request: DeviceRequest {
                device: self.device.clone(),
                ..DeviceRequest::default()
            },
            slicer: SlicerConfig {
                chunk_interval_ms: self.chunk_interval_ms,
                ..SlicerConfig::default()
            },
        }
    }

    pub fn endpoint_config(&self) -> EndpointConfig {
        EndpointConfig {
            rms_threshold: self.rms_threshold,
            silence_hold_ms: self.silence_hold_ms,
            ..EndpointConfig::default()
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::default()
    }
}

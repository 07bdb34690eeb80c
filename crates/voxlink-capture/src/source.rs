use crate::types::CaptureError;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Constraints requested from the platform when acquiring the
/// microphone. Echo cancellation, noise suppression and AGC are hints;
/// a source that cannot honor them logs and continues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRequest {
    pub device: Option<String>,
    pub sample_rate_hz: u32,
    pub channels: u16,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl Default for DeviceRequest {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate_hz: 16_000,
            channels: 1,
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

/// Capability provider for raw microphone audio.
///
/// Implementations push batches of normalized mono samples into the
/// given sender from whatever thread the platform delivers audio on.
/// The pipeline owns open/close ordering: `open` is called at most once
/// before `close`, and the handle is held exclusively for the lifetime
/// of a record cycle.
pub trait CaptureSource: Send {
    fn open(
        &mut self,
        request: &DeviceRequest,
        sink: mpsc::Sender<Vec<f32>>,
    ) -> Result<(), CaptureError>;

    fn close(&mut self);

    fn is_open(&self) -> bool;
}

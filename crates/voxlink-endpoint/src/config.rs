use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// RMS level (on normalized [-1, 1] samples) above which a tick
    /// counts as speech.
    pub rms_threshold: f32,
    /// How long energy must stay below the threshold, after speech has
    /// been heard, before the utterance is considered finished.
    pub silence_hold_ms: u64,
    /// Nominal spacing between analysis ticks. Detection itself is
    /// wall-clock based; this only sizes the driving timer.
    pub tick_interval_ms: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            rms_threshold: 0.01,
            silence_hold_ms: 1500,
            tick_interval_ms: 16,
        }
    }
}

impl EndpointConfig {
    pub fn silence_hold(&self) -> Duration {
        Duration::from_millis(self.silence_hold_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Shared counters for cross-task session monitoring.
///
/// Everything here is advisory; no control flow reads these values.
#[derive(Clone)]
pub struct SessionMetrics {
    // Audio level monitoring
    pub current_rms: Arc<AtomicU64>, // RMS * 1000 for precision

    // Event counters
    pub chunks_captured: Arc<AtomicU64>,
    pub chunks_sent: Arc<AtomicU64>,
    pub flushes_completed: Arc<AtomicU64>,
    pub transcripts_final: Arc<AtomicU64>,
    pub responses_received: Arc<AtomicU64>,
    pub playback_failures: Arc<AtomicU64>,

    // Activity indicators
    pub user_speaking: Arc<AtomicBool>,
    pub assistant_speaking: Arc<AtomicBool>,
    pub last_speech_time: Arc<RwLock<Option<Instant>>>,
}

impl Default for SessionMetrics {
    fn default() -> Self {
        Self {
            current_rms: Arc::new(AtomicU64::new(0)),
            chunks_captured: Arc::new(AtomicU64::new(0)),
            chunks_sent: Arc::new(AtomicU64::new(0)),
            flushes_completed: Arc::new(AtomicU64::new(0)),
            transcripts_final: Arc::new(AtomicU64::new(0)),
            responses_received: Arc::new(AtomicU64::new(0)),
            playback_failures: Arc::new(AtomicU64::new(0)),
            user_speaking: Arc::new(AtomicBool::new(false)),
            assistant_speaking: Arc::new(AtomicBool::new(false)),
            last_speech_time: Arc::new(RwLock::new(None)),
        }
    }
}

impl SessionMetrics {
    pub fn increment_chunks_captured(&self) {
        self.chunks_captured.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_chunks_sent(&self) {
        self.chunks_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_flushes(&self) {
        self.flushes_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_final_transcripts(&self) {
        self.transcripts_final.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_responses(&self) {
        self.responses_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_playback_failures(&self) {
        self.playback_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn update_audio_level(&self, samples: &[f32]) {
        if samples.is_empty() {
            return;
        }
        let sum_squares: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
        let rms = (sum_squares / samples.len() as f64).sqrt();
        self.current_rms
            .store((rms * 1000.0) as u64, Ordering::Relaxed);
    }

    pub fn set_user_speaking(&self, speaking: bool) {
        self.user_speaking.store(speaking, Ordering::Relaxed);
        if speaking {
            *self.last_speech_time.write() = Some(Instant::now());
        }
    }

    pub fn set_assistant_speaking(&self, speaking: bool) {
        self.assistant_speaking.store(speaking, Ordering::Relaxed);
    }

    pub fn rms(&self) -> f32 {
        self.current_rms.load(Ordering::Relaxed) as f32 / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_level_tracks_rms() {
        let m = SessionMetrics::default();
        m.update_audio_level(&[0.5, -0.5, 0.5, -0.5]);
        assert!((m.rms() - 0.5).abs() < 0.01);
    }

    #[test]
    fn speaking_flag_records_time() {
        let m = SessionMetrics::default();
        assert!(m.last_speech_time.read().is_none());
        m.set_user_speaking(true);
        assert!(m.last_speech_time.read().is_some());
    }
}

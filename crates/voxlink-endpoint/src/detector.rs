use crate::config::EndpointConfig;
use crate::energy::EnergyMeter;
use std::time::Instant;

/// Discrete endpointing signals derived from the rolling energy level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EndpointEvent {
    /// Energy crossed the speech threshold. Emitted on the rising edge
    /// of a speech run; the orchestrator treats repeats as idempotent.
    SpeechStarted { rms: f32 },
    /// Energy stayed below the threshold for the configured hold after
    /// speech had been heard. At most one per utterance.
    SilenceConfirmed { rms: f32 },
}

/// Latched speech/silence detector over per-tick RMS samples.
///
/// A quiet stretch before anyone has spoken never confirms silence:
/// `has_spoken` must latch first, and it resets when silence is
/// confirmed, so each utterance yields exactly one `SilenceConfirmed`.
pub struct EndpointDetector {
    config: EndpointConfig,
    meter: EnergyMeter,
    has_spoken: bool,
    silence_since: Option<Instant>,
    in_speech_run: bool,
    muted: bool,
    ticks_processed: u64,
}

impl EndpointDetector {
    pub fn new(config: EndpointConfig) -> Self {
        Self {
            config,
            meter: EnergyMeter::new(),
            has_spoken: false,
            silence_since: None,
            in_speech_run: false,
            muted: false,
            ticks_processed: 0,
        }
    }

    /// Feed one analysis frame of normalized samples.
    pub fn process_frame(&mut self, frame: &[f32], now: Instant) -> Option<EndpointEvent> {
        let rms = self.meter.calculate_rms(frame);
        self.on_tick(rms, now)
    }

    /// Feed one precomputed RMS sample. `now` is caller-supplied so
    /// tests can drive the timer deterministically.
    pub fn on_tick(&mut self, rms: f32, now: Instant) -> Option<EndpointEvent> {
        if self.muted {
            return None;
        }
        self.ticks_processed += 1;

        if rms >= self.config.rms_threshold {
            self.silence_since = None;
            self.has_spoken = true;
            if !self.in_speech_run {
                self.in_speech_run = true;
                tracing::debug!(target: "endpoint", rms, "speech onset");
                return Some(EndpointEvent::SpeechStarted { rms });
            }
            return None;
        }

        self.in_speech_run = false;

        if !self.has_spoken {
            return None;
        }

        match self.silence_since {
            None => {
                self.silence_since = Some(now);
                None
            }
            Some(started) => {
                if now.duration_since(started) >= self.config.silence_hold() {
                    self.has_spoken = false;
                    self.silence_since = None;
                    tracing::debug!(target: "endpoint", rms, "silence confirmed");
                    Some(EndpointEvent::SilenceConfirmed { rms })
                } else {
                    None
                }
            }
        }
    }

    /// Suspend detection while the assistant is speaking or a flush is
    /// being processed. Ticks delivered while muted are dropped.
    pub fn mute(&mut self) {
        self.muted = true;
        self.silence_since = None;
    }

    pub fn unmute(&mut self) {
        self.muted = false;
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn reset(&mut self) {
        self.has_spoken = false;
        self.silence_since = None;
        self.in_speech_run = false;
        self.ticks_processed = 0;
    }

    pub fn ticks_processed(&self) -> u64 {
        self.ticks_processed
    }
}

//! Bridges the capture fan-out to the endpoint detector.
//!
//! Runs for the whole session; capture starts and stops underneath it
//! without restarting this task. The orchestrator mutes it through a
//! shared flag while the assistant speaks or nothing is being captured.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use voxlink_capture::AnalysisFrame;
use voxlink_endpoint::{EndpointConfig, EndpointDetector};

use super::SessionEvent;

pub fn spawn(
    mut analysis_rx: broadcast::Receiver<AnalysisFrame>,
    muted: Arc<AtomicBool>,
    events_tx: mpsc::Sender<SessionEvent>,
    config: EndpointConfig,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(target: "endpoint", "endpoint task started");
        let mut detector = EndpointDetector::new(config);

        loop {
            let frame = match analysis_rx.recv().await {
                Ok(frame) => frame,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(target: "endpoint", skipped, "analysis stream lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            let should_mute = muted.load(Ordering::SeqCst);
            if should_mute != detector.is_muted() {
                if should_mute {
                    detector.mute();
                } else {
                    // Start the next utterance from a clean slate so a
                    // timer from before the mute cannot fire.
                    detector.reset();
                    detector.unmute();
                }
                debug!(target: "endpoint", muted = should_mute, "mute flag changed");
            }

            if let Some(event) = detector.process_frame(&frame.samples, Instant::now()) {
                if events_tx.send(SessionEvent::Endpoint(event)).await.is_err() {
                    break;
                }
            }
        }

        info!(target: "endpoint", "endpoint task stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use voxlink_endpoint::EndpointEvent;

    fn frame(level: f32) -> AnalysisFrame {
        AnalysisFrame {
            samples: Arc::from(vec![level; 256].as_slice()),
        }
    }

    fn fast_config() -> EndpointConfig {
        EndpointConfig {
            rms_threshold: 0.01,
            silence_hold_ms: 50,
            tick_interval_ms: 16,
        }
    }

    #[tokio::test]
    async fn speech_then_silence_produces_both_events() {
        let (analysis_tx, analysis_rx) = broadcast::channel(64);
        let (events_tx, mut events_rx) = mpsc::channel(64);
        let muted = Arc::new(AtomicBool::new(false));
        let _task = spawn(analysis_rx, muted, events_tx, fast_config());

        analysis_tx.send(frame(0.3)).unwrap();
        let event = events_rx.recv().await.unwrap();
        assert!(matches!(
            event,
            SessionEvent::Endpoint(EndpointEvent::SpeechStarted { .. })
        ));

        // Quiet frames spread past the hold interval.
        for _ in 0..6 {
            analysis_tx.send(frame(0.0001)).unwrap();
            tokio::time::sleep(Duration::from_millis(15)).await;
        }

        let event = events_rx.recv().await.unwrap();
        assert!(matches!(
            event,
            SessionEvent::Endpoint(EndpointEvent::SilenceConfirmed { .. })
        ));
    }

    #[tokio::test]
    async fn muted_task_emits_nothing() {
        let (analysis_tx, analysis_rx) = broadcast::channel(64);
        let (events_tx, mut events_rx) = mpsc::channel(64);
        let muted = Arc::new(AtomicBool::new(true));
        let _task = spawn(analysis_rx, muted, events_tx, fast_config());

        analysis_tx.send(frame(0.3)).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(events_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unmute_discards_stale_silence_state() {
        let (analysis_tx, analysis_rx) = broadcast::channel(64);
        let (events_tx, mut events_rx) = mpsc::channel(64);
        let muted = Arc::new(AtomicBool::new(false));
        let _task = spawn(analysis_rx, muted.clone(), events_tx, fast_config());

        // Latch speech, then mute mid-silence.
        analysis_tx.send(frame(0.3)).unwrap();
        assert!(matches!(
            events_rx.recv().await.unwrap(),
            SessionEvent::Endpoint(EndpointEvent::SpeechStarted { .. })
        ));
        analysis_tx.send(frame(0.0001)).unwrap();
        muted.store(true, Ordering::SeqCst);
        analysis_tx.send(frame(0.0001)).unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;

        // Unmuted quiet frames must not confirm a pre-mute utterance.
        muted.store(false, Ordering::SeqCst);
        for _ in 0..6 {
            analysis_tx.send(frame(0.0001)).unwrap();
            tokio::time::sleep(Duration::from_millis(15)).await;
        }
        assert!(events_rx.try_recv().is_err());
    }
}

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::slicer::{ChunkSlicer, SlicerConfig};
use crate::source::{CaptureSource, DeviceRequest};
use crate::types::{AnalysisFrame, AudioChunk, CaptureError};
use voxlink_telemetry::SessionMetrics;

#[derive(Debug, Clone, Default)]
pub struct CaptureConfig {
    pub request: DeviceRequest,
    pub slicer: SlicerConfig,
}

enum PipelineCommand {
    Pause,
    Resume,
    Stop,
}

/// Owns the microphone for the lifetime of a session.
///
/// `pause`/`resume` gate chunk emission without releasing the device,
/// which is what lets a flush finalize one utterance and keep listening
/// for the next. Only `stop` tears the device down.
pub struct CapturePipeline {
    source: Box<dyn CaptureSource>,
    cfg: CaptureConfig,
    metrics: Option<Arc<SessionMetrics>>,
    cmd_tx: Option<mpsc::Sender<PipelineCommand>>,
    worker: Option<JoinHandle<()>>,
}

impl CapturePipeline {
    pub fn new(source: Box<dyn CaptureSource>, cfg: CaptureConfig) -> Self {
        Self {
            source,
            cfg,
            metrics: None,
            cmd_tx: None,
            worker: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<SessionMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().map(|w| !w.is_finished()).unwrap_or(false)
    }

    /// Acquire the device and start slicing. Ready chunks go to
    /// `chunk_tx`; every raw batch is also fanned out on `analysis_tx`
    /// for endpointing.
    pub fn start(
        &mut self,
        chunk_tx: mpsc::Sender<AudioChunk>,
        analysis_tx: broadcast::Sender<AnalysisFrame>,
    ) -> Result<(), CaptureError> {
        if self.is_running() {
            return Err(CaptureError::AlreadyRunning);
        }

        let (sample_tx, sample_rx) = mpsc::channel::<Vec<f32>>(64);
        self.source.open(&self.cfg.request, sample_tx)?;

        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let worker = PipelineWorker {
            slicer: ChunkSlicer::new(self.cfg.slicer),
            sample_rx,
            cmd_rx,
            chunk_tx,
            analysis_tx,
            metrics: self.metrics.clone(),
            capturing: Arc::new(AtomicBool::new(true)),
        };

        self.cmd_tx = Some(cmd_tx);
        self.worker = Some(tokio::spawn(worker.run()));
        tracing::info!(target: "capture", "capture pipeline started");
        Ok(())
    }

    /// Stop emitting chunks and flush the in-flight partial chunk. The
    /// device stays open so `resume` restarts instantly.
    pub async fn pause(&mut self) {
        self.send_command(PipelineCommand::Pause).await;
    }

    pub async fn resume(&mut self) {
        self.send_command(PipelineCommand::Resume).await;
    }

    /// Flush, release the microphone, and wait for the worker to exit.
    pub async fn stop(&mut self) {
        self.send_command(PipelineCommand::Stop).await;
        self.cmd_tx = None;
        if let Some(worker) = self.worker.take() {
            let _ = worker.await;
        }
        self.source.close();
        tracing::info!(target: "capture", "capture pipeline stopped");
    }

    async fn send_command(&mut self, cmd: PipelineCommand) {
        if let Some(tx) = &self.cmd_tx {
            if tx.send(cmd).await.is_err() {
                tracing::warn!(target: "capture", "capture worker already gone");
            }
        }
    }
}

struct PipelineWorker {
    slicer: ChunkSlicer,
    sample_rx: mpsc::Receiver<Vec<f32>>,
    cmd_rx: mpsc::Receiver<PipelineCommand>,
    chunk_tx: mpsc::Sender<AudioChunk>,
    analysis_tx: broadcast::Sender<AnalysisFrame>,
    metrics: Option<Arc<SessionMetrics>>,
    capturing: Arc<AtomicBool>,
}

impl PipelineWorker {
    async fn run(mut self) {
        loop {
            tokio::select! {
                Some(cmd) = self.cmd_rx.recv() => {
                    match cmd {
                        PipelineCommand::Pause => {
                            self.capturing.store(false, Ordering::SeqCst);
                            self.flush_partial().await;
                            tracing::debug!(target: "capture", "capture paused");
                        }
                        PipelineCommand::Resume => {
                            self.capturing.store(true, Ordering::SeqCst);
                            tracing::debug!(target: "capture", "capture resumed");
                        }
                        PipelineCommand::Stop => {
                            self.flush_partial().await;
                            break;
                        }
                    }
                }
                maybe_batch = self.sample_rx.recv() => {
                    match maybe_batch {
                        Some(batch) => self.handle_batch(batch).await,
                        None => {
                            // Source dropped its sender (device closed
                            // underneath us); flush what we have.
                            self.flush_partial().await;
                            break;
                        }
                    }
                }
            }
        }

        tracing::debug!(target: "capture", "capture worker exited");
    }

    async fn handle_batch(&mut self, batch: Vec<f32>) {
        if !self.capturing.load(Ordering::SeqCst) {
            return;
        }

        if let Some(m) = &self.metrics {
            m.update_audio_level(&batch);
        }

        // Fan out for endpointing. No receivers just means the endpoint
        // task has not started or already stopped.
        let _ = self.analysis_tx.send(AnalysisFrame {
            samples: Arc::from(batch.as_slice()),
        });

        for chunk in self.slicer.push(&batch) {
            self.deliver(chunk).await;
        }
    }

    async fn flush_partial(&mut self) {
        if let Some(chunk) = self.slicer.flush() {
            self.deliver(chunk).await;
        }
    }

    async fn deliver(&self, chunk: AudioChunk) {
        if let Some(m) = &self.metrics {
            m.increment_chunks_captured();
        }
        if self.chunk_tx.send(chunk).await.is_err() {
            tracing::warn!(target: "capture", "no listener for captured chunks");
        }
    }
}

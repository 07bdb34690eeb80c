use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use tokio::sync::mpsc;

use crate::source::{CaptureSource, DeviceRequest};
use crate::types::CaptureError;

/// cpal-backed microphone source.
///
/// `cpal::Stream` is not `Send`, so the stream lives on a dedicated
/// thread for its whole lifetime; `open` blocks until that thread
/// reports whether the device came up. The stream callback runs on the
/// platform's audio thread; samples are normalized to [-1, 1], downmixed
/// to mono, and pushed to the pipeline with `try_send` so the audio
/// thread never blocks. Overflow drops the batch, which the pipeline
/// tolerates.
pub struct CpalSource {
    stop_tx: Option<std_mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl CpalSource {
    pub fn new() -> Self {
        Self {
            stop_tx: None,
            thread: None,
        }
    }
}

impl Default for CpalSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSource for CpalSource {
    fn open(
        &mut self,
        request: &DeviceRequest,
        sink: mpsc::Sender<Vec<f32>>,
    ) -> Result<(), CaptureError> {
        if self.thread.is_some() {
            return Err(CaptureError::AlreadyRunning);
        }

        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<(), CaptureError>>();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();
        let request = request.clone();

        let thread = std::thread::Builder::new()
            .name("voxlink-capture".into())
            .spawn(move || {
                let stream = match build_stream(&request, sink) {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                // Hold the stream alive until close() or drop.
                let _ = stop_rx.recv();
                drop(stream);
                tracing::info!(target: "capture", "microphone stream released");
            })
            .map_err(|e| CaptureError::DeviceEnumeration(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.stop_tx = Some(stop_tx);
                self.thread = Some(thread);
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(CaptureError::DeviceEnumeration(
                    "capture thread died during startup".into(),
                ))
            }
        }
    }

    fn close(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }

    fn is_open(&self) -> bool {
        self.thread.is_some()
    }
}

impl Drop for CpalSource {
    fn drop(&mut self) {
        self.close();
    }
}

fn resolve_device(name: Option<&str>) -> Result<cpal::Device, CaptureError> {
    let host = cpal::default_host();
    match name {
        Some(wanted) => {
            let mut devices = host
                .input_devices()
                .map_err(|e| CaptureError::DeviceEnumeration(e.to_string()))?;
            devices
                .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
                .ok_or_else(|| CaptureError::DeviceNotFound {
                    name: Some(wanted.to_string()),
                })
        }
        None => host
            .default_input_device()
            .ok_or(CaptureError::DeviceNotFound { name: None }),
    }
}

fn build_stream(
    request: &DeviceRequest,
    sink: mpsc::Sender<Vec<f32>>,
) -> Result<cpal::Stream, CaptureError> {
    let device = resolve_device(request.device.as_deref())?;

    if request.echo_cancellation || request.noise_suppression || request.auto_gain_control {
        // cpal exposes no AEC/NS/AGC knobs; honoring these is up to
        // the platform's input processing. Log and continue.
        tracing::debug!(
            target: "capture",
            "echo/noise/gain processing requested; relying on platform defaults"
        );
    }

    let default_cfg = device
        .default_input_config()
        .map_err(|e| CaptureError::DeviceEnumeration(e.to_string()))?;
    let sample_format = default_cfg.sample_format();
    let channels = default_cfg.channels();
    let stream_cfg = StreamConfig {
        channels,
        sample_rate: cpal::SampleRate(request.sample_rate_hz),
        buffer_size: cpal::BufferSize::Default,
    };

    let err_fn = |e| tracing::error!(target: "capture", "input stream error: {}", e);

    let stream = match sample_format {
        SampleFormat::F32 => {
            let tx = sink;
            device.build_input_stream(
                &stream_cfg,
                move |data: &[f32], _| push_mono(data, channels, 1.0, &tx),
                err_fn,
                None,
            )?
        }
        SampleFormat::I16 => {
            let tx = sink;
            device.build_input_stream(
                &stream_cfg,
                move |data: &[i16], _| {
                    let normalized: Vec<f32> =
                        data.iter().map(|&s| s as f32 / i16::MAX as f32).collect();
                    push_mono(&normalized, channels, 1.0, &tx);
                },
                err_fn,
                None,
            )?
        }
        SampleFormat::U16 => {
            let tx = sink;
            device.build_input_stream(
                &stream_cfg,
                move |data: &[u16], _| {
                    let normalized: Vec<f32> = data
                        .iter()
                        .map(|&s| (s as f32 - 32768.0) / 32768.0)
                        .collect();
                    push_mono(&normalized, channels, 1.0, &tx);
                },
                err_fn,
                None,
            )?
        }
        other => {
            return Err(CaptureError::FormatNotSupported {
                format: format!("{:?}", other),
            })
        }
    };

    stream.play()?;
    tracing::info!(
        target: "capture",
        device = ?device.name().ok(),
        rate = request.sample_rate_hz,
        "microphone stream opened"
    );
    Ok(stream)
}

fn push_mono(data: &[f32], channels: u16, gain: f32, tx: &mpsc::Sender<Vec<f32>>) {
    let batch: Vec<f32> = if channels <= 1 {
        data.iter().map(|&s| s * gain).collect()
    } else {
        let ch = channels as usize;
        data.chunks_exact(ch)
            .map(|frame| frame.iter().sum::<f32>() / ch as f32 * gain)
            .collect()
    };

    if tx.try_send(batch).is_err() {
        tracing::trace!(target: "capture", "pipeline busy, dropping capture batch");
    }
}

use std::collections::VecDeque;
use std::sync::Arc;

use crate::types::{AudioChunk, AudioEncoding};

#[derive(Debug, Clone, Copy)]
pub struct SlicerConfig {
    pub chunk_interval_ms: u64,
    pub sample_rate_hz: u32,
    pub encoding: AudioEncoding,
}

impl Default for SlicerConfig {
    fn default() -> Self {
        Self {
            chunk_interval_ms: 250,
            sample_rate_hz: 16_000,
            encoding: AudioEncoding::PcmS16le,
        }
    }
}

impl SlicerConfig {
    pub fn samples_per_chunk(&self) -> usize {
        (self.sample_rate_hz as u64 * self.chunk_interval_ms / 1000) as usize
    }
}

/// Buffers incoming samples and cuts them into fixed-duration chunks.
///
/// Chunk timestamps are derived from the running sample count, so
/// consecutive chunks are contiguous and strictly ordered regardless of
/// how the platform batches its callbacks.
pub struct ChunkSlicer {
    cfg: SlicerConfig,
    buffer: VecDeque<i16>,
    samples_emitted: u64,
}

impl ChunkSlicer {
    pub fn new(cfg: SlicerConfig) -> Self {
        let cap = cfg.samples_per_chunk() * 2;
        Self {
            cfg,
            buffer: VecDeque::with_capacity(cap),
            samples_emitted: 0,
        }
    }

    /// Append normalized samples; returns every chunk that became ready.
    pub fn push(&mut self, samples: &[f32]) -> Vec<AudioChunk> {
        self.buffer.extend(
            samples
                .iter()
                .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16),
        );

        let per_chunk = self.cfg.samples_per_chunk();
        let mut ready = Vec::new();
        while self.buffer.len() >= per_chunk {
            ready.push(self.emit(per_chunk));
        }
        ready
    }

    /// Emit whatever partial chunk is pending. Called when capture is
    /// paused or stopped so no tail audio is lost.
    pub fn flush(&mut self) -> Option<AudioChunk> {
        if self.buffer.is_empty() {
            return None;
        }
        let n = self.buffer.len();
        Some(self.emit(n))
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.samples_emitted = 0;
    }

    fn emit(&mut self, n: usize) -> AudioChunk {
        let mut bytes = Vec::with_capacity(n * 2);
        for _ in 0..n {
            // Length is checked by both call sites.
            let s = self.buffer.pop_front().unwrap_or(0);
            bytes.extend_from_slice(&s.to_le_bytes());
        }

        let captured_at_ms = self.samples_emitted * 1000 / self.cfg.sample_rate_hz as u64;
        self.samples_emitted += n as u64;

        AudioChunk {
            data: Arc::from(bytes.into_boxed_slice()),
            captured_at_ms,
            encoding: self.cfg.encoding,
        }
    }
}

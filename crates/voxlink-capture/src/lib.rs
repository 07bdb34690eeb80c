pub mod device;
pub mod pipeline;
pub mod slicer;
pub mod source;
pub mod types;

pub use device::CpalSource;
pub use pipeline::{CaptureConfig, CapturePipeline};
pub use slicer::{ChunkSlicer, SlicerConfig};
pub use source::{CaptureSource, DeviceRequest};
pub use types::{AnalysisFrame, AudioChunk, AudioEncoding, CaptureError};

//! Streaming pipeline: capture, windowing, and transcription workers.

pub mod capture;
pub mod chunk_buffer;
pub mod controller;
pub mod inference;
pub mod state;
pub mod types;

pub use capture::CaptureWorker;
pub use chunk_buffer::ChunkBuffer;
pub use controller::{PipelineController, PipelineOptions};
pub use inference::InferenceWorker;
pub use state::{PipelineState, StateCell};
pub use types::{AudioWindow, SampleBlock, Transcript};

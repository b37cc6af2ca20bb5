//! Speech-to-text engines.

pub mod transcriber;
pub mod whisper;

pub use transcriber::{MockTranscriber, Transcriber};
pub use whisper::{WhisperConfig, WhisperTranscriber};

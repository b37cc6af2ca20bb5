//! Audio sources: microphone capture, WAV playback, and test mocks.

#[cfg(feature = "cpal-audio")]
pub mod capture;
pub mod recorder;
pub mod wav;

#[cfg(feature = "cpal-audio")]
pub use capture::{CpalAudioSource, list_devices};
pub use recorder::{AudioSource, FramePhase, MockAudioSource};
pub use wav::WavAudioSource;

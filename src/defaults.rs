//! Default configuration constants for talkback.
//!
//! Shared constants used across configuration types to keep the audio,
//! transcription, and conversation layers consistent.

use std::time::Duration;

/// Default audio sample rate in Hz.
///
/// 16kHz is the standard for speech recognition and provides a good balance
/// between quality and computational efficiency for voice applications.
pub const SAMPLE_RATE: u32 = 16000;

/// Default transcription window duration in seconds.
///
/// Each window is handed to the transcriber as one unit. Two seconds keeps
/// latency low while giving the model enough context to recognize phrases.
pub const WINDOW_SECS: f32 = 2.0;

/// Default capacity of the capture -> inference queue, in sample blocks.
///
/// At ~60Hz polling this is roughly one second of headroom before blocks
/// are dropped; inference routinely lags a full window behind real time.
pub const AUDIO_QUEUE_CAPACITY: usize = 64;

/// Default capacity of the inference -> conversation queue, in transcripts.
pub const TRANSCRIPT_QUEUE_CAPACITY: usize = 64;

/// Interval at which the capture worker polls the audio source (~60Hz).
pub const CAPTURE_POLL_INTERVAL: Duration = Duration::from_millis(16);

/// Timeout for blocking queue pops inside workers.
///
/// This bounds shutdown latency: every worker re-checks the pipeline state
/// at least this often. Short enough to feel instant, long enough to avoid
/// busy-spinning.
pub const QUEUE_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Consecutive audio read failures tolerated before the capture worker
/// declares the device dead.
pub const MAX_CONSECUTIVE_READ_ERRORS: u32 = 10;

/// Number of recent conversation entries sent as context per reply request.
pub const REPLY_CONTEXT_TURNS: usize = 5;

/// Network timeout for a single reply-generation request.
pub const REPLY_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-subscriber buffer for pipeline events. Subscribers slower than this
/// lose events rather than block the emitting worker.
pub const EVENT_BUFFER: usize = 64;

/// Default language code for transcription.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Compute the window size in samples for a rate and duration.
pub fn window_samples(sample_rate: u32, window_secs: f32) -> usize {
    (sample_rate as f32 * window_secs) as usize
}

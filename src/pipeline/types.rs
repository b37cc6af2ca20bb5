//! Data types flowing through the streaming pipeline.

use std::time::Instant;

/// One audio-source read's worth of raw PCM samples.
///
/// Produced by the capture worker, consumed exactly once by the inference
/// worker; ownership transfers through the audio queue.
#[derive(Debug, Clone)]
pub struct SampleBlock {
    /// PCM samples (16-bit signed integers).
    pub samples: Vec<i16>,
    /// Timestamp when this block was captured.
    pub timestamp: Instant,
    /// Sequence number for ordering and gap detection.
    pub sequence: u64,
}

impl SampleBlock {
    pub fn new(samples: Vec<i16>, timestamp: Instant, sequence: u64) -> Self {
        Self {
            samples,
            timestamp,
            sequence,
        }
    }
}

/// A fixed-length window of audio, normalized for transcription.
///
/// Invariant: `samples.len()` equals the configured window size, and every
/// sample lies in [-1.0, 1.0]. Built and consumed entirely within the
/// inference worker; never retained after inference.
#[derive(Debug, Clone)]
pub struct AudioWindow {
    /// Normalized f32 samples.
    pub samples: Vec<f32>,
    /// Window counter, assigned in emission order.
    pub sequence: u64,
}

/// A recognized piece of speech.
///
/// Invariant: `text` is non-empty after trimming; silence and noise windows
/// never produce a transcript.
#[derive(Debug, Clone)]
pub struct Transcript {
    pub text: String,
    /// Timestamp when transcription completed.
    pub timestamp: Instant,
}

impl Transcript {
    pub fn new(text: String) -> Self {
        Self {
            text,
            timestamp: Instant::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_block_creation() {
        let samples = vec![100, 200, 300];
        let timestamp = Instant::now();

        let block = SampleBlock::new(samples.clone(), timestamp, 42);

        assert_eq!(block.samples, samples);
        assert_eq!(block.timestamp, timestamp);
        assert_eq!(block.sequence, 42);
    }

    #[test]
    fn test_transcript_creation() {
        let transcript = Transcript::new("hello world".to_string());
        assert_eq!(transcript.text, "hello world");
        assert!(transcript.timestamp <= Instant::now());
    }
}

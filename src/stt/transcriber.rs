use crate::error::{Result, TalkbackError};

/// Trait for speech-to-text engines.
///
/// Implementations receive one window of normalized mono samples at a time
/// and return the recognized text, which may be empty for silence.
pub trait Transcriber: Send {
    /// Transcribe a window of f32 samples in [-1.0, 1.0] at 16kHz.
    fn transcribe(&mut self, samples: &[f32]) -> Result<String>;
}

/// Mock transcriber for testing.
pub struct MockTranscriber {
    /// Scripted results, consumed one per call. When exhausted, falls back
    /// to `fallback`.
    results: Vec<std::result::Result<String, String>>,
    next: usize,
    fallback: String,
    calls: Vec<usize>,
    delay: Option<std::time::Duration>,
}

impl MockTranscriber {
    pub fn new() -> Self {
        Self {
            results: Vec::new(),
            next: 0,
            fallback: String::new(),
            calls: Vec::new(),
            delay: None,
        }
    }

    /// Return the same text on every call.
    pub fn with_transcription(mut self, text: &str) -> Self {
        self.fallback = text.to_string();
        self
    }

    /// Script per-call results; `Err` strings become transcription errors.
    pub fn with_results(mut self, results: Vec<std::result::Result<String, String>>) -> Self {
        self.results = results;
        self.next = 0;
        self
    }

    /// Sleep this long inside every call, simulating slow inference.
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sample counts of the windows seen so far.
    pub fn window_sizes(&self) -> &[usize] {
        &self.calls
    }

    pub fn call_count(&self) -> usize {
        self.calls.len()
    }
}

impl Default for MockTranscriber {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcriber for MockTranscriber {
    fn transcribe(&mut self, samples: &[f32]) -> Result<String> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.calls.push(samples.len());

        if self.next < self.results.len() {
            let result = self.results[self.next].clone();
            self.next += 1;
            return result.map_err(|message| TalkbackError::Transcription { message });
        }

        Ok(self.fallback.clone())
    }
}

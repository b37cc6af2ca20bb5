use crate::error::{Result, TalkbackError};

/// Trait for audio source devices.
///
/// This trait allows swapping implementations (real audio device, WAV file,
/// or mock).
pub trait AudioSource: Send {
    /// Start capturing audio from the source.
    fn start(&mut self) -> Result<()>;

    /// Stop capturing audio from the source.
    fn stop(&mut self) -> Result<()>;

    /// Read whatever audio has accumulated since the last call.
    ///
    /// Returns 16-bit mono PCM samples. An empty vector from a live source
    /// means "nothing yet"; from a finite source it means exhausted.
    fn read_samples(&mut self) -> Result<Vec<i16>>;

    /// Whether this source ends on its own (file/pipe) or runs until
    /// stopped (microphone).
    fn is_finite(&self) -> bool {
        false
    }
}

/// One phase of a mock source's scripted output.
#[derive(Debug, Clone)]
pub struct FramePhase {
    /// Samples returned per read during this phase.
    pub samples: Vec<i16>,
    /// How many reads this phase lasts.
    pub count: u32,
}

/// Mock audio source for testing.
#[derive(Debug, Clone)]
pub struct MockAudioSource {
    is_started: bool,
    phases: Vec<FramePhase>,
    phase_index: usize,
    reads_in_phase: u32,
    finite: bool,
    should_fail_start: bool,
    should_fail_read: bool,
    error_message: String,
}

impl MockAudioSource {
    pub fn new() -> Self {
        Self {
            is_started: false,
            phases: vec![FramePhase {
                samples: vec![0i16; 160],
                count: u32::MAX,
            }],
            phase_index: 0,
            reads_in_phase: 0,
            finite: true,
            should_fail_start: false,
            should_fail_read: false,
            error_message: "mock audio error".to_string(),
        }
    }

    /// Script a sequence of phases; the source exhausts after the last one.
    pub fn with_frame_sequence(mut self, phases: Vec<FramePhase>) -> Self {
        self.phases = phases;
        self.phase_index = 0;
        self.reads_in_phase = 0;
        self
    }

    /// Return the same samples on every read, forever.
    pub fn with_samples(mut self, samples: Vec<i16>) -> Self {
        self.phases = vec![FramePhase {
            samples,
            count: u32::MAX,
        }];
        self
    }

    /// Behave like a live microphone: empty reads mean "not yet", and the
    /// source never reports exhaustion.
    pub fn as_live_source(mut self) -> Self {
        self.finite = false;
        self
    }

    pub fn with_start_failure(mut self) -> Self {
        self.should_fail_start = true;
        self
    }

    pub fn with_read_failure(mut self) -> Self {
        self.should_fail_read = true;
        self
    }

    pub fn with_error_message(mut self, message: &str) -> Self {
        self.error_message = message.to_string();
        self
    }

    pub fn is_started(&self) -> bool {
        self.is_started
    }
}

impl Default for MockAudioSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSource for MockAudioSource {
    fn start(&mut self) -> Result<()> {
        if self.should_fail_start {
            Err(TalkbackError::AudioCapture {
                message: self.error_message.clone(),
            })
        } else {
            self.is_started = true;
            Ok(())
        }
    }

    fn stop(&mut self) -> Result<()> {
        self.is_started = false;
        Ok(())
    }

    fn read_samples(&mut self) -> Result<Vec<i16>> {
        if self.should_fail_read {
            return Err(TalkbackError::AudioCapture {
                message: self.error_message.clone(),
            });
        }

        while let Some(phase) = self.phases.get(self.phase_index) {
            if self.reads_in_phase < phase.count {
                self.reads_in_phase += 1;
                return Ok(phase.samples.clone());
            }
            self.phase_index += 1;
            self.reads_in_phase = 0;
        }

        // All phases exhausted
        Ok(Vec::new())
    }

    fn is_finite(&self) -> bool {
        self.finite
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_returns_configured_samples() {
        let test_samples = vec![100i16, 200, 300, 400, 500];
        let mut source = MockAudioSource::new().with_samples(test_samples.clone());

        assert_eq!(source.read_samples().unwrap(), test_samples);
        assert_eq!(source.read_samples().unwrap(), test_samples);
    }

    #[test]
    fn test_mock_frame_sequence_exhausts() {
        let mut source = MockAudioSource::new().with_frame_sequence(vec![
            FramePhase {
                samples: vec![1i16; 10],
                count: 2,
            },
            FramePhase {
                samples: vec![2i16; 10],
                count: 1,
            },
        ]);

        assert_eq!(source.read_samples().unwrap(), vec![1i16; 10]);
        assert_eq!(source.read_samples().unwrap(), vec![1i16; 10]);
        assert_eq!(source.read_samples().unwrap(), vec![2i16; 10]);
        assert!(source.read_samples().unwrap().is_empty());
        assert!(source.read_samples().unwrap().is_empty());
    }

    #[test]
    fn test_mock_start_failure() {
        let mut source = MockAudioSource::new()
            .with_start_failure()
            .with_error_message("no such device");

        match source.start() {
            Err(TalkbackError::AudioCapture { message }) => {
                assert_eq!(message, "no such device");
            }
            other => panic!("Expected AudioCapture error, got {other:?}"),
        }
        assert!(!source.is_started());
    }

    #[test]
    fn test_mock_read_failure() {
        let mut source = MockAudioSource::new().with_read_failure();
        assert!(source.read_samples().is_err());
    }

    #[test]
    fn test_mock_start_stop_tracking() {
        let mut source = MockAudioSource::new();
        source.start().unwrap();
        assert!(source.is_started());
        source.stop().unwrap();
        assert!(!source.is_started());
    }

    #[test]
    fn test_live_source_is_not_finite() {
        let source = MockAudioSource::new().as_live_source();
        assert!(!source.is_finite());
        assert!(MockAudioSource::new().is_finite());
    }
}

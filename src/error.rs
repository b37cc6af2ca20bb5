//! Error types for talkback.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TalkbackError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio capture errors (fatal to the pipeline)
    #[error("Audio device not found: {device}")]
    AudioDeviceNotFound { device: String },

    #[error("Audio capture failed: {message}")]
    AudioCapture { message: String },

    // Transcription errors (non-fatal, a single window is skipped)
    #[error("Transcription model not found at {path}")]
    TranscriptionModelNotFound { path: String },

    #[error("Transcription failed: {message}")]
    Transcription { message: String },

    // Lifecycle errors
    #[error("Invalid pipeline transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, TalkbackError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_audio_device_not_found_display() {
        let error = TalkbackError::AudioDeviceNotFound {
            device: "default".to_string(),
        };
        assert_eq!(error.to_string(), "Audio device not found: default");
    }

    #[test]
    fn test_audio_capture_display() {
        let error = TalkbackError::AudioCapture {
            message: "device disappeared".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Audio capture failed: device disappeared"
        );
    }

    #[test]
    fn test_transcription_display() {
        let error = TalkbackError::Transcription {
            message: "inference failed".to_string(),
        };
        assert_eq!(error.to_string(), "Transcription failed: inference failed");
    }

    #[test]
    fn test_invalid_transition_display() {
        let error = TalkbackError::InvalidTransition {
            from: "Idle".to_string(),
            to: "Stopping".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid pipeline transition: Idle -> Stopping"
        );
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: TalkbackError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_str = "invalid = toml = syntax";
        let toml_error = toml::from_str::<toml::Value>(toml_str).unwrap_err();
        let error: TalkbackError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<TalkbackError>();
        assert_sync::<TalkbackError>();
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_result() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(returns_result().unwrap(), 42);
    }
}

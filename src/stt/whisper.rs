//! Whisper-based speech-to-text.
//!
//! Requires the `whisper` feature (and cmake to build whisper.cpp):
//!
//! ```bash
//! cargo build --features whisper
//! ```

use crate::defaults;
use crate::error::{Result, TalkbackError};
use crate::stt::transcriber::Transcriber;
use std::path::PathBuf;

#[cfg(feature = "whisper")]
use std::sync::Once;
#[cfg(feature = "whisper")]
use whisper_rs::{
    FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, install_logging_hooks,
};

#[cfg(feature = "whisper")]
static LOGGING_HOOKS_INSTALLED: Once = Once::new();

#[derive(Debug, Clone)]
pub struct WhisperConfig {
    /// Path to the ggml model file.
    pub model_path: PathBuf,
    /// Language code ("en", "es", ...); "auto" lets the model detect.
    pub language: String,
    /// Inference threads (None = library default).
    pub threads: Option<usize>,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/ggml-base.bin"),
            language: defaults::DEFAULT_LANGUAGE.to_string(),
            threads: None,
        }
    }
}

/// Whisper implementation of [`Transcriber`].
#[cfg(feature = "whisper")]
pub struct WhisperTranscriber {
    context: WhisperContext,
    config: WhisperConfig,
}

/// Placeholder when built without the `whisper` feature; construction
/// succeeds so configuration can be validated, transcription errors.
#[cfg(not(feature = "whisper"))]
#[derive(Debug)]
pub struct WhisperTranscriber {
    config: WhisperConfig,
}

impl WhisperTranscriber {
    /// Load the model at `config.model_path`.
    ///
    /// # Errors
    /// `TranscriptionModelNotFound` when the file is missing;
    /// `Transcription` when the model fails to load.
    pub fn new(config: WhisperConfig) -> Result<Self> {
        if !config.model_path.exists() {
            return Err(TalkbackError::TranscriptionModelNotFound {
                path: config.model_path.to_string_lossy().to_string(),
            });
        }
        Self::load(config)
    }

    pub fn config(&self) -> &WhisperConfig {
        &self.config
    }

    #[cfg(feature = "whisper")]
    fn load(config: WhisperConfig) -> Result<Self> {
        // Route whisper.cpp's chatty logging away from stderr (once)
        LOGGING_HOOKS_INSTALLED.call_once(|| {
            install_logging_hooks();
        });

        let context_params = WhisperContextParameters::default();
        let context = WhisperContext::new_with_params(
            config
                .model_path
                .to_str()
                .ok_or_else(|| TalkbackError::Transcription {
                    message: "Invalid UTF-8 in model path".to_string(),
                })?,
            context_params,
        )
        .map_err(|e| TalkbackError::Transcription {
            message: format!("Failed to load Whisper model: {}", e),
        })?;

        Ok(Self { context, config })
    }

    #[cfg(not(feature = "whisper"))]
    fn load(config: WhisperConfig) -> Result<Self> {
        Ok(Self { config })
    }
}

#[cfg(feature = "whisper")]
impl Transcriber for WhisperTranscriber {
    fn transcribe(&mut self, samples: &[f32]) -> Result<String> {
        let mut state = self
            .context
            .create_state()
            .map_err(|e| TalkbackError::Transcription {
                message: format!("Failed to create Whisper state: {}", e),
            })?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        if self.config.language == "auto" {
            params.set_language(None);
        } else {
            params.set_language(Some(&self.config.language));
        }
        if let Some(threads) = self.config.threads {
            params.set_n_threads(threads as i32);
        }
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        state
            .full(params, samples)
            .map_err(|e| TalkbackError::Transcription {
                message: format!("Whisper inference failed: {}", e),
            })?;

        let mut text = String::new();
        for segment in state.as_iter() {
            text.push_str(&segment.to_string());
        }

        Ok(text)
    }
}

#[cfg(not(feature = "whisper"))]
impl Transcriber for WhisperTranscriber {
    fn transcribe(&mut self, _samples: &[f32]) -> Result<String> {
        Err(TalkbackError::Transcription {
            message: concat!(
                "Whisper feature not enabled; this binary was built without ",
                "speech recognition. Rebuild with: cargo build --features whisper"
            )
            .to_string(),
        })
    }
}

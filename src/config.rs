use crate::defaults;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub stt: SttConfig,
    pub reply: ReplyConfig,
    pub pipeline: PipelineTuning,
}

/// Audio capture configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub device: Option<String>,
    pub sample_rate: u32,
    /// Transcription window duration in seconds.
    pub window_secs: f32,
}

/// Speech-to-text configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SttConfig {
    /// Path to the transcription model file.
    pub model_path: Option<PathBuf>,
    pub language: String,
}

/// Reply-generation service configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReplyConfig {
    /// Endpoint of the generateContent-style service.
    pub endpoint: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    /// How many recent conversation entries to send as context.
    pub context_turns: usize,
}

/// Queue sizing and worker timing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineTuning {
    pub audio_queue: usize,
    pub transcript_queue: usize,
    pub poll_timeout_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: defaults::SAMPLE_RATE,
            window_secs: defaults::WINDOW_SECS,
        }
    }
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            language: defaults::DEFAULT_LANGUAGE.to_string(),
        }
    }
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            context_turns: defaults::REPLY_CONTEXT_TURNS,
        }
    }
}

impl Default for PipelineTuning {
    fn default() -> Self {
        Self {
            audio_queue: defaults::AUDIO_QUEUE_CAPACITY,
            transcript_queue: defaults::TRANSCRIPT_QUEUE_CAPACITY,
            poll_timeout_ms: defaults::QUEUE_POLL_TIMEOUT.as_millis() as u64,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e) => {
                if e.downcast_ref::<std::io::Error>()
                    .map(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
                    .unwrap_or(false)
                {
                    Ok(Self::default())
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - TALKBACK_MODEL → stt.model_path
    /// - TALKBACK_LANGUAGE → stt.language
    /// - TALKBACK_AUDIO_DEVICE → audio.device
    /// - TALKBACK_REPLY_ENDPOINT → reply.endpoint
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(model) = std::env::var("TALKBACK_MODEL")
            && !model.is_empty()
        {
            self.stt.model_path = Some(PathBuf::from(model));
        }

        if let Ok(language) = std::env::var("TALKBACK_LANGUAGE")
            && !language.is_empty()
        {
            self.stt.language = language;
        }

        if let Ok(device) = std::env::var("TALKBACK_AUDIO_DEVICE")
            && !device.is_empty()
        {
            self.audio.device = Some(device);
        }

        if let Ok(endpoint) = std::env::var("TALKBACK_REPLY_ENDPOINT")
            && !endpoint.is_empty()
        {
            self.reply.endpoint = endpoint;
        }

        self
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/talkback/config.toml on Linux
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("talkback").join("config.toml"))
    }

    /// Window size in samples derived from the audio section.
    pub fn window_samples(&self) -> usize {
        defaults::window_samples(self.audio.sample_rate, self.audio.window_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to serialize tests that modify environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    // SAFETY: These helpers are only used in tests with ENV_LOCK held,
    // ensuring no concurrent access to environment variables.
    fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) }
    }

    fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) }
    }

    fn clear_talkback_env() {
        remove_env("TALKBACK_MODEL");
        remove_env("TALKBACK_LANGUAGE");
        remove_env("TALKBACK_AUDIO_DEVICE");
        remove_env("TALKBACK_REPLY_ENDPOINT");
    }

    #[test]
    fn test_default_config_has_correct_values() {
        let config = Config::default();

        assert_eq!(config.audio.device, None);
        assert_eq!(config.audio.sample_rate, 16000);
        assert!((config.audio.window_secs - 2.0).abs() < f32::EPSILON);
        assert_eq!(config.stt.language, "en");
        assert_eq!(config.reply.context_turns, 5);
        assert_eq!(config.reply.api_key_env, "GEMINI_API_KEY");
        assert_eq!(config.pipeline.audio_queue, 64);
        assert_eq!(config.pipeline.poll_timeout_ms, 100);
    }

    #[test]
    fn test_window_samples_from_config() {
        let config = Config::default();
        assert_eq!(config.window_samples(), 32000);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[audio]\nwindow_secs = 3.0\n\n[reply]\ncontext_turns = 8\n"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert!((config.audio.window_secs - 3.0).abs() < f32::EPSILON);
        assert_eq!(config.reply.context_turns, 8);
        // Untouched sections keep defaults
        assert_eq!(config.audio.sample_rate, 16000);
        assert_eq!(config.stt.language, "en");
    }

    #[test]
    fn test_load_invalid_toml_fails() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "audio = not toml").unwrap();

        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = Config::load_or_default(Path::new("/nonexistent/talkback.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_env_overrides() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_talkback_env();

        set_env("TALKBACK_LANGUAGE", "de");
        set_env("TALKBACK_AUDIO_DEVICE", "pipewire");
        set_env("TALKBACK_REPLY_ENDPOINT", "http://localhost:9999/generate");

        let config = Config::default().with_env_overrides();
        assert_eq!(config.stt.language, "de");
        assert_eq!(config.audio.device, Some("pipewire".to_string()));
        assert_eq!(config.reply.endpoint, "http://localhost:9999/generate");

        clear_talkback_env();
    }

    #[test]
    fn test_empty_env_values_are_ignored() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_talkback_env();

        set_env("TALKBACK_LANGUAGE", "");

        let config = Config::default().with_env_overrides();
        assert_eq!(config.stt.language, "en");

        clear_talkback_env();
    }
}

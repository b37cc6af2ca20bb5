//! Reply generation against a generateContent-style HTTP service.

use crate::defaults;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

/// Errors from one reply attempt.
///
/// All of these are per-request: the conversation loop appends the error
/// text as an assistant entry and keeps going.
#[derive(Debug, Error)]
pub enum ReplyError {
    #[error("reply request failed: {0}")]
    Network(String),
    #[error("reply service returned status {code}")]
    Service { code: u16 },
    #[error("reply service returned no usable text")]
    EmptyResponse,
}

/// Trait for reply-generation backends.
///
/// Shared across reply worker threads behind an `Arc`; implementations must
/// be callable concurrently.
pub trait ReplyClient: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String, ReplyError>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

/// Blocking HTTP client for generateContent endpoints.
///
/// The API key travels as a `key` query parameter, the way the Gemini API
/// expects it.
pub struct HttpReplyClient {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
}

impl HttpReplyClient {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Result<Self, ReplyError> {
        Self::with_timeout(endpoint, api_key, defaults::REPLY_TIMEOUT)
    }

    pub fn with_timeout(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ReplyError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ReplyError::Network(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }
}

impl ReplyClient for HttpReplyClient {
    fn generate(&self, prompt: &str) -> Result<String, ReplyError> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .map_err(|e| ReplyError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReplyError::Service {
                code: status.as_u16(),
            });
        }

        let body: GenerateResponse = response
            .json()
            .map_err(|e| ReplyError::Network(format!("invalid response body: {e}")))?;

        let text = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .map(|p| p.text)
            .unwrap_or_default();

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ReplyError::EmptyResponse);
        }
        Ok(trimmed.to_string())
    }
}

/// Mock reply client for testing.
///
/// Scripted replies are consumed in call order; an optional per-call delay
/// lets tests exercise out-of-order completion.
pub struct MockReplyClient {
    responses: Mutex<ScriptState>,
    delay: Option<Duration>,
}

struct ScriptState {
    scripted: Vec<Result<String, ReplyErrorKind>>,
    next: usize,
    prompts: Vec<String>,
}

/// Cloneable stand-in for scripting `ReplyError` results.
#[derive(Debug, Clone)]
pub enum ReplyErrorKind {
    Network(String),
    Service(u16),
    Empty,
}

impl From<ReplyErrorKind> for ReplyError {
    fn from(kind: ReplyErrorKind) -> Self {
        match kind {
            ReplyErrorKind::Network(message) => ReplyError::Network(message),
            ReplyErrorKind::Service(code) => ReplyError::Service { code },
            ReplyErrorKind::Empty => ReplyError::EmptyResponse,
        }
    }
}

impl MockReplyClient {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(ScriptState {
                scripted: Vec::new(),
                next: 0,
                prompts: Vec::new(),
            }),
            delay: None,
        }
    }

    /// Script per-call results, consumed in order. After the script runs
    /// out, calls echo the prompt back.
    pub fn with_responses(self, responses: Vec<Result<String, ReplyErrorKind>>) -> Self {
        if let Ok(mut state) = self.responses.lock() {
            state.scripted = responses;
            state.next = 0;
        }
        self
    }

    /// Sleep this long inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Prompts seen so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.responses
            .lock()
            .map(|s| s.prompts.clone())
            .unwrap_or_default()
    }
}

impl Default for MockReplyClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplyClient for MockReplyClient {
    fn generate(&self, prompt: &str) -> Result<String, ReplyError> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        let mut state = self
            .responses
            .lock()
            .map_err(|_| ReplyError::Network("mock poisoned".to_string()))?;
        state.prompts.push(prompt.to_string());

        if state.next < state.scripted.len() {
            let result = state.scripted[state.next].clone();
            state.next += 1;
            return result.map_err(ReplyError::from);
        }

        Ok(format!("echo: {prompt}"))
    }
}

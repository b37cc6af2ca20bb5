//! talkback - streaming voice conversation pipeline
//!
//! Captures microphone audio, transcribes it in fixed windows, and
//! generates spoken-style replies through an LLM endpoint.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
pub mod cli;
pub mod config;
pub mod convo;
pub mod defaults;
pub mod error;
pub mod events;
pub mod pipeline;
pub mod stt;

// Core traits (source → transcribe → converse)
pub use audio::recorder::AudioSource;
pub use convo::reply::ReplyClient;
pub use stt::transcriber::Transcriber;

// Pipeline
pub use pipeline::controller::{PipelineController, PipelineOptions};
pub use pipeline::state::PipelineState;
pub use pipeline::types::Transcript;

// Conversation
pub use convo::{ConversationEntry, ConversationHandle, ConversationLoop, Role};

// Events
pub use events::{EventBus, PipelineEvent};

// Error handling
pub use error::{Result, TalkbackError};

// Config
pub use config::Config;

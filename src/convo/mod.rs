//! Conversation loop: turns transcripts into conversation turns and
//! fans reply generation out to worker threads.
//!
//! The loop owns the history. Each transcript becomes a user entry and
//! spawns one reply worker with an immutable context snapshot; completions
//! arrive over a channel and are appended in completion order, which may
//! differ from utterance order. On shutdown the loop drains every in-flight
//! reply before returning the final history.

pub mod history;
pub mod reply;

pub use history::{ConversationEntry, ConversationHistory, Role, build_prompt};
pub use reply::{HttpReplyClient, MockReplyClient, ReplyClient, ReplyError, ReplyErrorKind};

use crate::defaults;
use crate::events::{EventBus, PipelineEvent};
use crate::pipeline::types::Transcript;
use crossbeam_channel::{Receiver, select, unbounded};
use std::sync::Arc;
use std::thread;

struct ReplyOutcome {
    text: String,
    failed: bool,
}

pub struct ConversationLoop {
    transcript_rx: Receiver<Transcript>,
    client: Arc<dyn ReplyClient>,
    events: EventBus,
    context_turns: usize,
}

impl ConversationLoop {
    pub fn new(
        transcript_rx: Receiver<Transcript>,
        client: Arc<dyn ReplyClient>,
        events: EventBus,
    ) -> Self {
        Self {
            transcript_rx,
            client,
            events,
            context_turns: defaults::REPLY_CONTEXT_TURNS,
        }
    }

    pub fn with_context_turns(mut self, turns: usize) -> Self {
        self.context_turns = turns;
        self
    }

    /// Spawn the loop on its own thread.
    pub fn spawn(self) -> ConversationHandle {
        ConversationHandle {
            join: thread::spawn(move || self.run()),
        }
    }

    /// Run until the transcript stream closes and every in-flight reply has
    /// landed. Returns the complete history.
    pub fn run(self) -> Vec<ConversationEntry> {
        let mut history = ConversationHistory::new();
        let (done_tx, done_rx) = unbounded::<ReplyOutcome>();
        let mut transcript_rx = self.transcript_rx;
        let mut transcripts_open = true;
        let mut in_flight: usize = 0;

        while transcripts_open || in_flight > 0 {
            select! {
                recv(transcript_rx) -> msg => match msg {
                    Ok(transcript) => {
                        history.push(Role::User, transcript.text);
                        let prompt = build_prompt(&history.snapshot(self.context_turns));
                        let client = Arc::clone(&self.client);
                        let done_tx = done_tx.clone();
                        in_flight += 1;
                        thread::spawn(move || {
                            let outcome = match client.generate(&prompt) {
                                Ok(text) => ReplyOutcome { text, failed: false },
                                Err(e) => ReplyOutcome {
                                    text: format!("(reply failed: {e})"),
                                    failed: true,
                                },
                            };
                            // The loop may have exited only if in_flight hit
                            // zero, which cannot happen before this send.
                            let _ = done_tx.send(outcome);
                        });
                    }
                    Err(_) => {
                        transcripts_open = false;
                        // Stop polling the closed stream; keep draining replies.
                        transcript_rx = crossbeam_channel::never();
                    }
                },
                recv(done_rx) -> msg => {
                    if let Ok(outcome) = msg {
                        in_flight -= 1;
                        if outcome.failed {
                            self.events.emit(PipelineEvent::WorkerError {
                                worker: "reply".to_string(),
                                reason: outcome.text.clone(),
                            });
                        }
                        self.events.emit(PipelineEvent::ReplyAvailable {
                            text: outcome.text.clone(),
                        });
                        history.push(Role::Assistant, outcome.text);
                    }
                },
            }
        }

        history.into_entries()
    }
}

/// Join handle for a spawned [`ConversationLoop`].
pub struct ConversationHandle {
    join: thread::JoinHandle<Vec<ConversationEntry>>,
}

impl ConversationHandle {
    /// Wait for the loop to finish and take the final history.
    pub fn finish(self) -> Vec<ConversationEntry> {
        self.join.join().unwrap_or_default()
    }
}

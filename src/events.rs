//! Event fan-out from the pipeline to external consumers.
//!
//! Workers publish discrete events through an [`EventBus`]; any number of
//! consumers (CLI renderer, logger, test harness) subscribe and receive them
//! over their own bounded channel. Sends never block: a subscriber that
//! falls more than [`defaults::EVENT_BUFFER`] events behind loses events
//! instead of stalling the pipeline.

use crate::defaults;
use crate::pipeline::state::PipelineState;
use crossbeam_channel::{Receiver, Sender, bounded};
use serde::Serialize;
use std::sync::{Arc, Mutex};

/// Discrete events emitted by the pipeline and conversation loop.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A new transcript was recognized.
    TranscriptAvailable { text: String },
    /// A generated reply arrived (or an error entry was appended).
    ReplyAvailable { text: String },
    /// The pipeline lifecycle state changed.
    StateChanged { state: PipelineState },
    /// A worker hit a non-fatal error and kept going, or a fatal one and
    /// escalated.
    WorkerError { worker: String, reason: String },
}

/// Fan-out bus for [`PipelineEvent`]s.
///
/// Cheap to clone; all clones share the same subscriber list.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<Sender<PipelineEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber and return its receiving end.
    pub fn subscribe(&self) -> Receiver<PipelineEvent> {
        let (tx, rx) = bounded(defaults::EVENT_BUFFER);
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }
        rx
    }

    /// Deliver an event to every live subscriber without blocking.
    ///
    /// Full subscriber buffers drop the event; disconnected subscribers are
    /// pruned.
    pub fn emit(&self, event: PipelineEvent) {
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.retain(|tx| {
                !matches!(
                    tx.try_send(event.clone()),
                    Err(crossbeam_channel::TrySendError::Disconnected(_))
                )
            });
        }
    }

    /// Number of live subscribers (for diagnostics).
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscriber_receives_events() {
        let bus = EventBus::new();
        let rx = bus.subscribe();

        bus.emit(PipelineEvent::TranscriptAvailable {
            text: "hello".to_string(),
        });

        let event = rx.recv().unwrap();
        assert_eq!(
            event,
            PipelineEvent::TranscriptAvailable {
                text: "hello".to_string()
            }
        );
    }

    #[test]
    fn test_multiple_subscribers_all_receive() {
        let bus = EventBus::new();
        let rx1 = bus.subscribe();
        let rx2 = bus.subscribe();

        bus.emit(PipelineEvent::ReplyAvailable {
            text: "reply".to_string(),
        });

        assert!(rx1.recv().is_ok());
        assert!(rx2.recv().is_ok());
    }

    #[test]
    fn test_emit_without_subscribers_does_not_panic() {
        let bus = EventBus::new();
        bus.emit(PipelineEvent::WorkerError {
            worker: "capture".to_string(),
            reason: "gone".to_string(),
        });
    }

    #[test]
    fn test_disconnected_subscriber_is_pruned() {
        let bus = EventBus::new();
        let rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        drop(rx);
        bus.emit(PipelineEvent::TranscriptAvailable {
            text: "x".to_string(),
        });
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_slow_subscriber_loses_events_but_never_blocks() {
        let bus = EventBus::new();
        let rx = bus.subscribe();

        // Overfill the subscriber buffer; emit must not block.
        for i in 0..(defaults::EVENT_BUFFER + 10) {
            bus.emit(PipelineEvent::TranscriptAvailable {
                text: format!("event {i}"),
            });
        }

        // The buffered prefix is intact and in order.
        let mut received = 0;
        while let Ok(event) = rx.try_recv() {
            assert_eq!(
                event,
                PipelineEvent::TranscriptAvailable {
                    text: format!("event {received}"),
                }
            );
            received += 1;
        }
        assert_eq!(received, defaults::EVENT_BUFFER);
    }

    #[test]
    fn test_event_serializes_to_tagged_json() {
        let event = PipelineEvent::TranscriptAvailable {
            text: "hi".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"transcript_available\""));
        assert!(json.contains("\"text\":\"hi\""));
    }
}

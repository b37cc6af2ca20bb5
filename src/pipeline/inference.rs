//! Inference worker: windows the audio queue and runs speech-to-text.
//!
//! Runs on its own thread. Blocks accumulate in a [`ChunkBuffer`] until a
//! full window is available, then the window is transcribed and any
//! non-empty text is forwarded as a [`Transcript`]. Transcription errors are
//! recoverable: the window is dropped and the loop keeps consuming.

use crate::defaults;
use crate::events::{EventBus, PipelineEvent};
use crate::pipeline::chunk_buffer::ChunkBuffer;
use crate::pipeline::state::StateCell;
use crate::pipeline::types::{SampleBlock, Transcript};
use crate::stt::transcriber::Transcriber;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub struct InferenceWorker {
    transcriber: Box<dyn Transcriber>,
    audio_rx: Receiver<SampleBlock>,
    transcript_tx: Sender<Transcript>,
    state: Arc<StateCell>,
    events: EventBus,
    window_samples: usize,
    poll_timeout: Duration,
}

impl InferenceWorker {
    pub fn new(
        transcriber: Box<dyn Transcriber>,
        audio_rx: Receiver<SampleBlock>,
        transcript_tx: Sender<Transcript>,
        state: Arc<StateCell>,
        events: EventBus,
        window_samples: usize,
    ) -> Self {
        Self {
            transcriber,
            audio_rx,
            transcript_tx,
            state,
            events,
            window_samples,
            poll_timeout: defaults::QUEUE_POLL_TIMEOUT,
        }
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Spawn the worker on its own thread.
    pub fn spawn(self) -> thread::JoinHandle<()> {
        thread::spawn(move || self.run())
    }

    /// Consume loop. Exits when the audio queue disconnects or the pipeline
    /// leaves `Running`. A partial window buffered at exit is discarded.
    pub fn run(mut self) {
        let mut buffer = ChunkBuffer::new();

        loop {
            match self.audio_rx.recv_timeout(self.poll_timeout) {
                Ok(block) => {
                    buffer.append(block);
                    while let Some(window) = buffer.try_take_window(self.window_samples) {
                        if !self.transcribe_window(&window.samples) {
                            return;
                        }
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    if !self.state.is_running() {
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    // Capture ended; drain any full windows already buffered.
                    while let Some(window) = buffer.try_take_window(self.window_samples) {
                        if !self.transcribe_window(&window.samples) {
                            return;
                        }
                    }
                    break;
                }
            }
        }
        // transcript_tx drops here, closing the stream for the consumer
    }

    /// Transcribe one window and forward non-empty text.
    ///
    /// Returns false only when the transcript consumer is gone and the
    /// worker should exit.
    fn transcribe_window(&mut self, samples: &[f32]) -> bool {
        let text = match self.transcriber.transcribe(samples) {
            Ok(text) => text,
            Err(e) => {
                // Recoverable: drop this window, keep consuming.
                self.events.emit(PipelineEvent::WorkerError {
                    worker: "inference".to_string(),
                    reason: format!("transcription failed: {e}"),
                });
                return true;
            }
        };

        let trimmed = text.trim();
        if trimmed.is_empty() {
            // Silence or noise; not a conversation turn.
            return true;
        }

        self.events.emit(PipelineEvent::TranscriptAvailable {
            text: trimmed.to_string(),
        });
        self.transcript_tx
            .send(Transcript::new(trimmed.to_string()))
            .is_ok()
    }
}

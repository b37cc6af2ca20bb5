//! Capture worker: polls an audio source and feeds the audio queue.
//!
//! Runs on its own thread. Each poll drains whatever the source has
//! accumulated into a [`SampleBlock`] and offers it to the bounded audio
//! queue without blocking. When the queue is full the incoming block is
//! dropped and counted; capture never stalls on a slow transcriber.

use crate::audio::recorder::AudioSource;
use crate::defaults;
use crate::events::{EventBus, PipelineEvent};
use crate::pipeline::state::StateCell;
use crate::pipeline::types::SampleBlock;
use crossbeam_channel::{Sender, TrySendError};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

pub struct CaptureWorker {
    source: Box<dyn AudioSource>,
    audio_tx: Sender<SampleBlock>,
    state: Arc<StateCell>,
    events: EventBus,
    dropped_blocks: Arc<AtomicU64>,
    poll_interval: Duration,
    sequence: u64,
}

impl CaptureWorker {
    pub fn new(
        source: Box<dyn AudioSource>,
        audio_tx: Sender<SampleBlock>,
        state: Arc<StateCell>,
        events: EventBus,
        dropped_blocks: Arc<AtomicU64>,
    ) -> Self {
        Self {
            source,
            audio_tx,
            state,
            events,
            dropped_blocks,
            poll_interval: defaults::CAPTURE_POLL_INTERVAL,
            sequence: 0,
        }
    }

    /// Override the poll interval (tests use a short one).
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Spawn the worker on its own thread.
    pub fn spawn(self) -> thread::JoinHandle<()> {
        thread::spawn(move || self.run())
    }

    /// Poll loop. Exits when the pipeline leaves `Running`, the source
    /// exhausts (finite sources), the downstream queue disconnects, or
    /// too many consecutive read errors accumulate.
    pub fn run(mut self) {
        let mut consecutive_errors: u32 = 0;

        while self.state.is_running() {
            match self.source.read_samples() {
                Ok(samples) if samples.is_empty() => {
                    if self.source.is_finite() {
                        // File/pipe sources end on their own.
                        break;
                    }
                    thread::sleep(self.poll_interval);
                }
                Ok(samples) => {
                    consecutive_errors = 0;
                    self.offer_block(samples);
                    thread::sleep(self.poll_interval);
                }
                Err(e) => {
                    consecutive_errors += 1;
                    if consecutive_errors >= defaults::MAX_CONSECUTIVE_READ_ERRORS {
                        let reason = format!("audio source failed repeatedly: {e}");
                        self.events.emit(PipelineEvent::WorkerError {
                            worker: "capture".to_string(),
                            reason: reason.clone(),
                        });
                        self.state.fail(reason);
                        break;
                    }
                    self.events.emit(PipelineEvent::WorkerError {
                        worker: "capture".to_string(),
                        reason: format!("audio read error ({consecutive_errors}): {e}"),
                    });
                    thread::sleep(self.poll_interval);
                }
            }
        }

        if let Err(e) = self.source.stop() {
            eprintln!("talkback: failed to stop audio source: {e}");
        }
        // audio_tx drops here, closing the queue for the inference worker
    }

    /// Non-blocking enqueue with drop-and-count on overflow.
    fn offer_block(&mut self, samples: Vec<i16>) {
        let block = SampleBlock::new(samples, Instant::now(), self.sequence);
        self.sequence += 1;

        match self.audio_tx.try_send(block) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped_blocks.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Disconnected(_)) => {
                // Inference side is gone; nothing left to do.
                self.state.fail("audio queue disconnected".to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::recorder::{FramePhase, MockAudioSource};
    use crossbeam_channel::bounded;

    fn running_state(events: &EventBus) -> Arc<StateCell> {
        let state = Arc::new(StateCell::new(events.clone()));
        state.begin_running().unwrap();
        state
    }

    fn worker(
        source: MockAudioSource,
        capacity: usize,
        events: EventBus,
        state: Arc<StateCell>,
        dropped: Arc<AtomicU64>,
    ) -> (CaptureWorker, crossbeam_channel::Receiver<SampleBlock>) {
        let (tx, rx) = bounded(capacity);
        let worker = CaptureWorker::new(Box::new(source), tx, state, events, dropped)
            .with_poll_interval(Duration::from_millis(1));
        (worker, rx)
    }

    #[test]
    fn test_finite_source_drains_and_exits() {
        let events = EventBus::new();
        let state = running_state(&events);
        let source = MockAudioSource::new().with_frame_sequence(vec![FramePhase {
            samples: vec![7i16; 100],
            count: 3,
        }]);
        let dropped = Arc::new(AtomicU64::new(0));
        let (worker, rx) = worker(source, 8, events, state, Arc::clone(&dropped));

        worker.run();

        let blocks: Vec<_> = rx.try_iter().collect();
        assert_eq!(blocks.len(), 3);
        for (i, block) in blocks.iter().enumerate() {
            assert_eq!(block.sequence, i as u64);
            assert_eq!(block.samples, vec![7i16; 100]);
        }
        assert_eq!(dropped.load(Ordering::Relaxed), 0);
        // Worker dropped its sender on exit
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_full_queue_drops_incoming_block() {
        let events = EventBus::new();
        let state = running_state(&events);
        // Queue of 1: first block enters, the next two are dropped.
        let source = MockAudioSource::new().with_frame_sequence(vec![FramePhase {
            samples: vec![1i16; 10],
            count: 3,
        }]);
        let dropped = Arc::new(AtomicU64::new(0));
        let (worker, rx) = worker(source, 1, events, state, Arc::clone(&dropped));

        worker.run();

        // The oldest queued block survives; newer ones were dropped.
        let block = rx.recv().unwrap();
        assert_eq!(block.sequence, 0);
        assert!(rx.try_recv().is_err());
        assert_eq!(dropped.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_repeated_read_errors_fail_the_pipeline() {
        let events = EventBus::new();
        let event_rx = events.subscribe();
        let state = running_state(&events);
        let source = MockAudioSource::new()
            .with_read_failure()
            .with_error_message("device unplugged");
        let dropped = Arc::new(AtomicU64::new(0));
        let (worker, _rx) = worker(source, 8, events, Arc::clone(&state), dropped);

        worker.run();

        assert!(matches!(
            state.get(),
            crate::pipeline::state::PipelineState::Failed { ref reason }
                if reason.contains("device unplugged")
        ));

        let worker_errors = event_rx
            .try_iter()
            .filter(|e| matches!(e, PipelineEvent::WorkerError { .. }))
            .count();
        assert_eq!(
            worker_errors,
            defaults::MAX_CONSECUTIVE_READ_ERRORS as usize
        );
    }

    #[test]
    fn test_successful_read_resets_error_count() {
        let events = EventBus::new();
        let state = running_state(&events);
        // Errors below the threshold interleaved with successes must not
        // fail the pipeline; the mock cannot interleave, so verify the
        // success path clears the counter by scripting reads after start.
        let source = MockAudioSource::new().with_frame_sequence(vec![FramePhase {
            samples: vec![3i16; 10],
            count: 2,
        }]);
        let dropped = Arc::new(AtomicU64::new(0));
        let (worker, rx) = worker(source, 8, events, Arc::clone(&state), dropped);

        worker.run();

        assert_eq!(rx.try_iter().count(), 2);
        assert!(!matches!(
            state.get(),
            crate::pipeline::state::PipelineState::Failed { .. }
        ));
    }

    #[test]
    fn test_live_source_stops_when_state_leaves_running() {
        let events = EventBus::new();
        let state = running_state(&events);
        let source = MockAudioSource::new()
            .with_samples(vec![2i16; 10])
            .as_live_source();
        let dropped = Arc::new(AtomicU64::new(0));
        let (worker, rx) = worker(source, 1024, events, Arc::clone(&state), dropped);

        let handle = worker.spawn();
        thread::sleep(Duration::from_millis(20));
        state.begin_stopping().unwrap();
        handle.join().unwrap();

        assert!(rx.try_iter().count() >= 1);
        assert_eq!(state.get(), crate::pipeline::state::PipelineState::Stopping);
    }
}

//! Pipeline controller: owns worker lifecycles and the shared state cell.
//!
//! The controller is the only place that performs state transitions other
//! than failure. `start` wires the capture and inference workers together
//! over a bounded audio queue and hands back the transcript stream; `stop`
//! requests shutdown and joins both workers before reporting `Stopped`.

use crate::audio::recorder::AudioSource;
use crate::config::Config;
use crate::defaults;
use crate::error::Result;
use crate::events::EventBus;
use crate::pipeline::capture::CaptureWorker;
use crate::pipeline::inference::InferenceWorker;
use crate::pipeline::state::{PipelineState, StateCell};
use crate::pipeline::types::Transcript;
use crate::stt::transcriber::Transcriber;
use crossbeam_channel::{Receiver, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

/// Queue sizing, window geometry, and worker timing for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub window_samples: usize,
    pub audio_queue: usize,
    pub transcript_queue: usize,
    /// Queue pop timeout for the inference worker; bounds how long a stop
    /// request can go unobserved.
    pub poll_timeout: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            window_samples: defaults::window_samples(
                defaults::SAMPLE_RATE,
                defaults::WINDOW_SECS,
            ),
            audio_queue: defaults::AUDIO_QUEUE_CAPACITY,
            transcript_queue: defaults::TRANSCRIPT_QUEUE_CAPACITY,
            poll_timeout: defaults::QUEUE_POLL_TIMEOUT,
        }
    }
}

impl PipelineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            window_samples: config.window_samples(),
            audio_queue: config.pipeline.audio_queue,
            transcript_queue: config.pipeline.transcript_queue,
            poll_timeout: Duration::from_millis(config.pipeline.poll_timeout_ms),
        }
    }
}

struct WorkerHandles {
    capture: JoinHandle<()>,
    inference: JoinHandle<()>,
}

pub struct PipelineController {
    options: PipelineOptions,
    state: Arc<StateCell>,
    events: EventBus,
    dropped_blocks: Arc<AtomicU64>,
    workers: Option<WorkerHandles>,
}

impl PipelineController {
    pub fn new(options: PipelineOptions, events: EventBus) -> Self {
        let state = Arc::new(StateCell::new(events.clone()));
        Self {
            options,
            state,
            events,
            dropped_blocks: Arc::new(AtomicU64::new(0)),
            workers: None,
        }
    }

    /// Start the capture and inference workers.
    ///
    /// The audio source is started before any thread spawns so that device
    /// errors surface synchronously. Returns the transcript stream; it
    /// closes when the pipeline stops or fails.
    pub fn start(
        &mut self,
        mut source: Box<dyn AudioSource>,
        transcriber: Box<dyn Transcriber>,
    ) -> Result<Receiver<Transcript>> {
        self.state.begin_running()?;

        if let Err(e) = source.start() {
            self.state.fail(format!("audio source failed to start: {e}"));
            return Err(e);
        }

        self.dropped_blocks.store(0, Ordering::Relaxed);

        let (audio_tx, audio_rx) = bounded(self.options.audio_queue);
        let (transcript_tx, transcript_rx) = bounded(self.options.transcript_queue);

        let capture = CaptureWorker::new(
            source,
            audio_tx,
            Arc::clone(&self.state),
            self.events.clone(),
            Arc::clone(&self.dropped_blocks),
        )
        .spawn();

        let inference = InferenceWorker::new(
            transcriber,
            audio_rx,
            transcript_tx,
            Arc::clone(&self.state),
            self.events.clone(),
            self.options.window_samples,
        )
        .with_poll_timeout(self.options.poll_timeout)
        .spawn();

        self.workers = Some(WorkerHandles { capture, inference });

        Ok(transcript_rx)
    }

    /// Request shutdown and wait for both workers to exit.
    ///
    /// Capture stops first (it observes the state change), the audio queue
    /// closes, and inference drains whatever full windows remain. If a
    /// worker failed while we were stopping, the `Failed` state wins.
    pub fn stop(&mut self) -> Result<()> {
        self.state.begin_stopping()?;
        self.join_workers();

        if matches!(self.state.get(), PipelineState::Failed { .. }) {
            return Ok(());
        }
        self.state.finish_stopping()
    }

    /// Wait for workers after a failure, without a stop transition.
    pub fn join(&mut self) {
        self.join_workers();
    }

    /// Acknowledge a failure and return to `Idle`.
    pub fn reset(&mut self) -> Result<()> {
        self.join_workers();
        self.state.reset()
    }

    pub fn state(&self) -> PipelineState {
        self.state.get()
    }

    /// Blocks dropped so far because the audio queue was full.
    pub fn dropped_blocks(&self) -> u64 {
        self.dropped_blocks.load(Ordering::Relaxed)
    }

    fn join_workers(&mut self) {
        if let Some(handles) = self.workers.take() {
            if handles.capture.join().is_err() {
                eprintln!("talkback: capture worker panicked");
            }
            if handles.inference.join().is_err() {
                eprintln!("talkback: inference worker panicked");
            }
        }
    }
}

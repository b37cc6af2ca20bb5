//! Accumulates irregularly-sized sample blocks into fixed-size windows.
//!
//! Windows are tumbling (non-overlapping): each sample belongs to exactly
//! one window, oldest-first. Samples left over after the last full window
//! stay buffered for the next one. On shutdown the partial remainder is
//! dropped rather than flushed — a truncated window degrades recognition
//! quality more than it is worth.

use crate::pipeline::types::{AudioWindow, SampleBlock};
use std::collections::VecDeque;

pub struct ChunkBuffer {
    accumulator: VecDeque<i16>,
    /// Next window sequence number.
    sequence: u64,
}

impl ChunkBuffer {
    pub fn new() -> Self {
        Self {
            accumulator: VecDeque::new(),
            sequence: 0,
        }
    }

    /// Append a block's samples to the accumulator.
    pub fn append(&mut self, block: SampleBlock) {
        self.accumulator.extend(block.samples);
    }

    /// Remove exactly `window_samples` from the front if available.
    ///
    /// Returns the window normalized to f32 in [-1.0, 1.0], or `None` when
    /// fewer than `window_samples` are buffered. Call repeatedly to drain
    /// all full windows.
    pub fn try_take_window(&mut self, window_samples: usize) -> Option<AudioWindow> {
        if window_samples == 0 || self.accumulator.len() < window_samples {
            return None;
        }

        let samples: Vec<f32> = self
            .accumulator
            .drain(..window_samples)
            .map(|s| s as f32 / 32768.0)
            .collect();

        let sequence = self.sequence;
        self.sequence += 1;

        Some(AudioWindow { samples, sequence })
    }

    /// Number of samples currently buffered.
    pub fn len(&self) -> usize {
        self.accumulator.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accumulator.is_empty()
    }

    /// Discard any buffered partial window.
    pub fn clear(&mut self) {
        self.accumulator.clear();
    }
}

impl Default for ChunkBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Waveform tap for the visualizer. Written by the audio callback, copied
/// out by the UI; neither side blocks.

use std::sync::atomic::{AtomicUsize, Ordering};

use super::smoothing::AtomicF32;

pub const DEFAULT_WAVEFORM_SIZE: usize = 1024;

pub struct Waveform {
    samples: Box<[AtomicF32]>,
    cursor: AtomicUsize,
}

impl Waveform {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            samples: (0..size).map(|_| AtomicF32::new(0.0)).collect(),
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Record interleaved stereo output (called from the audio callback).
    pub fn record(&self, interleaved: &[f32]) {
        let len = self.samples.len();
        let mut pos = self.cursor.load(Ordering::Relaxed);
        for frame in interleaved.chunks_exact(2) {
            self.samples[pos].store((frame[0] + frame[1]) * 0.5);
            pos = (pos + 1) % len;
        }
        self.cursor.store(pos, Ordering::Release);
    }

    /// Oldest-to-newest copy of the window, values roughly in [-1, 1].
    pub fn snapshot(&self) -> Vec<f32> {
        let len = self.samples.len();
        let start = self.cursor.load(Ordering::Acquire);
        (0..len)
            .map(|i| self.samples[(start + i) % len].load())
            .collect()
    }
}

impl Default for Waveform {
    fn default() -> Self {
        Self::new(DEFAULT_WAVEFORM_SIZE)
    }
}

//! Stereo sample storage
//!
//! [`StereoBuffer`] backs both the fixed-capacity loop stores and the
//! block-sized scratch buffers. It is allocated once and never resized on
//! the audio thread.

use crate::dsp::math::linear_to_db;

/// Samples at or above this magnitude count as clipped
pub const CLIP_SAMPLE_THRESHOLD: f32 = 1.0;

/// Planar stereo buffer with fixed capacity
#[derive(Debug, Clone, Default)]
pub struct StereoBuffer {
    left: Vec<f32>,
    right: Vec<f32>,
}

impl StereoBuffer {
    /// Allocate a silent buffer holding `capacity` frames
    pub fn new(capacity: usize) -> Self {
        Self {
            left: vec![0.0; capacity],
            right: vec![0.0; capacity],
        }
    }

    /// Build a buffer from two equally long channels
    ///
    /// The longer channel is truncated if the lengths differ.
    pub fn from_channels(mut left: Vec<f32>, mut right: Vec<f32>) -> Self {
        let len = left.len().min(right.len());
        left.truncate(len);
        right.truncate(len);
        Self { left, right }
    }

    /// Number of frames the buffer can hold
    pub fn capacity(&self) -> usize {
        self.left.len()
    }

    /// Check if the buffer has no storage
    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    /// Left channel
    pub fn left(&self) -> &[f32] {
        &self.left
    }

    /// Right channel
    pub fn right(&self) -> &[f32] {
        &self.right
    }

    /// Both channels, mutable
    pub fn channels_mut(&mut self) -> (&mut [f32], &mut [f32]) {
        (&mut self.left, &mut self.right)
    }

    /// First `len` frames of both channels, mutable
    pub fn slices_mut(&mut self, len: usize) -> (&mut [f32], &mut [f32]) {
        let len = len.min(self.left.len());
        (&mut self.left[..len], &mut self.right[..len])
    }

    /// First `len` frames of both channels
    pub fn slices(&self, len: usize) -> (&[f32], &[f32]) {
        let len = len.min(self.left.len());
        (&self.left[..len], &self.right[..len])
    }

    /// Read one frame; out-of-range reads return silence
    #[inline]
    pub fn frame(&self, index: usize) -> (f32, f32) {
        match (self.left.get(index), self.right.get(index)) {
            (Some(&l), Some(&r)) => (l, r),
            _ => (0.0, 0.0),
        }
    }

    /// Write one frame; out-of-range writes are ignored
    #[inline]
    pub fn set_frame(&mut self, index: usize, left: f32, right: f32) {
        if index < self.left.len() {
            self.left[index] = left;
            self.right[index] = right;
        }
    }

    /// Silence the whole buffer
    pub fn clear(&mut self) {
        self.left.iter_mut().for_each(|s| *s = 0.0);
        self.right.iter_mut().for_each(|s| *s = 0.0);
    }

    /// Silence the first `len` frames
    pub fn clear_prefix(&mut self, len: usize) {
        let (left, right) = self.slices_mut(len);
        left.iter_mut().for_each(|s| *s = 0.0);
        right.iter_mut().for_each(|s| *s = 0.0);
    }

    /// Copy the first `len` frames of `other` into this buffer
    pub fn copy_prefix_from(&mut self, other: &StereoBuffer, len: usize) {
        let len = len.min(self.capacity()).min(other.capacity());
        self.left[..len].copy_from_slice(&other.left[..len]);
        self.right[..len].copy_from_slice(&other.right[..len]);
    }

    /// Absolute peak over the first `len` frames, both channels
    pub fn peak(&self, len: usize) -> f32 {
        let (left, right) = self.slices(len);
        peak_of(left).max(peak_of(right))
    }

    /// Peak level in dBFS over the first `len` frames
    pub fn peak_db(&self, len: usize) -> f32 {
        linear_to_db(self.peak(len))
    }
}

/// Absolute peak of a channel
pub fn peak_of(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0_f32, |acc, &s| acc.max(s.abs()))
}

/// Number of samples at or above full scale
pub fn count_clipped(samples: &[f32]) -> usize {
    samples
        .iter()
        .filter(|s| s.abs() >= CLIP_SAMPLE_THRESHOLD)
        .count()
}

//! Pitch-shift collaborator
//!
//! [`PitchShifter`] is the seam the loop track uses for per-layer pitch.
//! [`DelayLinePitchShifter`] is the built-in implementation: two modulated
//! delay taps half a window apart, crossfaded with complementary sin² gains
//! so each tap is silent at the moment its delay jumps.

use super::math::{lerp, sanitize};
use std::f32::consts::PI;

/// Pitch range accepted by the track, in semitones
pub const PITCH_RANGE_SEMITONES: (f32, f32) = (-24.0, 24.0);

/// Window length at 48 kHz for standard quality
const STANDARD_WINDOW_48K: usize = 1024;

/// Window length at 48 kHz for high quality
const HIGH_QUALITY_WINDOW_48K: usize = 2048;

/// Minimum tap delay so interpolation never reads the slot being written
const TAP_GUARD: f32 = 2.0;

/// Block-level pitch shifter contract
pub trait PitchShifter: Send {
    /// Allocate buffers for the given rate and block size
    fn prepare(&mut self, sample_rate: u32, max_block_size: usize);

    /// Set the shift amount in semitones
    fn set_semitones(&mut self, semitones: f32);

    /// Select the longer, smoother analysis window
    fn set_high_quality(&mut self, high_quality: bool);

    /// Shift a stereo block in place
    fn process(&mut self, left: &mut [f32], right: &mut [f32]);

    /// Fixed processing latency in samples
    fn latency_samples(&self) -> usize;

    /// Clear internal delay lines
    fn reset(&mut self);

    /// False when the shifter would pass audio through untouched
    fn is_active(&self) -> bool;
}

/// Two-tap delay-line pitch shifter
#[derive(Debug, Clone)]
pub struct DelayLinePitchShifter {
    buffer_l: Vec<f32>,
    buffer_r: Vec<f32>,
    write_pos: usize,
    phase: f32,
    ratio: f32,
    semitones: f32,
    high_quality: bool,
    window: usize,
    sample_rate: u32,
}

impl DelayLinePitchShifter {
    /// Create an unprepared shifter at unity pitch
    pub fn new() -> Self {
        Self {
            buffer_l: Vec::new(),
            buffer_r: Vec::new(),
            write_pos: 0,
            phase: 0.0,
            ratio: 1.0,
            semitones: 0.0,
            high_quality: false,
            window: STANDARD_WINDOW_48K,
            sample_rate: 48000,
        }
    }

    /// Current shift in semitones
    pub fn semitones(&self) -> f32 {
        self.semitones
    }

    fn window_for(&self, high_quality: bool) -> usize {
        let base = if high_quality {
            HIGH_QUALITY_WINDOW_48K
        } else {
            STANDARD_WINDOW_48K
        };
        ((base as u64 * self.sample_rate as u64) / 48000).max(64) as usize
    }

    #[inline]
    fn read(buffer: &[f32], write_pos: usize, delay: f32) -> f32 {
        let size = buffer.len();
        let position = write_pos as f32 - delay;
        let base = position.floor();
        let frac = position - base;
        let i0 = (base as isize).rem_euclid(size as isize) as usize;
        let i1 = (i0 + 1) % size;
        lerp(buffer[i0], buffer[i1], frac)
    }
}

impl Default for DelayLinePitchShifter {
    fn default() -> Self {
        Self::new()
    }
}

impl PitchShifter for DelayLinePitchShifter {
    fn prepare(&mut self, sample_rate: u32, _max_block_size: usize) {
        self.sample_rate = sample_rate.max(1);
        // Sized for the high quality window so toggling quality never allocates
        let size = self.window_for(true) + 2 * TAP_GUARD as usize + 4;
        self.buffer_l = vec![0.0; size];
        self.buffer_r = vec![0.0; size];
        self.window = self.window_for(self.high_quality);
        self.reset();
    }

    fn set_semitones(&mut self, semitones: f32) {
        let (min, max) = PITCH_RANGE_SEMITONES;
        self.semitones = if semitones.is_finite() {
            semitones.clamp(min, max)
        } else {
            0.0
        };
        self.ratio = 2.0_f32.powf(self.semitones / 12.0);
    }

    fn set_high_quality(&mut self, high_quality: bool) {
        if high_quality != self.high_quality {
            self.high_quality = high_quality;
            self.window = self.window_for(high_quality);
        }
    }

    fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        if !self.is_active() || self.buffer_l.is_empty() {
            return;
        }
        let size = self.buffer_l.len();
        let window = self.window as f32;
        let increment = (1.0 - self.ratio) / window;

        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            self.buffer_l[self.write_pos] = sanitize(*l);
            self.buffer_r[self.write_pos] = sanitize(*r);

            self.phase = (self.phase + increment).rem_euclid(1.0);
            let phase_b = (self.phase + 0.5).rem_euclid(1.0);
            let delay_a = TAP_GUARD + self.phase * window;
            let delay_b = TAP_GUARD + phase_b * window;
            let gain_a = (PI * self.phase).sin().powi(2);
            let gain_b = 1.0 - gain_a;

            *l = Self::read(&self.buffer_l, self.write_pos, delay_a) * gain_a
                + Self::read(&self.buffer_l, self.write_pos, delay_b) * gain_b;
            *r = Self::read(&self.buffer_r, self.write_pos, delay_a) * gain_a
                + Self::read(&self.buffer_r, self.write_pos, delay_b) * gain_b;

            self.write_pos = (self.write_pos + 1) % size;
        }
    }

    fn latency_samples(&self) -> usize {
        self.window / 2 + TAP_GUARD as usize
    }

    fn reset(&mut self) {
        self.buffer_l.iter_mut().for_each(|s| *s = 0.0);
        self.buffer_r.iter_mut().for_each(|s| *s = 0.0);
        self.write_pos = 0;
        self.phase = 0.0;
    }

    fn is_active(&self) -> bool {
        self.semitones.abs() > 1.0e-3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Count rising zero crossings as a crude frequency estimate
    fn zero_crossings(samples: &[f32]) -> usize {
        samples
            .windows(2)
            .filter(|w| w[0] < 0.0 && w[1] >= 0.0)
            .count()
    }

    fn sine(freq: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f32 / 48000.0).sin() * 0.5)
            .collect()
    }

    #[test]
    fn test_unity_pitch_is_bypassed() {
        let mut shifter = DelayLinePitchShifter::new();
        shifter.prepare(48000, 512);
        shifter.set_semitones(0.0);
        let input = sine(440.0, 512);
        let mut left = input.clone();
        let mut right = input.clone();
        shifter.process(&mut left, &mut right);
        assert_eq!(left, input);
        assert!(!shifter.is_active());
    }

    #[test]
    fn test_octave_up_doubles_crossings() {
        let mut shifter = DelayLinePitchShifter::new();
        shifter.prepare(48000, 48000);
        shifter.set_semitones(12.0);
        let input = sine(200.0, 48000);
        let mut left = input.clone();
        let mut right = input.clone();
        shifter.process(&mut left, &mut right);

        let settled = &left[4800..];
        let expected = zero_crossings(&input[4800..]) * 2;
        let measured = zero_crossings(settled);
        let tolerance = expected / 10;
        assert!(
            measured.abs_diff(expected) <= tolerance,
            "expected ~{} crossings, got {}",
            expected,
            measured
        );
    }

    #[test]
    fn test_latency_tracks_quality() {
        let mut shifter = DelayLinePitchShifter::new();
        shifter.prepare(48000, 256);
        let standard = shifter.latency_samples();
        shifter.set_high_quality(true);
        assert!(shifter.latency_samples() > standard);
        assert_eq!(standard, 514);
    }

    #[test]
    fn test_semitones_clamped() {
        let mut shifter = DelayLinePitchShifter::new();
        shifter.set_semitones(99.0);
        assert_eq!(shifter.semitones(), 24.0);
        shifter.set_semitones(f32::NAN);
        assert_eq!(shifter.semitones(), 0.0);
    }
}

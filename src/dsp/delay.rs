//! Delay collaborator
//!
//! Stereo feedback delay with a one-pole damping filter in the feedback path.
//! Buffers are sized in `prepare` for the longest allowed delay so that
//! changing the time never allocates.

use super::math::sanitize;
use super::Effect;
use std::f32::consts::PI;

/// Longest supported delay time
const MAX_DELAY_MS: f32 = 2000.0;

/// Stereo delay effect with damped feedback
#[derive(Debug, Clone)]
pub struct Delay {
    /// Delay time in milliseconds (1-2000)
    delay_time_ms: f32,
    /// Feedback amount (0-0.95, never 1.0)
    feedback: f32,
    /// Wet signal level (0-1)
    wet_level: f32,
    /// Low-pass frequency of the feedback path (20-20000 Hz)
    damping_hz: f32,
    buffer_l: Vec<f32>,
    buffer_r: Vec<f32>,
    write_pos: usize,
    sample_rate: f32,
    filter_state_l: f32,
    filter_state_r: f32,
}

impl Delay {
    /// Create a new delay with the given time in milliseconds
    pub fn new(delay_time_ms: f32) -> Self {
        Self {
            delay_time_ms: delay_time_ms.clamp(1.0, MAX_DELAY_MS),
            feedback: 0.3,
            wet_level: 0.5,
            damping_hz: 8000.0,
            buffer_l: Vec::new(),
            buffer_r: Vec::new(),
            write_pos: 0,
            sample_rate: 48000.0,
            filter_state_l: 0.0,
            filter_state_r: 0.0,
        }
    }

    /// Set delay time (clamped to 1-2000 ms)
    pub fn set_delay_time_ms(&mut self, ms: f32) {
        self.delay_time_ms = ms.clamp(1.0, MAX_DELAY_MS);
    }

    /// Set feedback amount (clamped to 0-0.95)
    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback.clamp(0.0, 0.95);
    }

    /// Set wet level (clamped to 0-1)
    pub fn set_wet_level(&mut self, level: f32) {
        self.wet_level = level.clamp(0.0, 1.0);
    }

    /// Set feedback damping cutoff (clamped to 20-20000 Hz)
    pub fn set_damping_hz(&mut self, hz: f32) {
        self.damping_hz = hz.clamp(20.0, 20000.0);
    }

    fn delay_samples(&self) -> usize {
        let samples = (self.delay_time_ms * self.sample_rate / 1000.0) as usize;
        samples.clamp(1, self.buffer_l.len().saturating_sub(1).max(1))
    }

    fn damping_coeff(&self) -> f32 {
        1.0 - (-2.0 * PI * self.damping_hz / self.sample_rate).exp()
    }
}

impl Default for Delay {
    fn default() -> Self {
        Self::new(375.0)
    }
}

impl Effect for Delay {
    fn prepare(&mut self, sample_rate: u32, _max_block_size: usize) {
        self.sample_rate = sample_rate as f32;
        let size = (MAX_DELAY_MS * self.sample_rate / 1000.0) as usize + 2;
        self.buffer_l = vec![0.0; size];
        self.buffer_r = vec![0.0; size];
        self.write_pos = 0;
    }

    fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        let size = self.buffer_l.len();
        if size == 0 {
            return;
        }
        let delay = self.delay_samples();
        let coeff = self.damping_coeff();

        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let read_pos = (self.write_pos + size - delay) % size;
            let delayed_l = self.buffer_l[read_pos];
            let delayed_r = self.buffer_r[read_pos];

            self.filter_state_l += coeff * (delayed_l * self.feedback - self.filter_state_l);
            self.filter_state_r += coeff * (delayed_r * self.feedback - self.filter_state_r);

            self.buffer_l[self.write_pos] = sanitize(*l + self.filter_state_l);
            self.buffer_r[self.write_pos] = sanitize(*r + self.filter_state_r);

            *l += delayed_l * self.wet_level;
            *r += delayed_r * self.wet_level;

            self.write_pos = (self.write_pos + 1) % size;
        }
    }

    fn reset(&mut self) {
        self.buffer_l.iter_mut().for_each(|s| *s = 0.0);
        self.buffer_r.iter_mut().for_each(|s| *s = 0.0);
        self.filter_state_l = 0.0;
        self.filter_state_r = 0.0;
        self.write_pos = 0;
    }

    fn name(&self) -> &str {
        "Delay"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_impulse_is_echoed() {
        let mut delay = Delay::new(1.0);
        delay.set_wet_level(1.0);
        delay.set_feedback(0.0);
        delay.prepare(1000, 64);

        let mut left = vec![0.0; 8];
        let mut right = vec![0.0; 8];
        left[0] = 1.0;
        delay.process(&mut left, &mut right);

        assert_eq!(left[0], 1.0);
        assert_eq!(left[1], 1.0); // 1 ms at 1 kHz
        assert_eq!(left[2], 0.0);
    }

    #[test]
    fn test_unprepared_delay_is_transparent() {
        let mut delay = Delay::default();
        let mut left = vec![0.25; 4];
        let mut right = vec![0.25; 4];
        delay.process(&mut left, &mut right);
        assert_eq!(left, vec![0.25; 4]);
    }

    #[test]
    fn test_reset_clears_tail() {
        let mut delay = Delay::new(1.0);
        delay.prepare(1000, 64);
        let mut left = vec![1.0; 4];
        let mut right = vec![1.0; 4];
        delay.process(&mut left, &mut right);
        delay.reset();

        let mut left = vec![0.0; 4];
        let mut right = vec![0.0; 4];
        delay.process(&mut left, &mut right);
        assert!(left.iter().all(|&s| s == 0.0));
    }
}

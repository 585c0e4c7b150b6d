//! Loop-boundary anti-click
//!
//! Two independent treatments around every wrap of the master loop, both
//! applied to the loop-only signal:
//!
//! - **Ducking**: a strength `s` ramps 0 -> 1 over the pre-boundary window
//!   and 1 -> 0 over the post-boundary window. At strength `s` the signal is
//!   blended toward a one-pole low-passed copy of itself by
//!   `s * filter_depth` and attenuated by `s * duck_depth`.
//! - **Smear**: clean loop audio is recorded into a ring continuously. At
//!   the wrap the ring freezes and its most recent material is replayed
//!   backwards from the capture point under a cosine-attack / flat /
//!   cos^2-release envelope, added on top of the ducked signal.

use std::f32::consts::PI;

use crate::config::{AntiClickSettings, MAX_ANTI_CLICK_MS, MAX_SMEAR_LENGTH};
use crate::dsp::math::{ms_to_samples, sanitize};

// ============================================================================
// Smear Ring
// ============================================================================

#[derive(Debug, Clone, Default)]
struct SmearRing {
    left: Vec<f32>,
    right: Vec<f32>,
    write: usize,
    filled: usize,
    /// Replay state; the ring is frozen while `remaining > 0`
    capture_point: usize,
    length: usize,
    attack_len: usize,
    release_len: usize,
    elapsed: usize,
}

impl SmearRing {
    fn allocate(&mut self, capacity: usize) {
        self.left = vec![0.0; capacity.max(1)];
        self.right = vec![0.0; capacity.max(1)];
        self.reset();
    }

    fn reset(&mut self) {
        self.left.iter_mut().for_each(|s| *s = 0.0);
        self.right.iter_mut().for_each(|s| *s = 0.0);
        self.write = 0;
        self.filled = 0;
        self.length = 0;
        self.elapsed = 0;
    }

    fn is_playing(&self) -> bool {
        self.elapsed < self.length
    }

    #[inline]
    fn push(&mut self, left: f32, right: f32) {
        let size = self.left.len();
        self.left[self.write] = left;
        self.right[self.write] = right;
        self.write = (self.write + 1) % size;
        self.filled = (self.filled + 1).min(size);
    }

    fn start(&mut self, length: usize, attack_fraction: f32) {
        let length = length.min(self.filled);
        self.capture_point = self.write;
        self.length = length;
        self.elapsed = 0;
        self.attack_len = (attack_fraction * length as f32).round() as usize;
        self.release_len = (length - self.attack_len.min(length)) / 2;
    }

    /// Envelope value at `t` samples into the replay
    fn envelope(&self, t: usize) -> f32 {
        let sustain_end = self.length - self.release_len;
        if t < self.attack_len {
            0.5 * (1.0 - (PI * t as f32 / self.attack_len as f32).cos())
        } else if t < sustain_end {
            1.0
        } else {
            let u = (t - sustain_end) as f32 / self.release_len.max(1) as f32;
            (0.5 * PI * u).cos().powi(2)
        }
    }

    /// Next replayed frame, walking backwards from the capture point
    #[inline]
    fn next(&mut self) -> (f32, f32) {
        let size = self.left.len();
        let t = self.elapsed;
        let index = (self.capture_point + size - 1 - (t % size)) % size;
        let env = self.envelope(t);
        self.elapsed += 1;
        (self.left[index] * env, self.right[index] * env)
    }
}

// ============================================================================
// Anti-Click Processor
// ============================================================================

/// Boundary ducking and smear for the master loop
#[derive(Debug, Clone)]
pub struct AntiClick {
    settings: AntiClickSettings,
    sample_rate: f32,
    pre_samples: usize,
    post_samples: usize,
    lp_coeff: f32,
    lp_state: [f32; 2],
    post_countdown: usize,
    last_position: Option<f32>,
    smear: SmearRing,
}

impl AntiClick {
    pub fn new(settings: &AntiClickSettings) -> Self {
        let mut processor = Self {
            settings: settings.clamped(),
            sample_rate: 48000.0,
            pre_samples: 0,
            post_samples: 0,
            lp_coeff: 1.0,
            lp_state: [0.0; 2],
            post_countdown: 0,
            last_position: None,
            smear: SmearRing::default(),
        };
        processor.update_coefficients();
        processor
    }

    /// Allocate the smear ring for the longest configurable replay
    pub fn prepare(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate as f32;
        let ring = ms_to_samples(MAX_ANTI_CLICK_MS * MAX_SMEAR_LENGTH, self.sample_rate);
        self.smear.allocate(ring);
        self.update_coefficients();
        self.reset();
    }

    pub fn settings(&self) -> &AntiClickSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: &AntiClickSettings) {
        self.settings = settings.clamped();
        self.update_coefficients();
    }

    fn update_coefficients(&mut self) {
        self.pre_samples = ms_to_samples(self.settings.pre_ms, self.sample_rate);
        self.post_samples = ms_to_samples(self.settings.post_ms, self.sample_rate);
        let w = 2.0 * PI * self.settings.filter_cutoff_hz / self.sample_rate;
        self.lp_coeff = (1.0 - (-w).exp()).clamp(0.0, 1.0);
    }

    /// Clear filter, countdown, smear and wrap history
    pub fn reset(&mut self) {
        self.lp_state = [0.0; 2];
        self.post_countdown = 0;
        self.last_position = None;
        self.smear.reset();
    }

    /// Forget the last position so a jump of the playhead is not a wrap
    pub fn rebase(&mut self) {
        self.last_position = None;
    }

    /// Feed the normalized master position; true if it just wrapped
    ///
    /// A wrap is a jump of more than half the loop against the playback
    /// direction.
    #[inline]
    pub fn observe(&mut self, position: f32, reverse: bool) -> bool {
        let wrapped = match self.last_position {
            Some(last) => {
                let delta = position - last;
                if reverse {
                    delta > 0.5
                } else {
                    delta < -0.5
                }
            }
            None => false,
        };
        self.last_position = Some(position);
        wrapped
    }

    /// Current ducking strength for a frame `distance` samples before the wrap
    #[inline]
    fn strength(&mut self, distance: f64) -> f32 {
        let pre = if self.pre_samples > 0 && distance < self.pre_samples as f64 {
            (1.0 - distance / self.pre_samples as f64).clamp(0.0, 1.0) as f32
        } else {
            0.0
        };
        let post = if self.post_countdown > 0 {
            let s = self.post_countdown as f32 / self.post_samples.max(1) as f32;
            self.post_countdown -= 1;
            s
        } else {
            0.0
        };
        pre.max(post).clamp(0.0, 1.0)
    }

    /// Process one loop-only frame
    ///
    /// `distance` is the number of output samples until the next wrap;
    /// `wrapped` marks the first frame after one.
    #[inline]
    pub fn process_frame(
        &mut self,
        left: f32,
        right: f32,
        distance: f64,
        wrapped: bool,
    ) -> (f32, f32) {
        if wrapped {
            self.post_countdown = self.post_samples;
            if self.settings.smear_amount > 0.0 {
                let length =
                    (self.post_samples as f32 * self.settings.smear_length).round() as usize;
                self.smear.start(length, self.settings.smear_attack);
            }
        }

        let s = self.strength(distance);
        self.lp_state[0] += self.lp_coeff * (left - self.lp_state[0]);
        self.lp_state[1] += self.lp_coeff * (right - self.lp_state[1]);
        self.lp_state = [sanitize(self.lp_state[0]), sanitize(self.lp_state[1])];

        let (mut out_l, mut out_r) = if s > 0.0 {
            let fd = s * self.settings.filter_depth;
            let dd = s * self.settings.duck_depth;
            (
                (left * (1.0 - fd) + self.lp_state[0] * fd) * (1.0 - dd),
                (right * (1.0 - fd) + self.lp_state[1] * fd) * (1.0 - dd),
            )
        } else {
            (left, right)
        };

        if self.smear.is_playing() {
            let (sl, sr) = self.smear.next();
            out_l += sl * self.settings.smear_amount;
            out_r += sr * self.settings.smear_amount;
        } else {
            self.smear.push(left, right);
        }
        (out_l, out_r)
    }

    /// True while a smear replay is running
    pub fn is_smearing(&self) -> bool {
        self.smear.is_playing()
    }
}

//! Linear parameter ramps
//!
//! A [`SmoothedValue`] is owned by the audio thread. The control side only
//! ever supplies a new target (through [`crate::engine::SharedParameters`]);
//! the audio thread is the only code that advances the ramp.

/// Default ramp length in milliseconds
pub const DEFAULT_SMOOTHING_MS: f32 = 20.0;

/// Linear ramp towards a target value
#[derive(Debug, Clone)]
pub struct SmoothedValue {
    current: f32,
    target: f32,
    step: f32,
    remaining: usize,
    ramp_samples: usize,
}

impl SmoothedValue {
    /// Create a ramp resting at `value`
    pub fn new(value: f32) -> Self {
        Self {
            current: value,
            target: value,
            step: 0.0,
            remaining: 0,
            ramp_samples: 0,
        }
    }

    /// Configure the ramp length from a time and sample rate
    pub fn prepare(&mut self, sample_rate: f32, ramp_ms: f32) {
        self.ramp_samples = (sample_rate * ramp_ms * 0.001).round().max(0.0) as usize;
        self.set_immediate(self.target);
    }

    /// Start ramping towards `target`
    pub fn set_target(&mut self, target: f32) {
        if target == self.target {
            return;
        }
        self.target = target;
        if self.ramp_samples == 0 {
            self.current = target;
            self.remaining = 0;
            return;
        }
        self.remaining = self.ramp_samples;
        self.step = (self.target - self.current) / self.ramp_samples as f32;
    }

    /// Jump straight to `value` without ramping
    pub fn set_immediate(&mut self, value: f32) {
        self.current = value;
        self.target = value;
        self.step = 0.0;
        self.remaining = 0;
    }

    /// Advance one sample and return the new value
    #[inline]
    pub fn next_value(&mut self) -> f32 {
        if self.remaining > 0 {
            self.remaining -= 1;
            if self.remaining == 0 {
                self.current = self.target;
            } else {
                self.current += self.step;
            }
        }
        self.current
    }

    /// Advance `samples` samples at once
    pub fn skip(&mut self, samples: usize) {
        if samples >= self.remaining {
            self.current = self.target;
            self.remaining = 0;
        } else {
            self.remaining -= samples;
            self.current += self.step * samples as f32;
        }
    }

    /// Current value without advancing
    pub fn current(&self) -> f32 {
        self.current
    }

    /// Value the ramp is heading towards
    pub fn target(&self) -> f32 {
        self.target
    }

    /// True while the ramp has not reached its target
    pub fn is_smoothing(&self) -> bool {
        self.remaining > 0
    }
}

impl Default for SmoothedValue {
    fn default() -> Self {
        Self::new(0.0)
    }
}

//! Saturation collaborator
//!
//! Waveshaping drive stage. Placed in the post-loop chain it is the classic
//! ADD+ companion: every committed override pass is driven a little harder.

use super::math::{db_to_linear, sanitize};
use super::Effect;
use serde::{Deserialize, Serialize};

/// Types of saturation waveshaping
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SaturationType {
    /// Soft tanh curve with slight asymmetry
    #[default]
    Tape,
    /// Rational soft knee, `x / (1 + |x|^(1 + drive))`
    Tube,
    /// Hard digital clipping at full scale
    HardClip,
}

impl SaturationType {
    /// Parse saturation type from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "tape" => Some(SaturationType::Tape),
            "tube" => Some(SaturationType::Tube),
            "hardclip" | "hard_clip" | "hard-clip" => Some(SaturationType::HardClip),
            _ => None,
        }
    }

    #[inline]
    fn shape(self, x: f32, drive: f32) -> f32 {
        match self {
            SaturationType::Tape => {
                let shaped = (x * (1.0 + drive * 4.0)).tanh();
                shaped + 0.1 * drive * shaped * shaped
            }
            SaturationType::Tube => x / (1.0 + x.abs().powf(1.0 + drive)),
            SaturationType::HardClip => (x * (1.0 + drive * 10.0)).clamp(-1.0, 1.0),
        }
    }
}

/// Waveshaping saturation effect
///
/// # Parameters
/// - `drive`: 0.0 to 1.0
/// - `mix`: dry/wet, 0.0 to 1.0
/// - `output_gain_db`: -24 to +24 dB
#[derive(Debug, Clone)]
pub struct Saturation {
    drive: f32,
    kind: SaturationType,
    mix: f32,
    output_gain_db: f32,
    output_gain: f32,
}

impl Saturation {
    /// Create a tape saturator with the given drive
    pub fn new(drive: f32) -> Self {
        Self {
            drive: drive.clamp(0.0, 1.0),
            kind: SaturationType::Tape,
            mix: 1.0,
            output_gain_db: 0.0,
            output_gain: 1.0,
        }
    }

    /// Set the drive amount (clamped to 0-1)
    pub fn set_drive(&mut self, drive: f32) {
        self.drive = drive.clamp(0.0, 1.0);
    }

    /// Get the current drive amount
    pub fn drive(&self) -> f32 {
        self.drive
    }

    /// Set the waveshaping curve
    pub fn set_type(&mut self, kind: SaturationType) {
        self.kind = kind;
    }

    /// Get the waveshaping curve
    pub fn saturation_type(&self) -> SaturationType {
        self.kind
    }

    /// Set the dry/wet mix (clamped to 0-1)
    pub fn set_mix(&mut self, mix: f32) {
        self.mix = mix.clamp(0.0, 1.0);
    }

    /// Set the output gain in dB (clamped to +-24 dB)
    pub fn set_output_gain_db(&mut self, db: f32) {
        self.output_gain_db = db.clamp(-24.0, 24.0);
        self.output_gain = db_to_linear(self.output_gain_db);
    }
}

impl Default for Saturation {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl Effect for Saturation {
    fn prepare(&mut self, _sample_rate: u32, _max_block_size: usize) {
        self.output_gain = db_to_linear(self.output_gain_db);
    }

    fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        if self.mix < f32::EPSILON {
            return;
        }
        let dry_mix = 1.0 - self.mix;
        for sample in left.iter_mut().chain(right.iter_mut()) {
            let dry = *sample;
            let wet = self.kind.shape(dry, self.drive);
            *sample = sanitize((dry * dry_mix + wet * self.mix) * self.output_gain);
        }
    }

    fn reset(&mut self) {}

    fn name(&self) -> &str {
        "Saturation"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_mix_is_transparent() {
        let mut sat = Saturation::new(1.0);
        sat.set_mix(0.0);
        let mut left = vec![0.7; 8];
        let mut right = vec![-0.7; 8];
        sat.process(&mut left, &mut right);
        assert_eq!(left[0], 0.7);
        assert_eq!(right[0], -0.7);
    }

    #[test]
    fn test_hard_clip_bounds() {
        let mut sat = Saturation::new(1.0);
        sat.set_type(SaturationType::HardClip);
        let mut left = vec![5.0; 4];
        let mut right = vec![-5.0; 4];
        sat.process(&mut left, &mut right);
        assert_eq!(left[0], 1.0);
        assert_eq!(right[0], -1.0);
    }

    #[test]
    fn test_tape_adds_gain_at_low_level() {
        let mut sat = Saturation::new(0.5);
        let mut left = vec![0.05; 4];
        let mut right = vec![0.05; 4];
        sat.process(&mut left, &mut right);
        assert!(left[0] > 0.05);
    }

    #[test]
    fn test_parse_type() {
        assert_eq!(SaturationType::parse("Tube"), Some(SaturationType::Tube));
        assert_eq!(SaturationType::parse("hard-clip"), Some(SaturationType::HardClip));
        assert_eq!(SaturationType::parse("fuzz"), None);
    }
}

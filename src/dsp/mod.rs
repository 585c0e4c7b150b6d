//! DSP building blocks
//!
//! Sample helpers, parameter ramps and the per-layer EQ used inside the
//! looper core, plus the block-level collaborator contracts ([`Effect`],
//! [`PitchShifter`]) and a couple of reference collaborators.

mod chain;
mod delay;
mod effect;
mod eq;
pub mod math;
mod pitch;
mod saturation;
mod smoothing;

pub use chain::EffectChain;
pub use delay::Delay;
pub use effect::{Bypass, Effect};
pub use eq::{ThreeBandEq, EQ_GAIN_RANGE_DB};
pub use math::{db_to_linear, hermite, linear_to_db, sanitize, soft_clip};
pub use pitch::{DelayLinePitchShifter, PitchShifter, PITCH_RANGE_SEMITONES};
pub use saturation::{Saturation, SaturationType};
pub use smoothing::{SmoothedValue, DEFAULT_SMOOTHING_MS};

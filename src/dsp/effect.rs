//! Effect trait definition
//!
//! Contract for the single-purpose DSP blocks that sit outside the looper
//! core (delay, saturation, degrade, reverb...). The orchestrator only ever
//! talks to them through this block-level interface.

/// Base trait for all collaborator effects
///
/// Effects process a stereo block in place. `prepare` is called once before
/// streaming and again whenever the sample rate or block size changes; it is
/// the only place an implementation may allocate.
pub trait Effect: Send {
    /// Prepare the effect for processing
    fn prepare(&mut self, sample_rate: u32, max_block_size: usize);

    /// Process one stereo block in place
    ///
    /// Both slices have the same length, never longer than the
    /// `max_block_size` given to [`Effect::prepare`].
    fn process(&mut self, left: &mut [f32], right: &mut [f32]);

    /// Clear internal state (filter history, delay lines)
    fn reset(&mut self);

    /// Human-readable name
    fn name(&self) -> &str;

    /// Processing latency in samples
    fn latency_samples(&self) -> usize {
        0
    }
}

/// Pass-through effect, handy as a placeholder collaborator
#[derive(Debug, Clone, Default)]
pub struct Bypass;

impl Effect for Bypass {
    fn prepare(&mut self, _sample_rate: u32, _max_block_size: usize) {}

    fn process(&mut self, _left: &mut [f32], _right: &mut [f32]) {}

    fn reset(&mut self) {}

    fn name(&self) -> &str {
        "Bypass"
    }
}

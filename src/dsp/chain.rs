//! Effect chain
//!
//! Effects are processed in chain order (index 0 first). The chain is the
//! "fully effected output" stage that additive capture records from.

use super::Effect;

/// Ordered list of collaborator effects
pub struct EffectChain {
    effects: Vec<Box<dyn Effect>>,
    sample_rate: u32,
    max_block_size: usize,
}

impl EffectChain {
    /// Create a new empty effect chain
    pub fn new() -> Self {
        Self {
            effects: Vec::new(),
            sample_rate: 48000,
            max_block_size: 1024,
        }
    }

    /// Append an effect at the end of the chain
    ///
    /// The effect is prepared with the chain's current settings, so this
    /// must be called from setup code, never from the audio callback.
    pub fn push(&mut self, mut effect: Box<dyn Effect>) {
        effect.prepare(self.sample_rate, self.max_block_size);
        self.effects.push(effect);
    }

    /// Builder-style [`EffectChain::push`]
    pub fn with(mut self, effect: Box<dyn Effect>) -> Self {
        self.push(effect);
        self
    }

    /// Remove and return the effect at `index`
    pub fn remove(&mut self, index: usize) -> Option<Box<dyn Effect>> {
        if index < self.effects.len() {
            Some(self.effects.remove(index))
        } else {
            None
        }
    }

    /// Number of effects in the chain
    pub fn len(&self) -> usize {
        self.effects.len()
    }

    /// Check if the chain is empty
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Effect names in processing order
    pub fn names(&self) -> Vec<&str> {
        self.effects.iter().map(|e| e.name()).collect()
    }
}

impl Default for EffectChain {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for EffectChain {
    fn prepare(&mut self, sample_rate: u32, max_block_size: usize) {
        self.sample_rate = sample_rate;
        self.max_block_size = max_block_size;
        for effect in &mut self.effects {
            effect.prepare(sample_rate, max_block_size);
        }
    }

    fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        for effect in &mut self.effects {
            effect.process(left, right);
        }
    }

    fn reset(&mut self) {
        for effect in &mut self.effects {
            effect.reset();
        }
    }

    fn name(&self) -> &str {
        "Effect Chain"
    }

    fn latency_samples(&self) -> usize {
        self.effects.iter().map(|e| e.latency_samples()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::{Bypass, Saturation};

    struct Scale(f32);

    impl Effect for Scale {
        fn prepare(&mut self, _sample_rate: u32, _max_block_size: usize) {}
        fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
            for s in left.iter_mut().chain(right.iter_mut()) {
                *s *= self.0;
            }
        }
        fn reset(&mut self) {}
        fn name(&self) -> &str {
            "Scale"
        }
    }

    #[test]
    fn test_empty_chain_passthrough() {
        let mut chain = EffectChain::new();
        let mut left = vec![0.5; 16];
        let mut right = vec![-0.5; 16];
        chain.process(&mut left, &mut right);
        assert!(left.iter().all(|&s| s == 0.5));
        assert!(right.iter().all(|&s| s == -0.5));
    }

    #[test]
    fn test_chain_order() {
        let mut chain = EffectChain::new()
            .with(Box::new(Scale(2.0)))
            .with(Box::new(Bypass))
            .with(Box::new(Saturation::new(0.5)));
        assert_eq!(chain.names(), vec!["Scale", "Bypass", "Saturation"]);

        let mut left = vec![0.1; 4];
        let mut right = vec![0.1; 4];
        chain.process(&mut left, &mut right);
        assert!(left[0] > 0.1);
    }

    #[test]
    fn test_remove() {
        let mut chain = EffectChain::new().with(Box::new(Bypass));
        assert_eq!(chain.len(), 1);
        assert!(chain.remove(3).is_none());
        assert!(chain.remove(0).is_some());
        assert!(chain.is_empty());
    }
}

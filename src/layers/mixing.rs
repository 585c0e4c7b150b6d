//! Layer compositing
//!
//! Two pure mixing rules selected by [`MixMode`], the solo/override gain
//! resolution that runs before them, and the Layer-mode bounce that feeds
//! the layer underneath a new recording into it.

use log::debug;

use super::orchestrator::LayerOrchestrator;
use crate::engine::{EngineEvent, LayerIndex, LayerType, MixMode, MAX_LAYERS};

// ============================================================================
// Mixing Rules
// ============================================================================

/// Track mode: straight sum
#[inline]
pub(crate) fn mix_track(mix: &mut [f32], layer: &[f32]) {
    for (m, &x) in mix.iter_mut().zip(layer) {
        *m += x;
    }
}

/// Layer mode: an audible layer replaces what is below it
///
/// `gain` is the layer's mute x solo gain, so a layer fading out lets the
/// layers below fade back in.
#[inline]
pub(crate) fn mix_layer(mix: &mut [f32], layer: &[f32], gain: &[f32]) {
    for ((m, &x), &g) in mix.iter_mut().zip(layer).zip(gain) {
        *m = *m * (1.0 - g) + x;
    }
}

/// Composite one layer into the running mix
#[inline]
pub(crate) fn mix_into(mode: MixMode, mix: &mut [f32], layer: &[f32], gain: &[f32]) {
    match mode {
        MixMode::Track => mix_track(mix, layer),
        MixMode::Layer => mix_layer(mix, layer, gain),
    }
}

// ============================================================================
// Bounce
// ============================================================================

/// Layer-mode bounce of the layer below into a new recording
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Bounce {
    target: Option<usize>,
    source: usize,
    progress: usize,
    complete: bool,
}

impl Bounce {
    pub(crate) fn start(&mut self, target: usize, source: usize) {
        *self = Self {
            target: Some(target),
            source,
            progress: 0,
            complete: false,
        };
    }

    pub(crate) fn cancel(&mut self) {
        self.target = None;
        self.progress = 0;
    }

    pub(crate) fn target(&self) -> Option<usize> {
        self.target
    }

    pub(crate) fn source(&self) -> Option<usize> {
        self.target.map(|_| self.source)
    }

    /// Source layer if `layer` is the one being bounced into
    #[inline]
    pub(crate) fn source_for(&self, layer: usize) -> Option<usize> {
        match self.target {
            Some(target) if target == layer => Some(self.source),
            _ => None,
        }
    }

    /// Frames still to bounce in a loop of `length`
    #[inline]
    pub(crate) fn remaining(&self, length: usize) -> usize {
        length.saturating_sub(self.progress)
    }

    /// Account for `frames` bounced; true exactly once, when it completes
    pub(crate) fn advance(&mut self, frames: usize, length: usize) -> bool {
        self.progress += frames;
        if self.progress >= length && self.target.is_some() {
            self.target = None;
            self.complete = true;
            return true;
        }
        false
    }

    pub(crate) fn progress(&self, length: usize) -> f32 {
        if self.complete {
            1.0
        } else if self.target.is_some() && length > 0 {
            (self.progress as f32 / length as f32).min(1.0)
        } else {
            0.0
        }
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.complete
    }

    /// Keep the bounce pointing at the same layers after a deletion
    pub(crate) fn layer_removed(&mut self, removed: usize) {
        match self.target {
            Some(target) if target == removed || self.source == removed => self.cancel(),
            Some(target) if target > removed => {
                self.target = Some(target - 1);
                if self.source > removed {
                    self.source -= 1;
                }
            }
            _ => {}
        }
    }
}

// ============================================================================
// Orchestrator: Gains and Bounce
// ============================================================================

impl LayerOrchestrator {
    /// Decide the solo/override gain of every layer for the coming block
    ///
    /// A layer that is writing is always heard. Otherwise a layer is
    /// silenced when some layer is soloed and it is not, or when an audible
    /// override layer sits above it.
    pub(super) fn update_solo_gains(&mut self) {
        let any_solo = self
            .tracks
            .iter()
            .any(|t| t.is_soloed() && t.has_content() && !t.is_undone());
        let top_override = self.tracks.iter().rposition(|t| {
            t.layer_type() == LayerType::Override && t.has_content() && t.is_audible()
        });

        for (k, track) in self.tracks.iter_mut().enumerate() {
            let silenced = if track.state().is_writing() {
                false
            } else {
                let solo_out = any_solo && !track.is_soloed();
                let overridden = matches!(top_override, Some(top) if k < top);
                solo_out || overridden
            };
            track.set_solo_gain(if silenced { 0.0 } else { 1.0 });
        }
    }

    /// Highest audible layer below `layer` that has content
    pub(super) fn bounce_source_below(&self, layer: usize) -> Option<usize> {
        (0..layer).rev().find(|&j| {
            let t = &self.tracks[j];
            t.has_content() && t.is_audible() && t.solo_gain_target() > 0.0
        })
    }

    /// Arm a bounce into `layer` if Layer mode calls for one
    pub(super) fn start_bounce(&mut self, layer: usize) {
        if self.global.mix_mode != MixMode::Layer || layer == 0 || self.master_len == 0 {
            self.bounce.cancel();
            return;
        }
        match self.bounce_source_below(layer) {
            Some(source) => {
                debug!("Bouncing layer {} into layer {}", source + 1, layer + 1);
                self.bounce.start(layer, source);
            }
            None => self.bounce.cancel(),
        }
    }

    /// Drop the bounce if its target stopped writing
    pub(super) fn check_bounce(&mut self) {
        if let Some(target) = self.bounce.target() {
            if !self.tracks[target].state().is_writing() {
                self.bounce.cancel();
            }
        }
    }

    pub(super) fn finish_bounce(&mut self, layer: usize) {
        if let Some(layer) = LayerIndex::new(layer) {
            self.link.emit(EngineEvent::BounceComplete { layer });
        }
    }

    /// Number of layers currently contributing to the mix
    pub fn audible_layers(&self) -> usize {
        (0..MAX_LAYERS)
            .filter(|&k| {
                let t = &self.tracks[k];
                t.has_content() && t.is_audible() && t.solo_gain_target() > 0.0
            })
            .count()
    }
}

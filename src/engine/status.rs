//! Published engine status
//!
//! The audio thread stores a snapshot at the end of every block; the UI
//! thread reads whatever was last published. All fields are independent
//! relaxed atomics, so a reader can observe values from two adjacent blocks.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, AtomicUsize, Ordering};

use super::params::AtomicF32;
use super::transport::{EngineState, LayerIndex, LayerType, MixMode, TrackState, MAX_LAYERS};

/// Per-layer status slots
#[derive(Debug, Default)]
pub struct LayerStatus {
    state: AtomicU8,
    length: AtomicUsize,
    position: AtomicUsize,
    has_content: AtomicBool,
    undone: AtomicBool,
    is_override: AtomicBool,
    peak: AtomicF32,
    clipped: AtomicU64,
}

impl LayerStatus {
    pub fn state(&self) -> TrackState {
        TrackState::from_u8(self.state.load(Ordering::Relaxed))
    }

    /// Loop length in samples
    pub fn length(&self) -> usize {
        self.length.load(Ordering::Relaxed)
    }

    /// Integer playhead
    pub fn position(&self) -> usize {
        self.position.load(Ordering::Relaxed)
    }

    pub fn has_content(&self) -> bool {
        self.has_content.load(Ordering::Relaxed)
    }

    /// Layer is silenced by undo
    pub fn is_undone(&self) -> bool {
        self.undone.load(Ordering::Relaxed)
    }

    pub fn layer_type(&self) -> LayerType {
        if self.is_override.load(Ordering::Relaxed) {
            LayerType::Override
        } else {
            LayerType::Regular
        }
    }

    /// Output peak of the last block
    pub fn peak(&self) -> f32 {
        self.peak.load()
    }

    /// Total clipped output samples since the last reset
    pub fn clipped_samples(&self) -> u64 {
        self.clipped.load(Ordering::Relaxed)
    }
}

/// Snapshot of one layer as the audio thread sees it
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct LayerSnapshot {
    pub state: TrackState,
    pub length: usize,
    pub position: usize,
    pub has_content: bool,
    pub undone: bool,
    pub layer_type: LayerType,
    pub peak: f32,
    pub clipped: u64,
}

/// Engine-wide status published once per block
#[derive(Debug, Default)]
pub struct EngineStatus {
    state: AtomicU8,
    mix_mode: AtomicU8,
    current_layer: AtomicUsize,
    highest_layer: AtomicUsize,
    master_length: AtomicUsize,
    master_position: AtomicUsize,
    recording_progress: AtomicF32,
    bounce_progress: AtomicF32,
    additive_capture: AtomicBool,
    master_peak: AtomicF32,
    master_clipped: AtomicU64,
    blocks: AtomicU32,
    layers: [LayerStatus; MAX_LAYERS],
}

impl EngineStatus {
    /// Most active state across all layers
    pub fn state(&self) -> EngineState {
        TrackState::from_u8(self.state.load(Ordering::Relaxed))
    }

    pub fn mix_mode(&self) -> MixMode {
        MixMode::from_u8(self.mix_mode.load(Ordering::Relaxed))
    }

    /// Layer the transport commands act on
    pub fn current_layer(&self) -> LayerIndex {
        LayerIndex::new(self.current_layer.load(Ordering::Relaxed)).unwrap_or(LayerIndex::FIRST)
    }

    /// Highest layer that has ever been written since the last clear
    pub fn highest_layer(&self) -> usize {
        self.highest_layer.load(Ordering::Relaxed)
    }

    /// Length of layer 1 in samples, 0 before the first recording
    pub fn master_length(&self) -> usize {
        self.master_length.load(Ordering::Relaxed)
    }

    pub fn master_position(&self) -> usize {
        self.master_position.load(Ordering::Relaxed)
    }

    /// 0-1 progress toward the preset length of the active recording
    pub fn recording_progress(&self) -> f32 {
        self.recording_progress.load()
    }

    /// 0-1 progress of the running layer-mode bounce
    pub fn bounce_progress(&self) -> f32 {
        self.bounce_progress.load()
    }

    pub fn is_additive_capture_active(&self) -> bool {
        self.additive_capture.load(Ordering::Relaxed)
    }

    /// Master output peak of the last block
    pub fn master_peak(&self) -> f32 {
        self.master_peak.load()
    }

    pub fn master_clipped_samples(&self) -> u64 {
        self.master_clipped.load(Ordering::Relaxed)
    }

    /// Blocks processed, wrapping
    pub fn blocks_processed(&self) -> u32 {
        self.blocks.load(Ordering::Relaxed)
    }

    pub fn layer(&self, index: LayerIndex) -> &LayerStatus {
        &self.layers[index.get()]
    }

    pub(crate) fn publish_layer(&self, index: usize, snapshot: &LayerSnapshot) {
        if let Some(slot) = self.layers.get(index) {
            slot.state.store(snapshot.state.as_u8(), Ordering::Relaxed);
            slot.length.store(snapshot.length, Ordering::Relaxed);
            slot.position.store(snapshot.position, Ordering::Relaxed);
            slot.has_content.store(snapshot.has_content, Ordering::Relaxed);
            slot.undone.store(snapshot.undone, Ordering::Relaxed);
            slot.is_override
                .store(snapshot.layer_type == LayerType::Override, Ordering::Relaxed);
            slot.peak.store(snapshot.peak);
            slot.clipped.store(snapshot.clipped, Ordering::Relaxed);
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn publish_engine(
        &self,
        state: EngineState,
        mix_mode: MixMode,
        current_layer: usize,
        highest_layer: usize,
        master_length: usize,
        master_position: usize,
        recording_progress: f32,
        bounce_progress: f32,
        additive_capture: bool,
    ) {
        self.state.store(state.as_u8(), Ordering::Relaxed);
        self.mix_mode.store(mix_mode.as_u8(), Ordering::Relaxed);
        self.current_layer.store(current_layer, Ordering::Relaxed);
        self.highest_layer.store(highest_layer, Ordering::Relaxed);
        self.master_length.store(master_length, Ordering::Relaxed);
        self.master_position.store(master_position, Ordering::Relaxed);
        self.recording_progress.store(recording_progress);
        self.bounce_progress.store(bounce_progress);
        self.additive_capture.store(additive_capture, Ordering::Relaxed);
        self.blocks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn publish_master(&self, peak: f32, clipped: u64) {
        self.master_peak.store(peak);
        self.master_clipped.store(clipped, Ordering::Relaxed);
    }
}

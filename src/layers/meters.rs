//! Metering and read-only queries
//!
//! Layer-facing queries take a [`LayerIndex`]; the published
//! [`EngineStatus`](crate::engine::EngineStatus) carries the same values for
//! other threads.

use super::orchestrator::LayerOrchestrator;
use super::track::LoopTrack;
use crate::engine::{LayerIndex, TrackState};

impl LayerOrchestrator {
    /// Copy the engine's state into the shared status
    pub(super) fn publish_status(&self) {
        for (k, track) in self.tracks.iter().enumerate() {
            self.status.publish_layer(k, &track.snapshot());
        }
        self.status.publish_engine(
            self.engine_state(),
            self.global.mix_mode,
            self.current,
            self.highest,
            self.master_len,
            self.master_index_now(),
            self.recording_progress(),
            self.bounce_progress(),
            self.capture.is_active(),
        );
        self.status.publish_master(self.master_peak, self.master_clipped);
    }

    /// Undo cursor
    pub fn current_layer(&self) -> LayerIndex {
        LayerIndex::new(self.current).unwrap_or(LayerIndex::FIRST)
    }

    /// Highest layer written since the last reset
    pub fn highest_layer(&self) -> LayerIndex {
        LayerIndex::new(self.highest).unwrap_or(LayerIndex::FIRST)
    }

    pub fn layer(&self, index: LayerIndex) -> &LoopTrack {
        &self.tracks[index.get()]
    }

    /// Length of the master loop in samples, 0 before the first recording
    pub fn master_length(&self) -> usize {
        self.master_len
    }

    /// Master playhead within the active region, 0-1
    pub fn master_position(&self) -> f32 {
        let (start, end) = self.master_region();
        if end <= start {
            return 0.0;
        }
        (((self.master_position - start as f64) / (end - start) as f64) as f32).clamp(0.0, 1.0)
    }

    /// One layer's playhead within its region, 0-1
    pub fn layer_position(&self, index: LayerIndex) -> f32 {
        self.tracks[index.get()].normalized_position()
    }

    /// Fill `points` with peak values across one layer's loop
    pub fn waveform(&self, index: LayerIndex, points: &mut [f32]) {
        self.tracks[index.get()].waveform(points);
    }

    /// Progress of the running recording toward its target, 0-1
    pub fn recording_progress(&self) -> f32 {
        self.tracks
            .iter()
            .find(|t| t.state() == TrackState::Recording)
            .map(LoopTrack::recording_progress)
            .unwrap_or(0.0)
    }

    /// Progress of the running bounce, 0-1
    pub fn bounce_progress(&self) -> f32 {
        self.bounce.progress(self.master_len)
    }

    /// Whether the last bounce copied a whole loop
    pub fn is_bounce_complete(&self) -> bool {
        self.bounce.is_complete()
    }

    /// Layer being bounced from, while a bounce runs
    pub fn bounce_source(&self) -> Option<LayerIndex> {
        self.bounce.source().and_then(LayerIndex::new)
    }

    /// Peak of the last output block
    pub fn master_peak(&self) -> f32 {
        self.master_peak
    }

    /// Output samples at or above full scale before the final soft clip
    pub fn master_clipped_samples(&self) -> u64 {
        self.master_clipped
    }

    pub fn layer_peak(&self, index: LayerIndex) -> f32 {
        self.tracks[index.get()].peak()
    }

    pub fn layer_clipped_samples(&self, index: LayerIndex) -> u64 {
        self.tracks[index.get()].clipped_samples()
    }

    pub fn reset_master_clip_counter(&mut self) {
        self.master_clipped = 0;
    }
}

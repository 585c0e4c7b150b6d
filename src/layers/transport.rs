//! Performer transport
//!
//! `record`, `play`, `stop`, `overdub`, `undo` and `redo` on the layer
//! arena. The engine state is the most active state across all layers, and
//! `record()` cycles through it:
//!
//! | Engine state | `record()` |
//! |---|---|
//! | Idle | fresh recording on layer 1, or a phase-locked recording on the first empty layer |
//! | Recording | close the recording, then overdub a new layer |
//! | Playing | overdub a new layer (or the current one if it is empty) |
//! | Overdubbing | stop the overdub, then overdub a new layer if one is free |
//!
//! Any write first commits (clears) the layers that undo silenced above
//! the cursor, so redo is unavailable after it.

use log::debug;

use super::orchestrator::LayerOrchestrator;
use crate::engine::{EngineEvent, EngineState, LayerIndex, TrackState, MAX_LAYERS};

impl LayerOrchestrator {
    // ========================================================================
    // Queries
    // ========================================================================

    /// Most active state across all layers
    pub fn engine_state(&self) -> EngineState {
        self.tracks
            .iter()
            .fold(TrackState::Idle, |acc, t| acc.most_active(t.state()))
    }

    pub(super) fn has_any_content(&self) -> bool {
        self.tracks.iter().any(|t| t.has_content())
    }

    pub(super) fn first_empty_slot(&self) -> Option<usize> {
        self.tracks
            .iter()
            .position(|t| !t.has_content() && t.state() == TrackState::Idle)
    }

    /// Highest layer holding content or being written, if any
    pub(super) fn top_occupied(&self) -> Option<usize> {
        self.tracks
            .iter()
            .rposition(|t| t.has_content() || t.state().is_writing())
    }

    /// Integer master index the next write should land on
    pub(super) fn master_index_now(&self) -> usize {
        if self.master_len == 0 {
            return 0;
        }
        (self.master_position.max(0.0) as usize).min(self.master_len - 1)
    }

    pub(super) fn emit_for(&mut self, layer: usize, event: impl FnOnce(LayerIndex) -> EngineEvent) {
        if let Some(index) = LayerIndex::new(layer) {
            self.link.emit(event(index));
        }
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Advance the record cycle
    ///
    /// With ADD+ enabled and content present this triggers the additive
    /// capture instead.
    pub fn record(&mut self) {
        if self.global.additive_mode && self.has_any_content() {
            self.trigger_additive_capture();
            return;
        }
        self.commit_undone();

        match self.engine_state() {
            TrackState::Idle => self.record_from_idle(),
            TrackState::Recording => {
                self.finish_recordings();
                self.new_overdub_layer();
            }
            TrackState::Playing => {
                if self.tracks[self.current].has_content() {
                    self.new_overdub_layer();
                } else {
                    self.overdub_current();
                }
            }
            TrackState::Overdubbing => {
                self.stop_overdubs();
                self.new_overdub_layer();
            }
        }
    }

    /// Leave every write and keep looping; starts playback from Idle
    pub fn play(&mut self) {
        match self.engine_state() {
            TrackState::Recording => {
                self.finish_recordings();
                self.stop_overdubs();
            }
            TrackState::Overdubbing => self.stop_overdubs(),
            TrackState::Playing => {}
            TrackState::Idle => {
                if self.has_any_content() {
                    self.start_playback();
                    self.link.emit(EngineEvent::PlaybackStarted);
                }
            }
        }
    }

    /// Finalize writes and park every layer at the loop start
    pub fn stop(&mut self) {
        self.finish_recordings();
        self.stop_overdubs();
        for track in self.tracks.iter_mut() {
            track.stop();
        }
        self.master_position = self.master_start_position();
        self.stop_additive_capture();
        self.bounce.cancel();
        self.anti_click.reset();
        self.link.emit(EngineEvent::Stopped);
    }

    /// Toggle overdubbing on the current layer
    pub fn overdub(&mut self) {
        match self.engine_state() {
            TrackState::Recording => {
                let Some(k) = self
                    .tracks
                    .iter()
                    .position(|t| t.state() == TrackState::Recording)
                else {
                    return;
                };
                if let Some(length) = self.tracks[k].stop_recording(true) {
                    self.on_recording_complete(k, length);
                    self.emit_for(k, |layer| EngineEvent::OverdubStarted { layer });
                }
            }
            TrackState::Overdubbing => self.stop_overdubs(),
            TrackState::Playing => {
                self.commit_undone();
                self.overdub_current();
            }
            TrackState::Idle => {
                self.commit_undone();
                if self.has_any_content() {
                    self.start_playback();
                    self.overdub_current();
                }
            }
        }
    }

    /// Silence the current layer and step the cursor down
    pub fn undo(&mut self) {
        self.finish_recordings();
        self.stop_overdubs();
        let k = self.current;
        if !self.tracks[k].has_content() || self.tracks[k].is_undone() {
            return;
        }
        self.tracks[k].set_undone(true);
        if k > 0 {
            self.current = k - 1;
        }
        debug!("Undo layer {}", k + 1);
        self.emit_for(k, |layer| EngineEvent::Undo { layer });
    }

    /// Bring back the most recently undone layer
    pub fn redo(&mut self) {
        let k = self.current;
        let target = if self.tracks[k].is_undone() {
            Some(k)
        } else if k < self.highest && self.tracks[k + 1].is_undone() {
            Some(k + 1)
        } else {
            None
        };
        let Some(target) = target else {
            return;
        };
        self.tracks[target].set_undone(false);
        self.current = target;
        debug!("Redo layer {}", target + 1);
        self.emit_for(target, |layer| EngineEvent::Redo { layer });
    }

    // ========================================================================
    // Building Blocks
    // ========================================================================

    fn record_from_idle(&mut self) {
        if !self.has_any_content() {
            self.master_len = 0;
            self.master_position = 0.0;
            self.current = 0;
            self.highest = 0;
            let target = self.recording_target();
            self.tracks[0].start_recording(target, None);
            self.tracks[0].inherit_rate(self.master_speed.current(), self.global.speed);
            self.anti_click.reset();
            self.emit_for(0, |layer| EngineEvent::RecordingStarted {
                layer,
                target_length: target,
            });
            return;
        }

        let Some(slot) = self.first_empty_slot() else {
            self.link.emit(EngineEvent::CapacityReached);
            return;
        };
        self.start_playback();
        let start = self.master_index_now();
        self.tracks[slot].start_recording(self.master_len, Some(start));
        self.tracks[slot].inherit_rate(self.master_speed.current(), self.global.speed);
        self.current = slot;
        self.highest = self.highest.max(slot);
        self.start_bounce(slot);
        let target = self.master_len;
        self.emit_for(slot, |layer| EngineEvent::RecordingStarted {
            layer,
            target_length: target,
        });
    }

    /// Preset length in samples at the current tempo, 0 for free length
    pub(super) fn recording_target(&self) -> usize {
        let mut settings = self.global;
        settings.host_bpm = self.tempo_bpm;
        settings.target_length_samples(self.sample_rate)
    }

    /// Close every running recording
    pub(super) fn finish_recordings(&mut self) {
        for k in 0..MAX_LAYERS {
            if self.tracks[k].state() != TrackState::Recording {
                continue;
            }
            match self.tracks[k].stop_recording(false) {
                Some(length) => {
                    self.on_recording_complete(k, length);
                }
                None => self.refresh_highest(),
            }
        }
    }

    /// Bookkeeping after a recording closed with `length` frames
    ///
    /// Returns true if this recording defined the master loop.
    pub(super) fn on_recording_complete(&mut self, layer: usize, length: usize) -> bool {
        self.emit_for(layer, |layer| EngineEvent::RecordingStopped { layer, length });
        if self.master_len == 0 {
            self.master_len = length;
            self.master_position = self.tracks[layer].play_head();
            self.anti_click.rebase();
            return true;
        }
        false
    }

    pub(super) fn stop_overdubs(&mut self) {
        for k in 0..MAX_LAYERS {
            if self.tracks[k].state() == TrackState::Overdubbing {
                self.tracks[k].stop_overdub();
                self.emit_for(k, |layer| EngineEvent::OverdubStopped { layer });
            }
        }
    }

    /// Start every idle layer with content, from the master region start
    pub(super) fn start_playback(&mut self) {
        self.master_position = self.master_start_position();
        let (current, target) = (self.master_speed.current(), self.global.speed);
        for track in self.tracks.iter_mut() {
            if track.has_content() && track.state() == TrackState::Idle {
                track.play_from(self.master_position);
                track.inherit_rate(current, target);
            }
        }
        self.anti_click.rebase();
    }

    /// Overdub a fresh layer above the current one
    ///
    /// Degrades to plain playback when every layer is taken.
    fn new_overdub_layer(&mut self) {
        if self.master_len == 0 {
            return;
        }
        let Some(slot) = self.first_empty_slot() else {
            self.link.emit(EngineEvent::CapacityReached);
            return;
        };
        self.begin_empty_overdub(slot);
    }

    /// Overdub the current layer, turning it into a silent loop if empty
    fn overdub_current(&mut self) {
        if self.master_len == 0 {
            return;
        }
        let k = self.current;
        if self.tracks[k].has_content() {
            self.tracks[k].start_overdub();
            self.emit_for(k, |layer| EngineEvent::OverdubStarted { layer });
        } else {
            self.begin_empty_overdub(k);
        }
    }

    fn begin_empty_overdub(&mut self, slot: usize) {
        self.tracks[slot].start_overdub_empty(self.master_len, self.master_position);
        self.tracks[slot].inherit_rate(self.master_speed.current(), self.global.speed);
        self.current = slot;
        self.highest = self.highest.max(slot);
        self.start_bounce(slot);
        self.emit_for(slot, |layer| EngineEvent::OverdubStarted { layer });
    }

    /// Discard undone layers at and above the cursor
    pub(super) fn commit_undone(&mut self) {
        let mut first = None;
        for k in self.current..MAX_LAYERS {
            if self.tracks[k].is_undone() {
                self.tracks[k].clear();
                self.capture.layer_cleared(k);
                first.get_or_insert(k);
            }
        }
        if let Some(first) = first {
            self.refresh_highest();
            self.emit_for(first, |first| EngineEvent::UndoneLayersCommitted { first });
        }
    }

    /// Recompute the watermark; forget the master loop once nothing is left
    pub(super) fn refresh_highest(&mut self) {
        match self.top_occupied() {
            Some(top) => {
                self.current = self.current.min(top);
                self.highest = top;
            }
            None => {
                self.current = 0;
                self.highest = 0;
                self.master_len = 0;
                self.master_position = 0.0;
                self.bounce.cancel();
                self.stop_additive_capture();
                self.anti_click.reset();
            }
        }
    }
}

//! Layer management
//!
//! Whole-engine and per-layer structural operations: clear, clear/delete a
//! single layer, jump the undo cursor, and flatten every audible layer into
//! layer 1.

use log::debug;

use super::mixing::mix_into;
use super::orchestrator::LayerOrchestrator;
use super::track::pan_gains;
use crate::dsp::math::{sanitize, soft_clip_slice};
use crate::engine::{EngineEvent, LayerIndex, LayerSettings, LayerType, TrackState, MAX_LAYERS};

impl LayerOrchestrator {
    /// Erase every layer
    ///
    /// From Idle this is a full reset. While the loop runs the groove is
    /// kept: the master length survives and layer 1 starts overdubbing a
    /// silent loop at the current position. Per-layer controls are kept.
    pub fn clear(&mut self) {
        let keep_groove = self.engine_state() != TrackState::Idle && self.master_len > 0;
        for track in self.tracks.iter_mut() {
            track.clear();
        }
        self.bounce.cancel();
        self.stop_additive_capture();
        self.current = 0;
        self.highest = 0;

        if keep_groove {
            self.tracks[0].start_overdub_empty(self.master_len, self.master_position);
            self.tracks[0].inherit_rate(self.master_speed.current(), self.global.speed);
        } else {
            self.master_len = 0;
            self.master_position = 0.0;
            self.anti_click.reset();
        }
        self.link.emit(EngineEvent::Cleared {
            kept_groove: keep_groove,
        });
    }

    /// Erase one layer's audio, keeping its slot and controls
    pub fn clear_layer(&mut self, index: LayerIndex) {
        let k = index.get();
        self.tracks[k].clear();
        self.capture.layer_cleared(k);
        if self.bounce.target() == Some(k) || self.bounce.source() == Some(k) {
            self.bounce.cancel();
        }
        self.refresh_highest();
        self.link.emit(EngineEvent::LayerCleared { layer: index });
    }

    /// Remove one layer and move every layer above it down a slot
    ///
    /// Controls travel with their layer; the freed top slot gets defaults.
    pub fn delete_layer(&mut self, index: LayerIndex) {
        let k = index.get();
        self.tracks[k].clear();
        self.tracks[k..].rotate_left(1);
        self.last_layers[k..].rotate_left(1);

        let layers = self.params.layers();
        for j in k..MAX_LAYERS - 1 {
            layers[j].store(&layers[j + 1].load());
        }
        let defaults = LayerSettings::default();
        layers[MAX_LAYERS - 1].store(&defaults);
        self.last_layers[MAX_LAYERS - 1] = defaults;
        self.tracks[MAX_LAYERS - 1].apply_settings(&defaults);
        self.apply_global_broadcast(MAX_LAYERS - 1);

        self.capture.layer_removed(k);
        self.bounce.layer_removed(k);
        if self.current > k {
            self.current -= 1;
        }
        self.refresh_highest();
        self.link.emit(EngineEvent::LayerDeleted { layer: index });
    }

    /// Move the undo cursor: layers above `index` are silenced, the rest heard
    pub fn jump_to_layer(&mut self, index: LayerIndex) {
        let n = index.get();
        if n > self.highest {
            return;
        }
        for k in 0..=self.highest {
            self.tracks[k].set_undone(k > n);
        }
        self.current = n;
        self.link.emit(EngineEvent::JumpedToLayer { layer: index });
    }

    /// Merge every audible layer into layer 1
    ///
    /// Each layer is rendered over one master loop with its EQ, pitch,
    /// volume, pan and fade applied, mixed with the current mix rule,
    /// soft-clipped, and written into layer 1 at the current playhead with
    /// the transport state preserved. Every layer's controls are then reset
    /// to defaults.
    pub fn flatten(&mut self) {
        if self.master_len == 0 {
            return;
        }
        let prior = self.engine_state();
        self.finish_recordings();
        self.stop_overdubs();
        self.update_solo_gains();

        let len = self.master_len;
        let mode = self.global.mix_mode;
        self.mixdown.clear_prefix(len);
        let mut merged = 0;

        for k in 0..MAX_LAYERS {
            let track = &self.tracks[k];
            if !track.has_content() || !track.is_audible() || track.solo_gain_target() == 0.0 {
                continue;
            }
            merged += 1;

            let (low, mid, high) = track.eq_gains();
            self.flatten_eq.set_gains(low, mid, high);
            self.flatten_eq.reset();
            let (semitones, high_quality) = track.pitch();
            self.flatten_pitch.set_semitones(semitones);
            self.flatten_pitch.set_high_quality(high_quality);
            self.flatten_pitch.reset();
            let latency = if self.flatten_pitch.is_active() {
                self.flatten_pitch.latency_samples()
            } else {
                0
            };

            let (pan_l, pan_r) = pan_gains(track.pan());
            let level = track.volume() * track.fade_level();
            let total = len + latency;
            let mut rendered = 0;
            while rendered < total {
                let n = self.max_block.min(total - rendered);
                let (sl, sr) = self.render.slices_mut(n);
                for i in 0..n {
                    let (l, r) = track.content_frame(rendered + i);
                    sl[i] = l;
                    sr[i] = r;
                }
                self.flatten_eq.process(sl, sr);
                if latency > 0 {
                    self.flatten_pitch.process(sl, sr);
                }
                for i in 0..n {
                    sl[i] = sanitize(sl[i] * level * pan_l);
                    sr[i] = sanitize(sr[i] * level * pan_r);
                }

                // Drop the pitch shifter's start-up latency
                let skip = latency.saturating_sub(rendered).min(n);
                let count = n - skip;
                if count > 0 {
                    let dest = rendered + skip - latency;
                    let (ml, mr) = self.mixdown.slices_mut(len);
                    let ones = &self.unity_gain[..count];
                    mix_into(mode, &mut ml[dest..dest + count], &sl[skip..], ones);
                    mix_into(mode, &mut mr[dest..dest + count], &sr[skip..], ones);
                }
                rendered += n;
            }
        }

        {
            let (ml, mr) = self.mixdown.slices_mut(len);
            soft_clip_slice(ml);
            soft_clip_slice(mr);
        }

        for track in self.tracks.iter_mut() {
            track.clear();
        }
        let resume = if prior == TrackState::Idle {
            TrackState::Idle
        } else {
            TrackState::Playing
        };
        self.tracks[0].load_content(
            &self.mixdown,
            len,
            LayerType::Regular,
            self.master_position,
            resume,
        );
        if prior == TrackState::Overdubbing {
            self.tracks[0].start_overdub();
        }

        self.params.reset_layers();
        let defaults = LayerSettings::default();
        for k in 0..MAX_LAYERS {
            self.last_layers[k] = defaults;
            self.tracks[k].apply_settings(&defaults);
            self.apply_global_broadcast(k);
        }
        self.tracks[0].inherit_rate(self.master_speed.current(), self.global.speed);
        self.stop_additive_capture();
        self.bounce.cancel();
        self.current = 0;
        self.highest = 0;

        debug!("Flattened {} layers", merged);
        self.link.emit(EngineEvent::Flattened { layers: merged });
    }
}

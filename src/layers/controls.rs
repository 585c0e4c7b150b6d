//! Controls
//!
//! Every control lives in [`SharedParameters`](crate::engine::SharedParameters).
//! The setters here store into that shared store and apply it at once, so a
//! value set from the control thread and a value set directly on the engine
//! follow the same path. At the top of each block the store is compared
//! field by field with what was last applied; only the fields that changed
//! reach the layers. Loop region, speed and direction are engine-wide and
//! are broadcast to every layer when they change.

use log::debug;

use super::orchestrator::LayerOrchestrator;
use crate::config::AntiClickSettings;
use crate::engine::params::BPM_RANGE;
use crate::engine::{
    GlobalSettings, LayerIndex, LayerSettings, MixMode, ParameterSnapshot, MAX_LAYERS,
};
use crate::error::Result;

impl LayerOrchestrator {
    // ========================================================================
    // Parameter Sync
    // ========================================================================

    /// Read the host tempo for preset-length recordings
    pub(super) fn sync_host(&mut self) {
        let (bpm, playing) = match self.host.as_ref() {
            Some(host) => (host.bpm(), host.is_playing()),
            None => (None, false),
        };
        self.host_playing = playing;
        self.tempo_bpm = match bpm {
            Some(bpm) if bpm.is_finite() => (bpm as f32).clamp(BPM_RANGE.0, BPM_RANGE.1),
            _ => self.global.host_bpm,
        };
    }

    /// Apply whatever changed in the shared parameters since the last sync
    pub(super) fn sync_parameters(&mut self) {
        let next = self.params.global.load().clamped();
        if next != self.global {
            self.apply_global_changes(next);
        }
        for k in 0..MAX_LAYERS {
            let next = self.params.layers()[k].load().clamped();
            if next != self.last_layers[k] {
                self.apply_layer_changes(k, next);
            }
        }
    }

    fn apply_global_changes(&mut self, next: GlobalSettings) {
        let prev = self.global;
        self.global = next;

        if (next.loop_start, next.loop_end) != (prev.loop_start, prev.loop_end) {
            for track in self.tracks.iter_mut() {
                track.set_loop_region(next.loop_start, next.loop_end);
            }
            self.wrap_master_position();
        }
        if next.speed != prev.speed {
            for track in self.tracks.iter_mut() {
                track.set_rate(next.speed);
            }
            self.master_speed.set_target(next.speed);
        }
        if next.reverse != prev.reverse {
            for track in self.tracks.iter_mut() {
                track.set_reverse(next.reverse);
            }
            self.anti_click.rebase();
        }
        if next.anti_click != prev.anti_click {
            self.anti_click.set_settings(&next.anti_click);
        }
        if next.mix_mode != prev.mix_mode {
            if next.mix_mode == MixMode::Track {
                self.bounce.cancel();
            }
            debug!("Mix mode {:?}", next.mix_mode);
        }
        if prev.additive_mode && !next.additive_mode {
            self.stop_additive_capture();
        }
        if next.host_bpm != prev.host_bpm {
            self.sync_host();
        }
    }

    fn apply_layer_changes(&mut self, k: usize, next: LayerSettings) {
        let prev = self.last_layers[k];
        self.last_layers[k] = next;
        let track = &mut self.tracks[k];

        if next.mute != prev.mute {
            track.set_mute(next.mute);
        }
        if next.solo != prev.solo {
            track.set_solo(next.solo);
        }
        if next.volume != prev.volume {
            track.set_volume(next.volume);
        }
        if next.pan != prev.pan {
            track.set_pan(next.pan);
        }
        if (next.eq_low_db, next.eq_mid_db, next.eq_high_db)
            != (prev.eq_low_db, prev.eq_mid_db, prev.eq_high_db)
        {
            track.set_eq(next.eq_low_db, next.eq_mid_db, next.eq_high_db);
        }
        if (next.pitch_semitones, next.pitch_high_quality)
            != (prev.pitch_semitones, prev.pitch_high_quality)
        {
            track.set_pitch(next.pitch_semitones, next.pitch_high_quality);
        }
        if (next.loop_start, next.loop_end) != (prev.loop_start, prev.loop_end) {
            track.set_loop_region(next.loop_start, next.loop_end);
        }
        if next.reverse != prev.reverse {
            track.set_reverse(next.reverse);
        }
        if next.fade != prev.fade {
            track.set_fade(next.fade);
        }
    }

    // ========================================================================
    // Setters
    // ========================================================================

    /// Read-modify-write one layer's controls
    pub fn update_layer(&mut self, index: LayerIndex, update: impl FnOnce(&mut LayerSettings)) {
        let layer = self.params.layer(index);
        let mut settings = layer.load();
        update(&mut settings);
        layer.store(&settings);
        self.sync_parameters();
    }

    /// Read-modify-write the engine-wide controls
    pub fn update_global(&mut self, update: impl FnOnce(&mut GlobalSettings)) {
        let mut settings = self.params.global.load();
        update(&mut settings);
        self.params.global.store(&settings);
        self.sync_parameters();
    }

    pub fn set_layer_mute(&mut self, index: LayerIndex, mute: bool) {
        self.update_layer(index, |s| s.mute = mute);
    }

    pub fn set_layer_solo(&mut self, index: LayerIndex, solo: bool) {
        self.update_layer(index, |s| s.solo = solo);
    }

    /// Linear gain, 0-2
    pub fn set_layer_volume(&mut self, index: LayerIndex, volume: f32) {
        self.update_layer(index, |s| s.volume = volume);
    }

    /// -1 (left) to 1 (right)
    pub fn set_layer_pan(&mut self, index: LayerIndex, pan: f32) {
        self.update_layer(index, |s| s.pan = pan);
    }

    /// Band gains in dB, ±12
    pub fn set_layer_eq(&mut self, index: LayerIndex, low_db: f32, mid_db: f32, high_db: f32) {
        self.update_layer(index, |s| {
            s.eq_low_db = low_db;
            s.eq_mid_db = mid_db;
            s.eq_high_db = high_db;
        });
    }

    pub fn set_layer_pitch(&mut self, index: LayerIndex, semitones: f32, high_quality: bool) {
        self.update_layer(index, |s| {
            s.pitch_semitones = semitones;
            s.pitch_high_quality = high_quality;
        });
    }

    /// Normalized region of one layer; overwritten by the next global change
    pub fn set_layer_loop_region(&mut self, index: LayerIndex, start: f32, end: f32) {
        self.update_layer(index, |s| {
            s.loop_start = start;
            s.loop_end = end;
        });
    }

    pub fn set_layer_reverse(&mut self, index: LayerIndex, reverse: bool) {
        self.update_layer(index, |s| s.reverse = reverse);
    }

    /// Per-pass amplitude factor, 0-1
    pub fn set_layer_fade(&mut self, index: LayerIndex, fade: f32) {
        self.update_layer(index, |s| s.fade = fade);
    }

    /// Engine-wide normalized loop region
    pub fn set_loop_region(&mut self, start: f32, end: f32) {
        self.update_global(|g| {
            g.loop_start = start;
            g.loop_end = end;
        });
    }

    /// Engine-wide playback speed, 0.25-4
    pub fn set_speed(&mut self, speed: f32) {
        self.update_global(|g| g.speed = speed);
    }

    pub fn set_reverse(&mut self, reverse: bool) {
        self.update_global(|g| g.reverse = reverse);
    }

    /// Preset length for the next first recording; 0 and 0 means free length
    pub fn set_loop_length_bars(&mut self, bars: u32, beats: u32) {
        self.update_global(|g| {
            g.preset_bars = bars;
            g.preset_beats = beats;
        });
    }

    /// Tempo used when no host reports one
    pub fn set_host_bpm(&mut self, bpm: f32) {
        self.update_global(|g| g.host_bpm = bpm);
    }

    pub fn set_mix_mode(&mut self, mode: MixMode) {
        self.update_global(|g| g.mix_mode = mode);
    }

    /// Turning ADD+ off stops a running capture
    pub fn set_additive_mode(&mut self, enabled: bool) {
        self.update_global(|g| g.additive_mode = enabled);
    }

    pub fn set_anti_click(&mut self, settings: AntiClickSettings) {
        self.update_global(|g| g.anti_click = settings);
    }

    /// Controls as last applied
    pub fn global_settings(&self) -> GlobalSettings {
        self.global
    }

    pub fn layer_settings(&self, index: LayerIndex) -> LayerSettings {
        self.last_layers[index.get()]
    }

    /// Tempo currently used for preset lengths
    pub fn tempo_bpm(&self) -> f32 {
        self.tempo_bpm
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    pub fn snapshot_parameters(&self) -> ParameterSnapshot {
        ParameterSnapshot::capture(&self.params)
    }

    pub fn apply_parameters(&mut self, snapshot: &ParameterSnapshot) {
        snapshot.apply(&self.params);
        self.sync_parameters();
    }

    /// Serialize every control into a versioned blob
    pub fn save_parameters(&self) -> Result<Vec<u8>> {
        self.snapshot_parameters().to_blob()
    }

    /// Restore controls from a blob written by [`Self::save_parameters`]
    pub fn load_parameters(&mut self, blob: &[u8]) -> Result<()> {
        let snapshot = ParameterSnapshot::from_blob(blob)?;
        self.apply_parameters(&snapshot);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn engine() -> LayerOrchestrator {
        let config = EngineConfig {
            max_loop_seconds: 1.0,
            ..EngineConfig::default()
        };
        LayerOrchestrator::new(config).unwrap()
    }

    #[test]
    fn test_setters_reach_shared_store() {
        let mut engine = engine();
        let layer = LayerIndex::from_display(3).unwrap();
        engine.set_layer_volume(layer, 0.5);
        engine.set_speed(2.0);
        assert_eq!(engine.params().layer(layer).load().volume, 0.5);
        assert_eq!(engine.layer_settings(layer).volume, 0.5);
        assert_eq!(engine.global_settings().speed, 2.0);
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let mut engine = engine();
        engine.set_speed(10.0);
        assert_eq!(engine.global_settings().speed, 4.0);
        engine.set_layer_pan(LayerIndex::FIRST, f32::NAN);
        assert_eq!(engine.layer_settings(LayerIndex::FIRST).pan, 0.0);
    }

    #[test]
    fn test_host_tempo_overrides_control() {
        let mut engine = engine();
        engine.set_host_bpm(90.0);
        assert_eq!(engine.tempo_bpm(), 90.0);
        engine.set_host(Box::new(crate::engine::FixedTempo::new(140.0)));
        assert_eq!(engine.tempo_bpm(), 140.0);
        assert!(engine.is_host_playing());
    }

    #[test]
    fn test_parameter_blob_restores_controls() {
        let mut engine = engine();
        engine.set_layer_fade(LayerIndex::FIRST, 0.5);
        engine.set_reverse(true);
        let blob = engine.save_parameters().unwrap();

        let mut other = self::engine();
        other.load_parameters(&blob).unwrap();
        assert_eq!(other.layer_settings(LayerIndex::FIRST).fade, 0.5);
        assert!(other.global_settings().reverse);
    }
}

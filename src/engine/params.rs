//! Cross-thread parameter store
//!
//! Threading contract:
//! - Only the control thread stores into [`SharedParameters`].
//! - Only the audio thread loads from it, once at the start of each block,
//!   and turns the values into smoothing-ramp targets.
//! - Continuous values travel as atomic `f32` bit patterns, discrete flags as
//!   atomic bools/ints. No locks, no allocation on either side.
//!
//! The plain-value mirrors ([`LayerSettings`], [`GlobalSettings`]) are what
//! the engine and the persistence layer actually work with.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

use super::transport::{LayerIndex, MixMode, MAX_LAYERS};
use crate::config::AntiClickSettings;
use crate::dsp::{EQ_GAIN_RANGE_DB, PITCH_RANGE_SEMITONES};

/// Playback speed range
pub const SPEED_RANGE: (f32, f32) = (0.25, 4.0);

/// Per-layer volume range (linear gain)
pub const VOLUME_RANGE: (f32, f32) = (0.0, 2.0);

/// Host tempo range in BPM
pub const BPM_RANGE: (f32, f32) = (20.0, 300.0);

/// Largest preset length in bars
pub const MAX_PRESET_BARS: u32 = 64;

/// Beats per bar assumed by the preset length
pub const BEATS_PER_BAR: u32 = 4;

#[inline]
fn finite_clamp(value: f32, range: (f32, f32), fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(range.0, range.1)
    } else {
        fallback
    }
}

// ============================================================================
// Atomic f32
// ============================================================================

/// `f32` stored as its bit pattern in an `AtomicU32`
#[derive(Debug, Default)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    #[inline]
    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

// ============================================================================
// Layer Settings
// ============================================================================

/// Plain-value per-layer controls
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerSettings {
    pub mute: bool,
    pub solo: bool,
    /// Linear gain, 0-2
    pub volume: f32,
    /// -1 (left) to 1 (right)
    pub pan: f32,
    pub eq_low_db: f32,
    pub eq_mid_db: f32,
    pub eq_high_db: f32,
    pub pitch_semitones: f32,
    pub pitch_high_quality: bool,
    /// Normalized loop start, 0-1
    pub loop_start: f32,
    /// Normalized loop end, 0-1
    pub loop_end: f32,
    pub reverse: bool,
    /// Per-pass amplitude factor; 1 sustains forever
    pub fade: f32,
}

impl Default for LayerSettings {
    fn default() -> Self {
        Self {
            mute: false,
            solo: false,
            volume: 1.0,
            pan: 0.0,
            eq_low_db: 0.0,
            eq_mid_db: 0.0,
            eq_high_db: 0.0,
            pitch_semitones: 0.0,
            pitch_high_quality: false,
            loop_start: 0.0,
            loop_end: 1.0,
            reverse: false,
            fade: 1.0,
        }
    }
}

impl LayerSettings {
    /// Copy with every continuous value forced into range
    pub fn clamped(&self) -> Self {
        let d = Self::default();
        Self {
            volume: finite_clamp(self.volume, VOLUME_RANGE, d.volume),
            pan: finite_clamp(self.pan, (-1.0, 1.0), d.pan),
            eq_low_db: finite_clamp(self.eq_low_db, EQ_GAIN_RANGE_DB, 0.0),
            eq_mid_db: finite_clamp(self.eq_mid_db, EQ_GAIN_RANGE_DB, 0.0),
            eq_high_db: finite_clamp(self.eq_high_db, EQ_GAIN_RANGE_DB, 0.0),
            pitch_semitones: finite_clamp(self.pitch_semitones, PITCH_RANGE_SEMITONES, 0.0),
            loop_start: finite_clamp(self.loop_start, (0.0, 1.0), d.loop_start),
            loop_end: finite_clamp(self.loop_end, (0.0, 1.0), d.loop_end),
            fade: finite_clamp(self.fade, (0.0, 1.0), d.fade),
            ..*self
        }
    }
}

/// Atomic mirror of [`LayerSettings`]
#[derive(Debug)]
pub struct LayerParameters {
    pub mute: AtomicBool,
    pub solo: AtomicBool,
    pub volume: AtomicF32,
    pub pan: AtomicF32,
    pub eq_low_db: AtomicF32,
    pub eq_mid_db: AtomicF32,
    pub eq_high_db: AtomicF32,
    pub pitch_semitones: AtomicF32,
    pub pitch_high_quality: AtomicBool,
    pub loop_start: AtomicF32,
    pub loop_end: AtomicF32,
    pub reverse: AtomicBool,
    pub fade: AtomicF32,
}

impl LayerParameters {
    pub fn new(settings: &LayerSettings) -> Self {
        let s = settings.clamped();
        Self {
            mute: AtomicBool::new(s.mute),
            solo: AtomicBool::new(s.solo),
            volume: AtomicF32::new(s.volume),
            pan: AtomicF32::new(s.pan),
            eq_low_db: AtomicF32::new(s.eq_low_db),
            eq_mid_db: AtomicF32::new(s.eq_mid_db),
            eq_high_db: AtomicF32::new(s.eq_high_db),
            pitch_semitones: AtomicF32::new(s.pitch_semitones),
            pitch_high_quality: AtomicBool::new(s.pitch_high_quality),
            loop_start: AtomicF32::new(s.loop_start),
            loop_end: AtomicF32::new(s.loop_end),
            reverse: AtomicBool::new(s.reverse),
            fade: AtomicF32::new(s.fade),
        }
    }

    /// Snapshot the current values
    pub fn load(&self) -> LayerSettings {
        LayerSettings {
            mute: self.mute.load(Ordering::Relaxed),
            solo: self.solo.load(Ordering::Relaxed),
            volume: self.volume.load(),
            pan: self.pan.load(),
            eq_low_db: self.eq_low_db.load(),
            eq_mid_db: self.eq_mid_db.load(),
            eq_high_db: self.eq_high_db.load(),
            pitch_semitones: self.pitch_semitones.load(),
            pitch_high_quality: self.pitch_high_quality.load(Ordering::Relaxed),
            loop_start: self.loop_start.load(),
            loop_end: self.loop_end.load(),
            reverse: self.reverse.load(Ordering::Relaxed),
            fade: self.fade.load(),
        }
    }

    /// Store a full set of values (clamped)
    pub fn store(&self, settings: &LayerSettings) {
        let s = settings.clamped();
        self.mute.store(s.mute, Ordering::Relaxed);
        self.solo.store(s.solo, Ordering::Relaxed);
        self.volume.store(s.volume);
        self.pan.store(s.pan);
        self.eq_low_db.store(s.eq_low_db);
        self.eq_mid_db.store(s.eq_mid_db);
        self.eq_high_db.store(s.eq_high_db);
        self.pitch_semitones.store(s.pitch_semitones);
        self.pitch_high_quality.store(s.pitch_high_quality, Ordering::Relaxed);
        self.loop_start.store(s.loop_start);
        self.loop_end.store(s.loop_end);
        self.reverse.store(s.reverse, Ordering::Relaxed);
        self.fade.store(s.fade);
    }
}

impl Default for LayerParameters {
    fn default() -> Self {
        Self::new(&LayerSettings::default())
    }
}

// ============================================================================
// Global Settings
// ============================================================================

/// Plain-value engine-wide controls
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalSettings {
    /// Normalized loop start broadcast to every layer
    pub loop_start: f32,
    /// Normalized loop end broadcast to every layer
    pub loop_end: f32,
    /// Playback speed, 0.25-4
    pub speed: f32,
    pub reverse: bool,
    /// Preset length in bars; 0 bars and 0 beats means free length
    pub preset_bars: u32,
    /// Extra beats on top of `preset_bars`
    pub preset_beats: u32,
    pub host_bpm: f32,
    pub mix_mode: MixMode,
    pub additive_mode: bool,
    pub anti_click: AntiClickSettings,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            loop_start: 0.0,
            loop_end: 1.0,
            speed: 1.0,
            reverse: false,
            preset_bars: 0,
            preset_beats: 0,
            host_bpm: 120.0,
            mix_mode: MixMode::Track,
            additive_mode: false,
            anti_click: AntiClickSettings::default(),
        }
    }
}

impl GlobalSettings {
    /// Copy with every value forced into range
    pub fn clamped(&self) -> Self {
        let d = Self::default();
        Self {
            loop_start: finite_clamp(self.loop_start, (0.0, 1.0), d.loop_start),
            loop_end: finite_clamp(self.loop_end, (0.0, 1.0), d.loop_end),
            speed: finite_clamp(self.speed, SPEED_RANGE, d.speed),
            preset_bars: self.preset_bars.min(MAX_PRESET_BARS),
            preset_beats: self.preset_beats.min(BEATS_PER_BAR * 4 - 1),
            host_bpm: finite_clamp(self.host_bpm, BPM_RANGE, d.host_bpm),
            anti_click: self.anti_click.clamped(),
            ..*self
        }
    }

    /// Recording target in samples derived from the preset and tempo
    ///
    /// Returns 0 (unlimited) when no preset length is set.
    pub fn target_length_samples(&self, sample_rate: u32) -> usize {
        let beats = self.preset_bars * BEATS_PER_BAR + self.preset_beats;
        if beats == 0 || self.host_bpm <= 0.0 {
            return 0;
        }
        let samples_per_beat = sample_rate as f64 * 60.0 / self.host_bpm as f64;
        (beats as f64 * samples_per_beat).round() as usize
    }
}

/// Atomic mirror of [`AntiClickSettings`]
#[derive(Debug)]
pub struct AntiClickParameters {
    pub pre_ms: AtomicF32,
    pub post_ms: AtomicF32,
    pub filter_cutoff_hz: AtomicF32,
    pub filter_depth: AtomicF32,
    pub duck_depth: AtomicF32,
    pub smear_amount: AtomicF32,
    pub smear_attack: AtomicF32,
    pub smear_length: AtomicF32,
}

impl AntiClickParameters {
    pub fn new(settings: &AntiClickSettings) -> Self {
        let s = settings.clamped();
        Self {
            pre_ms: AtomicF32::new(s.pre_ms),
            post_ms: AtomicF32::new(s.post_ms),
            filter_cutoff_hz: AtomicF32::new(s.filter_cutoff_hz),
            filter_depth: AtomicF32::new(s.filter_depth),
            duck_depth: AtomicF32::new(s.duck_depth),
            smear_amount: AtomicF32::new(s.smear_amount),
            smear_attack: AtomicF32::new(s.smear_attack),
            smear_length: AtomicF32::new(s.smear_length),
        }
    }

    pub fn load(&self) -> AntiClickSettings {
        AntiClickSettings {
            pre_ms: self.pre_ms.load(),
            post_ms: self.post_ms.load(),
            filter_cutoff_hz: self.filter_cutoff_hz.load(),
            filter_depth: self.filter_depth.load(),
            duck_depth: self.duck_depth.load(),
            smear_amount: self.smear_amount.load(),
            smear_attack: self.smear_attack.load(),
            smear_length: self.smear_length.load(),
        }
    }

    pub fn store(&self, settings: &AntiClickSettings) {
        let s = settings.clamped();
        self.pre_ms.store(s.pre_ms);
        self.post_ms.store(s.post_ms);
        self.filter_cutoff_hz.store(s.filter_cutoff_hz);
        self.filter_depth.store(s.filter_depth);
        self.duck_depth.store(s.duck_depth);
        self.smear_amount.store(s.smear_amount);
        self.smear_attack.store(s.smear_attack);
        self.smear_length.store(s.smear_length);
    }
}

/// Atomic mirror of [`GlobalSettings`]
#[derive(Debug)]
pub struct GlobalParameters {
    pub loop_start: AtomicF32,
    pub loop_end: AtomicF32,
    pub speed: AtomicF32,
    pub reverse: AtomicBool,
    pub preset_bars: AtomicU32,
    pub preset_beats: AtomicU32,
    pub host_bpm: AtomicF32,
    pub mix_mode: AtomicU8,
    pub additive_mode: AtomicBool,
    pub anti_click: AntiClickParameters,
}

impl GlobalParameters {
    pub fn new(settings: &GlobalSettings) -> Self {
        let s = settings.clamped();
        Self {
            loop_start: AtomicF32::new(s.loop_start),
            loop_end: AtomicF32::new(s.loop_end),
            speed: AtomicF32::new(s.speed),
            reverse: AtomicBool::new(s.reverse),
            preset_bars: AtomicU32::new(s.preset_bars),
            preset_beats: AtomicU32::new(s.preset_beats),
            host_bpm: AtomicF32::new(s.host_bpm),
            mix_mode: AtomicU8::new(s.mix_mode.as_u8()),
            additive_mode: AtomicBool::new(s.additive_mode),
            anti_click: AntiClickParameters::new(&s.anti_click),
        }
    }

    pub fn load(&self) -> GlobalSettings {
        GlobalSettings {
            loop_start: self.loop_start.load(),
            loop_end: self.loop_end.load(),
            speed: self.speed.load(),
            reverse: self.reverse.load(Ordering::Relaxed),
            preset_bars: self.preset_bars.load(Ordering::Relaxed),
            preset_beats: self.preset_beats.load(Ordering::Relaxed),
            host_bpm: self.host_bpm.load(),
            mix_mode: MixMode::from_u8(self.mix_mode.load(Ordering::Relaxed)),
            additive_mode: self.additive_mode.load(Ordering::Relaxed),
            anti_click: self.anti_click.load(),
        }
    }

    pub fn store(&self, settings: &GlobalSettings) {
        let s = settings.clamped();
        self.loop_start.store(s.loop_start);
        self.loop_end.store(s.loop_end);
        self.speed.store(s.speed);
        self.reverse.store(s.reverse, Ordering::Relaxed);
        self.preset_bars.store(s.preset_bars, Ordering::Relaxed);
        self.preset_beats.store(s.preset_beats, Ordering::Relaxed);
        self.host_bpm.store(s.host_bpm);
        self.mix_mode.store(s.mix_mode.as_u8(), Ordering::Relaxed);
        self.additive_mode.store(s.additive_mode, Ordering::Relaxed);
        self.anti_click.store(&s.anti_click);
    }
}

// ============================================================================
// Shared Parameters
// ============================================================================

/// Every control the engine reads, shared between UI and audio threads
#[derive(Debug)]
pub struct SharedParameters {
    pub global: GlobalParameters,
    layers: [LayerParameters; MAX_LAYERS],
}

impl SharedParameters {
    pub fn new(global: &GlobalSettings) -> Self {
        Self {
            global: GlobalParameters::new(global),
            layers: std::array::from_fn(|_| LayerParameters::default()),
        }
    }

    /// Controls of one layer
    pub fn layer(&self, index: LayerIndex) -> &LayerParameters {
        &self.layers[index.get()]
    }

    /// All layer controls in index order
    pub fn layers(&self) -> &[LayerParameters; MAX_LAYERS] {
        &self.layers
    }

    /// Put every layer back to identity defaults
    pub fn reset_layers(&self) {
        let defaults = LayerSettings::default();
        for layer in &self.layers {
            layer.store(&defaults);
        }
    }
}

impl Default for SharedParameters {
    fn default() -> Self {
        Self::new(&GlobalSettings::default())
    }
}

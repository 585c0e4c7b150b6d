//! Engine configuration
//!
//! Static sizing (sample rate, block size, loop capacity) plus the initial
//! values of the runtime controls. Loaded from JSON; every field has a
//! default so partial files are fine.

use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::dsp::DEFAULT_SMOOTHING_MS;
use crate::engine::MixMode;
use crate::error::{LooperError, Result};

/// Longest loop a config may request, in seconds
pub const MAX_LOOP_SECONDS_LIMIT: f32 = 600.0;

/// Longest anti-click window, in milliseconds
pub const MAX_ANTI_CLICK_MS: f32 = 500.0;

/// Longest smear replay relative to the post-boundary window
pub const MAX_SMEAR_LENGTH: f32 = 4.0;

// ============================================================================
// Anti-Click Settings
// ============================================================================

/// Loop-boundary ducking and smear parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AntiClickSettings {
    /// Window before the wrap, in ms (0-500)
    pub pre_ms: f32,
    /// Window after the wrap, in ms (0-500)
    pub post_ms: f32,
    /// One-pole low-pass cutoff used while ducking, in Hz
    pub filter_cutoff_hz: f32,
    /// How much of the filtered signal is blended in at full strength (0-1)
    pub filter_depth: f32,
    /// Volume reduction at full strength (0-1)
    pub duck_depth: f32,
    /// Level of the reversed smear overlay (0-1, 0 disables it)
    pub smear_amount: f32,
    /// Fraction of the smear spent in the cosine attack (0-1)
    pub smear_attack: f32,
    /// Smear length as a multiple of the post-boundary window (0.25-4)
    pub smear_length: f32,
}

impl Default for AntiClickSettings {
    fn default() -> Self {
        Self {
            pre_ms: 10.0,
            post_ms: 10.0,
            filter_cutoff_hz: 2000.0,
            filter_depth: 0.5,
            duck_depth: 0.5,
            smear_amount: 0.0,
            smear_attack: 0.25,
            smear_length: 1.0,
        }
    }
}

impl AntiClickSettings {
    /// Copy with every field forced into its valid range
    pub fn clamped(&self) -> Self {
        fn finite_or(value: f32, fallback: f32) -> f32 {
            if value.is_finite() {
                value
            } else {
                fallback
            }
        }
        let d = Self::default();
        Self {
            pre_ms: finite_or(self.pre_ms, d.pre_ms).clamp(0.0, MAX_ANTI_CLICK_MS),
            post_ms: finite_or(self.post_ms, d.post_ms).clamp(0.0, MAX_ANTI_CLICK_MS),
            filter_cutoff_hz: finite_or(self.filter_cutoff_hz, d.filter_cutoff_hz)
                .clamp(20.0, 20000.0),
            filter_depth: finite_or(self.filter_depth, d.filter_depth).clamp(0.0, 1.0),
            duck_depth: finite_or(self.duck_depth, d.duck_depth).clamp(0.0, 1.0),
            smear_amount: finite_or(self.smear_amount, d.smear_amount).clamp(0.0, 1.0),
            smear_attack: finite_or(self.smear_attack, d.smear_attack).clamp(0.0, 1.0),
            smear_length: finite_or(self.smear_length, d.smear_length)
                .clamp(0.25, MAX_SMEAR_LENGTH),
        }
    }

    /// Settings that leave the boundary untouched
    pub fn disabled() -> Self {
        Self {
            pre_ms: 0.0,
            post_ms: 0.0,
            smear_amount: 0.0,
            ..Self::default()
        }
    }
}

// ============================================================================
// Engine Configuration
// ============================================================================

/// Engine sizing and initial control values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Largest block the host will deliver
    pub max_block_size: usize,
    /// Capacity of every layer buffer, in seconds
    pub max_loop_seconds: f32,
    /// Length of the seam crossfade applied when a recording closes
    pub seam_crossfade_samples: usize,
    /// Ramp length for continuous parameters
    pub smoothing_ms: f32,
    /// Pass live input through while writing and whenever no loop plays
    pub input_monitoring: bool,
    /// Initial compositing mode
    pub mix_mode: MixMode,
    /// Initial loop-boundary settings
    pub anti_click: AntiClickSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            max_block_size: 1024,
            max_loop_seconds: 120.0,
            seam_crossfade_samples: 256,
            smoothing_ms: DEFAULT_SMOOTHING_MS,
            input_monitoring: true,
            mix_mode: MixMode::Track,
            anti_click: AntiClickSettings::default(),
        }
    }
}

impl EngineConfig {
    /// Config with a given sample rate and otherwise default values
    pub fn with_sample_rate(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            ..Self::default()
        }
    }

    /// Parse and validate a JSON config
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        debug!("Loading engine config from {}", path.display());
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Write the config as pretty JSON
    pub fn save_json_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Reject values that would make the engine unusable
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(LooperError::config("sample_rate", "must be non-zero"));
        }
        if self.max_block_size == 0 {
            return Err(LooperError::config("max_block_size", "must be non-zero"));
        }
        if !(self.max_loop_seconds > 0.0 && self.max_loop_seconds <= MAX_LOOP_SECONDS_LIMIT) {
            return Err(LooperError::config(
                "max_loop_seconds",
                format!("must be in (0, {}]", MAX_LOOP_SECONDS_LIMIT),
            ));
        }
        if !(self.smoothing_ms >= 0.0 && self.smoothing_ms.is_finite()) {
            return Err(LooperError::config("smoothing_ms", "must be a non-negative number"));
        }
        Ok(())
    }

    /// Frames each layer buffer can hold
    pub fn loop_capacity_samples(&self) -> usize {
        (self.max_loop_seconds.max(0.0) as f64 * self.sample_rate as f64) as usize
    }
}

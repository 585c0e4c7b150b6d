//! Host transport collaborator
//!
//! The looper asks its host for tempo so that preset loop lengths can be
//! expressed in bars and beats. A host without tempo information returns
//! `None` and the engine falls back to the `host_bpm` control.

use super::params::BPM_RANGE;

/// Tempo source provided by the surrounding host
pub trait HostTransport: Send {
    /// Current tempo, if the host knows one
    fn bpm(&self) -> Option<f64>;

    /// Whether the host transport is running
    fn is_playing(&self) -> bool {
        false
    }
}

/// Host that always reports the same tempo
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedTempo {
    bpm: f64,
    playing: bool,
}

impl FixedTempo {
    /// Tempo clamped to the supported BPM range
    pub fn new(bpm: f64) -> Self {
        let bpm = if bpm.is_finite() {
            bpm.clamp(BPM_RANGE.0 as f64, BPM_RANGE.1 as f64)
        } else {
            120.0
        };
        Self { bpm, playing: true }
    }

    pub fn stopped(mut self) -> Self {
        self.playing = false;
        self
    }
}

impl Default for FixedTempo {
    fn default() -> Self {
        Self::new(120.0)
    }
}

impl HostTransport for FixedTempo {
    fn bpm(&self) -> Option<f64> {
        Some(self.bpm)
    }

    fn is_playing(&self) -> bool {
        self.playing
    }
}

/// Host that never reports tempo
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHost;

impl HostTransport for NoHost {
    fn bpm(&self) -> Option<f64> {
        None
    }
}

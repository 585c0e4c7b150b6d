//! Transport and mode enums
//!
//! Tagged state shared by the track and orchestrator state machines, plus
//! the validated [`LayerIndex`] used to address the eight-slot layer arena.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of layers the engine can hold
pub const MAX_LAYERS: usize = 8;

// ============================================================================
// Track State
// ============================================================================

/// Transport state of a single loop track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum TrackState {
    /// Not producing audio
    #[default]
    Idle,
    /// Writing input sequentially; loop length not yet fixed
    Recording,
    /// Looping existing content
    Playing,
    /// Looping existing content while adding input on top
    Overdubbing,
}

impl TrackState {
    /// True for the states that write into the buffer
    pub fn is_writing(self) -> bool {
        matches!(self, TrackState::Recording | TrackState::Overdubbing)
    }

    /// Priority used to pick the "most active" state across layers
    fn activity(self) -> u8 {
        match self {
            TrackState::Idle => 0,
            TrackState::Playing => 1,
            TrackState::Overdubbing => 2,
            TrackState::Recording => 3,
        }
    }

    /// The more active of two states
    pub fn most_active(self, other: TrackState) -> TrackState {
        if other.activity() > self.activity() {
            other
        } else {
            self
        }
    }

    pub(crate) fn as_u8(self) -> u8 {
        self.activity()
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => TrackState::Playing,
            2 => TrackState::Overdubbing,
            3 => TrackState::Recording,
            _ => TrackState::Idle,
        }
    }
}

impl fmt::Display for TrackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackState::Idle => write!(f, "Idle"),
            TrackState::Recording => write!(f, "Recording"),
            TrackState::Playing => write!(f, "Playing"),
            TrackState::Overdubbing => write!(f, "Overdubbing"),
        }
    }
}

/// Engine-wide state: the most active state across all layers
pub type EngineState = TrackState;

// ============================================================================
// Modes
// ============================================================================

/// How layer outputs are composited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MixMode {
    /// Additive: every audible layer is summed
    #[default]
    Track,
    /// Punch-through: each audible layer replaces everything below it
    Layer,
}

impl MixMode {
    pub(crate) fn as_u8(self) -> u8 {
        match self {
            MixMode::Track => 0,
            MixMode::Layer => 1,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        if value == 1 {
            MixMode::Layer
        } else {
            MixMode::Track
        }
    }
}

impl fmt::Display for MixMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MixMode::Track => write!(f, "Track"),
            MixMode::Layer => write!(f, "Layer"),
        }
    }
}

/// Role of a layer in the mix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerType {
    /// Ordinary recorded layer
    #[default]
    Regular,
    /// Committed effected mixdown; silences regular layers beneath it
    Override,
}

// ============================================================================
// Layer Index
// ============================================================================

/// Validated index into the layer arena
///
/// Stored 0-based; the user-facing numbering is 1-based. Construction is the
/// only place a range check happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LayerIndex(usize);

impl LayerIndex {
    /// Layer 1
    pub const FIRST: LayerIndex = LayerIndex(0);

    /// Index from 0-based storage position
    pub fn new(index: usize) -> Option<Self> {
        (index < MAX_LAYERS).then_some(Self(index))
    }

    /// Index from the 1-based number shown to the performer
    pub fn from_display(number: usize) -> Option<Self> {
        number.checked_sub(1).and_then(Self::new)
    }

    /// 0-based storage position
    pub fn get(self) -> usize {
        self.0
    }

    /// 1-based number shown to the performer
    pub fn display_number(self) -> usize {
        self.0 + 1
    }
}

impl fmt::Display for LayerIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Layer {}", self.display_number())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_most_active_priority() {
        assert_eq!(
            TrackState::Idle.most_active(TrackState::Playing),
            TrackState::Playing
        );
        assert_eq!(
            TrackState::Overdubbing.most_active(TrackState::Playing),
            TrackState::Overdubbing
        );
        assert_eq!(
            TrackState::Overdubbing.most_active(TrackState::Recording),
            TrackState::Recording
        );
    }

    #[test]
    fn test_state_round_trip_through_u8() {
        for state in [
            TrackState::Idle,
            TrackState::Recording,
            TrackState::Playing,
            TrackState::Overdubbing,
        ] {
            assert_eq!(TrackState::from_u8(state.as_u8()), state);
        }
    }

    #[test]
    fn test_layer_index_bounds() {
        assert!(LayerIndex::new(7).is_some());
        assert!(LayerIndex::new(8).is_none());
        assert!(LayerIndex::from_display(0).is_none());
        assert_eq!(LayerIndex::from_display(1).map(LayerIndex::get), Some(0));
        assert_eq!(LayerIndex::from_display(8).map(LayerIndex::get), Some(7));
        assert!(LayerIndex::from_display(9).is_none());
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", TrackState::Overdubbing), "Overdubbing");
        assert_eq!(format!("{}", MixMode::Layer), "Layer");
        assert_eq!(format!("{}", LayerIndex::new(2).unwrap()), "Layer 3");
    }
}

//! Layer engine
//!
//! Up to eight stacked loop layers sharing one master loop:
//! - `track`: one layer's buffer, playhead and per-layer DSP
//! - `orchestrator`: the layer arena and the per-block pipeline
//! - `transport`, `management`: performer commands
//! - `mixing`, `capture`: Track/Layer compositing, bounce and ADD+
//! - `anti_click`: loop-boundary click suppression
//! - `controls`, `meters`: parameters in, status out

mod anti_click;
mod capture;
mod controls;
mod management;
mod meters;
mod mixing;
mod orchestrator;
mod track;
mod transport;

pub use anti_click::AntiClick;
pub use orchestrator::LayerOrchestrator;
pub use track::{LoopTrack, TrackTransition, DEFAULT_SEAM_CROSSFADE};

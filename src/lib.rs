//! Layerloop - Real-time Multi-layer Looper Core
//!
//! Up to eight stacked loop layers sharing one master loop, with undo/redo,
//! two mixing laws (additive "Track" and override "Layer"), ADD+ override
//! capture, flattening, and click-free loop boundaries.
//!
//! # Architecture
//!
//! - [`layers::LayerOrchestrator`] owns everything the audio thread touches
//!   and runs one block at a time through `process_block`.
//! - [`engine::LooperController`] is the control-thread handle: commands go
//!   in through a lock-free queue, events come back the same way, and
//!   continuous controls are written to shared atomics.
//! - [`dsp`] holds the sample-level building blocks and the effect and
//!   pitch-shift collaborator traits.
//!
//! ```no_run
//! use layerloop::{EngineConfig, LayerOrchestrator};
//!
//! let mut engine = LayerOrchestrator::new(EngineConfig::default())?;
//! let mut controller = engine.take_controller().expect("first call");
//! controller.record()?;
//!
//! let input = vec![0.0f32; 512];
//! let (mut out_l, mut out_r) = (vec![0.0f32; 512], vec![0.0f32; 512]);
//! engine.process_block(&input, &input, &mut out_l, &mut out_r);
//! controller.log_events();
//! # Ok::<(), layerloop::LooperError>(())
//! ```

pub mod cli;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod layers;

pub use config::{AntiClickSettings, EngineConfig};
pub use engine::{
    Command, EngineEvent, EngineState, EngineStatus, LayerIndex, LayerType, LooperController,
    MixMode, TrackState, MAX_LAYERS,
};
pub use error::{LooperError, Result};
pub use layers::{LayerOrchestrator, LoopTrack};

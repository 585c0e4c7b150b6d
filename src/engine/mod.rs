//! Engine plumbing
//!
//! Everything the layer engine needs that is not itself DSP:
//! - Stereo sample storage
//! - Transport and mode enums
//! - Cross-thread parameters, commands, events and status
//! - Host tempo collaborator
//! - Parameter persistence and WAV file I/O

pub mod buffer;
pub mod command;
pub mod host;
pub mod io;
pub mod params;
pub mod persist;
pub mod status;
pub mod transport;

pub use buffer::{count_clipped, peak_of, StereoBuffer, CLIP_SAMPLE_THRESHOLD};
pub use command::{Command, EngineEvent, LooperController};
pub use host::{FixedTempo, HostTransport, NoHost};
pub use io::{generate_test_tone, read_wav, write_wav, BitDepth};
pub use params::{GlobalSettings, LayerSettings, SharedParameters};
pub use persist::ParameterSnapshot;
pub use status::EngineStatus;
pub use transport::{EngineState, LayerIndex, LayerType, MixMode, TrackState, MAX_LAYERS};

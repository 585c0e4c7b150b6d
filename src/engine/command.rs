//! Control-thread handle
//!
//! Transport commands travel UI -> audio through one SPSC ring, engine
//! events travel audio -> UI through another. The audio thread drains the
//! command ring at the start of each block, so every command takes effect
//! on a block boundary. Events are the engine's only diagnostic output;
//! the controller is where they get logged.

use std::sync::Arc;

use log::{debug, info, warn};
use rtrb::{Consumer, Producer, RingBuffer};

use super::params::{GlobalSettings, LayerSettings, SharedParameters};
use super::status::EngineStatus;
use super::transport::LayerIndex;
use crate::error::{LooperError, Result};

/// Command ring capacity
pub const COMMAND_QUEUE_CAPACITY: usize = 256;

/// Event ring capacity
pub const EVENT_QUEUE_CAPACITY: usize = 1024;

/// Performer-facing transport commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Record,
    Play,
    Stop,
    Overdub,
    Undo,
    Redo,
    Clear,
    ClearLayer(LayerIndex),
    DeleteLayer(LayerIndex),
    JumpToLayer(LayerIndex),
    FlattenLayers,
    TriggerAdditiveCapture,
    StopAdditiveCapture,
}

/// Things the engine reports back to the control thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    RecordingStarted { layer: LayerIndex, target_length: usize },
    RecordingStopped { layer: LayerIndex, length: usize },
    OverdubStarted { layer: LayerIndex },
    OverdubStopped { layer: LayerIndex },
    PlaybackStarted,
    Stopped,
    /// Undone layers from `first` upwards were discarded by a new write
    UndoneLayersCommitted { first: LayerIndex },
    Undo { layer: LayerIndex },
    Redo { layer: LayerIndex },
    Cleared { kept_groove: bool },
    LayerCleared { layer: LayerIndex },
    LayerDeleted { layer: LayerIndex },
    JumpedToLayer { layer: LayerIndex },
    Flattened { layers: usize },
    BounceComplete { layer: LayerIndex },
    AdditiveCaptureStarted,
    AdditiveCaptureStopped,
    OverrideCommitted { layer: LayerIndex, new_layer: bool },
    /// A write was requested but every layer already holds content
    CapacityReached,
}

/// Audio-thread end of the queues
pub(crate) struct EngineLink {
    pub(crate) commands: Consumer<Command>,
    pub(crate) events: Producer<EngineEvent>,
}

impl EngineLink {
    /// Next pending command, if any
    #[inline]
    pub(crate) fn next_command(&mut self) -> Option<Command> {
        self.commands.pop().ok()
    }

    /// Report an event; dropped silently when the ring is full
    #[inline]
    pub(crate) fn emit(&mut self, event: EngineEvent) {
        let _ = self.events.push(event);
    }
}

/// Build both ends of the control link
pub(crate) fn control_link(
    params: Arc<SharedParameters>,
    status: Arc<EngineStatus>,
) -> (EngineLink, LooperController) {
    let (command_tx, command_rx) = RingBuffer::new(COMMAND_QUEUE_CAPACITY);
    let (event_tx, event_rx) = RingBuffer::new(EVENT_QUEUE_CAPACITY);
    (
        EngineLink {
            commands: command_rx,
            events: event_tx,
        },
        LooperController {
            commands: command_tx,
            events: event_rx,
            params,
            status,
        },
    )
}

/// Control-thread handle to a running engine
pub struct LooperController {
    commands: Producer<Command>,
    events: Consumer<EngineEvent>,
    params: Arc<SharedParameters>,
    status: Arc<EngineStatus>,
}

impl LooperController {
    /// Queue a command for the next block
    pub fn send(&mut self, command: Command) -> Result<()> {
        debug!("Queueing {:?}", command);
        self.commands.push(command).map_err(|_| {
            warn!("Command queue full, dropping {:?}", command);
            LooperError::InvalidParameter {
                param: "command".to_string(),
                value: format!("{:?}", command),
                expected: "free space in the command queue".to_string(),
            }
        })
    }

    pub fn record(&mut self) -> Result<()> {
        self.send(Command::Record)
    }

    pub fn play(&mut self) -> Result<()> {
        self.send(Command::Play)
    }

    pub fn stop(&mut self) -> Result<()> {
        self.send(Command::Stop)
    }

    pub fn overdub(&mut self) -> Result<()> {
        self.send(Command::Overdub)
    }

    pub fn undo(&mut self) -> Result<()> {
        self.send(Command::Undo)
    }

    pub fn redo(&mut self) -> Result<()> {
        self.send(Command::Redo)
    }

    pub fn clear(&mut self) -> Result<()> {
        self.send(Command::Clear)
    }

    /// Queue a per-layer command addressed by 1-based layer number
    pub fn send_for_layer(
        &mut self,
        number: usize,
        command: fn(LayerIndex) -> Command,
    ) -> Result<()> {
        let index =
            LayerIndex::from_display(number).ok_or(LooperError::LayerOutOfRange { index: number })?;
        self.send(command(index))
    }

    /// Shared parameter store
    pub fn params(&self) -> &SharedParameters {
        &self.params
    }

    /// Published engine status
    pub fn status(&self) -> &EngineStatus {
        &self.status
    }

    /// Read-modify-write one layer's controls (1-based layer number)
    pub fn update_layer(
        &self,
        number: usize,
        update: impl FnOnce(&mut LayerSettings),
    ) -> Result<()> {
        let index =
            LayerIndex::from_display(number).ok_or(LooperError::LayerOutOfRange { index: number })?;
        let layer = self.params.layer(index);
        let mut settings = layer.load();
        update(&mut settings);
        layer.store(&settings);
        Ok(())
    }

    /// Read-modify-write the global controls
    pub fn update_global(&self, update: impl FnOnce(&mut GlobalSettings)) {
        let mut settings = self.params.global.load();
        update(&mut settings);
        self.params.global.store(&settings);
    }

    /// Hand every pending engine event to `handler`
    pub fn drain_events(&mut self, mut handler: impl FnMut(EngineEvent)) -> usize {
        let mut count = 0;
        while let Ok(event) = self.events.pop() {
            handler(event);
            count += 1;
        }
        count
    }

    /// Log every pending engine event
    pub fn log_events(&mut self) -> usize {
        self.drain_events(|event| match event {
            EngineEvent::CapacityReached => warn!("All layers are full"),
            EngineEvent::RecordingStopped { layer, length } => {
                info!("{} recorded ({} samples)", layer, length)
            }
            EngineEvent::OverrideCommitted { layer, new_layer } => {
                info!("Override pass committed to {} (new: {})", layer, new_layer)
            }
            other => debug!("Engine event: {:?}", other),
        })
    }
}

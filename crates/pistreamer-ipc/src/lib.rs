//! Typed UI<->Engine messages for pistreamer.
//!
//! This crate defines the configuration records, source state, telemetry
//! events and the command/event enums exchanged between a front end and the
//! engine, plus the [`EventBus`] used for fan-out and the bounded-time
//! helper used by the device enumeration of the video and audio crates.

mod bus;
mod commands;
mod events;
pub mod probe;
mod state;
mod types;

pub use bus::EventBus;
pub use commands::EngineCommand;
pub use events::{ControllerEvent, EngineEvent, SourceEvent, SourceEventKind};
pub use state::{AggregateScope, EngineStatus, RunState, SourceId, SourceStatus};
pub use types::{
    AudioConfig, AudioDevice, SourceCategory, SourceConfig, Telemetry, VideoConfig, VideoDevice,
    VideoFormat,
};

use crossbeam_channel::{Receiver, Sender};

/// Channel capacity for commands (UI → Engine).
pub const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Channel capacity for events (Engine → UI).
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Creates a bounded command channel.
pub fn command_channel() -> (Sender<EngineCommand>, Receiver<EngineCommand>) {
    crossbeam_channel::bounded(COMMAND_CHANNEL_CAPACITY)
}

/// Creates a bounded event channel.
pub fn event_channel() -> (Sender<EngineEvent>, Receiver<EngineEvent>) {
    crossbeam_channel::bounded(EVENT_CHANNEL_CAPACITY)
}

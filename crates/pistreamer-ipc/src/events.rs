//! Events sent from the engine and its sources to the UI.

use serde::{Deserialize, Serialize};

use crate::state::{EngineStatus, RunState, SourceId};
use crate::types::{AudioDevice, SourceCategory, VideoDevice, VideoFormat};

/// A single telemetry or state notification from one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceEvent {
    /// Source that emitted the event.
    pub source: SourceId,

    /// What happened.
    pub kind: SourceEventKind,
}

/// Payload of a [`SourceEvent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SourceEventKind {
    /// Run state changed.
    RunState(RunState),

    /// Frame counter.
    Frame(u64),

    /// Instantaneous frames per second.
    Fps(f32),

    /// Bitrate in kbit/s.
    Bitrate(f32),

    /// The source failed; the reason is also kept as its last error.
    Error(String),
}

/// Notifications from the source controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ControllerEvent {
    /// A new source handle is fully constructed and may be subscribed to.
    SourceReady {
        category: SourceCategory,
        index: usize,
        source: SourceId,
    },

    /// A source handle was discarded; later indices shifted down by one.
    SourceRemoved {
        category: SourceCategory,
        index: usize,
        source: SourceId,
    },

    /// Aggregate running flag changed.
    AggregateChanged(bool),
}

/// Events that the engine can send to the UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EngineEvent {
    /// Engine is ready.
    Ready,

    /// Source controller notification.
    Controller(ControllerEvent),

    /// Telemetry from a source.
    Telemetry(SourceEvent),

    /// Current engine status.
    Status(EngineStatus),

    /// Available video capture devices.
    VideoDevices(Vec<VideoDevice>),

    /// Formats of one video capture device.
    VideoFormats {
        device: String,
        formats: Vec<VideoFormat>,
    },

    /// Available audio capture devices.
    AudioDevices(Vec<AudioDevice>),

    /// Sample formats audio sources accept.
    AudioFormats(Vec<String>),

    /// A command failed.
    Error {
        /// Error message.
        message: String,
    },

    /// Engine has shut down.
    Shutdown,
}

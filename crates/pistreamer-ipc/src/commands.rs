//! Commands sent from the UI to the engine.

use serde::{Deserialize, Serialize};

use crate::types::{SourceCategory, SourceConfig};

/// Commands that the UI can send to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EngineCommand {
    /// Start every configured source.
    Start,

    /// Stop every configured source.
    Stop,

    /// Append a source configuration.
    AddSource(SourceConfig),

    /// Replace the configuration at `index` within its category.
    UpdateSource { index: usize, config: SourceConfig },

    /// Remove the configuration at `index` within `category`.
    RemoveSource {
        category: SourceCategory,
        index: usize,
    },

    /// Request the current engine status.
    GetStatus,

    /// Request the list of video capture devices.
    GetVideoDevices,

    /// Request the formats supported by a video capture device.
    GetVideoFormats { device: String },

    /// Request the list of audio capture devices.
    GetAudioDevices,

    /// Request the sample formats audio sources accept.
    GetAudioFormats,

    /// Stop all sources and shut the engine down.
    Shutdown,
}

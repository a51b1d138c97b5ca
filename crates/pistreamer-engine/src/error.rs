//! Error types for the engine.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use pistreamer_audio::AudioError;
use pistreamer_ipc::SourceCategory;
use pistreamer_video::VideoError;

/// Errors raised by the controller, the configuration store and settings.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A positional accessor was given an index past the end.
    #[error("No {category} source at index {index} (have {len})")]
    IndexOutOfRange {
        category: SourceCategory,
        index: usize,
        len: usize,
    },

    /// The configuration file could not be read or written.
    #[error("Config file {path}: {source}")]
    StoreIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The configuration file is not valid JSON of the expected shape.
    #[error("Config file {path} is malformed: {source}")]
    StoreFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A setting holds a value of a different type than requested.
    #[error("Setting {namespace}.{key} has an unexpected type: {source}")]
    SettingType {
        namespace: String,
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Video source error.
    #[error(transparent)]
    Video(#[from] VideoError),

    /// Audio source error.
    #[error(transparent)]
    Audio(#[from] AudioError),
}

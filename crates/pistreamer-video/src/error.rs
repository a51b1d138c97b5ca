//! Error types for the video module.

use thiserror::Error;

/// Errors that can occur while driving a video source.
#[derive(Debug, Error)]
pub enum VideoError {
    /// The encoder executable could not be started.
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The stderr pipe of the encoder was not captured.
    #[error("Failed to capture encoder stderr")]
    MissingStderr,

    /// The termination request could not be delivered.
    #[error("Failed to terminate process {pid}: {source}")]
    Terminate {
        pid: u32,
        #[source]
        source: std::io::Error,
    },

    /// Other I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

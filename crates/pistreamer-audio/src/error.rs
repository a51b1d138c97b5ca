//! Error types for the audio module.

use thiserror::Error;

/// Errors that can occur while building or driving an audio graph.
#[derive(Debug, Error)]
pub enum AudioError {
    /// Destination address could not be turned into a host and port.
    #[error("Invalid destination address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    /// No encoder element is known for the configured encoder name.
    #[error("Audio encoder not supported: {0}")]
    UnsupportedEncoder(String),

    /// No graph engine is compiled in.
    #[error("No audio graph backend available")]
    BackendUnavailable,

    /// The graph engine rejected the description.
    #[error("Graph construction failed: {0}")]
    Construction(String),

    /// The graph refused a state change.
    #[error("Graph state change failed: {0}")]
    StateChange(String),

    /// The source has no graph because its configuration failed to build.
    #[error("Audio graph unavailable: {0}")]
    GraphUnavailable(String),
}

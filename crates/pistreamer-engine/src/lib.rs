//! Source supervision for pistreamer.
//!
//! The [`Engine`] owns a [`ConfigStore`], a [`SourceController`] holding one
//! [`PlaybackSource`] per stored record, and forwards controller and
//! telemetry events to the UI over the IPC channels.

mod controller;
mod error;
mod orchestrator;
mod settings;
mod source;
mod store;
#[cfg(test)]
mod testing;

pub use controller::SourceController;
pub use error::EngineError;
pub use orchestrator::Engine;
pub use settings::{EngineSettings, Settings, ENGINE_NAMESPACE};
pub use source::{PlaybackSource, SourceFactory};
pub use store::{ConfigEvent, ConfigStore};

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};

use pistreamer_ipc::{EngineCommand, EngineEvent};
use pistreamer_video::SystemLauncher;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Create an engine over `store` that launches real encoder processes and
/// uses the compiled-in graph backend.
pub fn create_engine(
    command_rx: Receiver<EngineCommand>,
    event_tx: Sender<EngineEvent>,
    store: ConfigStore,
) -> EngineResult<Engine> {
    let backend = pistreamer_audio::default_backend()?;
    Ok(Engine::new(
        command_rx,
        event_tx,
        store,
        Arc::new(SystemLauncher),
        backend,
    ))
}

//! The two kinds of playback source behind one type.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};

use pistreamer_audio::{GraphBackend, GraphSource};
use pistreamer_ipc::{RunState, SourceCategory, SourceConfig, SourceEvent, SourceId, Telemetry};
use pistreamer_video::{LaunchOptions, ProcessLauncher, ProcessSource};

use crate::EngineResult;

/// A process-backed video source or a graph-backed audio source.
pub enum PlaybackSource {
    Process(ProcessSource),
    Graph(GraphSource),
}

impl PlaybackSource {
    pub fn id(&self) -> SourceId {
        match self {
            Self::Process(source) => source.id(),
            Self::Graph(source) => source.id(),
        }
    }

    pub fn category(&self) -> SourceCategory {
        match self {
            Self::Process(_) => SourceCategory::Video,
            Self::Graph(_) => SourceCategory::Audio,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Process(source) => &source.config().name,
            Self::Graph(source) => &source.config().name,
        }
    }

    pub fn state(&self) -> RunState {
        match self {
            Self::Process(source) => source.state(),
            Self::Graph(source) => source.state(),
        }
    }

    pub fn telemetry(&self) -> Telemetry {
        match self {
            Self::Process(source) => source.telemetry(),
            Self::Graph(source) => source.telemetry(),
        }
    }

    pub fn last_error(&self) -> Option<&str> {
        match self {
            Self::Process(source) => source.last_error(),
            Self::Graph(source) => source.last_error(),
        }
    }

    pub fn subscribe(&mut self) -> Receiver<SourceEvent> {
        match self {
            Self::Process(source) => source.subscribe(),
            Self::Graph(source) => source.subscribe(),
        }
    }

    pub fn subscribe_with(&mut self, tx: Sender<SourceEvent>) {
        match self {
            Self::Process(source) => source.subscribe_with(tx),
            Self::Graph(source) => source.subscribe_with(tx),
        }
    }

    pub fn start(&mut self) -> EngineResult<()> {
        match self {
            Self::Process(source) => source.start()?,
            Self::Graph(source) => source.start()?,
        }
        Ok(())
    }

    pub fn stop(&mut self) -> EngineResult<()> {
        match self {
            Self::Process(source) => source.stop()?,
            Self::Graph(source) => source.stop()?,
        }
        Ok(())
    }

    /// Process pending asynchronous notifications. Returns true if the run
    /// state changed.
    pub fn poll(&mut self) -> bool {
        match self {
            Self::Process(source) => source.poll(),
            Self::Graph(source) => source.poll(),
        }
    }

    /// Replace the configuration in place; the id is kept.
    ///
    /// Returns false if `config` belongs to the other category.
    pub fn set_config(&mut self, config: SourceConfig) -> bool {
        match (self, config) {
            (Self::Process(source), SourceConfig::Video(config)) => {
                source.set_config(config);
                true
            }
            (Self::Graph(source), SourceConfig::Audio(config)) => {
                source.set_config(config);
                true
            }
            _ => false,
        }
    }
}

/// Creates source handles with unique ids.
pub struct SourceFactory {
    launcher: Arc<dyn ProcessLauncher>,
    launch_options: LaunchOptions,
    backend: Arc<dyn GraphBackend>,
    next_id: u64,
}

impl SourceFactory {
    pub fn new(
        launcher: Arc<dyn ProcessLauncher>,
        launch_options: LaunchOptions,
        backend: Arc<dyn GraphBackend>,
    ) -> Self {
        Self {
            launcher,
            launch_options,
            backend,
            next_id: 1,
        }
    }

    /// Build an idle source for `config`.
    pub fn create(&mut self, config: SourceConfig) -> PlaybackSource {
        let id = SourceId(self.next_id);
        self.next_id += 1;

        match config {
            SourceConfig::Video(config) => PlaybackSource::Process(ProcessSource::new(
                id,
                config,
                self.launch_options.clone(),
                Arc::clone(&self.launcher),
            )),
            SourceConfig::Audio(config) => {
                PlaybackSource::Graph(GraphSource::new(id, config, Arc::clone(&self.backend)))
            }
        }
    }
}

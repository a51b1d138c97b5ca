//! Graph-backed audio source.

use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use pistreamer_ipc::{
    AudioConfig, EventBus, RunState, SourceEvent, SourceEventKind, SourceId, Telemetry,
};

use crate::backend::{BusMessage, GraphBackend, MediaGraph, TapSink};
use crate::error::AudioError;
use crate::graph::build_description;
use crate::sampler::BitrateSampler;
use crate::AudioResult;

/// A constructed graph together with its tap plumbing.
struct BuiltGraph {
    graph: Box<dyn MediaGraph>,
    sampler: Arc<Mutex<BitrateSampler>>,
    samples: Receiver<f32>,
}

/// An audio source backed by one persistent processing graph.
///
/// The graph is built whenever the configuration is set. A configuration
/// that fails to build leaves the source Idle with the failure as its last
/// error; starting it returns [`AudioError::GraphUnavailable`].
pub struct GraphSource {
    id: SourceId,
    config: AudioConfig,
    backend: Arc<dyn GraphBackend>,
    graph: Option<BuiltGraph>,
    /// Graph built while running, swapped in on the next stop.
    staged: Option<Option<BuiltGraph>>,
    state: RunState,
    telemetry: Telemetry,
    last_error: Option<String>,
    events: EventBus<SourceEvent>,
}

impl GraphSource {
    pub fn new(id: SourceId, config: AudioConfig, backend: Arc<dyn GraphBackend>) -> Self {
        let mut source = Self {
            id,
            config,
            backend,
            graph: None,
            staged: None,
            state: RunState::Idle,
            telemetry: Telemetry::default(),
            last_error: None,
            events: EventBus::new(),
        };
        source.graph = source.build_graph();
        source
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    /// Replace the configuration and rebuild the graph.
    ///
    /// While running, the new graph waits until the next stop.
    pub fn set_config(&mut self, config: AudioConfig) {
        debug!(source = %self.id, name = %config.name, "Audio configuration replaced");
        self.config = config;

        let built = self.build_graph();
        if self.state.is_running() {
            self.staged = Some(built);
        } else {
            self.graph = built;
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn telemetry(&self) -> Telemetry {
        self.telemetry
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn subscribe(&mut self) -> Receiver<SourceEvent> {
        self.events.subscribe()
    }

    pub fn subscribe_with(&mut self, tx: Sender<SourceEvent>) {
        self.events.subscribe_with(tx);
    }

    /// Activate the graph. Does nothing unless idle.
    #[instrument(name = "audio_start", skip(self), fields(source = %self.id))]
    pub fn start(&mut self) -> AudioResult<()> {
        if self.state.is_running() {
            debug!("Already running, ignoring start");
            return Ok(());
        }

        let Some(built) = self.graph.as_mut() else {
            let reason = self
                .last_error
                .clone()
                .unwrap_or_else(|| "no graph".to_string());
            warn!("Cannot start without a graph: {}", reason);
            return Err(AudioError::GraphUnavailable(reason));
        };

        built.sampler.lock().reset(Instant::now());
        built.samples.try_iter().for_each(drop);

        if let Err(e) = built.graph.play() {
            if let Err(reset) = built.graph.reset() {
                warn!("Failed to reset graph: {}", reset);
            }
            self.fail(e.to_string());
            return Err(e);
        }

        info!(device = %self.config.device, address = %self.config.address, "Audio graph playing");
        self.last_error = None;
        self.set_state(RunState::Running);
        Ok(())
    }

    /// Reset the graph and go idle. Does nothing if idle.
    #[instrument(name = "audio_stop", skip(self), fields(source = %self.id))]
    pub fn stop(&mut self) -> AudioResult<()> {
        if !self.state.is_running() {
            debug!("Already idle, ignoring stop");
            return Ok(());
        }

        self.deactivate();
        Ok(())
    }

    /// Drain bitrate samples and check the graph bus.
    ///
    /// Returns true if the run state changed.
    pub fn poll(&mut self) -> bool {
        if !self.state.is_running() {
            return false;
        }
        let Some(built) = self.graph.as_mut() else {
            return false;
        };

        let samples: Vec<f32> = built.samples.try_iter().collect();
        let message = built.graph.poll_bus();

        for kbps in samples {
            self.telemetry.bitrate_kbps = kbps;
            self.publish(SourceEventKind::Bitrate(kbps));
        }

        match message {
            Some(BusMessage::Error(reason)) => {
                self.fail(reason);
                self.deactivate();
                true
            }
            Some(BusMessage::EndOfStream) => {
                self.fail("end of stream".to_string());
                self.deactivate();
                true
            }
            None => false,
        }
    }

    fn build_graph(&mut self) -> Option<BuiltGraph> {
        let (tx, samples) = crossbeam_channel::unbounded();
        let sampler = Arc::new(Mutex::new(BitrateSampler::new(Instant::now())));
        let tap = TapSink::new(Arc::clone(&sampler), tx);

        let result = build_description(&self.config).and_then(|description| {
            info!(source = %self.id, "Building graph: {}", description);
            self.backend.build(&description, tap)
        });

        match result {
            Ok(graph) => {
                if !self.state.is_running() {
                    self.last_error = None;
                }
                Some(BuiltGraph {
                    graph,
                    sampler,
                    samples,
                })
            }
            Err(e) => {
                self.fail(e.to_string());
                None
            }
        }
    }

    fn deactivate(&mut self) {
        if let Some(built) = self.graph.as_mut() {
            if let Err(e) = built.graph.reset() {
                warn!(source = %self.id, "Failed to reset graph: {}", e);
            }
        }

        self.telemetry.reset();
        self.publish(SourceEventKind::Bitrate(0.0));
        self.set_state(RunState::Idle);

        if let Some(staged) = self.staged.take() {
            debug!(source = %self.id, "Swapping in staged graph");
            self.graph = staged;
        }
    }

    fn fail(&mut self, reason: String) {
        warn!(source = %self.id, "{}", reason);
        self.last_error = Some(reason.clone());
        self.publish(SourceEventKind::Error(reason));
    }

    fn set_state(&mut self, state: RunState) {
        if self.state == state {
            return;
        }
        debug!(source = %self.id, previous = self.state.name(), current = state.name(), "State transition");
        self.state = state;
        self.publish(SourceEventKind::RunState(state));
    }

    fn publish(&mut self, kind: SourceEventKind) {
        self.events.publish(SourceEvent {
            source: self.id,
            kind,
        });
    }
}

impl Drop for GraphSource {
    fn drop(&mut self) {
        if !self.state.is_running() {
            return;
        }
        if let Some(built) = self.graph.as_mut() {
            if let Err(e) = built.graph.reset() {
                warn!(source = %self.id, "Failed to reset graph on drop: {}", e);
            }
        }
    }
}

//! Keeps source handles in step with the configuration store.

use crossbeam_channel::Receiver;
use tracing::{debug, info, instrument, warn};

use pistreamer_ipc::{
    AggregateScope, ControllerEvent, EventBus, SourceCategory, SourceConfig, SourceStatus,
};

use crate::error::EngineError;
use crate::source::{PlaybackSource, SourceFactory};
use crate::store::ConfigEvent;
use crate::EngineResult;

/// Owns one handle per configuration record and the aggregate running flag.
///
/// Handles live in two ordered collections, one per category, whose indices
/// mirror the store's. A new handle is announced with
/// [`ControllerEvent::SourceReady`] only after it has been inserted, so a
/// subscriber reacting to the event can always reach it through
/// [`source_at_mut`](Self::source_at_mut).
pub struct SourceController {
    video: Vec<PlaybackSource>,
    audio: Vec<PlaybackSource>,
    factory: SourceFactory,
    scope: AggregateScope,
    running: bool,
    events: EventBus<ControllerEvent>,
}

impl SourceController {
    /// Create a handle for every record in `records`, in order.
    ///
    /// Each record goes through the same path as a live addition.
    pub fn new(
        records: impl IntoIterator<Item = SourceConfig>,
        factory: SourceFactory,
        scope: AggregateScope,
    ) -> Self {
        let mut controller = Self {
            video: Vec::new(),
            audio: Vec::new(),
            factory,
            scope,
            running: false,
            events: EventBus::new(),
        };

        for config in records {
            let index = controller.count_of(config.category());
            if let Err(e) = controller.handle_config_event(ConfigEvent::Added { index, config }) {
                warn!("Failed to create source: {}", e);
            }
        }

        info!(
            video = controller.video.len(),
            audio = controller.audio.len(),
            ?scope,
            "Source controller ready"
        );
        controller
    }

    pub fn subscribe(&mut self) -> Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    pub fn scope(&self) -> AggregateScope {
        self.scope
    }

    /// Last computed aggregate running flag.
    pub fn state(&self) -> bool {
        self.running
    }

    pub fn count_of(&self, category: SourceCategory) -> usize {
        self.collection(category).len()
    }

    pub fn source_at(&self, category: SourceCategory, index: usize) -> EngineResult<&PlaybackSource> {
        let sources = self.collection(category);
        let len = sources.len();
        sources.get(index).ok_or(EngineError::IndexOutOfRange {
            category,
            index,
            len,
        })
    }

    pub fn source_at_mut(
        &mut self,
        category: SourceCategory,
        index: usize,
    ) -> EngineResult<&mut PlaybackSource> {
        let sources = self.collection_mut(category);
        let len = sources.len();
        sources.get_mut(index).ok_or(EngineError::IndexOutOfRange {
            category,
            index,
            len,
        })
    }

    /// All handles, video first, in index order.
    pub fn sources(&self) -> impl Iterator<Item = &PlaybackSource> {
        self.video.iter().chain(self.audio.iter())
    }

    pub fn sources_mut(&mut self) -> impl Iterator<Item = &mut PlaybackSource> {
        self.video.iter_mut().chain(self.audio.iter_mut())
    }

    /// Apply one store mutation to the handle collections.
    #[instrument(name = "controller_config_event", skip_all)]
    pub fn handle_config_event(&mut self, event: ConfigEvent) -> EngineResult<()> {
        match event {
            ConfigEvent::Added { index, config } => {
                let category = config.category();
                let len = self.count_of(category);
                if index > len {
                    return Err(EngineError::IndexOutOfRange {
                        category,
                        index,
                        len,
                    });
                }

                let source = self.factory.create(config);
                let id = source.id();
                self.collection_mut(category).insert(index, source);
                info!(%category, index, source = %id, "Source added");

                self.events.publish(ControllerEvent::SourceReady {
                    category,
                    index,
                    source: id,
                });
            }
            ConfigEvent::Changed { index, config } => {
                let category = config.category();
                let source = self.source_at_mut(category, index)?;
                source.set_config(config);
                debug!(%category, index, source = %source.id(), "Source reconfigured");
            }
            ConfigEvent::Removed { category, index } => {
                self.source_at(category, index)?;
                // Dropping a running handle terminates its process or
                // resets its graph.
                let source = self.collection_mut(category).remove(index);
                let id = source.id();
                drop(source);
                info!(%category, index, source = %id, "Source removed");

                self.events.publish(ControllerEvent::SourceRemoved {
                    category,
                    index,
                    source: id,
                });
                self.recompute();
            }
        }
        Ok(())
    }

    /// Start every source. Failures are logged and kept as the source's
    /// last error; the remaining sources still start.
    #[instrument(name = "controller_start", skip(self))]
    pub fn start(&mut self) {
        info!("Starting all sources");
        for source in self.sources_mut() {
            if let Err(e) = source.start() {
                warn!(source = %source.id(), "Start failed: {}", e);
            }
        }
        self.recompute();
    }

    /// Stop every source.
    ///
    /// Video sources go idle once their process exit is observed by a
    /// later [`poll`](Self::poll).
    #[instrument(name = "controller_stop", skip(self))]
    pub fn stop(&mut self) {
        info!("Stopping all sources");
        for source in self.sources_mut() {
            if let Err(e) = source.stop() {
                warn!(source = %source.id(), "Stop failed: {}", e);
            }
        }
        self.recompute();
    }

    /// Let every source handle its pending notifications, then recompute
    /// the aggregate if any run state changed.
    pub fn poll(&mut self) {
        let mut changed = false;
        for source in self.sources_mut() {
            changed |= source.poll();
        }
        if changed {
            self.recompute();
        }
    }

    /// Point-in-time view of every source.
    pub fn status(&self) -> Vec<SourceStatus> {
        let describe = |index: usize, source: &PlaybackSource| SourceStatus {
            id: source.id(),
            category: source.category(),
            index,
            name: source.name().to_string(),
            state: source.state(),
            telemetry: source.telemetry(),
            last_error: source.last_error().map(str::to_string),
        };

        self.video
            .iter()
            .enumerate()
            .chain(self.audio.iter().enumerate())
            .map(|(index, source)| describe(index, source))
            .collect()
    }

    /// OR of the run states in scope; publishes only on change.
    fn recompute(&mut self) {
        let scope = self.scope;
        let running = self
            .sources()
            .filter(|source| scope.includes(source.category()))
            .any(|source| source.state().is_running());

        if running == self.running {
            return;
        }

        info!(running, "Aggregate state changed");
        self.running = running;
        self.events.publish(ControllerEvent::AggregateChanged(running));
    }

    fn collection(&self, category: SourceCategory) -> &Vec<PlaybackSource> {
        match category {
            SourceCategory::Video => &self.video,
            SourceCategory::Audio => &self.audio,
        }
    }

    fn collection_mut(&mut self, category: SourceCategory) -> &mut Vec<PlaybackSource> {
        match category {
            SourceCategory::Video => &mut self.video,
            SourceCategory::Audio => &mut self.audio,
        }
    }
}

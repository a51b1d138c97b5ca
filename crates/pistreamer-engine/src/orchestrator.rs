//! Engine command loop.

use std::sync::Arc;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use tracing::{debug, error, info, instrument, warn};

use pistreamer_audio::{audio_formats, enumerate_audio_devices, GraphBackend};
use pistreamer_ipc::{
    ControllerEvent, EngineCommand, EngineEvent, EngineStatus, SourceCategory, SourceEvent,
};
use pistreamer_video::{enumerate_video_devices, enumerate_video_formats, ProcessLauncher};

use crate::controller::SourceController;
use crate::settings::EngineSettings;
use crate::source::SourceFactory;
use crate::store::{ConfigEvent, ConfigStore};
use crate::EngineResult;

/// Owns the configuration store, the source controller and every source.
///
/// All of them are touched only from the thread running [`Engine::run`].
pub struct Engine {
    command_rx: Receiver<EngineCommand>,
    event_tx: Sender<EngineEvent>,
    settings: EngineSettings,
    store: ConfigStore,
    config_rx: Receiver<ConfigEvent>,
    controller: SourceController,
    controller_rx: Receiver<ControllerEvent>,
    telemetry_tx: Sender<SourceEvent>,
    telemetry_rx: Receiver<SourceEvent>,
}

impl Engine {
    /// Create an engine over `store`, with one handle per stored record.
    pub fn new(
        command_rx: Receiver<EngineCommand>,
        event_tx: Sender<EngineEvent>,
        mut store: ConfigStore,
        launcher: Arc<dyn ProcessLauncher>,
        backend: Arc<dyn GraphBackend>,
    ) -> Self {
        let settings = EngineSettings::from_settings(store.settings());
        debug!(?settings, "Engine settings");

        let factory = SourceFactory::new(launcher, settings.launch_options(), backend);
        let mut controller =
            SourceController::new(store.records(), factory, settings.aggregate_scope);

        let config_rx = store.subscribe();
        let controller_rx = controller.subscribe();
        let (telemetry_tx, telemetry_rx) = crossbeam_channel::unbounded();
        for source in controller.sources_mut() {
            source.subscribe_with(telemetry_tx.clone());
        }

        Self {
            command_rx,
            event_tx,
            settings,
            store,
            config_rx,
            controller,
            controller_rx,
            telemetry_tx,
            telemetry_rx,
        }
    }

    /// Run the engine (blocking).
    #[instrument(name = "engine_run", skip(self))]
    pub fn run(&mut self) {
        info!("Engine starting");
        self.send_event(EngineEvent::Ready);

        loop {
            match self.command_rx.recv_timeout(self.settings.poll_interval) {
                Ok(command) => {
                    if !self.handle_command(command) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    info!("Command channel disconnected, shutting down");
                    self.shutdown();
                    break;
                }
            }

            self.controller.poll();
            self.forward_events();
        }

        info!("Engine stopped");
    }

    /// Handle a command. Returns false if engine should stop.
    fn handle_command(&mut self, command: EngineCommand) -> bool {
        debug!(?command, "Handling command");

        match command {
            EngineCommand::Start => self.controller.start(),
            EngineCommand::Stop => self.controller.stop(),
            EngineCommand::AddSource(config) => {
                let result = self.store.add(config).map(|_| ());
                self.apply_config(result);
            }
            EngineCommand::UpdateSource { index, config } => {
                let result = self.store.update(index, config);
                self.apply_config(result);
            }
            EngineCommand::RemoveSource { category, index } => {
                let result = self.store.remove(category, index).map(|_| ());
                self.apply_config(result);
            }
            EngineCommand::GetStatus => self.send_status(),
            EngineCommand::GetVideoDevices => {
                self.send_event(EngineEvent::VideoDevices(enumerate_video_devices()))
            }
            EngineCommand::GetVideoFormats { device } => {
                let formats = enumerate_video_formats(&self.settings.ffmpeg_path, &device);
                self.send_event(EngineEvent::VideoFormats { device, formats });
            }
            EngineCommand::GetAudioDevices => {
                self.send_event(EngineEvent::AudioDevices(enumerate_audio_devices()))
            }
            EngineCommand::GetAudioFormats => {
                self.send_event(EngineEvent::AudioFormats(audio_formats()))
            }
            EngineCommand::Shutdown => {
                self.shutdown();
                self.send_event(EngineEvent::Shutdown);
                return false;
            }
        }

        true
    }

    /// Report a store failure, then hand every saved mutation to the
    /// controller.
    fn apply_config(&mut self, result: EngineResult<()>) {
        if let Err(e) = result {
            error!("Configuration change failed: {}", e);
            self.send_error(e.to_string());
        }

        let pending: Vec<ConfigEvent> = self.config_rx.try_iter().collect();
        for event in pending {
            if let Err(e) = self.controller.handle_config_event(event) {
                error!("Source controller out of step with configuration: {}", e);
                self.send_error(e.to_string());
            }
        }
    }

    /// Forward controller and telemetry events to the UI.
    ///
    /// Newly ready sources are subscribed before their announcement is
    /// forwarded.
    fn forward_events(&mut self) {
        let controller_events: Vec<ControllerEvent> = self.controller_rx.try_iter().collect();
        for event in controller_events {
            if let ControllerEvent::SourceReady {
                category, index, ..
            } = &event
            {
                self.subscribe_source(*category, *index);
            }
            self.send_event(EngineEvent::Controller(event));
        }

        let telemetry: Vec<SourceEvent> = self.telemetry_rx.try_iter().collect();
        for event in telemetry {
            self.send_telemetry(event);
        }
    }

    fn subscribe_source(&mut self, category: SourceCategory, index: usize) {
        match self.controller.source_at_mut(category, index) {
            Ok(source) => source.subscribe_with(self.telemetry_tx.clone()),
            Err(e) => warn!("Ready source vanished before subscription: {}", e),
        }
    }

    fn send_status(&self) {
        self.send_event(EngineEvent::Status(EngineStatus {
            running: self.controller.state(),
            scope: self.controller.scope(),
            sources: self.controller.status(),
        }));
    }

    /// Stop every source and flush what they reported.
    #[instrument(name = "engine_shutdown", skip(self))]
    fn shutdown(&mut self) {
        info!("Shutting down sources");
        self.controller.stop();
        self.controller.poll();
        self.forward_events();
    }

    fn send_error(&self, message: String) {
        self.send_event(EngineEvent::Error { message });
    }

    /// Deliver an event the UI cannot recover if lost, waiting for room.
    ///
    /// Aggregate changes are edge-triggered and replies answer a single
    /// command, so neither may be dropped on a full channel.
    fn send_event(&self, event: EngineEvent) {
        if let Err(e) = self.event_tx.send(event) {
            warn!("Failed to send event: {}", e);
        }
    }

    /// Telemetry is superseded by the next sample, so a full channel drops it.
    fn send_telemetry(&self, event: SourceEvent) {
        match self.event_tx.try_send(EngineEvent::Telemetry(event)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => debug!("Event channel full, dropping telemetry"),
            Err(TrySendError::Disconnected(_)) => warn!("Event channel disconnected"),
        }
    }
}

//! Process-backed video source.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, info, instrument, trace, warn};

use pistreamer_ipc::{
    EventBus, RunState, SourceEvent, SourceEventKind, SourceId, Telemetry, VideoConfig,
};

use crate::args::{build_args, DEFAULT_CAPTURE_BACKEND};
use crate::launcher::{ProcessHandle, ProcessLauncher, ProcessNotification};
use crate::telemetry::parse_progress;
use crate::VideoResult;

/// How the encoder process is invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    /// Encoder executable.
    pub program: String,

    /// Capture backend for the input stage.
    pub capture_backend: String,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            program: "ffmpeg".to_string(),
            capture_backend: DEFAULT_CAPTURE_BACKEND.to_string(),
        }
    }
}

/// A video source backed by one external encoder process.
///
/// `Idle -> Running` only through [`start`](Self::start); `Running -> Idle`
/// when the process exit is observed, whether requested by
/// [`stop`](Self::stop) or not.
///
/// Stopping sends a graceful termination request and relies on the process
/// exiting. That is enough for the streaming muxers used here, which need no
/// trailer; a file muxer would need a finalization step first.
pub struct ProcessSource {
    id: SourceId,
    config: VideoConfig,
    options: LaunchOptions,
    launcher: Arc<dyn ProcessLauncher>,
    process: Option<Box<dyn ProcessHandle>>,
    notify_rx: Option<Receiver<ProcessNotification>>,
    state: RunState,
    telemetry: Telemetry,
    stop_requested: bool,
    last_error: Option<String>,
    events: EventBus<SourceEvent>,
}

impl ProcessSource {
    /// Create an idle source bound to `config`.
    pub fn new(
        id: SourceId,
        config: VideoConfig,
        options: LaunchOptions,
        launcher: Arc<dyn ProcessLauncher>,
    ) -> Self {
        Self {
            id,
            config,
            options,
            launcher,
            process: None,
            notify_rx: None,
            state: RunState::Idle,
            telemetry: Telemetry::default(),
            stop_requested: false,
            last_error: None,
            events: EventBus::new(),
        }
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    pub fn config(&self) -> &VideoConfig {
        &self.config
    }

    /// Replace the configuration. A running process keeps its arguments
    /// until the next start.
    pub fn set_config(&mut self, config: VideoConfig) {
        debug!(source = %self.id, name = %config.name, "Video configuration replaced");
        self.config = config;
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

    /// Subscribe to this source's events.
    pub fn subscribe(&mut self) -> Receiver<SourceEvent> {
        self.events.subscribe()
    }

    /// Subscribe an existing sender to this source's events.
    pub fn subscribe_with(&mut self, tx: Sender<SourceEvent>) {
        self.events.subscribe_with(tx);
    }

    /// Encoder arguments for the current configuration.
    pub fn args(&self) -> Vec<String> {
        build_args(&self.config, &self.options.capture_backend)
    }

    /// Launch the encoder. Does nothing unless idle.
    ///
    /// Device and address are not validated; problems show up as an exit.
    #[instrument(name = "video_start", skip(self), fields(source = %self.id))]
    pub fn start(&mut self) -> VideoResult<()> {
        if self.state.is_running() {
            debug!("Already running, ignoring start");
            return Ok(());
        }

        let args = self.args();
        info!("Running: {} {}", self.options.program, args.join(" "));

        let (tx, rx) = crossbeam_channel::unbounded();
        match self.launcher.launch(&self.options.program, &args, tx) {
            Ok(process) => {
                self.process = Some(process);
                self.notify_rx = Some(rx);
                self.stop_requested = false;
                self.last_error = None;
                self.set_state(RunState::Running);
                Ok(())
            }
            Err(e) => {
                self.fail(e.to_string());
                Err(e)
            }
        }
    }

    /// Request a graceful stop. Does nothing if idle.
    #[instrument(name = "video_stop", skip(self), fields(source = %self.id))]
    pub fn stop(&mut self) -> VideoResult<()> {
        if !self.state.is_running() {
            debug!("Already idle, ignoring stop");
            return Ok(());
        }

        if let Some(process) = self.process.as_mut() {
            info!(pid = process.id(), "Requesting encoder termination");
            process.terminate()?;
        }
        // Only a delivered request turns the coming exit into a clean stop.
        self.stop_requested = true;
        Ok(())
    }

    /// Handle pending process notifications.
    ///
    /// Returns true if the run state changed.
    pub fn poll(&mut self) -> bool {
        let Some(rx) = self.notify_rx.as_ref() else {
            return false;
        };

        let pending: Vec<ProcessNotification> = rx.try_iter().collect();
        let mut changed = false;
        for notification in pending {
            match notification {
                ProcessNotification::Diagnostic(chunk) => {
                    self.handle_diagnostic(&String::from_utf8_lossy(&chunk))
                }
                ProcessNotification::Exited(code) => {
                    self.handle_exit(code);
                    changed = true;
                }
            }
        }
        changed
    }

    fn handle_diagnostic(&mut self, text: &str) {
        trace!(source = %self.id, "{}", text.trim_end());

        let update = parse_progress(text);
        if let Some(frame) = update.frame {
            self.telemetry.frame = frame;
            self.publish(SourceEventKind::Frame(frame));
        }
        if let Some(fps) = update.fps {
            self.telemetry.fps = fps;
            self.publish(SourceEventKind::Fps(fps));
        }
        if let Some(bitrate) = update.bitrate_kbps {
            self.telemetry.bitrate_kbps = bitrate;
            self.publish(SourceEventKind::Bitrate(bitrate));
        }
    }

    fn handle_exit(&mut self, code: Option<i32>) {
        let requested = self.stop_requested;
        info!(source = %self.id, ?code, requested, "Encoder process exited");

        self.process = None;
        self.notify_rx = None;
        self.stop_requested = false;

        self.telemetry.reset();
        self.publish(SourceEventKind::Frame(0));
        self.publish(SourceEventKind::Fps(0.0));
        self.publish(SourceEventKind::Bitrate(0.0));

        if !requested && code != Some(0) {
            let reason = match code {
                Some(code) => format!("Encoder exited with code {code}"),
                None => "Encoder terminated by signal".to_string(),
            };
            self.fail(reason);
        }

        self.set_state(RunState::Idle);
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

impl Drop for ProcessSource {
    fn drop(&mut self) {
        if self.stop_requested {
            return;
        }
        if let Some(mut process) = self.process.take() {
            if let Err(e) = process.terminate() {
                warn!(source = %self.id, "Failed to stop encoder on drop: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use bytes::Bytes;
    use parking_lot::Mutex;

    use super::*;
    use crate::error::VideoError;

    /// Records launches and hands out the notify sender of each.
    #[derive(Default)]
    struct FakeLauncher {
        launches: Mutex<Vec<Vec<String>>>,
        notifiers: Mutex<Vec<Sender<ProcessNotification>>>,
        terminations: Arc<AtomicUsize>,
        fail: bool,
        fail_terminate: bool,
    }

    impl FakeLauncher {
        fn launch_count(&self) -> usize {
            self.launches.lock().len()
        }

        fn notify(&self, notification: ProcessNotification) {
            let notifiers = self.notifiers.lock();
            notifiers.last().unwrap().send(notification).unwrap();
        }
    }

    struct FakeProcess {
        terminations: Arc<AtomicUsize>,
        fail_terminate: bool,
    }

    impl ProcessHandle for FakeProcess {
        fn id(&self) -> u32 {
            4242
        }

        fn terminate(&mut self) -> VideoResult<()> {
            self.terminations.fetch_add(1, Ordering::SeqCst);
            if self.fail_terminate {
                return Err(VideoError::Terminate {
                    pid: 4242,
                    source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
                });
            }
            Ok(())
        }
    }

    impl ProcessLauncher for FakeLauncher {
        fn launch(
            &self,
            program: &str,
            args: &[String],
            notify: Sender<ProcessNotification>,
        ) -> VideoResult<Box<dyn ProcessHandle>> {
            if self.fail {
                return Err(VideoError::Spawn {
                    program: program.to_string(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                });
            }
            self.launches.lock().push(args.to_vec());
            self.notifiers.lock().push(notify);
            Ok(Box::new(FakeProcess {
                terminations: Arc::clone(&self.terminations),
                fail_terminate: self.fail_terminate,
            }))
        }
    }

    fn source(launcher: &Arc<FakeLauncher>) -> ProcessSource {
        let launcher: Arc<dyn ProcessLauncher> = launcher.clone();
        ProcessSource::new(
            SourceId(1),
            VideoConfig::default(),
            LaunchOptions::default(),
            launcher,
        )
    }

    fn kinds(rx: &Receiver<SourceEvent>) -> Vec<SourceEventKind> {
        rx.try_iter().map(|event| event.kind).collect()
    }

    #[test]
    fn test_start_launches_once_with_built_args() {
        let launcher = Arc::new(FakeLauncher::default());
        let mut source = source(&launcher);

        source.start().unwrap();
        source.start().unwrap();

        assert_eq!(launcher.launch_count(), 1);
        assert_eq!(launcher.launches.lock()[0], source.args());
        assert_eq!(source.state(), RunState::Running);
    }

    #[test]
    fn test_stop_requests_termination_and_waits_for_exit() {
        let launcher = Arc::new(FakeLauncher::default());
        let mut source = source(&launcher);
        source.start().unwrap();

        source.stop().unwrap();
        assert_eq!(launcher.terminations.load(Ordering::SeqCst), 1);
        assert_eq!(source.state(), RunState::Running);

        launcher.notify(ProcessNotification::Exited(Some(255)));
        assert!(source.poll());
        assert_eq!(source.state(), RunState::Idle);
        assert_eq!(source.last_error(), None);
    }

    #[test]
    fn test_stop_while_idle_is_noop() {
        let launcher = Arc::new(FakeLauncher::default());
        let mut source = source(&launcher);

        source.stop().unwrap();

        assert_eq!(launcher.terminations.load(Ordering::SeqCst), 0);
        assert!(!source.poll());
    }

    #[test]
    fn test_diagnostics_publish_telemetry() {
        let launcher = Arc::new(FakeLauncher::default());
        let mut source = source(&launcher);
        let rx = source.subscribe();
        source.start().unwrap();

        launcher.notify(ProcessNotification::Diagnostic(Bytes::from_static(
            b"frame=  120 fps= 59.9 q=23.0 size=  340kB time=00:00:02.00 bitrate=1392.1kbits/s speed=1.0x",
        )));
        assert!(!source.poll());

        assert_eq!(
            kinds(&rx),
            vec![
                SourceEventKind::RunState(RunState::Running),
                SourceEventKind::Frame(120),
                SourceEventKind::Fps(59.9),
                SourceEventKind::Bitrate(1392.1),
            ]
        );
        assert_eq!(source.telemetry().frame, 120);
    }

    #[test]
    fn test_partial_chunk_only_emits_present_fields() {
        let launcher = Arc::new(FakeLauncher::default());
        let mut source = source(&launcher);
        source.start().unwrap();
        let rx = source.subscribe();

        launcher.notify(ProcessNotification::Diagnostic(Bytes::from_static(b"fps= 30.0")));
        source.poll();

        assert_eq!(kinds(&rx), vec![SourceEventKind::Fps(30.0)]);
        assert_eq!(source.last_error(), None);
    }

    #[test]
    fn test_exit_zeroes_telemetry_and_goes_idle() {
        let launcher = Arc::new(FakeLauncher::default());
        let mut source = source(&launcher);
        source.start().unwrap();
        launcher.notify(ProcessNotification::Diagnostic(Bytes::from_static(
            b"frame=  500 fps= 30.0 bitrate=900.0kbits/s",
        )));
        source.poll();
        let rx = source.subscribe();

        launcher.notify(ProcessNotification::Exited(Some(1)));
        assert!(source.poll());

        assert_eq!(source.telemetry(), Telemetry::default());
        assert_eq!(source.state(), RunState::Idle);
        assert_eq!(
            kinds(&rx),
            vec![
                SourceEventKind::Frame(0),
                SourceEventKind::Fps(0.0),
                SourceEventKind::Bitrate(0.0),
                SourceEventKind::Error("Encoder exited with code 1".to_string()),
                SourceEventKind::RunState(RunState::Idle),
            ]
        );
        assert_eq!(source.last_error(), Some("Encoder exited with code 1"));
    }

    #[test]
    fn test_restart_after_exit_launches_again() {
        let launcher = Arc::new(FakeLauncher::default());
        let mut source = source(&launcher);
        source.start().unwrap();
        launcher.notify(ProcessNotification::Exited(Some(1)));
        source.poll();

        source.start().unwrap();

        assert_eq!(launcher.launch_count(), 2);
        assert_eq!(source.state(), RunState::Running);
        assert_eq!(source.last_error(), None);
    }

    #[test]
    fn test_spawn_failure_stays_idle_with_reason() {
        let launcher = Arc::new(FakeLauncher {
            fail: true,
            ..Default::default()
        });
        let mut source = source(&launcher);

        assert!(source.start().is_err());
        assert_eq!(source.state(), RunState::Idle);
        assert!(source.last_error().unwrap().contains("ffmpeg"));
    }

    #[test]
    fn test_config_change_applies_on_next_start() {
        let launcher = Arc::new(FakeLauncher::default());
        let mut source = source(&launcher);
        source.start().unwrap();

        source.set_config(VideoConfig {
            device: "/dev/video2".to_string(),
            ..Default::default()
        });
        assert!(launcher.launches.lock()[0].contains(&"/dev/video0".to_string()));

        launcher.notify(ProcessNotification::Exited(Some(0)));
        source.poll();
        source.start().unwrap();
        assert!(launcher.launches.lock()[1].contains(&"/dev/video2".to_string()));
    }

    #[test]
    fn test_drop_terminates_running_process() {
        let launcher = Arc::new(FakeLauncher::default());
        let mut source = source(&launcher);
        source.start().unwrap();

        drop(source);

        assert_eq!(launcher.terminations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_stop_keeps_crash_reporting_and_drop_cleanup() {
        let launcher = Arc::new(FakeLauncher {
            fail_terminate: true,
            ..Default::default()
        });
        let mut source = source(&launcher);
        source.start().unwrap();

        assert!(matches!(source.stop(), Err(VideoError::Terminate { .. })));

        launcher.notify(ProcessNotification::Exited(Some(1)));
        assert!(source.poll());
        assert_eq!(source.state(), RunState::Idle);
        assert_eq!(source.last_error(), Some("Encoder exited with code 1"));
    }

    #[test]
    fn test_drop_after_failed_stop_retries_termination() {
        let launcher = Arc::new(FakeLauncher {
            fail_terminate: true,
            ..Default::default()
        });
        let mut source = source(&launcher);
        source.start().unwrap();
        assert!(source.stop().is_err());

        drop(source);

        assert_eq!(launcher.terminations.load(Ordering::SeqCst), 2);
    }
}

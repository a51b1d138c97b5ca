//! Test doubles for the process launcher and graph backend.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_channel::Sender;
use parking_lot::Mutex;

use pistreamer_audio::{AudioResult, BusMessage, GraphBackend, MediaGraph, TapSink};
use pistreamer_video::{
    LaunchOptions, ProcessHandle, ProcessLauncher, ProcessNotification, VideoResult,
};

use crate::source::SourceFactory;

/// Records launches and lets tests deliver notifications to each.
#[derive(Default)]
pub struct FakeLauncher {
    launches: Mutex<Vec<(Vec<String>, Sender<ProcessNotification>)>>,
    pub terminations: Arc<AtomicUsize>,
}

impl FakeLauncher {
    pub fn launch_count(&self) -> usize {
        self.launches.lock().len()
    }

    pub fn args(&self, launch: usize) -> Vec<String> {
        self.launches.lock()[launch].0.clone()
    }

    pub fn notify(&self, launch: usize, notification: ProcessNotification) {
        let launches = self.launches.lock();
        launches[launch].1.send(notification).unwrap();
    }

    pub fn exit(&self, launch: usize, code: Option<i32>) {
        self.notify(launch, ProcessNotification::Exited(code));
    }

    pub fn terminations(&self) -> usize {
        self.terminations.load(Ordering::SeqCst)
    }
}

struct FakeProcess {
    terminations: Arc<AtomicUsize>,
}

impl ProcessHandle for FakeProcess {
    fn id(&self) -> u32 {
        1000
    }

    fn terminate(&mut self) -> VideoResult<()> {
        self.terminations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl ProcessLauncher for FakeLauncher {
    fn launch(
        &self,
        _program: &str,
        args: &[String],
        notify: Sender<ProcessNotification>,
    ) -> VideoResult<Box<dyn ProcessHandle>> {
        self.launches.lock().push((args.to_vec(), notify));
        Ok(Box::new(FakeProcess {
            terminations: Arc::clone(&self.terminations),
        }))
    }
}

#[derive(Default)]
pub struct GraphLog {
    pub descriptions: Vec<String>,
    pub plays: usize,
    pub resets: usize,
    pub bus: VecDeque<BusMessage>,
    pub taps: Vec<TapSink>,
}

/// Builds graphs that only record what happens to them.
#[derive(Default)]
pub struct FakeBackend {
    pub log: Arc<Mutex<GraphLog>>,
}

struct FakeGraph {
    log: Arc<Mutex<GraphLog>>,
}

impl MediaGraph for FakeGraph {
    fn play(&mut self) -> AudioResult<()> {
        self.log.lock().plays += 1;
        Ok(())
    }

    fn reset(&mut self) -> AudioResult<()> {
        self.log.lock().resets += 1;
        Ok(())
    }

    fn poll_bus(&mut self) -> Option<BusMessage> {
        self.log.lock().bus.pop_front()
    }
}

impl GraphBackend for FakeBackend {
    fn build(&self, description: &str, tap: TapSink) -> AudioResult<Box<dyn MediaGraph>> {
        let mut log = self.log.lock();
        log.descriptions.push(description.to_string());
        log.taps.push(tap);
        Ok(Box::new(FakeGraph {
            log: Arc::clone(&self.log),
        }))
    }
}

pub fn factory(launcher: &Arc<FakeLauncher>, backend: &Arc<FakeBackend>) -> SourceFactory {
    let launcher: Arc<dyn ProcessLauncher> = launcher.clone();
    let backend: Arc<dyn GraphBackend> = backend.clone();
    SourceFactory::new(launcher, LaunchOptions::default(), backend)
}

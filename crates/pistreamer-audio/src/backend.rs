//! Seam between audio sources and the media graph engine.

use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::Sender;
use parking_lot::Mutex;

use crate::error::AudioError;
use crate::sampler::BitrateSampler;
use crate::AudioResult;

/// Messages a running graph reports on its bus.
#[derive(Debug, Clone, PartialEq)]
pub enum BusMessage {
    Error(String),
    EndOfStream,
}

/// A constructed media graph.
pub trait MediaGraph: Send {
    /// Transition the graph to playing.
    fn play(&mut self) -> AudioResult<()>;

    /// Return the graph to its initial state, releasing the device.
    fn reset(&mut self) -> AudioResult<()>;

    /// Next pending bus message, if any.
    fn poll_bus(&mut self) -> Option<BusMessage>;
}

/// Builds graphs from a textual description.
pub trait GraphBackend: Send + Sync {
    /// Construct a graph, wiring its tap element to `tap`.
    fn build(&self, description: &str, tap: TapSink) -> AudioResult<Box<dyn MediaGraph>>;
}

/// Receiving end of the instrumentation tap.
///
/// The tap fires on the streaming thread for every buffer that passes the
/// encoder; the sampler is shared with the owning source so it can be
/// reset on start.
#[derive(Clone)]
pub struct TapSink {
    sampler: Arc<Mutex<BitrateSampler>>,
    tx: Sender<f32>,
}

impl TapSink {
    pub fn new(sampler: Arc<Mutex<BitrateSampler>>, tx: Sender<f32>) -> Self {
        Self { sampler, tx }
    }

    /// Count a buffer of `len` bytes delivered now.
    pub fn deliver(&self, len: usize) {
        self.deliver_at(len, Instant::now());
    }

    /// Count a buffer of `len` bytes delivered at `now`.
    pub fn deliver_at(&self, len: usize, now: Instant) {
        let sample = self.sampler.lock().record(len, now);
        if let Some(kbps) = sample {
            // Receiver is gone once the owning source dropped the graph.
            let _ = self.tx.send(kbps);
        }
    }
}

/// Backend used when no graph engine is compiled in.
#[derive(Debug, Default)]
pub struct UnavailableBackend;

impl GraphBackend for UnavailableBackend {
    fn build(&self, _description: &str, _tap: TapSink) -> AudioResult<Box<dyn MediaGraph>> {
        Err(AudioError::BackendUnavailable)
    }
}

/// The graph backend selected at compile time.
pub fn default_backend() -> AudioResult<Arc<dyn GraphBackend>> {
    #[cfg(feature = "gstreamer")]
    let backend: Arc<dyn GraphBackend> = Arc::new(crate::gst::GstBackend::new()?);

    #[cfg(not(feature = "gstreamer"))]
    let backend: Arc<dyn GraphBackend> = Arc::new(UnavailableBackend);

    Ok(backend)
}

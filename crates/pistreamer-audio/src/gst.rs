//! GStreamer implementation of the graph backend.

use gstreamer as gst;
use gst::prelude::*;
use tracing::{debug, info, warn};

use crate::backend::{BusMessage, GraphBackend, MediaGraph, TapSink};
use crate::error::AudioError;
use crate::graph::TAP_NAME;
use crate::AudioResult;

/// Builds pipelines with `gst::parse::launch`.
#[derive(Debug)]
pub struct GstBackend;

impl GstBackend {
    /// Initialize the library. Safe to call more than once.
    pub fn new() -> AudioResult<Self> {
        gst::init().map_err(|e| AudioError::Construction(e.to_string()))?;
        info!(version = %gst::version_string(), "GStreamer initialized");
        Ok(Self)
    }
}

impl GraphBackend for GstBackend {
    fn build(&self, description: &str, tap: TapSink) -> AudioResult<Box<dyn MediaGraph>> {
        let pipeline = gst::parse::launch(description)
            .map_err(|e| AudioError::Construction(e.to_string()))?
            .downcast::<gst::Pipeline>()
            .map_err(|_| AudioError::Construction("description is not a pipeline".to_string()))?;

        let identity = pipeline.by_name(TAP_NAME).ok_or_else(|| {
            AudioError::Construction(format!("element {TAP_NAME} not found"))
        })?;

        identity.connect("handoff", false, move |values| {
            if let Some(Ok(buffer)) = values.get(1).map(|value| value.get::<gst::Buffer>()) {
                tap.deliver(buffer.size());
            }
            None
        });

        let bus = pipeline
            .bus()
            .ok_or_else(|| AudioError::Construction("pipeline has no bus".to_string()))?;

        debug!("Pipeline constructed");
        Ok(Box::new(GstGraph { pipeline, bus }))
    }
}

struct GstGraph {
    pipeline: gst::Pipeline,
    bus: gst::Bus,
}

impl GstGraph {
    fn set_state(&self, state: gst::State) -> AudioResult<()> {
        self.pipeline
            .set_state(state)
            .map(|_| ())
            .map_err(|e| AudioError::StateChange(format!("{state:?}: {e}")))
    }
}

impl MediaGraph for GstGraph {
    fn play(&mut self) -> AudioResult<()> {
        self.set_state(gst::State::Playing)
    }

    fn reset(&mut self) -> AudioResult<()> {
        self.set_state(gst::State::Null)
    }

    fn poll_bus(&mut self) -> Option<BusMessage> {
        while let Some(message) = self.bus.pop() {
            match message.view() {
                gst::MessageView::Error(err) => {
                    let mut reason = err.error().to_string();
                    if let Some(debug) = err.debug() {
                        reason = format!("{reason} ({debug})");
                    }
                    return Some(BusMessage::Error(reason));
                }
                gst::MessageView::Eos(_) => return Some(BusMessage::EndOfStream),
                _ => {}
            }
        }
        None
    }
}

impl Drop for GstGraph {
    fn drop(&mut self) {
        if let Err(e) = self.set_state(gst::State::Null) {
            warn!("Failed to release pipeline: {}", e);
        }
    }
}

//! Graph-backed audio sources.
//!
//! Each [`GraphSource`] owns one persistent processing graph built from a
//! textual description: ALSA capture, conversion, Opus encoding, an
//! instrumentation tap, MPEG-TS muxing and a UDP sink. Encoded data passing
//! the tap feeds a [`BitrateSampler`].
//!
//! Graphs are constructed through the [`GraphBackend`] trait. With the
//! `gstreamer` feature enabled, [`default_backend`] returns a GStreamer
//! backend; without it every build fails with
//! [`AudioError::BackendUnavailable`] and sources stay idle.

mod backend;
mod device;
mod error;
mod graph;
#[cfg(feature = "gstreamer")]
mod gst;
mod sampler;
mod source;

pub use backend::{default_backend, BusMessage, GraphBackend, MediaGraph, TapSink, UnavailableBackend};
pub use device::{audio_formats, enumerate_audio_devices, parse_device_list};
pub use error::AudioError;
pub use graph::{build_description, parse_destination, Destination, OPUS_BITRATE, SAMPLE_RATE, TAP_NAME};
#[cfg(feature = "gstreamer")]
pub use gst::GstBackend;
pub use sampler::{BitrateSampler, SAMPLE_WINDOW};
pub use source::GraphSource;

/// Result type for audio operations.
pub type AudioResult<T> = Result<T, AudioError>;

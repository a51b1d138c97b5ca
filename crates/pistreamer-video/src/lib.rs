//! Process-backed video sources.
//!
//! Each source drives one external encoder process: the argument vector is
//! derived from a [`VideoConfig`](pistreamer_ipc::VideoConfig), the process's
//! stderr is scanned for progress, and its exit returns the source to idle.

mod args;
mod error;
mod launcher;
mod probe;
mod source;
mod telemetry;

pub use args::{build_args, select_muxer, DEFAULT_CAPTURE_BACKEND, MUXER_MJPEG, MUXER_MPEGTS};
pub use error::VideoError;
pub use launcher::{ProcessHandle, ProcessLauncher, ProcessNotification, SystemLauncher};
pub use probe::{enumerate_video_devices, enumerate_video_formats, parse_device_info, parse_format_list};
pub use source::{LaunchOptions, ProcessSource};
pub use telemetry::{parse_progress, ProgressUpdate};

/// Result type for video operations.
pub type VideoResult<T> = Result<T, VideoError>;

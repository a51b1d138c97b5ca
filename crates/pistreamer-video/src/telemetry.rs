//! Progress extraction from the encoder's diagnostic stream.
//!
//! The stream is chunked arbitrarily. Each chunk is searched on its own for
//! a frame counter, a frame rate and a bitrate; any subset may be present.

use std::sync::LazyLock;

use regex::Regex;

static FRAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"frame=\s*(\d+)").unwrap());
static FPS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"fps=\s*([\d.]+)").unwrap());
static BITRATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"bitrate=\s*([\d.]+\w+)").unwrap());

/// Fields found in one diagnostic chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProgressUpdate {
    pub frame: Option<u64>,
    pub fps: Option<f32>,
    pub bitrate_kbps: Option<f32>,
}

impl ProgressUpdate {
    /// Returns true if no field was found.
    pub fn is_empty(&self) -> bool {
        self.frame.is_none() && self.fps.is_none() && self.bitrate_kbps.is_none()
    }
}

/// Search `chunk` for progress fields. Missing or unparsable fields are
/// left as `None`.
pub fn parse_progress(chunk: &str) -> ProgressUpdate {
    ProgressUpdate {
        frame: capture(&FRAME_RE, chunk).and_then(|v| v.parse().ok()),
        fps: capture(&FPS_RE, chunk).and_then(|v| v.parse().ok()),
        bitrate_kbps: capture(&BITRATE_RE, chunk).and_then(parse_bitrate),
    }
}

fn capture<'a>(re: &Regex, text: &'a str) -> Option<&'a str> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Strip the unit suffix ("kbits/s") and parse the number in front of it.
fn parse_bitrate(value: &str) -> Option<f32> {
    value
        .trim_end_matches(|c: char| !(c.is_ascii_digit() || c == '.'))
        .parse()
        .ok()
}

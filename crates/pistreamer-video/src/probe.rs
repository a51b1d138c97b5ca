//! V4L2 capture device and format enumeration.

use std::fs;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument, warn};

use pistreamer_ipc::probe::{capture_output, PROBE_TIMEOUT};
use pistreamer_ipc::{VideoDevice, VideoFormat};

static CARD_TYPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Card type\s*:\s*(.+)").unwrap());

/// `[video4linux2,v4l2 @ 0x...] Raw : yuyv422 : YUYV 4:2:2 : 640x480 1280x720`
///
/// The descriptive name may itself contain colons, so the last field is
/// only split off at a space-delimited colon.
static FORMAT_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\] (\w+)\s*:\s*(\w+)\s*:\s*(.+)\s+:\s+(.+)").unwrap());

const CAPTURE_CAPABILITY: &str = "Video Capture\n";

/// Enumerate V4L2 devices that can capture video.
#[instrument(name = "enumerate_video_devices")]
pub fn enumerate_video_devices() -> Vec<VideoDevice> {
    let mut paths: Vec<String> = match fs::read_dir("/dev") {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with("video"))
            .map(|entry| entry.path().to_string_lossy().into_owned())
            .collect(),
        Err(e) => {
            warn!("Failed to list /dev: {}", e);
            return Vec::new();
        }
    };
    paths.sort();

    let mut devices = Vec::new();
    for path in paths {
        let device_arg = format!("--device={path}");
        match capture_output("v4l2-ctl", &[&device_arg, "-D"], PROBE_TIMEOUT) {
            Ok(Some(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                if let Some(device) = parse_device_info(&path, &stdout) {
                    devices.push(device);
                }
            }
            Ok(None) => {}
            Err(e) => warn!(path, "Failed to query device: {}", e),
        }
    }

    debug!(count = devices.len(), "Enumerated video devices");
    devices
}

/// Interpret `v4l2-ctl -D` output for `path`.
///
/// A capture node lists "Video Capture" under both its driver and device
/// capabilities; metadata nodes list it at most once.
pub fn parse_device_info(path: &str, output: &str) -> Option<VideoDevice> {
    if output.matches(CAPTURE_CAPABILITY).count() <= 1 {
        return None;
    }

    let card = CARD_TYPE_RE
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| "Unknown".to_string());

    Some(VideoDevice {
        label: format!("{card} ({path})"),
        path: path.to_string(),
    })
}

/// Enumerate the formats a capture device supports.
#[instrument(name = "enumerate_video_formats")]
pub fn enumerate_video_formats(program: &str, device: &str) -> Vec<VideoFormat> {
    let args = ["-f", "v4l2", "-list_formats", "all", "-i", device];
    match capture_output(program, &args, PROBE_TIMEOUT) {
        Ok(Some(output)) => parse_format_list(&String::from_utf8_lossy(&output.stderr)),
        Ok(None) => Vec::new(),
        Err(e) => {
            warn!("Failed to list formats: {}", e);
            Vec::new()
        }
    }
}

/// Parse the format listing the encoder prints on stderr.
pub fn parse_format_list(stderr: &str) -> Vec<VideoFormat> {
    stderr
        .lines()
        .filter_map(|line| FORMAT_LINE_RE.captures(line))
        .filter(|caps| &caps[2] != "Unsupported")
        .map(|caps| VideoFormat {
            compressed: &caps[1] == "Compressed",
            name: caps[2].to_string(),
            description: caps[3].trim().to_string(),
            resolutions: caps[4].split_whitespace().map(str::to_string).collect(),
        })
        .collect()
}

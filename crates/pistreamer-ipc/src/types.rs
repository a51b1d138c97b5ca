//! Common types used across IPC messages.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Configuration of one video source.
///
/// Missing fields fall back to the defaults the settings file has always
/// used, so partially written records still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Display name.
    pub name: String,

    /// Capture device path (e.g. "/dev/video0").
    pub device: String,

    /// Input pixel format short name (e.g. "mjpeg", "yuyv422").
    pub format: String,

    /// Capture width in pixels.
    pub width: u32,

    /// Capture height in pixels.
    pub height: u32,

    /// Requested capture framerate.
    pub framerate: u32,

    /// Encoder name ("copy", "libx264", ...).
    pub encoder: String,

    /// Constant rate factor, only used by quality-tunable encoders.
    pub crf: u32,

    /// Destination address (e.g. "udp://127.0.0.1:5000").
    pub address: String,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            name: "Default".to_string(),
            device: "/dev/video0".to_string(),
            format: String::new(),
            width: 1920,
            height: 1080,
            framerate: 60,
            encoder: "copy".to_string(),
            crf: 0,
            address: "udp://127.0.0.1:5000".to_string(),
        }
    }
}

/// Configuration of one audio source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Display name.
    pub name: String,

    /// ALSA hardware handle (e.g. "hw:1,0").
    pub device: String,

    /// Raw sample format (e.g. "S16LE").
    pub format: String,

    /// Channel count.
    pub channels: u32,

    /// Encoder name ("opus").
    pub encoder: String,

    /// Destination address, `scheme://host:port`.
    pub address: String,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            name: "Default".to_string(),
            device: "hw:1,0".to_string(),
            format: "S16LE".to_string(),
            channels: 2,
            encoder: "opus".to_string(),
            address: "udp://127.0.0.1:5000".to_string(),
        }
    }
}

/// Source category. Each category has its own ordered collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceCategory {
    /// Process-backed video source.
    Video,

    /// Graph-backed audio source.
    Audio,
}

impl SourceCategory {
    /// Returns the lowercase name used in logs and on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }
}

impl fmt::Display for SourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A configuration record of either category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SourceConfig {
    Video(VideoConfig),
    Audio(AudioConfig),
}

impl SourceConfig {
    /// The category this record belongs to.
    pub fn category(&self) -> SourceCategory {
        match self {
            Self::Video(_) => SourceCategory::Video,
            Self::Audio(_) => SourceCategory::Audio,
        }
    }

    /// Display name of the record.
    pub fn name(&self) -> &str {
        match self {
            Self::Video(config) => &config.name,
            Self::Audio(config) => &config.name,
        }
    }
}

/// Live throughput counters of a source.
///
/// Audio sources only ever report a bitrate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    /// Frames processed so far.
    pub frame: u64,

    /// Instantaneous frames per second.
    pub fps: f32,

    /// Bitrate in kbit/s.
    pub bitrate_kbps: f32,
}

impl Telemetry {
    /// Reset every counter to zero.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// A video capture device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoDevice {
    /// Display label, "<card> (<path>)".
    pub label: String,

    /// Device path.
    pub path: String,
}

/// A pixel format supported by a video capture device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoFormat {
    /// Whether the format is compressed (e.g. mjpeg).
    pub compressed: bool,

    /// Short name passed as the input format.
    pub name: String,

    /// Descriptive name for display.
    pub description: String,

    /// Supported resolutions, "WxH".
    pub resolutions: Vec<String>,
}

/// An audio capture device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioDevice {
    /// Display label.
    pub label: String,

    /// ALSA hardware handle, "hw:<card>,<device>".
    pub hw: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_config_defaults_fill_missing_fields() {
        let config: VideoConfig =
            serde_json::from_str(r#"{"name": "Cam", "encoder": "libx264"}"#).unwrap();

        assert_eq!(config.name, "Cam");
        assert_eq!(config.encoder, "libx264");
        assert_eq!(config.device, "/dev/video0");
        assert_eq!(config.width, 1920);
        assert_eq!(config.height, 1080);
        assert_eq!(config.address, "udp://127.0.0.1:5000");
    }

    #[test]
    fn test_audio_config_defaults() {
        let config: AudioConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, AudioConfig::default());
        assert_eq!(config.channels, 2);
    }

    #[test]
    fn test_source_config_category() {
        assert_eq!(
            SourceConfig::Video(VideoConfig::default()).category(),
            SourceCategory::Video
        );
        assert_eq!(
            SourceConfig::Audio(AudioConfig::default()).category(),
            SourceCategory::Audio
        );
        assert_eq!(SourceCategory::Audio.to_string(), "audio");
    }

    #[test]
    fn test_telemetry_reset() {
        let mut telemetry = Telemetry {
            frame: 10,
            fps: 30.0,
            bitrate_kbps: 1200.0,
        };
        telemetry.reset();
        assert_eq!(telemetry, Telemetry::default());
    }
}

//! Command line definition.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use pistreamer_ipc::{AudioConfig, SourceCategory, VideoConfig};

/// Supervise live video and audio sources.
#[derive(Debug, Parser)]
#[command(name = "pistreamer", version, about)]
pub struct Cli {
    /// Configuration file [default: <config dir>/pistreamer/config.json]
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the engine. Reads `start`, `stop`, `status` and `quit` from stdin.
    Run,

    /// Print the configured sources.
    List,

    /// Print the available capture devices and audio sample formats.
    Devices,

    /// Print the formats a video device offers.
    Formats {
        /// Device path, e.g. /dev/video0
        device: String,
    },

    /// Add a video source.
    AddVideo(VideoArgs),

    /// Add an audio source.
    AddAudio(AudioArgs),

    /// Remove a source by category and index.
    Remove {
        category: CategoryArg,
        index: usize,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CategoryArg {
    Video,
    Audio,
}

impl From<CategoryArg> for SourceCategory {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Video => SourceCategory::Video,
            CategoryArg::Audio => SourceCategory::Audio,
        }
    }
}

/// Video source fields; omitted ones take the record defaults.
#[derive(Debug, Args)]
pub struct VideoArgs {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub device: Option<String>,
    /// Input pixel format, e.g. mjpeg or yuyv422
    #[arg(long)]
    pub format: Option<String>,
    #[arg(long)]
    pub width: Option<u32>,
    #[arg(long)]
    pub height: Option<u32>,
    #[arg(long)]
    pub framerate: Option<u32>,
    /// `copy` or `libx264`
    #[arg(long)]
    pub encoder: Option<String>,
    #[arg(long)]
    pub crf: Option<u32>,
    /// Destination, e.g. udp://192.168.1.20:5000
    #[arg(long)]
    pub address: Option<String>,
}

impl VideoArgs {
    pub fn into_config(self) -> VideoConfig {
        let defaults = VideoConfig::default();
        VideoConfig {
            name: self.name.unwrap_or(defaults.name),
            device: self.device.unwrap_or(defaults.device),
            format: self.format.unwrap_or(defaults.format),
            width: self.width.unwrap_or(defaults.width),
            height: self.height.unwrap_or(defaults.height),
            framerate: self.framerate.unwrap_or(defaults.framerate),
            encoder: self.encoder.unwrap_or(defaults.encoder),
            crf: self.crf.unwrap_or(defaults.crf),
            address: self.address.unwrap_or(defaults.address),
        }
    }
}

/// Audio source fields; omitted ones take the record defaults.
#[derive(Debug, Args)]
pub struct AudioArgs {
    #[arg(long)]
    pub name: Option<String>,
    /// ALSA handle, e.g. hw:1,0
    #[arg(long)]
    pub device: Option<String>,
    #[arg(long)]
    pub format: Option<String>,
    #[arg(long)]
    pub channels: Option<u32>,
    #[arg(long)]
    pub encoder: Option<String>,
    #[arg(long)]
    pub address: Option<String>,
}

impl AudioArgs {
    pub fn into_config(self) -> AudioConfig {
        let defaults = AudioConfig::default();
        AudioConfig {
            name: self.name.unwrap_or(defaults.name),
            device: self.device.unwrap_or(defaults.device),
            format: self.format.unwrap_or(defaults.format),
            channels: self.channels.unwrap_or(defaults.channels),
            encoder: self.encoder.unwrap_or(defaults.encoder),
            address: self.address.unwrap_or(defaults.address),
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_add_video_fills_defaults() {
        let cli = Cli::parse_from([
            "pistreamer",
            "add-video",
            "--name",
            "cam",
            "--encoder",
            "libx264",
            "--crf",
            "23",
        ]);
        let Command::AddVideo(args) = cli.command else {
            panic!("expected add-video");
        };

        let config = args.into_config();
        assert_eq!(config.name, "cam");
        assert_eq!(config.encoder, "libx264");
        assert_eq!(config.crf, 23);
        assert_eq!(config.device, "/dev/video0");
        assert_eq!(config.framerate, 60);
    }

    #[test]
    fn test_remove_parses_category() {
        let cli = Cli::parse_from(["pistreamer", "--config", "/tmp/p.json", "remove", "audio", "2"]);

        assert_eq!(cli.config, Some(PathBuf::from("/tmp/p.json")));
        assert!(matches!(
            cli.command,
            Command::Remove {
                category: CategoryArg::Audio,
                index: 2
            }
        ));
    }
}

//! Subcommand implementations.

use std::io::{self, BufRead};
use std::path::Path;
use std::thread;

use anyhow::{anyhow, Context};
use crossbeam_channel::Receiver;
use tracing::{debug, error, info, warn};

use pistreamer_audio::{audio_formats, enumerate_audio_devices};
use pistreamer_engine::{create_engine, ConfigStore, EngineSettings};
use pistreamer_ipc::{
    command_channel, event_channel, AudioConfig, EngineCommand, EngineEvent, EngineStatus,
    SourceCategory, SourceConfig, SourceStatus, VideoConfig, VideoFormat,
};
use pistreamer_video::{enumerate_video_devices, enumerate_video_formats};

use crate::cli::{Cli, Command};
use crate::default_config_path;

/// Run the selected subcommand.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let path = match cli.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    debug!(path = %path.display(), "Using configuration file");

    match cli.command {
        Command::Run => run_engine(&path),
        Command::List => {
            let store = open_store(&path)?;
            for line in list_lines(&store) {
                println!("{line}");
            }
            Ok(())
        }
        Command::Devices => {
            for device in enumerate_video_devices() {
                println!("video  {}", device.label);
            }
            for device in enumerate_audio_devices() {
                println!("audio  {}", device.label);
            }
            println!("audio formats: {}", audio_formats().join(" "));
            Ok(())
        }
        Command::Formats { device } => {
            let store = open_store(&path)?;
            let settings = EngineSettings::from_settings(store.settings());
            for format in enumerate_video_formats(&settings.ffmpeg_path, &device) {
                println!("{}", format_line(&format));
            }
            Ok(())
        }
        Command::AddVideo(args) => add(&path, SourceConfig::Video(args.into_config())),
        Command::AddAudio(args) => add(&path, SourceConfig::Audio(args.into_config())),
        Command::Remove { category, index } => remove(&path, category.into(), index),
    }
}

fn open_store(path: &Path) -> anyhow::Result<ConfigStore> {
    ConfigStore::open(path).with_context(|| format!("Failed to load {}", path.display()))
}

fn add(path: &Path, config: SourceConfig) -> anyhow::Result<()> {
    let mut store = open_store(path)?;
    let category = config.category();
    let index = store.add(config)?;
    println!("Added {category} source {index}");
    Ok(())
}

fn remove(path: &Path, category: SourceCategory, index: usize) -> anyhow::Result<()> {
    let mut store = open_store(path)?;
    let removed = store.remove(category, index)?;
    println!("Removed {category} source {index} ({})", removed.name());
    Ok(())
}

/// Run the engine until `quit` or end of input.
fn run_engine(path: &Path) -> anyhow::Result<()> {
    let store = open_store(path)?;

    let (command_tx, command_rx) = command_channel();
    let (event_tx, event_rx) = event_channel();

    let mut engine = create_engine(command_rx, event_tx, store)?;
    let engine_thread = thread::Builder::new()
        .name("engine".to_string())
        .spawn(move || {
            info!("Engine thread starting");
            engine.run();
            info!("Engine thread stopped");
        })
        .context("Failed to spawn engine thread")?;

    let event_thread = thread::Builder::new()
        .name("events".to_string())
        .spawn(move || report_events(event_rx))
        .context("Failed to spawn event thread")?;

    for line in io::stdin().lock().lines() {
        let line = line.context("Failed to read stdin")?;
        let command = match line.trim() {
            "" => continue,
            "start" => EngineCommand::Start,
            "stop" => EngineCommand::Stop,
            "status" => EngineCommand::GetStatus,
            "quit" | "exit" => break,
            other => {
                warn!("Unknown command {:?}; expected start, stop, status or quit", other);
                continue;
            }
        };
        if command_tx.send(command).is_err() {
            break;
        }
    }

    // The engine may already be gone if its channel disconnected.
    let _ = command_tx.send(EngineCommand::Shutdown);
    engine_thread
        .join()
        .map_err(|_| anyhow!("Engine thread panicked"))?;
    event_thread
        .join()
        .map_err(|_| anyhow!("Event thread panicked"))?;
    Ok(())
}

/// Log every engine event until the engine drops its sender.
fn report_events(event_rx: Receiver<EngineEvent>) {
    for event in event_rx {
        match event {
            EngineEvent::Ready => info!("Engine ready"),
            EngineEvent::Controller(event) => info!(?event, "Controller"),
            EngineEvent::Telemetry(event) => debug!(source = %event.source, kind = ?event.kind, "Telemetry"),
            EngineEvent::Status(status) => {
                for line in status_lines(&status) {
                    println!("{line}");
                }
            }
            EngineEvent::Error { message } => error!("{}", message),
            EngineEvent::Shutdown => info!("Engine shut down"),
            other => debug!(?other, "Event"),
        }
    }
}

fn video_line(index: usize, config: &VideoConfig) -> String {
    format!(
        "video {index}: {} {} {}x{}@{} {} -> {}",
        config.name,
        config.device,
        config.width,
        config.height,
        config.framerate,
        config.encoder,
        config.address
    )
}

fn audio_line(index: usize, config: &AudioConfig) -> String {
    format!(
        "audio {index}: {} {} {} {}ch {} -> {}",
        config.name, config.device, config.format, config.channels, config.encoder, config.address
    )
}

fn list_lines(store: &ConfigStore) -> Vec<String> {
    store
        .video()
        .iter()
        .enumerate()
        .map(|(index, config)| video_line(index, config))
        .chain(
            store
                .audio()
                .iter()
                .enumerate()
                .map(|(index, config)| audio_line(index, config)),
        )
        .collect()
}

fn format_line(format: &VideoFormat) -> String {
    let kind = if format.compressed { "Compressed" } else { "Raw" };
    format!(
        "{kind:<10} {:<10} {}: {}",
        format.name,
        format.description,
        format.resolutions.join(" ")
    )
}

fn source_line(source: &SourceStatus) -> String {
    let mut line = format!(
        "{} {} {} [{}] {} frame={} fps={:.1} bitrate={:.1}kbit/s",
        source.category,
        source.index,
        source.name,
        source.id,
        source.state.name(),
        source.telemetry.frame,
        source.telemetry.fps,
        source.telemetry.bitrate_kbps
    );
    if let Some(error) = &source.last_error {
        line.push_str(&format!(" last error: {error}"));
    }
    line
}

fn status_lines(status: &EngineStatus) -> Vec<String> {
    let state = if status.running { "running" } else { "idle" };
    std::iter::once(format!("aggregate: {state} ({})", status.scope))
        .chain(status.sources.iter().map(source_line))
        .collect()
}

#[cfg(test)]
mod tests {
    use pistreamer_ipc::{AggregateScope, RunState, SourceId, Telemetry};

    use super::*;

    #[test]
    fn test_add_and_remove_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        add(&path, SourceConfig::Video(VideoConfig::default())).unwrap();
        add(
            &path,
            SourceConfig::Audio(AudioConfig {
                name: "mic".to_string(),
                ..Default::default()
            }),
        )
        .unwrap();
        remove(&path, SourceCategory::Video, 0).unwrap();

        let store = open_store(&path).unwrap();
        assert_eq!(
            list_lines(&store),
            vec!["audio 0: mic hw:1,0 S16LE 2ch opus -> udp://127.0.0.1:5000"]
        );
        assert!(remove(&path, SourceCategory::Video, 0).is_err());
    }

    #[test]
    fn test_video_line() {
        assert_eq!(
            video_line(1, &VideoConfig::default()),
            "video 1: Default /dev/video0 1920x1080@60 copy -> udp://127.0.0.1:5000"
        );
    }

    #[test]
    fn test_status_lines() {
        let status = EngineStatus {
            running: true,
            scope: AggregateScope::AllSources,
            sources: vec![SourceStatus {
                id: SourceId(2),
                category: SourceCategory::Video,
                index: 0,
                name: "cam".to_string(),
                state: RunState::Idle,
                telemetry: Telemetry::default(),
                last_error: Some("Encoder exited with code 1".to_string()),
            }],
        };

        assert_eq!(
            status_lines(&status),
            vec![
                "aggregate: running (all_sources)".to_string(),
                "video 0 cam [#2] Idle frame=0 fps=0.0 bitrate=0.0kbit/s last error: Encoder exited with code 1"
                    .to_string(),
            ]
        );
    }

    #[test]
    fn test_format_line() {
        let format = VideoFormat {
            compressed: true,
            name: "mjpeg".to_string(),
            description: "Motion-JPEG".to_string(),
            resolutions: vec!["640x480".to_string(), "1920x1080".to_string()],
        };

        assert_eq!(
            format_line(&format),
            "Compressed mjpeg      Motion-JPEG: 640x480 1920x1080"
        );
    }
}

//! Persisted source configuration.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use pistreamer_ipc::{AudioConfig, EventBus, SourceCategory, SourceConfig, VideoConfig};

use crate::error::EngineError;
use crate::settings::Settings;
use crate::EngineResult;

/// A mutation of the source collections, emitted after it was saved.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigEvent {
    /// A record was appended at `index`.
    Added { index: usize, config: SourceConfig },

    /// The record at `index` was replaced.
    Changed { index: usize, config: SourceConfig },

    /// The record at `index` was removed; later records shifted down.
    Removed {
        category: SourceCategory,
        index: usize,
    },
}

/// On-disk layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    settings: Settings,

    #[serde(default)]
    video: Vec<VideoConfig>,

    #[serde(default)]
    audio: Vec<AudioConfig>,
}

/// Ordered video and audio configuration records plus settings.
///
/// Every mutation writes the file first and then notifies subscribers.
pub struct ConfigStore {
    path: Option<PathBuf>,
    file: ConfigFile,
    events: EventBus<ConfigEvent>,
}

impl ConfigStore {
    /// Load `path`, or start empty if it does not exist yet.
    #[instrument(name = "config_open", skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref().to_path_buf();

        let file = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).map_err(|source| {
                EngineError::StoreFormat {
                    path: path.clone(),
                    source,
                }
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("No config file yet, starting empty");
                ConfigFile::default()
            }
            Err(source) => return Err(EngineError::StoreIo { path, source }),
        };

        debug!(
            video = file.video.len(),
            audio = file.audio.len(),
            "Configuration loaded"
        );

        Ok(Self {
            path: Some(path),
            file,
            events: EventBus::new(),
        })
    }

    /// A store that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            file: ConfigFile::default(),
            events: EventBus::new(),
        }
    }

    pub fn subscribe(&mut self) -> Receiver<ConfigEvent> {
        self.events.subscribe()
    }

    pub fn settings(&self) -> &Settings {
        &self.file.settings
    }

    /// Change one setting and save.
    pub fn set_setting<T: Serialize>(
        &mut self,
        namespace: &str,
        key: &str,
        value: T,
    ) -> EngineResult<()> {
        self.file.settings.set(namespace, key, value)?;
        self.save()
    }

    pub fn video(&self) -> &[VideoConfig] {
        &self.file.video
    }

    pub fn audio(&self) -> &[AudioConfig] {
        &self.file.audio
    }

    pub fn len(&self, category: SourceCategory) -> usize {
        match category {
            SourceCategory::Video => self.file.video.len(),
            SourceCategory::Audio => self.file.audio.len(),
        }
    }

    /// All records, video first, in index order.
    pub fn records(&self) -> Vec<SourceConfig> {
        self.file
            .video
            .iter()
            .cloned()
            .map(SourceConfig::Video)
            .chain(self.file.audio.iter().cloned().map(SourceConfig::Audio))
            .collect()
    }

    pub fn get(&self, category: SourceCategory, index: usize) -> EngineResult<SourceConfig> {
        self.check_index(category, index)?;
        Ok(match category {
            SourceCategory::Video => SourceConfig::Video(self.file.video[index].clone()),
            SourceCategory::Audio => SourceConfig::Audio(self.file.audio[index].clone()),
        })
    }

    /// Append a record. Returns its index.
    pub fn add(&mut self, config: SourceConfig) -> EngineResult<usize> {
        let index = match &config {
            SourceConfig::Video(video) => {
                self.file.video.push(video.clone());
                self.file.video.len() - 1
            }
            SourceConfig::Audio(audio) => {
                self.file.audio.push(audio.clone());
                self.file.audio.len() - 1
            }
        };

        info!(category = %config.category(), index, name = config.name(), "Source configuration added");
        self.commit(ConfigEvent::Added { index, config })?;
        Ok(index)
    }

    /// Replace the record at `index` of the record's category.
    pub fn update(&mut self, index: usize, config: SourceConfig) -> EngineResult<()> {
        self.check_index(config.category(), index)?;
        match &config {
            SourceConfig::Video(video) => self.file.video[index] = video.clone(),
            SourceConfig::Audio(audio) => self.file.audio[index] = audio.clone(),
        }

        info!(category = %config.category(), index, name = config.name(), "Source configuration changed");
        self.commit(ConfigEvent::Changed { index, config })
    }

    /// Remove the record at `index`. Later records shift down by one.
    pub fn remove(&mut self, category: SourceCategory, index: usize) -> EngineResult<SourceConfig> {
        self.check_index(category, index)?;
        let removed = match category {
            SourceCategory::Video => SourceConfig::Video(self.file.video.remove(index)),
            SourceCategory::Audio => SourceConfig::Audio(self.file.audio.remove(index)),
        };

        info!(%category, index, name = removed.name(), "Source configuration removed");
        self.commit(ConfigEvent::Removed { category, index })?;
        Ok(removed)
    }

    fn check_index(&self, category: SourceCategory, index: usize) -> EngineResult<()> {
        let len = self.len(category);
        if index >= len {
            return Err(EngineError::IndexOutOfRange {
                category,
                index,
                len,
            });
        }
        Ok(())
    }

    /// Save, then notify. Subscribers are notified even if the save failed
    /// so that they stay in step with the in-memory records.
    fn commit(&mut self, event: ConfigEvent) -> EngineResult<()> {
        let saved = self.save();
        self.events.publish(event);
        saved
    }

    fn save(&self) -> EngineResult<()> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };

        let io_err = |source| EngineError::StoreIo {
            path: path.clone(),
            source,
        };

        let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                fs::create_dir_all(parent).map_err(io_err)?;
                parent
            }
            None => Path::new("."),
        };

        let contents = serde_json::to_string_pretty(&self.file).map_err(|source| {
            EngineError::StoreFormat {
                path: path.clone(),
                source,
            }
        })?;

        // Readers see either the previous file or the complete new one.
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
        tmp.write_all(contents.as_bytes()).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(path).map_err(|e| io_err(e.error))?;

        debug!(path = %path.display(), "Configuration saved");
        Ok(())
    }
}

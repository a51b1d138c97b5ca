//! Namespaced key/value settings.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use pistreamer_ipc::AggregateScope;
use pistreamer_video::{LaunchOptions, DEFAULT_CAPTURE_BACKEND};

use crate::error::EngineError;
use crate::EngineResult;

/// Values addressed by `(namespace, key)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings {
    values: BTreeMap<String, BTreeMap<String, Value>>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Typed lookup. `Ok(None)` if the key is absent.
    pub fn get<T: DeserializeOwned>(&self, namespace: &str, key: &str) -> EngineResult<Option<T>> {
        let Some(value) = self.values.get(namespace).and_then(|keys| keys.get(key)) else {
            return Ok(None);
        };

        serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|source| EngineError::SettingType {
                namespace: namespace.to_string(),
                key: key.to_string(),
                source,
            })
    }

    /// Typed lookup falling back to `default` when absent or mistyped.
    pub fn get_or<T: DeserializeOwned>(&self, namespace: &str, key: &str, default: T) -> T {
        match self.get(namespace, key) {
            Ok(Some(value)) => value,
            Ok(None) => default,
            Err(e) => {
                warn!("{}, using default", e);
                default
            }
        }
    }

    pub fn set<T: Serialize>(&mut self, namespace: &str, key: &str, value: T) -> EngineResult<()> {
        let value = serde_json::to_value(value).map_err(|source| EngineError::SettingType {
            namespace: namespace.to_string(),
            key: key.to_string(),
            source,
        })?;

        self.values
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }
}

/// Namespace of the engine settings.
pub const ENGINE_NAMESPACE: &str = "engine";

/// Engine tunables read from [`Settings`].
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// Encoder executable for video sources.
    pub ffmpeg_path: String,

    /// Capture backend passed to the encoder.
    pub capture_backend: String,

    /// Which sources contribute to the aggregate running flag.
    pub aggregate_scope: AggregateScope,

    /// Period of the controller poll pass.
    pub poll_interval: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            capture_backend: DEFAULT_CAPTURE_BACKEND.to_string(),
            aggregate_scope: AggregateScope::default(),
            poll_interval: Duration::from_millis(50),
        }
    }
}

impl EngineSettings {
    /// Read the `engine.*` keys, defaulting each one that is missing.
    pub fn from_settings(settings: &Settings) -> Self {
        let defaults = Self::default();
        let poll_ms: u64 = settings.get_or(
            ENGINE_NAMESPACE,
            "poll_interval_ms",
            defaults.poll_interval.as_millis() as u64,
        );

        Self {
            ffmpeg_path: settings.get_or(ENGINE_NAMESPACE, "ffmpeg_path", defaults.ffmpeg_path),
            capture_backend: settings.get_or(
                ENGINE_NAMESPACE,
                "capture_backend",
                defaults.capture_backend,
            ),
            aggregate_scope: settings.get_or(
                ENGINE_NAMESPACE,
                "aggregate_scope",
                defaults.aggregate_scope,
            ),
            poll_interval: Duration::from_millis(poll_ms.max(1)),
        }
    }

    pub fn launch_options(&self) -> LaunchOptions {
        LaunchOptions {
            program: self.ffmpeg_path.clone(),
            capture_backend: self.capture_backend.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set() {
        let mut settings = Settings::new();
        settings.set("engine", "ffmpeg_path", "/opt/ffmpeg").unwrap();

        assert_eq!(
            settings.get::<String>("engine", "ffmpeg_path").unwrap(),
            Some("/opt/ffmpeg".to_string())
        );
        assert_eq!(settings.get::<String>("engine", "missing").unwrap(), None);
        assert_eq!(settings.get::<String>("other", "ffmpeg_path").unwrap(), None);
    }

    #[test]
    fn test_wrong_type() {
        let mut settings = Settings::new();
        settings.set("engine", "poll_interval_ms", "fast").unwrap();

        assert!(matches!(
            settings.get::<u64>("engine", "poll_interval_ms"),
            Err(EngineError::SettingType { .. })
        ));
        assert_eq!(settings.get_or("engine", "poll_interval_ms", 50u64), 50);
    }

    #[test]
    fn test_engine_defaults() {
        let engine = EngineSettings::from_settings(&Settings::new());
        assert_eq!(engine, EngineSettings::default());
        assert_eq!(engine.aggregate_scope, AggregateScope::VideoOnly);
        assert_eq!(engine.poll_interval, Duration::from_millis(50));
    }

    #[test]
    fn test_engine_overrides() {
        let mut settings = Settings::new();
        settings.set("engine", "aggregate_scope", "all_sources").unwrap();
        settings.set("engine", "poll_interval_ms", 20).unwrap();
        settings.set("engine", "capture_backend", "avfoundation").unwrap();

        let engine = EngineSettings::from_settings(&settings);

        assert_eq!(engine.aggregate_scope, AggregateScope::AllSources);
        assert_eq!(engine.poll_interval, Duration::from_millis(20));
        assert_eq!(engine.launch_options().capture_backend, "avfoundation");
        assert_eq!(engine.launch_options().program, "ffmpeg");
    }

    #[test]
    fn test_serializes_as_nested_map() {
        let mut settings = Settings::new();
        settings.set("engine", "poll_interval_ms", 50).unwrap();

        assert_eq!(
            serde_json::to_value(&settings).unwrap(),
            serde_json::json!({ "engine": { "poll_interval_ms": 50 } })
        );
    }
}

//! Source and engine state types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{SourceCategory, Telemetry};

/// Run state of a single source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    /// Not streaming. Initial state, and the state after any stop or exit.
    #[default]
    Idle,

    /// The backing process or graph is active.
    Running,
}

impl RunState {
    /// Returns true if the source is running.
    pub fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }

    /// Returns a simple string representation of the state.
    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Running => "Running",
        }
    }
}

/// Stable identity of a source handle.
///
/// Unlike the positional index, the id survives removals of other sources
/// and configuration changes of the source itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceId(pub u64);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which sources contribute to the aggregate running flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateScope {
    /// Only video sources are considered.
    #[default]
    VideoOnly,

    /// Video and audio sources are considered.
    AllSources,
}

impl AggregateScope {
    /// Returns true if sources of `category` count toward the aggregate.
    pub fn includes(self, category: SourceCategory) -> bool {
        match self {
            Self::VideoOnly => category == SourceCategory::Video,
            Self::AllSources => true,
        }
    }
}

impl fmt::Display for AggregateScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VideoOnly => write!(f, "video_only"),
            Self::AllSources => write!(f, "all_sources"),
        }
    }
}

/// Point-in-time view of one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceStatus {
    pub id: SourceId,
    pub category: SourceCategory,
    pub index: usize,
    pub name: String,
    pub state: RunState,
    pub telemetry: Telemetry,
    pub last_error: Option<String>,
}

/// Point-in-time view of the whole engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineStatus {
    /// Aggregate running flag.
    pub running: bool,

    /// Sources the aggregate flag is computed over.
    pub scope: AggregateScope,

    /// Every configured source, video first, in index order.
    pub sources: Vec<SourceStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_scope_includes() {
        assert!(AggregateScope::VideoOnly.includes(SourceCategory::Video));
        assert!(!AggregateScope::VideoOnly.includes(SourceCategory::Audio));
        assert!(AggregateScope::AllSources.includes(SourceCategory::Audio));
    }

    #[test]
    fn test_aggregate_scope_serde_names() {
        let scope: AggregateScope = serde_json::from_str(r#""all_sources""#).unwrap();
        assert_eq!(scope, AggregateScope::AllSources);
        assert_eq!(
            serde_json::to_string(&AggregateScope::VideoOnly).unwrap(),
            r#""video_only""#
        );
    }

    #[test]
    fn test_run_state_default_is_idle() {
        assert_eq!(RunState::default(), RunState::Idle);
        assert!(!RunState::Idle.is_running());
        assert!(RunState::Running.is_running());
    }
}

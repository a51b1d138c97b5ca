//! Headless front end for the pistreamer engine.

pub mod cli;
pub mod commands;

use std::path::PathBuf;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use cli::Cli;

/// Initialize logging.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "pistreamer=info,pistreamer_cli=info,pistreamer_engine=debug,pistreamer_video=info,pistreamer_audio=info".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// `<config dir>/pistreamer/config.json`
pub fn default_config_path() -> anyhow::Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("pistreamer").join("config.json"))
        .context("No configuration directory for this platform; pass --config")
}

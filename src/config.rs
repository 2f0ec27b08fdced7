use clap::Parser;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, ViewerError};

/// Command line flags; anything given here wins over every other source
#[derive(Debug, Default, Parser)]
#[command(name = "slice-viewer", version, about = "Live-reloading grid of page slice images")]
pub struct Cli {
    /// Directory holding "Slice <position>-<page>.png" images
    pub directory: Option<PathBuf>,

    /// Number of grid columns
    #[arg(short, long)]
    pub columns: Option<usize>,

    /// Quiet period after a change before reloading, in milliseconds (0 reloads on every event)
    #[arg(long, value_name = "MS")]
    pub debounce_ms: Option<u64>,

    /// Pixels scrolled per wheel notch
    #[arg(long, value_name = "PX")]
    pub scroll_step: Option<f32>,

    /// Read settings from this file instead of the user config file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Viewer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Watched directory (default: "./SQ Pages (KDN Baru) - 202")
    pub directory: PathBuf,
    /// Grid columns, filled right to left (default: 7)
    pub max_columns: usize,
    /// Reload quiet period in milliseconds (default: 200)
    pub debounce_ms: u64,
    /// Pixels per scroll unit (default: 60)
    pub scroll_step: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./SQ Pages (KDN Baru) - 202"),
            max_columns: 7,
            debounce_ms: 200,
            scroll_step: 60.0,
        }
    }
}

impl Settings {
    /// Load settings in order of priority:
    /// 1. Command line arguments
    /// 2. Environment variables (SLICE_VIEWER_MAX_COLUMNS, ...)
    /// 3. Config file (`--config`, or ~/.config/slice-viewer/config.toml)
    /// 4. Default values
    pub fn load(cli: &Cli) -> Result<Self> {
        let file = match &cli.config {
            Some(path) => Some((path.clone(), true)),
            None => Self::user_config_path()
                .filter(|path| path.exists())
                .map(|path| (path, false)),
        };

        let mut settings = Self::from_sources(file.as_ref().map(|(p, req)| (p.as_path(), *req)))?;
        settings.apply_cli(cli);
        settings.validate()?;

        tracing::debug!(?settings, "settings loaded");
        Ok(settings)
    }

    fn from_sources(file: Option<(&Path, bool)>) -> std::result::Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Some((path, required)) = file {
            tracing::info!(path = %path.display(), "Using config file");
            builder = builder.add_source(File::from(path).required(required));
        }

        builder = builder.add_source(Environment::with_prefix("SLICE_VIEWER").try_parsing(true));

        builder.build()?.try_deserialize()
    }

    fn apply_cli(&mut self, cli: &Cli) {
        if let Some(directory) = &cli.directory {
            self.directory = directory.clone();
        }
        if let Some(columns) = cli.columns {
            self.max_columns = columns;
        }
        if let Some(debounce_ms) = cli.debounce_ms {
            self.debounce_ms = debounce_ms;
        }
        if let Some(scroll_step) = cli.scroll_step {
            self.scroll_step = scroll_step;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.max_columns == 0 {
            return Err(ViewerError::InvalidColumns(self.max_columns));
        }
        if !(self.scroll_step.is_finite() && self.scroll_step > 0.0) {
            return Err(ConfigError::Message(format!(
                "scroll_step must be a positive number of pixels (got {})",
                self.scroll_step
            ))
            .into());
        }
        Ok(())
    }

    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Returns: ~/.config/slice-viewer/config.toml (on Linux)
    ///          ~/Library/Application Support/slice-viewer/config.toml (on macOS)
    ///          %APPDATA%\slice-viewer\config.toml (on Windows)
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("slice-viewer").join("config.toml"))
    }
}

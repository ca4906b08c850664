// SPDX-License-Identifier: GPL-3.0-only

use crate::backends::camera::types::{FourCc, StreamFormat};
use crate::constants::{self, formats, timing};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// How an open request is checked against the device's listed formats
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatPolicy {
    /// The request must appear in the capability list, otherwise open fails
    /// before any graph is built
    #[default]
    Strict,
    /// The request goes straight to the graph and the connect step decides
    AllowUnlisted,
}

/// Format used when an open request leaves a field at zero
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatSettings {
    /// Resolution width
    pub width: u32,
    /// Resolution height
    pub height: u32,
    /// Frames per second
    pub fps: u32,
    /// Pixel format (e.g., "MJPG", "YUY2")
    pub pixel_format: String,
}

impl Default for FormatSettings {
    fn default() -> Self {
        Self {
            width: formats::DEFAULT_WIDTH,
            height: formats::DEFAULT_HEIGHT,
            fps: formats::DEFAULT_FPS,
            pixel_format: formats::DEFAULT_PIXEL_FORMAT.to_string(),
        }
    }
}

impl FormatSettings {
    /// Convert into a stream format; an unparsable pixel format falls back to MJPG
    pub fn to_stream_format(&self) -> StreamFormat {
        let encoding = FourCc::parse(&self.pixel_format).unwrap_or(FourCc::MJPG);
        StreamFormat::new(self.width, self.height, self.fps, encoding)
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Whether unlisted formats may be handed to the graph
    pub format_policy: FormatPolicy,
    /// Target for automatic format selection
    pub default_format: FormatSettings,
    /// Frame pull timeout in milliseconds
    pub frame_wait_timeout_ms: u64,
    /// Graph start timeout in milliseconds
    pub start_timeout_ms: u64,
    /// Graph stop timeout in milliseconds
    pub stop_timeout_ms: u64,
    /// tracing filter directive used when RUST_LOG is unset
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            format_policy: FormatPolicy::default(),
            default_format: FormatSettings::default(),
            frame_wait_timeout_ms: timing::FRAME_WAIT_TIMEOUT_MS,
            start_timeout_ms: timing::START_TIMEOUT_MS,
            stop_timeout_ms: timing::STOP_TIMEOUT_MS,
            log_filter: constants::DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

/// Errors raised while reading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

impl Config {
    /// Parse a configuration from JSON text. Missing keys take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON configuration file
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Read the configuration named by `BECAM_CONFIG`.
    ///
    /// A missing variable yields defaults. A file that cannot be read or
    /// parsed is returned as an error so the caller can report it once
    /// logging is up.
    pub fn try_load() -> Result<Self, ConfigError> {
        let Some(path) = std::env::var_os(constants::CONFIG_ENV_VAR) else {
            return Ok(Self::default());
        };
        let path = PathBuf::from(path);
        let config = Self::from_path(&path)?;
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Frame pull timeout
    pub fn frame_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_wait_timeout_ms)
    }

    /// Graph start timeout
    pub fn start_timeout(&self) -> Duration {
        Duration::from_millis(self.start_timeout_ms)
    }

    /// Graph stop timeout
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    /// Like [`Config::try_load`], but warns and falls back to defaults
    pub fn load() -> Self {
        Self::try_load().unwrap_or_else(|e| {
            warn!(error = %e, "Using default configuration");
            Self::default()
        })
    }
}

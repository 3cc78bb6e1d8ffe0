// SPDX-License-Identifier: GPL-3.0-only

//! Persistent application configuration
//!
//! Stored as pretty JSON at `<config_dir>/capture-ring/config.json`. A missing
//! or corrupted file yields the defaults.

use crate::backends::camera::PixelFormat;
use crate::constants::capture::{DEFAULT_FRAMERATE, DEFAULT_HEIGHT, DEFAULT_WIDTH};
use crate::constants::persistence::{DEFAULT_SAVE_BACKLOG, MIN_FREE_BYTES};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Directory name used under the platform config and pictures directories
pub const APP_DIR_NAME: &str = "capture-ring";

/// Config file name inside the config directory
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Settings for the synthetic capture source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Frame width in sensor orientation
    pub width: u32,
    /// Frame height in sensor orientation
    pub height: u32,
    /// Delivery rate, 0 = as fast as possible
    pub framerate: u32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            framerate: DEFAULT_FRAMERATE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory receiving `pic_<slot>.jpg` files
    pub output_dir: PathBuf,
    /// Free bytes required on the output filesystem before capture starts
    pub min_free_bytes: u64,
    /// Save jobs allowed to wait behind the worker (`None` = unbounded)
    pub save_backlog: Option<usize>,
    /// Chroma order of captured frames
    pub pixel_format: PixelFormat,
    /// Synthetic source settings
    pub capture: CaptureSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            min_free_bytes: MIN_FREE_BYTES,
            save_backlog: Some(DEFAULT_SAVE_BACKLOG),
            pixel_format: PixelFormat::default(),
            capture: CaptureSettings::default(),
        }
    }
}

impl Config {
    /// Load from the default config directory
    pub fn load() -> Self {
        Self::load_from(&config_dir())
    }

    /// Save to the default config directory
    pub fn save(&self) -> io::Result<PathBuf> {
        self.save_to(&config_dir())
    }

    /// Load from `config.json` inside `dir`, falling back to defaults
    pub fn load_from(dir: &Path) -> Self {
        let path = dir.join(CONFIG_FILE_NAME);
        match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    info!(path = %path.display(), "Config loaded");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Corrupted config file, using defaults");
                    Self::default()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(path = %path.display(), "Config file not found, using defaults");
                Self::default()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read config file, using defaults");
                Self::default()
            }
        }
    }

    /// Write `config.json` inside `dir`, creating the directory
    pub fn save_to(&self, dir: &Path) -> io::Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(CONFIG_FILE_NAME);
        let contents = serde_json::to_string_pretty(self).map_err(io::Error::other)?;
        std::fs::write(&path, contents)?;
        info!(path = %path.display(), "Config saved");
        Ok(path)
    }
}

/// Platform config directory for this application
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

/// Default output directory (`<Pictures>/capture-ring`)
pub fn default_output_dir() -> PathBuf {
    dirs::picture_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join(APP_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "debug".into()),
            )
            .with_test_writer()
            .try_init();
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.min_free_bytes, 500_000_000);
        assert_eq!(config.save_backlog, Some(256));
        assert_eq!(config.pixel_format, PixelFormat::Nv21);
        assert_eq!(config.capture.width, 640);
        assert!(config.output_dir.ends_with(APP_DIR_NAME));
    }

    #[test]
    fn test_save_and_load() {
        init_test_tracing();
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested");

        let config = Config {
            output_dir: PathBuf::from("/tmp/frames"),
            min_free_bytes: 42,
            save_backlog: None,
            pixel_format: PixelFormat::Nv12,
            capture: CaptureSettings {
                width: 320,
                height: 240,
                framerate: 0,
            },
        };
        let path = config.save_to(&dir).unwrap();
        assert!(path.exists());
        assert_eq!(Config::load_from(&dir), config);
    }

    #[test]
    fn test_missing_and_corrupted_files_use_defaults() {
        init_test_tracing();
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(Config::load_from(&tmp.path().join("absent")), Config::default());

        std::fs::write(tmp.path().join(CONFIG_FILE_NAME), "{ not json").unwrap();
        assert_eq!(Config::load_from(tmp.path()), Config::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE_NAME),
            r#"{ "pixel_format": "Nv12", "capture": { "width": 320 } }"#,
        )
        .unwrap();

        let config = Config::load_from(tmp.path());
        assert_eq!(config.pixel_format, PixelFormat::Nv12);
        assert_eq!(config.capture.width, 320);
        assert_eq!(config.capture.height, DEFAULT_HEIGHT);
        assert_eq!(config.save_backlog, Some(DEFAULT_SAVE_BACKLOG));
    }
}

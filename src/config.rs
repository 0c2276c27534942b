use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

use crate::render::{ColorMode, RenderOptions};

/// Settings that cannot produce a working player.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("dynamic color mode draws block glyphs and cannot be used with unicode disabled")]
    DynamicWithoutUnicode,
    #[error("frame rate must be at least 1")]
    ZeroFrameRate,
    #[error("volume {0} is outside 0-100")]
    VolumeOutOfRange(f32),
    #[error("grid must have at least one row and one column")]
    EmptyGrid,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub playback: PlaybackConfig,
    pub input: InputConfig,
    pub render: RenderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlaybackConfig {
    pub color_mode: ColorMode,
    /// Start position in milliseconds
    pub offset_ms: u64,
    /// Frames per second; the stream's own rate when unset
    pub fps: Option<u32>,
    pub audio: bool,
    /// Percent, 0-100
    pub volume: f32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            color_mode: ColorMode::default(),
            offset_ms: 0,
            fps: None,
            audio: true,
            volume: 100.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InputConfig {
    pub keyboard: bool,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self { keyboard: true }
    }
}

impl InputConfig {
    /// Whether the terminal goes into raw mode. Only a keyboard reader can
    /// see Ctrl-C in raw mode, so without one it stays a signal.
    pub fn raw_mode(&self) -> bool {
        self.keyboard
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    pub unicode: bool,
    /// Color reduction step for 24-bit modes; `<= 0` disables
    pub color_reduce: i32,
    /// Fixed grid height; follows the terminal when unset
    pub rows: Option<u16>,
    /// Fixed grid width; follows the terminal when unset
    pub cols: Option<u16>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            unicode: true,
            color_reduce: -1,
            rows: None,
            cols: None,
        }
    }
}

impl RenderConfig {
    pub fn options(&self) -> RenderOptions {
        RenderOptions {
            unicode: self.unicode,
            color_reduce: self.color_reduce,
        }
    }

    /// Whether the grid tracks the terminal size.
    pub fn follows_terminal(&self) -> bool {
        self.rows.is_none() && self.cols.is_none()
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config at {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config at {}", path.display()))?;
        Ok(config)
    }

    /// Get the default XDG config path (~/.config/termvideo/config.toml)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("termvideo").join("config.toml"))
    }

    /// Load config from the default XDG path if it exists
    pub fn load_from_default_path() -> Option<Self> {
        let path = Self::default_path()?;
        if !path.exists() {
            return None;
        }
        match Self::load(&path) {
            Ok(config) => Some(config),
            Err(e) => {
                warn!("{:#}; using defaults", e);
                None
            }
        }
    }

    /// Initialize default config file at XDG path, returns the path
    pub fn init_default_config() -> Result<PathBuf> {
        let path = Self::default_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Self::write_template(&path)?;
        Ok(path)
    }

    fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, Self::generate_config_template())
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }

    /// Generate a commented TOML config template
    pub fn generate_config_template() -> String {
        r#"# termvideo configuration
# Command line flags override everything here.

[playback]
# Color mode: "color", "dynamic", "256", "monochrome", "ascii-art", "full-ascii"
color_mode = "color"
# Start position in milliseconds
offset_ms = 0
# Frames per second (omit to use the video's own rate)
# fps = 30
# Play the soundtrack
audio = true
# Volume in percent (0-100)
volume = 100.0

[input]
# Arrow keys seek and change volume, q quits
keyboard = true

[render]
# Use block and shade characters; "dynamic" mode requires this
unicode = true
# Round colors to multiples of this step with dithering (<= 0 disables)
color_reduce = -1
# Fixed grid size (omit to follow the terminal)
# rows = 40
# cols = 120
"#
        .to_string()
    }

    /// Merge CLI arguments into config (CLI takes priority)
    pub fn merge_args(&mut self, args: &crate::Args) {
        if let Some(mode) = args.color_mode {
            self.playback.color_mode = mode;
        }
        if let Some(offset) = args.offset {
            self.playback.offset_ms = offset;
        }
        if let Some(fps) = args.fps {
            self.playback.fps = Some(fps);
        }
        if args.no_audio {
            self.playback.audio = false;
        }
        if let Some(volume) = args.volume {
            self.playback.volume = volume;
        }

        if args.no_keyboard {
            self.input.keyboard = false;
        }

        if args.no_unicode {
            self.render.unicode = false;
        }
        if let Some(step) = args.color_reduce {
            self.render.color_reduce = step;
        }
        if let Some(rows) = args.rows {
            self.render.rows = Some(rows);
        }
        if let Some(cols) = args.cols {
            self.render.cols = Some(cols);
        }
    }

    /// Reject combinations that cannot be played.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.playback.color_mode == ColorMode::DynamicResolution && !self.render.unicode {
            return Err(ConfigError::DynamicWithoutUnicode);
        }
        if self.playback.fps == Some(0) {
            return Err(ConfigError::ZeroFrameRate);
        }
        if !(0.0..=100.0).contains(&self.playback.volume) {
            return Err(ConfigError::VolumeOutOfRange(self.playback.volume));
        }
        if self.render.rows == Some(0) || self.render.cols == Some(0) {
            return Err(ConfigError::EmptyGrid);
        }
        Ok(())
    }
}

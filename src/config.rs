use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{PlayerError, PlayerResult};
use crate::types::{ColorIndex, PALETTE_SIZE, Palette};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    #[serde(default)]
    pub palette: Palette,
    /// Palette index every cell fades to before playback starts.
    #[serde(default = "default_highlight")]
    pub highlight: u8,
    #[serde(default)]
    pub grid: GridLayout,
    #[serde(default)]
    pub timings: Timings,
    /// External player invoked as `<audio_command...> <file>`.
    #[serde(default = "default_audio_command")]
    pub audio_command: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridLayout {
    #[serde(default = "default_columns")]
    pub columns: usize,
    /// Rows per column in the full display.
    #[serde(default = "default_rows")]
    pub rows: usize,
    /// Rows that exist before the first reveal.
    #[serde(default = "default_base_rows")]
    pub base_rows: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timings {
    #[serde(default = "default_phase_ms")]
    pub resize_ms: u64,
    #[serde(default = "default_phase_ms")]
    pub reveal_ms: u64,
    #[serde(default = "default_phase_ms")]
    pub fade_ms: u64,
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    #[serde(default = "default_grace_ms")]
    pub grace_ms: u64,
}

fn default_highlight() -> u8 { 4 }
fn default_columns() -> usize { 52 }
fn default_rows() -> usize { 39 }
fn default_base_rows() -> usize { 7 }
fn default_phase_ms() -> u64 { 300 }
fn default_tick_ms() -> u64 { 16 }
fn default_grace_ms() -> u64 { 50 }
fn default_audio_command() -> Vec<String> {
    ["ffplay", "-nodisp", "-autoexit", "-loglevel", "quiet"]
        .map(String::from)
        .to_vec()
}

impl Default for PlayerConfig {
    fn default() -> Self {
        PlayerConfig {
            palette: Palette::default(),
            highlight: default_highlight(),
            grid: GridLayout::default(),
            timings: Timings::default(),
            audio_command: default_audio_command(),
        }
    }
}

impl Default for GridLayout {
    fn default() -> Self {
        GridLayout {
            columns: default_columns(),
            rows: default_rows(),
            base_rows: default_base_rows(),
        }
    }
}

impl Default for Timings {
    fn default() -> Self {
        Timings {
            resize_ms: default_phase_ms(),
            reveal_ms: default_phase_ms(),
            fade_ms: default_phase_ms(),
            tick_ms: default_tick_ms(),
            grace_ms: default_grace_ms(),
        }
    }
}

impl GridLayout {
    /// Cells in the full display; every decoded frame has this many entries.
    pub fn cell_count(&self) -> usize {
        self.columns * self.rows
    }
}

impl Timings {
    pub fn resize(&self) -> Duration {
        Duration::from_millis(self.resize_ms)
    }

    pub fn reveal(&self) -> Duration {
        Duration::from_millis(self.reveal_ms)
    }

    pub fn fade(&self) -> Duration {
        Duration::from_millis(self.fade_ms)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }
}

impl PlayerConfig {
    /// Load the user config, falling back to defaults when it is missing or invalid.
    pub fn load() -> Self {
        let config_path = Self::config_path();
        match std::fs::read_to_string(&config_path) {
            Ok(json) => match Self::from_json(&json) {
                Ok(config) => config,
                Err(e) => {
                    warn!(path = %config_path.display(), "invalid player config ({e}), using defaults");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Load an explicitly requested config; any problem is an error.
    pub fn load_from(path: &Path) -> PlayerResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> PlayerResult<Self> {
        let config: PlayerConfig = serde_json::from_str(json)
            .map_err(|e| PlayerError::config(format!("invalid JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> PlayerResult<()> {
        if self.highlight as usize >= PALETTE_SIZE {
            return Err(PlayerError::config(format!(
                "highlight {} is outside the {PALETTE_SIZE}-color palette",
                self.highlight
            )));
        }
        if self.grid.cell_count() == 0 {
            return Err(PlayerError::config("grid has no cells"));
        }
        if self.grid.base_rows > self.grid.rows {
            return Err(PlayerError::config(format!(
                "base_rows {} exceeds rows {}",
                self.grid.base_rows, self.grid.rows
            )));
        }
        if self.timings.tick_ms == 0 {
            return Err(PlayerError::config("tick_ms must be positive"));
        }
        if self.timings.grace_ms < self.timings.tick_ms {
            return Err(PlayerError::config(format!(
                "grace_ms {} is shorter than one tick ({} ms)",
                self.timings.grace_ms, self.timings.tick_ms
            )));
        }
        if self.audio_command.is_empty() {
            return Err(PlayerError::config("audio_command is empty"));
        }
        Ok(())
    }

    pub fn highlight_index(&self) -> ColorIndex {
        ColorIndex::new(self.highlight).unwrap_or_default()
    }

    fn config_path() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
        let mut path = PathBuf::from(home);
        path.push(".config");
        path.push("grid-player");
        path.push("config.json");
        path
    }
}

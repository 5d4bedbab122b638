//! Analysis settings, loadable from a TOML file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classifier::ClassifyThresholds;

/// Errors loading settings from disk.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Everything a game analysis run needs.
///
/// # Example
///
/// ```toml
/// engine_path = "/usr/bin/stockfish"
/// depth = 18
/// multipv = 3
/// selective = true
///
/// [engine_options]
/// Threads = "4"
/// Hash = "128"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSettings {
    /// Path to the UCI engine binary.
    pub engine_path: PathBuf,
    /// Depth budget for full-strength analysis.
    #[serde(default = "default_depth")]
    pub depth: u32,
    /// Depth budget for the selective-mode screening pass.
    #[serde(default = "default_shallow_depth")]
    pub shallow_depth: u32,
    /// Time budget per position in milliseconds.
    #[serde(default = "default_time_per_position_ms")]
    pub time_per_position_ms: u64,
    /// Number of variations to request per position.
    #[serde(default = "default_multipv")]
    pub multipv: u32,
    /// Screen with a shallow pass and only re-analyze swings.
    #[serde(default)]
    pub selective: bool,
    /// Swing magnitude that marks a position critical in selective mode.
    #[serde(default = "default_critical_threshold")]
    pub critical_threshold_cp: i32,
    /// UCI options applied after the handshake.
    #[serde(default = "default_engine_options")]
    pub engine_options: HashMap<String, String>,
    /// Classification thresholds.
    #[serde(default)]
    pub thresholds: ClassifyThresholds,
    /// Longest variation quoted in generated comments.
    #[serde(default = "default_max_variation_moves")]
    pub max_variation_moves: usize,
}

fn default_depth() -> u32 {
    18
}
fn default_shallow_depth() -> u32 {
    8
}
fn default_time_per_position_ms() -> u64 {
    500
}
fn default_multipv() -> u32 {
    3
}
fn default_critical_threshold() -> i32 {
    100
}
fn default_max_variation_moves() -> usize {
    6
}

fn default_engine_options() -> HashMap<String, String> {
    HashMap::from([
        ("Threads".to_string(), "4".to_string()),
        ("Hash".to_string(), "128".to_string()),
    ])
}

impl AnalysisSettings {
    /// Load settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let settings = toml::from_str(&text)?;
        Ok(settings)
    }

    /// Settings for an engine binary with everything else defaulted.
    pub fn for_engine(engine_path: impl Into<PathBuf>) -> Self {
        Self {
            engine_path: engine_path.into(),
            depth: default_depth(),
            shallow_depth: default_shallow_depth(),
            time_per_position_ms: default_time_per_position_ms(),
            multipv: default_multipv(),
            selective: false,
            critical_threshold_cp: default_critical_threshold(),
            engine_options: default_engine_options(),
            thresholds: ClassifyThresholds::default(),
            max_variation_moves: default_max_variation_moves(),
        }
    }

    /// Per-position time budget as a [`Duration`].
    pub fn time_per_position(&self) -> Duration {
        Duration::from_millis(self.time_per_position_ms)
    }
}

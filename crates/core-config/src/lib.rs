//! Ambient runtime configuration for the front-end's own subsystems.
//!
//! This is deliberately small: fuzzy-matching preset selection, history file
//! path/limits, and debug toggles. It has nothing to do with the shell's own
//! script-level configuration (themes, aliases, etc.) which uses a bespoke
//! TOML-subset grammar out of scope for this crate; this loads a real TOML
//! document with the `toml` crate instead.

use anyhow::Result;
use serde::Deserialize;
use std::{fs, path::PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FuzzyPreset {
    Default,
    Completion,
    History,
    Autocorrect,
}

impl Default for FuzzyPreset {
    fn default() -> Self {
        FuzzyPreset::Default
    }
}

impl FuzzyPreset {
    pub fn name(self) -> &'static str {
        match self {
            FuzzyPreset::Default => "default",
            FuzzyPreset::Completion => "completion",
            FuzzyPreset::History => "history",
            FuzzyPreset::Autocorrect => "autocorrect",
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FuzzyConfigFile {
    #[serde(default)]
    pub preset: FuzzyPreset,
    #[serde(default = "FuzzyConfigFile::default_min_similarity_score")]
    pub min_similarity_score: u32,
    #[serde(default = "FuzzyConfigFile::default_cache_size")]
    pub cache_size: usize,
}

impl Default for FuzzyConfigFile {
    fn default() -> Self {
        Self {
            preset: FuzzyPreset::default(),
            min_similarity_score: Self::default_min_similarity_score(),
            cache_size: Self::default_cache_size(),
        }
    }
}

impl FuzzyConfigFile {
    const fn default_min_similarity_score() -> u32 {
        0
    }
    const fn default_cache_size() -> usize {
        256
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HistoryConfigFile {
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "HistoryConfigFile::default_max_entries")]
    pub max_entries: usize,
    #[serde(default)]
    pub ignore_space_prefix: bool,
}

impl Default for HistoryConfigFile {
    fn default() -> Self {
        Self {
            path: None,
            max_entries: Self::default_max_entries(),
            ignore_space_prefix: false,
        }
    }
}

impl HistoryConfigFile {
    const fn default_max_entries() -> usize {
        10_000
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct DebugConfigFile {
    #[serde(default)]
    pub log_render_timings: bool,
    #[serde(default)]
    pub log_event_bus: bool,
    #[serde(default)]
    pub trace_tokenizer: bool,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConfigFile {
    #[serde(default)]
    pub fuzzy: FuzzyConfigFile,
    #[serde(default)]
    pub history: HistoryConfigFile,
    #[serde(default)]
    pub debug: DebugConfigFile,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub raw: Option<String>,
    pub file: ConfigFile,
}

/// Best-effort config path following platform conventions (XDG / AppData Roaming).
pub fn discover() -> PathBuf {
    let local = PathBuf::from("lusush.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("lusush").join("lusush.toml");
    }
    PathBuf::from("lusush.toml")
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    if let Ok(content) = fs::read_to_string(&path) {
        match toml::from_str::<ConfigFile>(&content) {
            Ok(file) => Ok(Config {
                raw: Some(content),
                file,
            }),
            Err(e) => {
                info!(target: "config", path = %path.display(), error = %e, "config_parse_error_using_defaults");
                Ok(Config::default())
            }
        }
    } else {
        Ok(Config::default())
    }
}

impl Config {
    /// Resolved history file path: explicit `[history] path` if set, else the
    /// platform history-file convention next to the config directory.
    pub fn history_path(&self) -> PathBuf {
        if let Some(path) = &self.file.history.path {
            return path.clone();
        }
        if let Some(dir) = dirs::data_dir() {
            return dir.join("lusush").join("history.jsonl");
        }
        PathBuf::from("lusush_history.jsonl")
    }
}

use anyhow::{Context, Result};
use notify::{Config as NotifyConfig, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

use crate::event::AppEvent;

pub const DEFAULT_VOLUME: u8 = 50;
pub const MAX_VOLUME: u8 = 100;

/// Root configuration structure. Serialized as JSON to `config.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Ordered rule list. Earlier rules win when several match.
    #[serde(rename = "games", default)]
    pub rules: Vec<Rule>,
    /// Playback volume in percent, 0–100.
    #[serde(default = "default_volume", deserialize_with = "deserialize_volume")]
    pub volume: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            volume: DEFAULT_VOLUME,
        }
    }
}

impl Config {
    /// Volume clamped to the valid percentage range.
    pub fn effective_volume(&self) -> u8 {
        self.volume.min(MAX_VOLUME)
    }
}

/// Pairs a process-name fragment with the track played while it runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Case-insensitive substring of a running process name (e.g. "notepad").
    #[serde(rename = "process_name")]
    pub process_match: String,
    /// Path of the `.mp3` / `.wav` file to loop while the process runs.
    #[serde(rename = "music_file")]
    pub track_path: String,
}

impl Rule {
    pub fn new(process_match: impl Into<String>, track_path: impl Into<String>) -> Self {
        Self {
            process_match: process_match.into(),
            track_path: track_path.into(),
        }
    }

    /// Text shown for this rule in the GUI list.
    pub fn label(&self) -> String {
        format!("{} - {}", self.process_match, self.track_path)
    }
}

/// Loads the config file at `path`, returning `Config::default()` if the file does not exist.
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Overwrites the file at `path` with `config`, creating the parent directory if needed.
pub fn save(path: &Path, config: &Config) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let content = serde_json::to_string_pretty(config).context("Failed to serialize config")?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config file: {}", path.display()))
}

/// Spawns a file watcher on the parent directory of `path`.  Whenever the config
/// file is created or modified, reloads it and sends a `ConfigReloaded` event.
pub async fn watch_config(path: PathBuf, tx: mpsc::Sender<AppEvent>) {
    let (watch_tx, mut watch_rx) = mpsc::channel::<notify::Event>(16);

    let mut watcher = match RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                let _ = watch_tx.blocking_send(event);
            }
        },
        NotifyConfig::default(),
    ) {
        Ok(w) => w,
        Err(e) => {
            tracing::warn!("Failed to create file watcher: {e}");
            return;
        }
    };

    // Watching the directory also catches write-new + rename saves.
    let watch_dir = match path.parent() {
        Some(d) => d.to_path_buf(),
        None => {
            tracing::warn!("Config path has no parent directory");
            return;
        }
    };

    if let Err(e) = watcher.watch(&watch_dir, RecursiveMode::NonRecursive) {
        tracing::warn!("Failed to watch {}: {e}", watch_dir.display());
        return;
    }

    while let Some(event) = watch_rx.recv().await {
        if touches_config(&event, &path) {
            match load_or_default(&path) {
                Ok(config) => {
                    if tx.send(AppEvent::ConfigReloaded(config)).await.is_err() {
                        break;
                    }
                }
                // Partial writes land here too; the next event carries the full file.
                Err(e) => tracing::debug!("Skipping reload: {e:#}"),
            }
        }
    }
}

/// True when `event` created or modified the file at `path`.
fn touches_config(event: &notify::Event, path: &Path) -> bool {
    matches!(
        event.kind,
        notify::EventKind::Create(_) | notify::EventKind::Modify(_)
    ) && event.paths.iter().any(|p| p == path)
}

fn default_volume() -> u8 {
    DEFAULT_VOLUME
}

/// Accepts any JSON number. Older configs stored the raw slider position as a float.
fn deserialize_volume<'de, D>(deserializer: D) -> std::result::Result<u8, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    Ok(raw.round().clamp(0.0, f64::from(MAX_VOLUME)) as u8)
}

/// Canonical location of the config file.
///
/// Defaults to `<config dir>/GameMusicControl/config.json`, where the config dir
/// is `%APPDATA%` on Windows, `~/Library/Application Support` on macOS and
/// `$XDG_CONFIG_HOME` (or `~/.config`) on Linux.
use anyhow::{Context, Result};
use std::path::PathBuf;

const APP_DIR_NAME: &str = "GameMusicControl";
pub const CONFIG_FILE_NAME: &str = "config.json";
/// Overrides the config file location when set.
pub const CONFIG_PATH_ENV: &str = "GAME_MUSIC_CONTROL_CONFIG";

/// Returns the application data directory.
pub fn app_data_dir() -> Result<PathBuf> {
    let base = dirs::config_dir().context("No per-user config directory on this platform")?;
    Ok(base.join(APP_DIR_NAME))
}

/// Returns the full path to the config file, honouring [`CONFIG_PATH_ENV`].
pub fn config_file_path() -> Result<PathBuf> {
    match std::env::var_os(CONFIG_PATH_ENV) {
        Some(custom) if !custom.is_empty() => Ok(PathBuf::from(custom)),
        _ => Ok(app_data_dir()?.join(CONFIG_FILE_NAME)),
    }
}

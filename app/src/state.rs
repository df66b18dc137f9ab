/// Shared application state.
///
/// One `AppState` is created at startup and handed out as `Arc<AppState>` to
/// the process watcher, the event loop and the GUI. The watcher only takes
/// rule snapshots; every mutation goes through the methods below, which
/// persist the config after each change.
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::Result;

use crate::config::{self, Config, Rule, MAX_VOLUME};
use crate::editor::{EditError, RuleEditor};
use crate::status::MonitorStatus;

/// How many of our own recent saves are remembered to recognize their echoes.
const RECENT_SAVES: usize = 8;

/// Result of [`AppState::apply_reload`].
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Reload {
    /// The file holds something this process wrote; memory is already newer or equal.
    OwnSave,
    Applied { volume_changed: bool },
}

pub struct AppState {
    config: RwLock<Config>,
    editor: Mutex<RuleEditor>,
    status: RwLock<MonitorStatus>,
    config_path: PathBuf,
    recent_saves: Mutex<VecDeque<Config>>,
}

impl AppState {
    pub fn new(config: Config, config_path: PathBuf) -> Self {
        Self {
            config: RwLock::new(config),
            editor: Mutex::new(RuleEditor::default()),
            status: RwLock::new(MonitorStatus::new()),
            config_path,
            recent_saves: Mutex::new(VecDeque::with_capacity(RECENT_SAVES)),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Copies the rule list under a short-held read lock.
    pub fn rules_snapshot(&self) -> Vec<Rule> {
        self.read_config().rules.clone()
    }

    pub fn volume(&self) -> u8 {
        self.read_config().effective_volume()
    }

    pub fn status(&self) -> MonitorStatus {
        self.status.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn update_status(&self, f: impl FnOnce(&mut MonitorStatus)) {
        f(&mut self.status.write().unwrap_or_else(PoisonError::into_inner));
    }

    /// Takes a config read back from disk after the file changed.
    ///
    /// Reloads of our own saves are dropped: by the time one arrives a later
    /// edit may already be in memory, and applying it would roll that edit back.
    pub fn apply_reload(&self, reloaded: Config) -> Reload {
        let mut config = self.write_config();
        if self.lock_recent_saves().contains(&reloaded) {
            return Reload::OwnSave;
        }
        let volume_changed = reloaded.effective_volume() != config.effective_volume();
        *config = reloaded;
        Reload::Applied { volume_changed }
    }

    pub fn add_rule(&self, rule: Rule) -> Result<(), EditError> {
        let mut config = self.write_config();
        self.lock_editor().add(&mut config.rules, rule)?;
        self.persist(&config);
        Ok(())
    }

    pub fn remove_rule(&self, index: Option<usize>) -> Result<Rule, EditError> {
        let mut config = self.write_config();
        let removed = self.lock_editor().remove(&mut config.rules, index)?;
        self.persist(&config);
        Ok(removed)
    }

    pub fn undo_remove(&self) -> Result<Rule, EditError> {
        let mut config = self.write_config();
        let restored = self.lock_editor().undo(&mut config.rules)?;
        self.persist(&config);
        Ok(restored)
    }

    /// Stores `volume` (clamped to 0–100) and saves the config.
    pub fn save_volume(&self, volume: u8) -> Result<()> {
        let mut config = self.write_config();
        config.volume = volume.min(MAX_VOLUME);
        self.save(&config)
    }

    /// Rule edits save eagerly; a failed save is logged and the in-memory edit kept.
    fn persist(&self, config: &Config) {
        if let Err(e) = self.save(config) {
            tracing::error!("Failed to save config: {e:#}");
        }
    }

    fn save(&self, config: &Config) -> Result<()> {
        // Recorded before writing so the file watcher never sees an unknown save.
        let mut recent = self.lock_recent_saves();
        if recent.len() == RECENT_SAVES {
            recent.pop_front();
        }
        recent.push_back(config.clone());
        drop(recent);
        config::save(&self.config_path, config)
    }

    fn read_config(&self) -> RwLockReadGuard<'_, Config> {
        self.config.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_config(&self) -> RwLockWriteGuard<'_, Config> {
        self.config.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_editor(&self) -> MutexGuard<'_, RuleEditor> {
        self.editor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_recent_saves(&self) -> MutexGuard<'_, VecDeque<Config>> {
        self.recent_saves.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

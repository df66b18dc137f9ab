#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod config;
mod editor;
mod event;
mod gui;
mod paths;
mod player;
mod process_monitor;
mod state;
mod status;
mod tray;
mod update;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing_subscriber::EnvFilter;

use crate::event::AppEvent;
use crate::player::AudioPlayer;
use crate::process_monitor::{SystemProcesses, POLL_INTERVAL_SECS};
use crate::state::{AppState, Reload};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,game_music_control=debug")),
        )
        .init();

    // ── Configuration ─────────────────────────────────────────────────────────
    let config_path = paths::config_file_path()?;
    let initial_config = config::load_or_default(&config_path).unwrap_or_else(|e| {
        tracing::warn!("Using default config: {e:#}");
        config::Config::default()
    });
    let initial_volume = initial_config.effective_volume();
    let state = Arc::new(AppState::new(initial_config, config_path.clone()));
    tracing::debug!("Config file: {}", state.config_path().display());

    // ── Audio ─────────────────────────────────────────────────────────────────
    let player = AudioPlayer::spawn(initial_volume)?;

    // ── Background tasks ──────────────────────────────────────────────────────
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    // Portal-backed file dialogs on Linux need a runtime on the GUI thread.
    let _guard = runtime.enter();

    let (event_tx, event_rx) = mpsc::channel::<AppEvent>(32);

    runtime.spawn(config::watch_config(config_path, event_tx.clone()));
    runtime.spawn(process_monitor::run(
        Arc::clone(&state),
        SystemProcesses::new(),
        Duration::from_secs(POLL_INTERVAL_SECS),
        event_tx.clone(),
    ));
    runtime.spawn(update::run(Arc::clone(&state)));

    // Graceful shutdown on Ctrl+C.
    {
        let tx = event_tx.clone();
        runtime.spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = tx.send(AppEvent::Shutdown).await;
            }
        });
    }

    runtime.spawn(event_loop(Arc::clone(&state), player.clone(), event_rx));

    // ── Tray icon ─────────────────────────────────────────────────────────────
    let quit_player = player.clone();
    let _tray = tray::start(move || {
        tracing::info!("Quit selected from tray");
        quit_player.stop();
        std::process::exit(0);
    })
    .map_err(|e| tracing::warn!("Running without tray icon: {e:#}"))
    .ok();

    tracing::info!("game-music-control v{} started", env!("CARGO_PKG_VERSION"));

    // ── GUI (blocks until the window closes) ──────────────────────────────────
    gui::run(state, player.clone())?;

    tracing::info!("Window closed, shutting down");
    player.stop();
    Ok(())
}

/// Applies watcher and config events to the player and the shared status.
async fn event_loop(state: Arc<AppState>, player: AudioPlayer, mut rx: mpsc::Receiver<AppEvent>) {
    while let Some(evt) = rx.recv().await {
        match evt {
            AppEvent::RuleMatched(rule) => {
                let played = player.play(Path::new(&rule.track_path)).await;
                match played {
                    Ok(()) => {
                        tracing::info!("Now playing {}", rule.track_path);
                        state.update_status(|s| s.set_playing(rule));
                    }
                    Err(e) => {
                        // No retry until the matched rule changes.
                        tracing::error!("Failed to play {}: {e:#}", rule.track_path);
                        state.update_status(|s| s.set_error(format!("{e:#}")));
                    }
                }
            }

            AppEvent::RuleCleared(rule) => {
                player.stop();
                tracing::info!("Music stopped ({} exited)", rule.process_match);
                state.update_status(|s| s.set_idle());
            }

            AppEvent::ConfigReloaded(new_config) => {
                let rule_count = new_config.rules.len();
                match state.apply_reload(new_config) {
                    Reload::OwnSave => tracing::debug!("Ignoring reload of our own save"),
                    Reload::Applied { volume_changed } => {
                        tracing::info!("Config reloaded ({rule_count} rules)");
                        // Leave an unsaved slider position alone unless the file changed it.
                        if volume_changed {
                            player.set_volume(state.volume());
                        }
                    }
                }
            }

            AppEvent::Shutdown => {
                tracing::info!("Shutting down");
                player.stop();
                std::process::exit(0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Rule};
    use crate::status::PlaybackState;

    fn state_in(dir: &tempfile::TempDir) -> Arc<AppState> {
        Arc::new(AppState::new(Config::default(), dir.path().join("config.json")))
    }

    /// Polls `state` until `done` holds, failing after a few seconds.
    async fn wait_for(state: &AppState, done: impl Fn(&AppState) -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !done(state) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("event loop did not reach the expected state");
    }

    #[tokio::test]
    async fn failed_play_is_recorded_and_loop_keeps_running() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(&dir);
        let player = AudioPlayer::spawn(50).unwrap();
        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(event_loop(Arc::clone(&state), player, rx));

        let missing = dir.path().join("missing.mp3");
        let rule = Rule::new("notepad", missing.to_string_lossy());
        tx.send(AppEvent::RuleMatched(rule.clone())).await.unwrap();
        wait_for(&state, |s| s.status().error.is_some()).await;

        let status = state.status();
        assert_eq!(status.state, PlaybackState::Idle);
        assert!(status.active_rule.is_none());
        assert!(status.error.unwrap_or_default().contains("Failed to open music file"));
        assert!(!handle.is_finished());

        // The process exiting afterwards clears the error.
        tx.send(AppEvent::RuleCleared(rule)).await.unwrap();
        wait_for(&state, |s| s.status().error.is_none()).await;
        assert_eq!(state.status().state, PlaybackState::Idle);
        assert!(!handle.is_finished());

        drop(tx);
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("event loop should end when the channel closes")
            .unwrap();
    }

    #[tokio::test]
    async fn external_reload_replaces_rules_and_keeps_volume() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(&dir);
        let player = AudioPlayer::spawn(50).unwrap();
        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(event_loop(Arc::clone(&state), player, rx));

        let edited = Config {
            rules: vec![Rule::new("game", "b.wav")],
            volume: state.volume(),
        };
        tx.send(AppEvent::ConfigReloaded(edited)).await.unwrap();
        wait_for(&state, |s| !s.rules_snapshot().is_empty()).await;

        assert_eq!(state.rules_snapshot(), vec![Rule::new("game", "b.wav")]);
        assert_eq!(state.volume(), config::DEFAULT_VOLUME);
        handle.abort();
    }

    #[tokio::test]
    async fn reload_of_own_save_does_not_roll_back_edits() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(&dir);
        let player = AudioPlayer::spawn(50).unwrap();
        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(event_loop(Arc::clone(&state), player, rx));

        state.add_rule(Rule::new("notepad", "a.mp3")).unwrap();
        let echoed = config::load_or_default(state.config_path()).unwrap();
        state.add_rule(Rule::new("game", "b.mp3")).unwrap();

        tx.send(AppEvent::ConfigReloaded(echoed)).await.unwrap();
        // Events are handled in order, so once this failure shows the reload is done.
        let marker = Rule::new("marker", dir.path().join("missing.wav").to_string_lossy());
        tx.send(AppEvent::RuleMatched(marker)).await.unwrap();
        wait_for(&state, |s| s.status().error.is_some()).await;

        assert_eq!(
            state.rules_snapshot(),
            vec![Rule::new("notepad", "a.mp3"), Rule::new("game", "b.mp3")]
        );
        handle.abort();
    }
}

/// Settings window: rule form, rule list, volume slider and status line.
///
/// Runs on the main thread. Every edit goes through [`AppState`], which saves
/// the config; the watcher picks up the new rule list on its next cycle.
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use eframe::egui;
use rfd::{FileDialog, MessageButtons, MessageDialog, MessageLevel};

use crate::config::{Rule, MAX_VOLUME};
use crate::editor::EditError;
use crate::player::AudioPlayer;
use crate::state::AppState;

pub const WINDOW_TITLE: &str = "Game Music Control";
const WINDOW_SIZE: [f32; 2] = [600.0, 400.0];
/// How often the status line is refreshed while the window is idle.
const STATUS_REFRESH: Duration = Duration::from_secs(1);

/// Opens the window and blocks until it is closed.
pub fn run(state: Arc<AppState>, player: AudioPlayer) -> Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(WINDOW_TITLE)
            .with_inner_size(WINDOW_SIZE),
        ..Default::default()
    };

    eframe::run_native(
        WINDOW_TITLE,
        options,
        Box::new(move |_cc| Ok(Box::new(MusicControlApp::new(state, player)))),
    )
    .map_err(|e| anyhow!("GUI event loop failed: {e}"))
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum DialogKind {
    Info,
    Warning,
    Error,
}

/// Title and severity of the dialog shown for an editing failure.
fn dialog_for(err: &EditError) -> (DialogKind, &'static str) {
    match err {
        EditError::EmptyField => (DialogKind::Warning, "Input Error"),
        EditError::NoSelection => (DialogKind::Warning, "Selection Error"),
        EditError::NothingToUndo => (DialogKind::Info, "Undo"),
    }
}

fn show_dialog(kind: DialogKind, title: &str, text: &str) {
    let level = match kind {
        DialogKind::Info => MessageLevel::Info,
        DialogKind::Warning => MessageLevel::Warning,
        DialogKind::Error => MessageLevel::Error,
    };
    let _ = MessageDialog::new()
        .set_level(level)
        .set_title(title)
        .set_description(text)
        .set_buttons(MessageButtons::Ok)
        .show();
}

/// Rules match on process names, so a browsed executable contributes only its file name.
fn process_name_from_path(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

struct MusicControlApp {
    state: Arc<AppState>,
    player: AudioPlayer,
    process_input: String,
    music_input: String,
    selected: Option<usize>,
    /// Slider position; only persisted on "Save Settings".
    volume: u8,
    /// Last volume seen in the shared config, to notice reloads from disk.
    synced_volume: u8,
}

impl MusicControlApp {
    fn new(state: Arc<AppState>, player: AudioPlayer) -> Self {
        let volume = state.volume();
        Self {
            state,
            player,
            process_input: String::new(),
            music_input: String::new(),
            selected: None,
            volume,
            synced_volume: volume,
        }
    }

    fn report(&self, err: &EditError) {
        let (kind, title) = dialog_for(err);
        show_dialog(kind, title, &err.to_string());
    }

    fn browse_game(&mut self) {
        let picked = FileDialog::new()
            .add_filter("Executable Files", &["exe"])
            .pick_file();
        if let Some(name) = picked.as_deref().and_then(process_name_from_path) {
            self.process_input = name;
        }
    }

    fn browse_music(&mut self) {
        let picked = FileDialog::new()
            .add_filter("Audio Files", &["mp3", "wav"])
            .pick_file();
        if let Some(path) = picked {
            self.music_input = path.to_string_lossy().into_owned();
        }
    }

    fn add_rule(&mut self) {
        let rule = Rule::new(self.process_input.trim(), self.music_input.trim());
        match self.state.add_rule(rule) {
            Ok(()) => {
                tracing::info!("Added {} - {}", self.process_input.trim(), self.music_input.trim());
                self.process_input.clear();
                self.music_input.clear();
            }
            Err(e) => self.report(&e),
        }
    }

    fn remove_rule(&mut self, index: Option<usize>) {
        match self.state.remove_rule(index) {
            Ok(rule) => {
                tracing::info!("Removed {}", rule.label());
                self.selected = None;
            }
            Err(e) => self.report(&e),
        }
    }

    fn undo_remove(&mut self) {
        match self.state.undo_remove() {
            Ok(rule) => tracing::info!("Restored {}", rule.label()),
            Err(e) => self.report(&e),
        }
    }

    fn save_settings(&mut self) {
        match self.state.save_volume(self.volume) {
            Ok(()) => {
                self.synced_volume = self.volume;
                self.player.set_volume(self.volume);
                show_dialog(DialogKind::Info, "Settings", "Settings saved successfully!");
            }
            Err(e) => {
                tracing::error!("Failed to save settings: {e:#}");
                show_dialog(DialogKind::Error, "Settings", &format!("Failed to save settings: {e:#}"));
            }
        }
    }

    fn sync_from_state(&mut self, rule_count: usize) {
        let volume = self.state.volume();
        if volume != self.synced_volume {
            self.volume = volume;
            self.synced_volume = volume;
        }
        if self.selected.is_some_and(|i| i >= rule_count) {
            self.selected = None;
        }
    }
}

impl eframe::App for MusicControlApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if ctx.input_mut(|i| i.consume_key(egui::Modifiers::CTRL, egui::Key::Z)) {
            self.undo_remove();
        }

        let rules = self.state.rules_snapshot();
        let status = self.state.status();
        self.sync_from_state(rules.len());

        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.label(status.summary());
            if let Some(tag) = &status.update_available {
                ui.label(format!("A new version is available: {tag}"));
            }
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::Grid::new("rule_form")
                .num_columns(3)
                .spacing([8.0, 8.0])
                .show(ui, |ui| {
                    ui.label("Game Process Name:");
                    ui.add(egui::TextEdit::singleline(&mut self.process_input).desired_width(300.0));
                    if ui.button("Browse").clicked() {
                        self.browse_game();
                    }
                    ui.end_row();

                    ui.label("Music File:");
                    ui.add(egui::TextEdit::singleline(&mut self.music_input).desired_width(300.0));
                    if ui.button("Browse").clicked() {
                        self.browse_music();
                    }
                    ui.end_row();
                });

            ui.add_space(6.0);
            ui.vertical_centered(|ui| {
                if ui.button("Add Game").clicked() {
                    self.add_rule();
                }
            });

            ui.add_space(6.0);
            ui.label("Games and Music:");

            let mut remove: Option<Option<usize>> = None;
            ui.horizontal(|ui| {
                ui.vertical(|ui| {
                    ui.set_width(440.0);
                    egui::ScrollArea::vertical()
                        .max_height(160.0)
                        .auto_shrink([false, true])
                        .show(ui, |ui| {
                            for (i, rule) in rules.iter().enumerate() {
                                let row = ui.selectable_label(self.selected == Some(i), rule.label());
                                if row.clicked() {
                                    self.selected = Some(i);
                                }
                                if row.secondary_clicked() {
                                    remove = Some(Some(i));
                                }
                            }
                        });
                });
                if ui.button("Remove Selected").clicked() {
                    remove = Some(self.selected);
                }
            });
            if let Some(index) = remove {
                self.remove_rule(index);
            }

            ui.add_space(6.0);
            ui.horizontal(|ui| {
                ui.label("Volume:");
                if ui.add(egui::Slider::new(&mut self.volume, 0..=MAX_VOLUME)).changed() {
                    self.player.set_volume(self.volume);
                }
            });

            ui.add_space(6.0);
            ui.vertical_centered(|ui| {
                if ui.button("Save Settings").clicked() {
                    self.save_settings();
                }
            });
        });

        ctx.request_repaint_after(STATUS_REFRESH);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn edit_errors_map_to_dialogs() {
        assert_eq!(dialog_for(&EditError::EmptyField), (DialogKind::Warning, "Input Error"));
        assert_eq!(dialog_for(&EditError::NoSelection), (DialogKind::Warning, "Selection Error"));
        assert_eq!(dialog_for(&EditError::NothingToUndo), (DialogKind::Info, "Undo"));
    }

    #[test]
    fn browsed_executable_keeps_file_name_only() {
        let path: PathBuf = ["games", "Elden Ring", "eldenring.exe"].iter().collect();
        assert_eq!(process_name_from_path(&path).as_deref(), Some("eldenring.exe"));
    }

    #[test]
    fn path_without_file_name_yields_nothing() {
        assert_eq!(process_name_from_path(Path::new("/")), None);
    }
}

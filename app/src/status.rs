use chrono::{DateTime, Local};

use crate::config::Rule;

/// Current playback state.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PlaybackState {
    /// No rule matches; nothing is playing.
    Idle,
    /// A rule matched and its track is looping.
    Playing,
}

/// Runtime status shown in the GUI status line.
#[derive(Debug, Clone)]
pub struct MonitorStatus {
    pub state: PlaybackState,
    /// Rule whose track is playing, if any.
    pub active_rule: Option<Rule>,
    /// When `state` last changed.
    pub since: DateTime<Local>,
    /// Last playback error. Cleared by the next successful change.
    pub error: Option<String>,
    /// Newer release tag reported by the update check.
    pub update_available: Option<String>,
}

impl MonitorStatus {
    /// Constructs the initial idle status.
    pub fn new() -> Self {
        Self {
            state: PlaybackState::Idle,
            active_rule: None,
            since: Local::now(),
            error: None,
            update_available: None,
        }
    }

    pub fn set_playing(&mut self, rule: Rule) {
        self.state = PlaybackState::Playing;
        self.active_rule = Some(rule);
        self.since = Local::now();
        self.error = None;
    }

    pub fn set_idle(&mut self) {
        self.state = PlaybackState::Idle;
        self.active_rule = None;
        self.since = Local::now();
        self.error = None;
    }

    /// Records a failed playback start. The state drops to idle.
    pub fn set_error(&mut self, message: String) {
        self.set_idle();
        self.error = Some(message);
    }

    /// One-line summary for the GUI.
    pub fn summary(&self) -> String {
        let since = self.since.format("%H:%M:%S");
        if let Some(err) = &self.error {
            return format!("Error: {err}");
        }
        match (self.state, &self.active_rule) {
            (PlaybackState::Playing, Some(rule)) => {
                format!("Playing {} for {} (since {since})", rule.track_path, rule.process_match)
            }
            _ => format!("Idle (since {since})"),
        }
    }
}

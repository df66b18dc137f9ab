use crate::config::{Config, Rule};

#[derive(Debug)]
pub enum AppEvent {
    /// A rule matched a running process and differs from the one playing (if any).
    RuleMatched(Rule),
    /// The rule that was playing no longer matches any running process.
    RuleCleared(Rule),
    /// The config file changed on disk and was successfully re-parsed.
    ConfigReloaded(Config),
    /// Ctrl+C received; stop playback and exit.
    Shutdown,
}

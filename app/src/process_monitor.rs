use std::sync::Arc;
use sysinfo::{ProcessesToUpdate, System};
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::config::Rule;
use crate::event::AppEvent;
use crate::state::AppState;

pub const POLL_INTERVAL_SECS: u64 = 10;

/// Source of running process names.
pub trait ProcessSource: Send {
    fn process_names(&mut self) -> Vec<String>;
}

/// Live OS process list backed by `sysinfo`.
pub struct SystemProcesses {
    sys: System,
}

impl SystemProcesses {
    pub fn new() -> Self {
        Self { sys: System::new() }
    }
}

impl ProcessSource for SystemProcesses {
    fn process_names(&mut self) -> Vec<String> {
        // Dead processes must be dropped or an exited game would keep matching.
        self.sys.refresh_processes(ProcessesToUpdate::All, true);
        self.sys
            .processes()
            .values()
            .map(|p| p.name().to_string_lossy().into_owned())
            .collect()
    }
}

/// Returns the first rule whose match string is a case-insensitive substring of
/// any name in `processes`. Rules with a blank match string never match.
pub fn find_match<'a, S: AsRef<str>>(rules: &'a [Rule], processes: &[S]) -> Option<&'a Rule> {
    let names: Vec<String> = processes.iter().map(|p| p.as_ref().to_lowercase()).collect();
    rules.iter().find(|rule| {
        let needle = rule.process_match.trim().to_lowercase();
        !needle.is_empty() && names.iter().any(|name| name.contains(&needle))
    })
}

/// A change in which rule should be playing.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Start(Rule),
    Switch { from: Rule, to: Rule },
    Stop(Rule),
}

/// Watcher state: the rule currently playing, if any.
#[derive(Debug, Default)]
pub struct MatchTracker {
    active: Option<Rule>,
}

impl MatchTracker {
    /// Feeds this cycle's match and returns the transition it causes, if any.
    pub fn observe(&mut self, matched: Option<&Rule>) -> Option<Transition> {
        match (self.active.take(), matched) {
            (None, None) => None,
            (None, Some(rule)) => {
                self.active = Some(rule.clone());
                Some(Transition::Start(rule.clone()))
            }
            (Some(current), Some(rule)) if current == *rule => {
                self.active = Some(current);
                None
            }
            (Some(current), Some(rule)) => {
                self.active = Some(rule.clone());
                Some(Transition::Switch {
                    from: current,
                    to: rule.clone(),
                })
            }
            (Some(current), None) => Some(Transition::Stop(current)),
        }
    }
}

/// Polls `source` every `period` and emits [`AppEvent::RuleMatched`] /
/// [`AppEvent::RuleCleared`] whenever the matching rule changes.
///
/// At most one rule is active at a time; when several match, the first in the
/// config list wins. Returns once the event receiver is dropped.
pub async fn run<P: ProcessSource>(
    state: Arc<AppState>,
    mut source: P,
    period: Duration,
    tx: mpsc::Sender<AppEvent>,
) {
    let mut tracker = MatchTracker::default();
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let names = source.process_names();
        let rules = state.rules_snapshot();
        let matched = find_match(&rules, &names);

        let event = match tracker.observe(matched) {
            None => continue,
            Some(Transition::Start(rule)) => {
                tracing::info!("{} is running, playing {}", rule.process_match, rule.track_path);
                AppEvent::RuleMatched(rule)
            }
            Some(Transition::Switch { from, to }) => {
                tracing::info!("Switching from {} to {}", from.process_match, to.process_match);
                AppEvent::RuleMatched(to)
            }
            Some(Transition::Stop(rule)) => {
                tracing::info!("{} has stopped, stopping music", rule.process_match);
                AppEvent::RuleCleared(rule)
            }
        };

        if tx.send(event).await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    use crate::config::Config;

    fn rule(process: &str, track: &str) -> Rule {
        Rule::new(process, track)
    }

    // ── find_match ────────────────────────────────────────────────────────────

    #[test]
    fn find_match_substring_case_insensitive() {
        let rules = vec![rule("NotePad", "a.mp3")];
        let found = find_match(&rules, &["explorer.exe", "notepad.EXE"]);
        assert_eq!(found, Some(&rules[0]));
    }

    #[test]
    fn find_match_first_rule_wins() {
        let rules = vec![rule("steam", "a.mp3"), rule("game", "b.mp3"), rule("steam", "c.mp3")];
        let found = find_match(&rules, &["game.exe", "steam.exe"]);
        assert_eq!(found, Some(&rules[0]));
    }

    #[test]
    fn find_match_order_follows_rules_not_processes() {
        let rules = vec![rule("zeta", "z.mp3"), rule("alpha", "a.mp3")];
        let found = find_match(&rules, &["alpha.exe", "zeta.exe"]);
        assert_eq!(found.map(|r| r.track_path.as_str()), Some("z.mp3"));
    }

    #[test]
    fn find_match_none_when_nothing_runs() {
        let rules = vec![rule("notepad", "a.mp3")];
        assert_eq!(find_match(&rules, &["explorer.exe"]), None);
        assert_eq!(find_match::<&str>(&rules, &[]), None);
        assert_eq!(find_match(&[], &["notepad.exe"]), None);
    }

    #[test]
    fn find_match_skips_blank_match_strings() {
        let rules = vec![rule("", "a.mp3"), rule("   ", "b.mp3"), rule("game", "c.mp3")];
        let found = find_match(&rules, &["game.exe"]);
        assert_eq!(found.map(|r| r.track_path.as_str()), Some("c.mp3"));
        assert_eq!(find_match(&rules[..2], &["game.exe"]), None);
    }

    // ── MatchTracker ──────────────────────────────────────────────────────────

    #[test]
    fn idle_to_match_starts() {
        let mut t = MatchTracker::default();
        let r = rule("notepad", "a.mp3");
        assert_eq!(t.observe(Some(&r)), Some(Transition::Start(r.clone())));
        assert_eq!(t.active, Some(r));
    }

    #[test]
    fn same_rule_again_is_noop() {
        let mut t = MatchTracker::default();
        let r = rule("notepad", "a.mp3");
        t.observe(Some(&r));
        assert_eq!(t.observe(Some(&r)), None);
        assert_eq!(t.observe(Some(&r.clone())), None);
        assert_eq!(t.active, Some(r));
    }

    #[test]
    fn different_rule_switches() {
        let mut t = MatchTracker::default();
        let r1 = rule("notepad", "a.mp3");
        let r2 = rule("game", "b.mp3");
        t.observe(Some(&r1));
        assert_eq!(
            t.observe(Some(&r2)),
            Some(Transition::Switch { from: r1, to: r2.clone() })
        );
        assert_eq!(t.active, Some(r2));
    }

    #[test]
    fn same_process_new_track_switches() {
        let mut t = MatchTracker::default();
        let old = rule("notepad", "a.mp3");
        let new = rule("notepad", "b.mp3");
        t.observe(Some(&old));
        assert!(matches!(t.observe(Some(&new)), Some(Transition::Switch { .. })));
    }

    #[test]
    fn match_lost_stops() {
        let mut t = MatchTracker::default();
        let r = rule("notepad", "a.mp3");
        t.observe(Some(&r));
        assert_eq!(t.observe(None), Some(Transition::Stop(r)));
        assert_eq!(t.active, None);
    }

    #[test]
    fn idle_without_match_is_noop() {
        let mut t = MatchTracker::default();
        assert_eq!(t.observe(None), None);
        assert_eq!(t.observe(None), None);
        assert_eq!(t.active, None);
    }

    // ── run ───────────────────────────────────────────────────────────────────

    /// Replays scripted snapshots, then repeats the last one.
    struct Scripted(VecDeque<Vec<String>>);

    impl Scripted {
        fn new(snapshots: &[&[&str]]) -> Self {
            Self(
                snapshots
                    .iter()
                    .map(|s| s.iter().map(|n| n.to_string()).collect())
                    .collect(),
            )
        }
    }

    impl ProcessSource for Scripted {
        fn process_names(&mut self) -> Vec<String> {
            if self.0.len() > 1 {
                self.0.pop_front().unwrap_or_default()
            } else {
                self.0.front().cloned().unwrap_or_default()
            }
        }
    }

    fn state_with(rules: Vec<Rule>) -> (tempfile::TempDir, Arc<AppState>) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config { rules, volume: 50 };
        let state = Arc::new(AppState::new(config, dir.path().join("config.json")));
        (dir, state)
    }

    #[tokio::test]
    async fn run_starts_then_stops_playback() {
        let (_dir, state) = state_with(vec![rule("notepad", "a.mp3")]);
        let source = Scripted::new(&[&["explorer.exe", "notepad.exe"], &["notepad.exe"], &["explorer.exe"]]);
        let (tx, mut rx) = mpsc::channel(8);
        let handle = tokio::spawn(run(state, source, Duration::from_millis(5), tx));

        match rx.recv().await {
            Some(AppEvent::RuleMatched(r)) => assert_eq!(r.track_path, "a.mp3"),
            other => panic!("expected RuleMatched, got {other:?}"),
        }
        match rx.recv().await {
            Some(AppEvent::RuleCleared(r)) => assert_eq!(r.process_match, "notepad"),
            other => panic!("expected RuleCleared, got {other:?}"),
        }

        drop(rx);
        handle.abort();
    }

    #[tokio::test]
    async fn run_reads_rule_changes_between_cycles() {
        let (_dir, state) = state_with(vec![]);
        let source = Scripted::new(&[&["game.exe"]]);
        let (tx, mut rx) = mpsc::channel(8);
        let handle = tokio::spawn(run(Arc::clone(&state), source, Duration::from_millis(5), tx));

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(rx.try_recv().is_err());

        state.add_rule(rule("GAME", "b.wav")).unwrap();
        match rx.recv().await {
            Some(AppEvent::RuleMatched(r)) => assert_eq!(r.track_path, "b.wav"),
            other => panic!("expected RuleMatched, got {other:?}"),
        }

        handle.abort();
    }

    #[tokio::test]
    async fn run_exits_when_receiver_dropped() {
        let (_dir, state) = state_with(vec![rule("notepad", "a.mp3")]);
        let source = Scripted::new(&[&["notepad.exe"], &[], &["notepad.exe"]]);
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        tokio::time::timeout(
            Duration::from_secs(5),
            run(state, source, Duration::from_millis(5), tx),
        )
        .await
        .expect("run should return once the receiver is gone");
    }
}

//! Drift-corrected Pomodoro countdown.
//!
//! The timer is a wall-clock-based state machine. It does not use internal
//! threads; the caller invokes `tick()` whenever it wants fresh progress.
//! While running, the only source of truth is the wall-clock deadline
//! (`expected_end_ms`), so a process that was suspended, killed or simply
//! not ticking recovers the exact remaining time from two timestamps.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running -> (Paused -> Running)* -> Idle (next session)
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let (mut timer, missed) = PomodoroTimer::restore(settings, snapshot);
//! timer.start();
//! // In a loop:
//! timer.tick(); // Returns Some(Event::SessionCompleted) at zero
//! store.save(&timer.snapshot());
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::session::{format_time, SessionKind, TimerSettings};
use crate::events::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Running,
    Paused,
}

impl TimerState {
    /// Word shown under the countdown.
    pub fn status_label(self) -> &'static str {
        match self {
            TimerState::Running => "Running",
            TimerState::Paused => "Paused",
            TimerState::Idle => "Ready",
        }
    }
}

/// The persisted timer shape.
///
/// Field names match the JSON written under the `pomodoro-timer` key:
/// `{timeLeft, state, cycles, isBreak, isLongBreak, expectedEndTime}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    /// Seconds left in the current session.
    pub time_left: u64,
    pub state: TimerState,
    pub cycles: u32,
    pub is_break: bool,
    pub is_long_break: bool,
    /// Deadline in epoch milliseconds; set only while running.
    #[serde(default)]
    pub expected_end_time: Option<u64>,
    /// When the current session was first started (epoch ms).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_started_at: Option<u64>,
}

/// Core countdown.
///
/// Operates on wall-clock deltas -- no internal thread.
#[derive(Debug, Clone)]
pub struct PomodoroTimer {
    settings: TimerSettings,
    state: TimerState,
    kind: SessionKind,
    cycles: u32,
    time_left_secs: u64,
    /// Epoch ms at which the running session hits zero.
    expected_end_ms: Option<u64>,
    /// Epoch ms of the first start of the current session.
    started_ms: Option<u64>,
}

impl PomodoroTimer {
    /// Create an idle timer at the top of a work session with zero cycles.
    pub fn new(settings: TimerSettings) -> Self {
        let time_left_secs = settings.duration_secs(SessionKind::Work);
        Self {
            settings,
            state: TimerState::Idle,
            kind: SessionKind::Work,
            cycles: 0,
            time_left_secs,
            expected_end_ms: None,
            started_ms: None,
        }
    }

    /// Rebuild a timer from persisted state, correcting for the time that
    /// passed while nothing was ticking.
    ///
    /// Returns the completion event if the deadline passed in the meantime.
    pub fn restore(settings: TimerSettings, snapshot: TimerSnapshot) -> (Self, Option<Event>) {
        Self::restore_at(settings, snapshot, now_ms())
    }

    pub fn restore_at(
        settings: TimerSettings,
        snapshot: TimerSnapshot,
        now: u64,
    ) -> (Self, Option<Event>) {
        let mut timer = Self {
            settings,
            state: snapshot.state,
            kind: SessionKind::from_flags(snapshot.is_break, snapshot.is_long_break),
            cycles: snapshot.cycles,
            time_left_secs: snapshot.time_left,
            expected_end_ms: None,
            started_ms: snapshot.session_started_at,
        };

        match (snapshot.state, snapshot.expected_end_time) {
            (TimerState::Running, Some(end)) => {
                timer.expected_end_ms = Some(end);
                let missed = timer.tick_at(now);
                debug!(
                    time_left_secs = timer.time_left_secs,
                    completed = missed.is_some(),
                    "restored running timer"
                );
                (timer, missed)
            }
            (TimerState::Running, None) => {
                warn!("persisted timer was running without a deadline; restoring as paused");
                timer.state = TimerState::Paused;
                (timer, None)
            }
            _ => (timer, None),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    pub fn cycles(&self) -> u32 {
        self.cycles
    }

    pub fn time_left_secs(&self) -> u64 {
        self.time_left_secs
    }

    pub fn expected_end_ms(&self) -> Option<u64> {
        self.expected_end_ms
    }

    pub fn settings(&self) -> &TimerSettings {
        &self.settings
    }

    /// Full length of the current session in seconds.
    pub fn total_secs(&self) -> u64 {
        self.settings.duration_secs(self.kind)
    }

    /// 0.0 .. 1.0 progress within the current session.
    pub fn progress(&self) -> f64 {
        let total = self.total_secs();
        if total == 0 {
            return 0.0;
        }
        (1.0 - self.time_left_secs as f64 / total as f64).clamp(0.0, 1.0)
    }

    /// The persisted shape of the current state.
    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            time_left: self.time_left_secs,
            state: self.state,
            cycles: self.cycles,
            is_break: self.kind.is_break(),
            is_long_break: self.kind.is_long_break(),
            expected_end_time: match self.state {
                TimerState::Running => self.expected_end_ms,
                _ => None,
            },
            session_started_at: self.started_ms,
        }
    }

    /// Build a full state snapshot event.
    pub fn status(&self) -> Event {
        self.status_at(now_ms())
    }

    pub fn status_at(&self, now: u64) -> Event {
        Event::StateSnapshot {
            state: self.state,
            kind: self.kind,
            label: self.kind.label().to_string(),
            status: self.state.status_label().to_string(),
            time_left_secs: self.time_left_secs,
            display: format_time(self.time_left_secs),
            total_secs: self.total_secs(),
            progress: self.progress(),
            cycles: self.cycles,
            at: to_datetime(now),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self) -> Option<Event> {
        self.start_at(now_ms())
    }

    /// Start from idle or continue from paused. No-op while running.
    pub fn start_at(&mut self, now: u64) -> Option<Event> {
        match self.state {
            TimerState::Idle => {
                self.begin(now);
                Some(Event::TimerStarted {
                    kind: self.kind,
                    time_left_secs: self.time_left_secs,
                    expected_end: to_datetime(self.expected_end_ms.unwrap_or(now)),
                    at: to_datetime(now),
                })
            }
            TimerState::Paused => {
                self.begin(now);
                Some(Event::TimerResumed {
                    kind: self.kind,
                    time_left_secs: self.time_left_secs,
                    expected_end: to_datetime(self.expected_end_ms.unwrap_or(now)),
                    at: to_datetime(now),
                })
            }
            TimerState::Running => None,
        }
    }

    pub fn pause(&mut self) -> Option<Event> {
        self.pause_at(now_ms())
    }

    /// Freeze the remaining time.
    ///
    /// If the deadline already passed, the session completes instead and
    /// the completion event is returned.
    pub fn pause_at(&mut self, now: u64) -> Option<Event> {
        if self.state != TimerState::Running {
            return None;
        }
        if let Some(completed) = self.tick_at(now) {
            return Some(completed);
        }
        self.state = TimerState::Paused;
        self.expected_end_ms = None;
        Some(Event::TimerPaused {
            kind: self.kind,
            time_left_secs: self.time_left_secs,
            at: to_datetime(now),
        })
    }

    pub fn resume(&mut self) -> Option<Event> {
        self.resume_at(now_ms())
    }

    /// Only acts on a paused timer.
    pub fn resume_at(&mut self, now: u64) -> Option<Event> {
        if self.state != TimerState::Paused {
            return None;
        }
        self.start_at(now)
    }

    pub fn toggle(&mut self) -> Option<Event> {
        self.toggle_at(now_ms())
    }

    /// The single play/pause control: pause when running, otherwise start or resume.
    pub fn toggle_at(&mut self, now: u64) -> Option<Event> {
        match self.state {
            TimerState::Running => self.pause_at(now),
            TimerState::Paused => self.resume_at(now),
            TimerState::Idle => self.start_at(now),
        }
    }

    pub fn reset(&mut self) -> Option<Event> {
        self.reset_at(now_ms())
    }

    /// Back to idle with the full duration of the current session kind.
    /// Cycles are kept.
    pub fn reset_at(&mut self, now: u64) -> Option<Event> {
        self.state = TimerState::Idle;
        self.expected_end_ms = None;
        self.started_ms = None;
        self.time_left_secs = self.total_secs();
        Some(Event::TimerReset {
            kind: self.kind,
            time_left_secs: self.time_left_secs,
            at: to_datetime(now),
        })
    }

    pub fn skip(&mut self) -> Option<Event> {
        self.skip_at(now_ms())
    }

    /// Jump to the next session as if the current one had finished.
    /// Never auto-starts the next session.
    pub fn skip_at(&mut self, now: u64) -> Option<Event> {
        let from = self.kind;
        self.state = TimerState::Idle;
        self.expected_end_ms = None;
        self.started_ms = None;
        let to = self.advance();
        Some(Event::TimerSkipped {
            from,
            to,
            cycles: self.cycles,
            at: to_datetime(now),
        })
    }

    pub fn tick(&mut self) -> Option<Event> {
        self.tick_at(now_ms())
    }

    /// Recompute the remaining time from the deadline.
    ///
    /// Returns `Some(Event::SessionCompleted)` when the session finishes.
    pub fn tick_at(&mut self, now: u64) -> Option<Event> {
        if self.state != TimerState::Running {
            return None;
        }
        let end = self.expected_end_ms?;
        self.time_left_secs = secs_until(end, now);
        if self.time_left_secs > 0 {
            return None;
        }
        Some(self.complete(end, now))
    }

    /// Swap in new settings.
    ///
    /// An idle session that has not been started yet picks up its new
    /// length; anything in progress keeps its remaining time.
    pub fn apply_settings(&mut self, settings: TimerSettings) {
        let untouched = self.state == TimerState::Idle
            && self.started_ms.is_none()
            && self.time_left_secs == self.total_secs();
        self.settings = settings;
        if untouched {
            self.time_left_secs = self.total_secs();
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn begin(&mut self, now: u64) {
        self.state = TimerState::Running;
        self.expected_end_ms = Some(now.saturating_add(self.time_left_secs.saturating_mul(1000)));
        self.started_ms.get_or_insert(now);
    }

    fn complete(&mut self, end: u64, now: u64) -> Event {
        let finished = self.kind;
        let started_at = self.started_ms.map(to_datetime);
        self.state = TimerState::Idle;
        self.expected_end_ms = None;
        self.started_ms = None;
        let next = self.advance();

        let auto_started = finished == SessionKind::Work && self.settings.auto_start_breaks;
        if auto_started {
            self.begin(now);
        }
        debug!(
            finished = finished.as_str(),
            next = next.as_str(),
            cycles = self.cycles,
            auto_started,
            "session completed"
        );

        Event::SessionCompleted {
            kind: finished,
            started_at,
            ended_at: to_datetime(end),
            cycles: self.cycles,
            next,
            auto_started,
        }
    }

    /// Move to the following session and load its full duration.
    fn advance(&mut self) -> SessionKind {
        let next = match self.kind {
            SessionKind::Work => {
                self.cycles = self.cycles.saturating_add(1);
                self.settings.break_after(self.cycles)
            }
            SessionKind::ShortBreak | SessionKind::LongBreak => SessionKind::Work,
        };
        self.kind = next;
        self.time_left_secs = self.total_secs();
        next
    }
}

/// Whole seconds from `now` until `end`, rounded up, zero once passed.
fn secs_until(end: u64, now: u64) -> u64 {
    end.saturating_sub(now).div_ceil(1000)
}

fn to_datetime(ms: u64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(i64::try_from(ms).unwrap_or(i64::MAX)).unwrap_or_default()
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: u64 = 1_700_000_000_000;

    fn settings() -> TimerSettings {
        TimerSettings::default()
    }

    #[test]
    fn start_pause_resume() {
        let mut timer = PomodoroTimer::new(settings());
        assert_eq!(timer.state(), TimerState::Idle);
        assert_eq!(timer.time_left_secs(), 25 * 60);

        assert!(matches!(timer.start_at(T0), Some(Event::TimerStarted { .. })));
        assert_eq!(timer.state(), TimerState::Running);
        assert_eq!(timer.expected_end_ms(), Some(T0 + 25 * 60 * 1000));

        assert!(matches!(timer.pause_at(T0 + 10_000), Some(Event::TimerPaused { .. })));
        assert_eq!(timer.state(), TimerState::Paused);
        assert_eq!(timer.time_left_secs(), 25 * 60 - 10);
        assert_eq!(timer.expected_end_ms(), None);

        assert!(matches!(timer.resume_at(T0 + 60_000), Some(Event::TimerResumed { .. })));
        assert_eq!(timer.expected_end_ms(), Some(T0 + 60_000 + (25 * 60 - 10) * 1000));
    }

    #[test]
    fn start_is_noop_while_running() {
        let mut timer = PomodoroTimer::new(settings());
        timer.start_at(T0);
        assert!(timer.start_at(T0 + 5_000).is_none());
        assert_eq!(timer.expected_end_ms(), Some(T0 + 25 * 60 * 1000));
    }

    #[test]
    fn resume_only_from_paused() {
        let mut timer = PomodoroTimer::new(settings());
        assert!(timer.resume_at(T0).is_none());
        assert_eq!(timer.state(), TimerState::Idle);
    }

    #[test]
    fn tick_rounds_partial_seconds_up() {
        let mut timer = PomodoroTimer::new(settings());
        timer.start_at(T0);
        assert!(timer.tick_at(T0 + 1_500).is_none());
        assert_eq!(timer.time_left_secs(), 25 * 60 - 1);
    }

    #[test]
    fn work_completion_moves_to_short_break() {
        let mut timer = PomodoroTimer::new(settings());
        timer.start_at(T0);
        let event = timer.tick_at(T0 + 25 * 60 * 1000).expect("completed");
        match event {
            Event::SessionCompleted {
                kind,
                cycles,
                next,
                auto_started,
                started_at,
                ..
            } => {
                assert_eq!(kind, SessionKind::Work);
                assert_eq!(cycles, 1);
                assert_eq!(next, SessionKind::ShortBreak);
                assert!(!auto_started);
                assert_eq!(started_at, Some(to_datetime(T0)));
            }
            other => panic!("Expected SessionCompleted, got {other:?}"),
        }
        assert_eq!(timer.state(), TimerState::Idle);
        assert_eq!(timer.kind(), SessionKind::ShortBreak);
        assert_eq!(timer.time_left_secs(), 5 * 60);
    }

    #[test]
    fn fourth_cycle_earns_long_break() {
        let mut timer = PomodoroTimer::new(settings());
        for _ in 0..3 {
            timer.skip_at(T0); // work -> short break
            timer.skip_at(T0); // break -> work
        }
        assert_eq!(timer.cycles(), 3);
        timer.skip_at(T0);
        assert_eq!(timer.cycles(), 4);
        assert_eq!(timer.kind(), SessionKind::LongBreak);
        assert_eq!(timer.time_left_secs(), 15 * 60);
        let snap = timer.snapshot();
        assert!(snap.is_break && snap.is_long_break);
    }

    #[test]
    fn break_completion_returns_to_work_without_cycle() {
        let mut timer = PomodoroTimer::new(settings());
        timer.skip_at(T0);
        timer.start_at(T0);
        let event = timer.tick_at(T0 + 5 * 60 * 1000).expect("completed");
        assert!(matches!(
            event,
            Event::SessionCompleted {
                kind: SessionKind::ShortBreak,
                next: SessionKind::Work,
                cycles: 1,
                ..
            }
        ));
        assert_eq!(timer.kind(), SessionKind::Work);
        assert_eq!(timer.time_left_secs(), 25 * 60);
    }

    #[test]
    fn auto_start_breaks_runs_the_break_immediately() {
        let mut timer = PomodoroTimer::new(TimerSettings {
            auto_start_breaks: true,
            ..settings()
        });
        timer.start_at(T0);
        let now = T0 + 25 * 60 * 1000 + 200;
        let event = timer.tick_at(now).expect("completed");
        assert!(matches!(event, Event::SessionCompleted { auto_started: true, .. }));
        assert_eq!(timer.state(), TimerState::Running);
        assert_eq!(timer.kind(), SessionKind::ShortBreak);
        assert_eq!(timer.expected_end_ms(), Some(now + 5 * 60 * 1000));
    }

    #[test]
    fn finished_break_never_auto_starts_work() {
        let mut timer = PomodoroTimer::new(TimerSettings {
            auto_start_breaks: true,
            ..settings()
        });
        timer.skip_at(T0);
        timer.start_at(T0);
        timer.tick_at(T0 + 5 * 60 * 1000);
        assert_eq!(timer.state(), TimerState::Idle);
        assert_eq!(timer.kind(), SessionKind::Work);
    }

    #[test]
    fn reset_restores_current_kind_duration() {
        let mut timer = PomodoroTimer::new(settings());
        timer.skip_at(T0);
        timer.start_at(T0);
        timer.tick_at(T0 + 90_000);
        timer.reset_at(T0 + 90_000);
        assert_eq!(timer.state(), TimerState::Idle);
        assert_eq!(timer.kind(), SessionKind::ShortBreak);
        assert_eq!(timer.time_left_secs(), 5 * 60);
        assert_eq!(timer.cycles(), 1);
    }

    #[test]
    fn pause_past_deadline_completes_instead() {
        let mut timer = PomodoroTimer::new(settings());
        timer.start_at(T0);
        let event = timer.pause_at(T0 + 30 * 60 * 1000);
        assert!(matches!(event, Some(Event::SessionCompleted { .. })));
        assert_eq!(timer.state(), TimerState::Idle);
    }

    #[test]
    fn restore_recomputes_remaining_from_deadline() {
        let mut timer = PomodoroTimer::new(settings());
        timer.start_at(T0);
        let snap = timer.snapshot();
        assert_eq!(snap.expected_end_time, Some(T0 + 25 * 60 * 1000));

        let (restored, missed) = PomodoroTimer::restore_at(settings(), snap, T0 + 10 * 60 * 1000);
        assert!(missed.is_none());
        assert_eq!(restored.state(), TimerState::Running);
        assert_eq!(restored.time_left_secs(), 15 * 60);
    }

    #[test]
    fn restore_after_deadline_completes_session() {
        let mut timer = PomodoroTimer::new(settings());
        timer.start_at(T0);
        let snap = timer.snapshot();

        let (restored, missed) = PomodoroTimer::restore_at(settings(), snap, T0 + 3_600_000);
        match missed {
            Some(Event::SessionCompleted { ended_at, .. }) => {
                assert_eq!(ended_at, to_datetime(T0 + 25 * 60 * 1000));
            }
            other => panic!("Expected SessionCompleted, got {other:?}"),
        }
        assert_eq!(restored.state(), TimerState::Idle);
        assert_eq!(restored.kind(), SessionKind::ShortBreak);
        assert_eq!(restored.cycles(), 1);
    }

    #[test]
    fn restore_paused_is_verbatim() {
        let snap = TimerSnapshot {
            time_left: 42,
            state: TimerState::Paused,
            cycles: 2,
            is_break: false,
            is_long_break: false,
            expected_end_time: Some(T0),
            session_started_at: None,
        };
        let (restored, missed) = PomodoroTimer::restore_at(settings(), snap, T0 + 999_999);
        assert!(missed.is_none());
        assert_eq!(restored.time_left_secs(), 42);
        assert_eq!(restored.snapshot().expected_end_time, None);
    }

    #[test]
    fn running_without_deadline_restores_paused() {
        let snap = TimerSnapshot {
            time_left: 100,
            state: TimerState::Running,
            cycles: 0,
            is_break: false,
            is_long_break: false,
            expected_end_time: None,
            session_started_at: None,
        };
        let (restored, _) = PomodoroTimer::restore_at(settings(), snap, T0);
        assert_eq!(restored.state(), TimerState::Paused);
        assert_eq!(restored.time_left_secs(), 100);
    }

    #[test]
    fn snapshot_uses_camel_case_keys() {
        let mut timer = PomodoroTimer::new(settings());
        timer.start_at(T0);
        let json = serde_json::to_value(timer.snapshot()).unwrap();
        assert_eq!(json["timeLeft"], 1500);
        assert_eq!(json["state"], "running");
        assert_eq!(json["isBreak"], false);
        assert_eq!(json["isLongBreak"], false);
        assert_eq!(json["expectedEndTime"], T0 + 1_500_000);
    }

    #[test]
    fn snapshot_parses_without_optional_fields() {
        let json = r#"{"timeLeft":300,"state":"idle","cycles":4,"isBreak":true,"isLongBreak":true,"expectedEndTime":null}"#;
        let snap: TimerSnapshot = serde_json::from_str(json).unwrap();
        let (timer, _) = PomodoroTimer::restore_at(settings(), snap, T0);
        assert_eq!(timer.kind(), SessionKind::LongBreak);
        assert_eq!(timer.cycles(), 4);
    }

    #[test]
    fn apply_settings_updates_untouched_idle_session() {
        let mut timer = PomodoroTimer::new(settings());
        timer.apply_settings(TimerSettings {
            work_duration: 50,
            ..settings()
        });
        assert_eq!(timer.time_left_secs(), 50 * 60);

        timer.start_at(T0);
        timer.pause_at(T0 + 1_000);
        timer.apply_settings(settings());
        assert_eq!(timer.time_left_secs(), 50 * 60 - 1);
    }

    #[test]
    fn status_reports_display_and_progress() {
        let mut timer = PomodoroTimer::new(settings());
        timer.start_at(T0);
        timer.tick_at(T0 + 750_000);
        match timer.status_at(T0 + 750_000) {
            Event::StateSnapshot {
                display,
                progress,
                status,
                label,
                ..
            } => {
                assert_eq!(display, "12:30");
                assert!((progress - 0.5).abs() < f64::EPSILON);
                assert_eq!(status, "Running");
                assert_eq!(label, "Work Session");
            }
            other => panic!("Expected StateSnapshot, got {other:?}"),
        }
    }
}

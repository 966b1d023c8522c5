use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::{SessionKind, TimerState};

/// Every timer state change produces an Event.
/// The CLI prints them; completion events also feed the session log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerStarted {
        kind: SessionKind,
        time_left_secs: u64,
        expected_end: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    TimerPaused {
        kind: SessionKind,
        time_left_secs: u64,
        at: DateTime<Utc>,
    },
    TimerResumed {
        kind: SessionKind,
        time_left_secs: u64,
        expected_end: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    /// A countdown reached zero.
    SessionCompleted {
        kind: SessionKind,
        /// When the session was first started, if known.
        started_at: Option<DateTime<Utc>>,
        /// The wall-clock deadline, which may lie in the past after a restore.
        ended_at: DateTime<Utc>,
        cycles: u32,
        next: SessionKind,
        /// The next session (a break) was started automatically.
        auto_started: bool,
    },
    TimerSkipped {
        from: SessionKind,
        to: SessionKind,
        cycles: u32,
        at: DateTime<Utc>,
    },
    TimerReset {
        kind: SessionKind,
        time_left_secs: u64,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        state: TimerState,
        kind: SessionKind,
        label: String,
        status: String,
        time_left_secs: u64,
        display: String,
        total_secs: u64,
        progress: f64,
        cycles: u32,
        at: DateTime<Utc>,
    },
}

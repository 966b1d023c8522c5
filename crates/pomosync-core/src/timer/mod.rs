mod engine;
mod session;

pub use engine::{PomodoroTimer, TimerSnapshot, TimerState};
pub use session::{format_time, SessionKind, TimerSettings};

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Which kind of interval the timer is counting down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    Work,
    ShortBreak,
    LongBreak,
}

impl SessionKind {
    /// Decode the `isBreak` / `isLongBreak` flag pair.
    ///
    /// A long-break flag without the break flag is treated as work, since
    /// `isLongBreak` is meaningless outside a break.
    pub fn from_flags(is_break: bool, is_long_break: bool) -> Self {
        match (is_break, is_long_break) {
            (false, _) => SessionKind::Work,
            (true, false) => SessionKind::ShortBreak,
            (true, true) => SessionKind::LongBreak,
        }
    }

    pub fn is_break(self) -> bool {
        !matches!(self, SessionKind::Work)
    }

    pub fn is_long_break(self) -> bool {
        matches!(self, SessionKind::LongBreak)
    }

    pub fn label(self) -> &'static str {
        match self {
            SessionKind::Work => "Work Session",
            SessionKind::ShortBreak => "Short Break",
            SessionKind::LongBreak => "Long Break",
        }
    }

    /// Column value used by the local session log and the cloud `sessions` table.
    pub fn as_str(self) -> &'static str {
        match self {
            SessionKind::Work => "work",
            SessionKind::ShortBreak => "short_break",
            SessionKind::LongBreak => "long_break",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "work" => Some(SessionKind::Work),
            "short_break" => Some(SessionKind::ShortBreak),
            "long_break" => Some(SessionKind::LongBreak),
            _ => None,
        }
    }
}

/// Timer durations and behaviour. Durations are in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSettings {
    #[serde(default = "default_work_duration")]
    pub work_duration: u32,
    #[serde(default = "default_short_break_duration")]
    pub short_break_duration: u32,
    #[serde(default = "default_long_break_duration")]
    pub long_break_duration: u32,
    #[serde(default)]
    pub auto_start_breaks: bool,
    /// Every Nth completed work session is followed by a long break.
    #[serde(default = "default_cycles_before_long_break")]
    pub cycles_before_long_break: u32,
}

fn default_work_duration() -> u32 {
    25
}
fn default_short_break_duration() -> u32 {
    5
}
fn default_long_break_duration() -> u32 {
    15
}
fn default_cycles_before_long_break() -> u32 {
    4
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            work_duration: default_work_duration(),
            short_break_duration: default_short_break_duration(),
            long_break_duration: default_long_break_duration(),
            auto_start_breaks: false,
            cycles_before_long_break: default_cycles_before_long_break(),
        }
    }
}

impl TimerSettings {
    /// Configured duration of `kind`, in minutes.
    pub fn duration_min(&self, kind: SessionKind) -> u32 {
        match kind {
            SessionKind::Work => self.work_duration,
            SessionKind::ShortBreak => self.short_break_duration,
            SessionKind::LongBreak => self.long_break_duration,
        }
    }

    /// Configured duration of `kind`, in seconds.
    pub fn duration_secs(&self, kind: SessionKind) -> u64 {
        u64::from(self.duration_min(kind)).saturating_mul(60)
    }

    /// The break that follows the `completed_cycles`-th work session.
    pub fn break_after(&self, completed_cycles: u32) -> SessionKind {
        let every = self.cycles_before_long_break.max(1);
        if completed_cycles > 0 && completed_cycles % every == 0 {
            SessionKind::LongBreak
        } else {
            SessionKind::ShortBreak
        }
    }

    /// Check every duration against the ranges the settings screen accepts.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_range("timer.work_duration", self.work_duration, 1, 60)?;
        check_range("timer.short_break_duration", self.short_break_duration, 1, 30)?;
        check_range("timer.long_break_duration", self.long_break_duration, 1, 60)?;
        check_range(
            "timer.cycles_before_long_break",
            self.cycles_before_long_break,
            1,
            u32::MAX,
        )?;
        Ok(())
    }
}

fn check_range(field: &str, value: u32, min: u32, max: u32) -> Result<(), ValidationError> {
    if value < min || value > max {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min,
            max,
            value,
        });
    }
    Ok(())
}

/// Render whole seconds as `MM:SS`. Minutes are not wrapped into hours.
pub fn format_time(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_fourth_cycle_earns_a_long_break() {
        let s = TimerSettings::default();
        assert_eq!(s.break_after(1), SessionKind::ShortBreak);
        assert_eq!(s.break_after(3), SessionKind::ShortBreak);
        assert_eq!(s.break_after(4), SessionKind::LongBreak);
        assert_eq!(s.break_after(8), SessionKind::LongBreak);
    }

    #[test]
    fn zero_interval_behaves_like_one() {
        let s = TimerSettings {
            cycles_before_long_break: 0,
            ..TimerSettings::default()
        };
        assert_eq!(s.break_after(1), SessionKind::LongBreak);
    }

    #[test]
    fn flags_roundtrip_through_kind() {
        for kind in [SessionKind::Work, SessionKind::ShortBreak, SessionKind::LongBreak] {
            assert_eq!(SessionKind::from_flags(kind.is_break(), kind.is_long_break()), kind);
        }
        assert_eq!(SessionKind::from_flags(false, true), SessionKind::Work);
    }

    #[test]
    fn validate_rejects_out_of_range_durations() {
        let mut s = TimerSettings::default();
        assert!(s.validate().is_ok());
        s.short_break_duration = 31;
        assert!(s.validate().is_err());
        s.short_break_duration = 5;
        s.work_duration = 0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn format_time_pads_both_fields() {
        assert_eq!(format_time(0), "00:00");
        assert_eq!(format_time(65), "01:05");
        assert_eq!(format_time(25 * 60), "25:00");
        assert_eq!(format_time(100 * 60), "100:00");
    }
}

//! Completion notifications.

use std::io::Write;

use crate::error::Result;
use crate::storage::Config;
use crate::timer::SessionKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: &'static str,
    pub body: String,
}

impl Notification {
    pub fn session_complete(kind: SessionKind) -> Self {
        let name = match kind {
            SessionKind::Work => "Work",
            SessionKind::ShortBreak => "Short break",
            SessionKind::LongBreak => "Long break",
        };
        Self {
            title: "Pomodoro Session Complete!",
            body: format!("{name} session has finished."),
        }
    }

    pub fn break_complete() -> Self {
        Self {
            title: "Break Time Over!",
            body: "Time to get back to work.".to_string(),
        }
    }

    /// A finished work session announces itself; a finished break calls you back.
    pub fn for_completed(kind: SessionKind) -> Self {
        if kind.is_break() {
            Self::break_complete()
        } else {
            Self::session_complete(kind)
        }
    }
}

pub trait Notifier {
    fn notify(&mut self, notification: &Notification) -> Result<()>;

    fn session_finished(&mut self, kind: SessionKind) -> Result<()> {
        self.notify(&Notification::for_completed(kind))
    }
}

/// Prints to a writer, ringing the terminal bell unless muted.
pub struct TerminalNotifier<W: Write> {
    out: W,
    enabled: bool,
    muted: bool,
}

impl TerminalNotifier<std::io::Stderr> {
    /// Stderr keeps stdout free for machine-readable output.
    pub fn stderr(config: &Config) -> Self {
        Self::new(std::io::stderr(), config)
    }
}

impl<W: Write> TerminalNotifier<W> {
    pub fn new(out: W, config: &Config) -> Self {
        Self {
            out,
            enabled: config.notifications,
            muted: config.muted,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Notifier for TerminalNotifier<W> {
    fn notify(&mut self, notification: &Notification) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let bell = if self.muted { "" } else { "\u{7}" };
        writeln!(self.out, "{bell}{}: {}", notification.title, notification.body)?;
        self.out.flush()?;
        Ok(())
    }
}

//! # pomosync Core Library
//!
//! Core logic for the pomosync Pomodoro timer. Everything is available
//! through the `pomosync` CLI binary, which is a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Timer**: A wall-clock-based state machine. It owns no threads; the
//!   caller invokes `tick()` and the remaining time is recomputed from the
//!   stored deadline, so it never drifts
//! - **Storage**: SQLite for the timer snapshot, session log and local
//!   tasks; TOML for configuration
//! - **Cloud**: Client for the hosted auth and REST backend, plus the
//!   one-shot migration of local data after sign-in
//!
//! ## Key Components
//!
//! - [`PomodoroTimer`]: Core timer state machine
//! - [`Database`]: Local persistence and statistics
//! - [`Config`]: Application configuration management
//! - [`TaskStore`]: Task CRUD, local or cloud-backed
//! - [`CloudClient`]: Hosted backend client

pub mod cloud;
pub mod error;
pub mod events;
pub mod notify;
pub mod storage;
pub mod task;
pub mod timer;

pub use cloud::{AuthSession, CloudClient, CredentialStore};
pub use error::{CloudError, ConfigError, CoreError, StorageError, ValidationError};
pub use events::Event;
pub use notify::{Notification, Notifier, TerminalNotifier};
pub use storage::{Config, Database, SessionRecord, Stats, Theme};
pub use task::{LocalTaskStore, NewTask, Task, TaskPatch, TaskStatus, TaskStore};
pub use timer::{format_time, PomodoroTimer, SessionKind, TimerSettings, TimerSnapshot, TimerState};

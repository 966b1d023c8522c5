//! SQLite-based local storage.
//!
//! Provides persistent storage for:
//! - The key-value store (timer state lives under `pomodoro-timer`)
//! - Completed sessions and their cloud upload flag
//! - Tasks kept locally while signed out
//! - Session statistics (daily and all-time)

use chrono::{DateTime, NaiveTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

use super::data_dir;
use super::migrations;
use crate::error::{Result, StorageError};
use crate::task::{Task, TaskStatus};
use crate::timer::{SessionKind, TimerSnapshot};

/// Key under which the timer snapshot is stored.
pub const TIMER_KEY: &str = "pomodoro-timer";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: i64,
    pub kind: SessionKind,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub task_id: Option<String>,
    pub synced: bool,
}

impl SessionRecord {
    pub fn duration_secs(&self) -> u64 {
        (self.ended_at - self.started_at).num_seconds().max(0) as u64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Stats {
    pub total_sessions: u64,
    pub completed_pomodoros: u64,
    pub total_focus_min: u64,
    pub total_break_min: u64,
    pub today_sessions: u64,
    pub today_focus_min: u64,
}

/// SQLite database for local state.
pub struct Database {
    conn: Connection,
}

pub(crate) fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            warn!(value = s, error = %e, "unparseable timestamp in database");
            DateTime::<Utc>::default()
        })
}

fn row_to_session(row: &rusqlite::Row) -> Result<SessionRecord, rusqlite::Error> {
    let kind_str: String = row.get(1)?;
    let kind = SessionKind::parse(&kind_str).unwrap_or(SessionKind::Work);
    let started_at: String = row.get(2)?;
    let ended_at: String = row.get(3)?;
    Ok(SessionRecord {
        id: row.get(0)?,
        kind,
        started_at: parse_ts(&started_at),
        ended_at: parse_ts(&ended_at),
        task_id: row.get(4)?,
        synced: row.get(5)?,
    })
}

fn row_to_task(row: &rusqlite::Row) -> Result<Task, rusqlite::Error> {
    let status: String = row.get(4)?;
    let created_at: String = row.get(5)?;
    let updated_at: String = row.get(6)?;
    Ok(Task {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        status: TaskStatus::parse(&status).unwrap_or(TaskStatus::Todo),
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
    })
}

const TASK_COLUMNS: &str = "id, user_id, title, description, status, created_at, updated_at";

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `<data_dir>/pomosync.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        Self::open_at(&data_dir()?.join("pomosync.db"))
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| StorageError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        migrations::migrate(&conn)
            .map_err(|e| StorageError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn })
    }

    // ── Key-value ────────────────────────────────────────────────────

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_delete(&self, key: &str) -> Result<()> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    /// Load the persisted timer. Unreadable state is logged and treated as absent.
    pub fn load_timer(&self) -> Result<Option<TimerSnapshot>> {
        let Some(json) = self.kv_get(TIMER_KEY)? else {
            return Ok(None);
        };
        match serde_json::from_str::<TimerSnapshot>(&json) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                warn!(error = %e, "failed to load timer state; starting fresh");
                Ok(None)
            }
        }
    }

    pub fn save_timer(&self, snapshot: &TimerSnapshot) -> Result<()> {
        let json = serde_json::to_string(snapshot)?;
        self.kv_set(TIMER_KEY, &json)
    }

    /// Store `next` only if the persisted timer still equals `expected`
    /// (`None` meaning nothing stored yet).
    ///
    /// Returns `false` without writing when another process changed the
    /// timer in between.
    pub fn replace_timer(
        &self,
        expected: Option<&TimerSnapshot>,
        next: &TimerSnapshot,
    ) -> Result<bool> {
        let json = serde_json::to_string(next)?;
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        if self.load_timer()?.as_ref() != expected {
            return Ok(false);
        }
        self.kv_set(TIMER_KEY, &json)?;
        tx.commit()?;
        Ok(true)
    }

    // ── Sessions ─────────────────────────────────────────────────────

    /// Record a completed session. Returns the new row id.
    pub fn record_session(
        &self,
        kind: SessionKind,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        task_id: Option<&str>,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO sessions (kind, started_at, ended_at, duration_secs, task_id, synced)
             VALUES (?1, ?2, ?3, ?4, ?5, 0)",
            params![
                kind.as_str(),
                ts(&started_at),
                ts(&ended_at),
                (ended_at - started_at).num_seconds().max(0),
                task_id,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn list_sessions(&self) -> Result<Vec<SessionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, kind, started_at, ended_at, task_id, synced
             FROM sessions ORDER BY started_at ASC, id ASC",
        )?;
        let rows = stmt.query_map([], row_to_session)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Sessions not yet uploaded to the cloud, oldest first.
    pub fn unsynced_sessions(&self) -> Result<Vec<SessionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, kind, started_at, ended_at, task_id, synced
             FROM sessions WHERE synced = 0 ORDER BY started_at ASC, id ASC",
        )?;
        let rows = stmt.query_map([], row_to_session)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn mark_session_synced(&self, id: i64) -> Result<()> {
        self.conn
            .execute("UPDATE sessions SET synced = 1 WHERE id = ?1", params![id])?;
        Ok(())
    }

    // ── Statistics ───────────────────────────────────────────────────

    pub fn stats_today(&self) -> Result<Stats> {
        let midnight = Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc();
        self.stats_since(Some(midnight), midnight)
    }

    pub fn stats_all(&self) -> Result<Stats> {
        let midnight = Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc();
        self.stats_since(None, midnight)
    }

    /// Aggregate sessions ended after `since` (or all of them), plus the
    /// work sessions ended after `today`.
    pub fn stats_since(
        &self,
        since: Option<DateTime<Utc>>,
        today: DateTime<Utc>,
    ) -> Result<Stats> {
        let since = since.map(|dt| ts(&dt)).unwrap_or_default();
        let mut stmt = self.conn.prepare(
            "SELECT kind, COUNT(*), COALESCE(SUM(duration_secs), 0)
             FROM sessions
             WHERE ended_at >= ?1
             GROUP BY kind",
        )?;
        let rows = stmt.query_map(params![since], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u64>(1)?,
                row.get::<_, u64>(2)?,
            ))
        })?;

        let mut stats = Stats::default();
        for row in rows {
            let (kind, count, secs) = row?;
            stats.total_sessions += count;
            match SessionKind::parse(&kind) {
                Some(SessionKind::Work) => {
                    stats.completed_pomodoros += count;
                    stats.total_focus_min += secs / 60;
                }
                Some(_) => stats.total_break_min += secs / 60,
                None => {}
            }
        }

        let (today_sessions, today_secs) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(duration_secs), 0)
             FROM sessions
             WHERE kind = 'work' AND ended_at >= ?1",
            params![ts(&today)],
            |row| Ok((row.get::<_, u64>(0)?, row.get::<_, u64>(1)?)),
        )?;
        stats.today_sessions = today_sessions;
        stats.today_focus_min = today_secs / 60;

        Ok(stats)
    }

    // ── Local tasks ──────────────────────────────────────────────────

    pub fn insert_task(&self, task: &Task) -> Result<()> {
        self.conn.execute(
            "INSERT INTO tasks (id, user_id, title, description, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                task.id,
                task.user_id,
                task.title,
                task.description,
                task.status.as_str(),
                ts(&task.created_at),
                ts(&task.updated_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_task(&self, id: &str) -> Result<Option<Task>> {
        let task = self
            .conn
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                params![id],
                row_to_task,
            )
            .optional()?;
        Ok(task)
    }

    /// All local tasks, newest first.
    pub fn list_tasks(&self) -> Result<Vec<Task>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt.query_map([], row_to_task)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Overwrite a task row. Returns false when the id matches nothing.
    pub fn update_task(&self, task: &Task) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE tasks SET title = ?2, description = ?3, status = ?4, updated_at = ?5
             WHERE id = ?1",
            params![
                task.id,
                task.title,
                task.description,
                task.status.as_str(),
                ts(&task.updated_at),
            ],
        )?;
        Ok(changed > 0)
    }

    /// Returns false when the id matches nothing.
    pub fn delete_task(&self, id: &str) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::TimerState;
    use chrono::Duration;

    #[test]
    fn record_and_query() {
        let db = Database::open_memory().unwrap();
        let end = Utc::now();
        db.record_session(SessionKind::Work, end - Duration::minutes(25), end, None)
            .unwrap();
        db.record_session(SessionKind::ShortBreak, end, end + Duration::minutes(5), None)
            .unwrap();
        let stats = db.stats_all().unwrap();
        assert_eq!(stats.total_sessions, 2);
        assert_eq!(stats.completed_pomodoros, 1);
        assert_eq!(stats.total_focus_min, 25);
        assert_eq!(stats.total_break_min, 5);
    }

    #[test]
    fn stats_split_today_from_history() {
        let db = Database::open_memory().unwrap();
        let today = Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc();
        let yesterday = today - Duration::hours(12);
        db.record_session(SessionKind::Work, yesterday - Duration::minutes(25), yesterday, None)
            .unwrap();
        db.record_session(
            SessionKind::Work,
            today + Duration::minutes(5),
            today + Duration::minutes(30),
            Some("t-1"),
        )
        .unwrap();

        let stats = db.stats_since(None, today).unwrap();
        assert_eq!(stats.completed_pomodoros, 2);
        assert_eq!(stats.today_sessions, 1);
        assert_eq!(stats.today_focus_min, 25);

        let only_today = db.stats_since(Some(today), today).unwrap();
        assert_eq!(only_today.completed_pomodoros, 1);
    }

    #[test]
    fn sessions_track_sync_flag() {
        let db = Database::open_memory().unwrap();
        let now = Utc::now();
        let a = db.record_session(SessionKind::Work, now, now, None).unwrap();
        let _b = db.record_session(SessionKind::LongBreak, now, now, None).unwrap();
        assert_eq!(db.unsynced_sessions().unwrap().len(), 2);
        db.mark_session_synced(a).unwrap();
        let rest = db.unsynced_sessions().unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].kind, SessionKind::LongBreak);
        assert_eq!(db.list_sessions().unwrap().len(), 2);
    }

    #[test]
    fn kv_store() {
        let db = Database::open_memory().unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
        db.kv_set("test", "hello").unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "hello");
        db.kv_delete("test").unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
    }

    #[test]
    fn timer_snapshot_roundtrip_and_corruption() {
        let db = Database::open_memory().unwrap();
        assert!(db.load_timer().unwrap().is_none());

        let snap = TimerSnapshot {
            time_left: 90,
            state: TimerState::Running,
            cycles: 3,
            is_break: false,
            is_long_break: false,
            expected_end_time: Some(1_700_000_090_000),
            session_started_at: Some(1_700_000_000_000),
        };
        db.save_timer(&snap).unwrap();
        assert_eq!(db.load_timer().unwrap(), Some(snap));

        db.kv_set(TIMER_KEY, "{not json").unwrap();
        assert!(db.load_timer().unwrap().is_none());
    }

    #[test]
    fn replace_timer_refuses_stale_snapshot() {
        let db = Database::open_memory().unwrap();
        let running = TimerSnapshot {
            time_left: 60,
            state: TimerState::Running,
            cycles: 0,
            is_break: false,
            is_long_break: false,
            expected_end_time: Some(1_700_000_060_000),
            session_started_at: Some(1_700_000_000_000),
        };
        assert!(db.replace_timer(None, &running).unwrap());
        assert!(!db.replace_timer(None, &running).unwrap());

        let paused = TimerSnapshot {
            time_left: 57,
            state: TimerState::Paused,
            expected_end_time: None,
            ..running.clone()
        };
        db.save_timer(&paused).unwrap();

        let completed = TimerSnapshot {
            time_left: 300,
            state: TimerState::Idle,
            cycles: 1,
            is_break: true,
            expected_end_time: None,
            session_started_at: None,
            ..running.clone()
        };
        assert!(!db.replace_timer(Some(&running), &completed).unwrap());
        assert_eq!(db.load_timer().unwrap(), Some(paused.clone()));

        assert!(db.replace_timer(Some(&paused), &completed).unwrap());
        assert_eq!(db.load_timer().unwrap(), Some(completed));
    }

    #[test]
    fn local_task_crud() {
        let db = Database::open_memory().unwrap();
        let now = Utc::now();
        let mut task = Task {
            id: "t-1".into(),
            user_id: None,
            title: "Write report".into(),
            description: None,
            status: TaskStatus::Todo,
            created_at: now,
            updated_at: now,
        };
        db.insert_task(&task).unwrap();
        task.status = TaskStatus::Done;
        assert!(db.update_task(&task).unwrap());
        assert_eq!(db.get_task("t-1").unwrap().unwrap().status, TaskStatus::Done);
        assert!(db.delete_task("t-1").unwrap());
        assert!(!db.delete_task("t-1").unwrap());
        assert!(db.get_task("t-1").unwrap().is_none());
    }
}

//! Task model and the storage seam shared by the local and cloud backends.
//!
//! Tasks are deliberately small: a title, an optional description and a
//! two-state status. Signed-out users keep tasks in the local database;
//! signed-in users read and write the hosted `tasks` table.

mod local;

pub use local::LocalTaskStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Todo,
    Done,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::Done => "done",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "todo" => Some(TaskStatus::Todo),
            "done" => Some(TaskStatus::Done),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            TaskStatus::Todo => TaskStatus::Done,
            TaskStatus::Done => TaskStatus::Todo,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task row. Field names match the hosted `tasks` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    /// Owner; `None` for tasks that only exist locally.
    #[serde(default)]
    pub user_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Apply a (normalized) patch and bump `updated_at`.
    pub fn apply(&mut self, patch: &TaskPatch, now: DateTime<Utc>) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        self.updated_at = now;
    }
}

/// Input for creating a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
}

impl NewTask {
    /// Trim the inputs; a blank title is rejected and a blank description dropped.
    pub fn new(title: &str, description: Option<&str>) -> Result<Self, ValidationError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ValidationError::Empty("title".into()));
        }
        Ok(Self {
            title: title.to_string(),
            description: normalize_description(description),
        })
    }
}

/// A partial update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    /// `Some(None)` clears the description.
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
}

impl TaskPatch {
    pub fn title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(Some(description.to_string()));
        self
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.status.is_none()
    }

    /// Trim text fields. A blank title is rejected; a blank description
    /// becomes a clear.
    pub fn normalized(self) -> Result<Self, ValidationError> {
        let title = match self.title {
            Some(t) => {
                let t = t.trim();
                if t.is_empty() {
                    return Err(ValidationError::Empty("title".into()));
                }
                Some(t.to_string())
            }
            None => None,
        };
        let description = self
            .description
            .map(|d| normalize_description(d.as_deref()));
        Ok(Self {
            title,
            description,
            status: self.status,
        })
    }
}

fn normalize_description(description: Option<&str>) -> Option<String> {
    description
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
}

/// CRUD over a task backend.
///
/// `list` returns newest first. `update`, `delete` and `toggle_status`
/// fail with [`CoreError::TaskNotFound`] for unknown ids.
#[async_trait(?Send)]
pub trait TaskStore {
    async fn create(&self, new: NewTask) -> Result<Task>;

    async fn list(&self) -> Result<Vec<Task>>;

    async fn get(&self, id: &str) -> Result<Option<Task>>;

    async fn update(&self, id: &str, patch: TaskPatch) -> Result<Task>;

    async fn delete(&self, id: &str) -> Result<()>;

    /// Flip todo <-> done.
    async fn toggle_status(&self, id: &str) -> Result<Task> {
        let current = self
            .get(id)
            .await?
            .ok_or_else(|| CoreError::TaskNotFound(id.to_string()))?;
        self.update(id, TaskPatch::default().status(current.status.toggled()))
            .await
    }
}

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use super::{NewTask, Task, TaskPatch, TaskStatus, TaskStore};
use crate::error::{CoreError, Result};
use crate::storage::Database;

/// Tasks kept in the local SQLite database while signed out.
pub struct LocalTaskStore<'a> {
    db: &'a Database,
}

impl<'a> LocalTaskStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }
}

#[async_trait(?Send)]
impl TaskStore for LocalTaskStore<'_> {
    async fn create(&self, new: NewTask) -> Result<Task> {
        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4().to_string(),
            user_id: None,
            title: new.title,
            description: new.description,
            status: TaskStatus::Todo,
            created_at: now,
            updated_at: now,
        };
        self.db.insert_task(&task)?;
        debug!(id = %task.id, "local task created");
        Ok(task)
    }

    async fn list(&self) -> Result<Vec<Task>> {
        self.db.list_tasks()
    }

    async fn get(&self, id: &str) -> Result<Option<Task>> {
        self.db.get_task(id)
    }

    async fn update(&self, id: &str, patch: TaskPatch) -> Result<Task> {
        let patch = patch.normalized()?;
        let mut task = self
            .db
            .get_task(id)?
            .ok_or_else(|| CoreError::TaskNotFound(id.to_string()))?;
        task.apply(&patch, Utc::now());
        self.db.update_task(&task)?;
        Ok(task)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        if !self.db.delete_task(id)? {
            return Err(CoreError::TaskNotFound(id.to_string()));
        }
        Ok(())
    }
}

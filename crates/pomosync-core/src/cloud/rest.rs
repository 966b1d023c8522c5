//! Row access for the hosted `users`, `tasks`, `sessions` and `preferences` tables.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::{AuthSession, CloudClient};
use crate::error::{CloudError, CoreError, Result};
use crate::storage::{Config, SessionRecord, Theme};
use crate::task::{NewTask, Task, TaskPatch, TaskStatus, TaskStore};
use crate::timer::{SessionKind, TimerSettings};

const RETURN_REPRESENTATION: &str = "return=representation";

/// One row of the hosted `sessions` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRow {
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: SessionKind,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub task_id: Option<String>,
}

impl SessionRow {
    pub fn from_record(user_id: &str, record: &SessionRecord) -> Self {
        Self {
            user_id: user_id.to_string(),
            kind: record.kind,
            started_at: record.started_at,
            ended_at: record.ended_at,
            task_id: record.task_id.clone(),
        }
    }
}

/// Timer preferences as the web client stores them (camelCase, no cycle count).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTimerSettings {
    pub work_duration: u32,
    pub short_break_duration: u32,
    pub long_break_duration: u32,
    pub auto_start_breaks: bool,
}

impl From<&TimerSettings> for RemoteTimerSettings {
    fn from(t: &TimerSettings) -> Self {
        Self {
            work_duration: t.work_duration,
            short_break_duration: t.short_break_duration,
            long_break_duration: t.long_break_duration,
            auto_start_breaks: t.auto_start_breaks,
        }
    }
}

/// The `settings` column of the `preferences` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferencesSettings {
    pub timer: RemoteTimerSettings,
    pub theme: Theme,
    pub notifications: bool,
}

impl PreferencesSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timer: RemoteTimerSettings::from(&config.timer),
            theme: config.theme,
            notifications: config.notifications,
        }
    }

    /// Overwrite the matching local fields. Local-only settings are kept.
    pub fn apply_to(&self, config: &mut Config) {
        config.timer.work_duration = self.timer.work_duration;
        config.timer.short_break_duration = self.timer.short_break_duration;
        config.timer.long_break_duration = self.timer.long_break_duration;
        config.timer.auto_start_breaks = self.timer.auto_start_breaks;
        config.theme = self.theme;
        config.notifications = self.notifications;
    }
}

#[derive(Debug, Deserialize)]
struct PreferencesRow {
    settings: PreferencesSettings,
}

impl CloudClient {
    fn table(
        &self,
        method: Method,
        table: &str,
        session: &AuthSession,
    ) -> Result<reqwest::RequestBuilder, CloudError> {
        self.request(method, &format!("rest/v1/{table}"), Some(&session.access_token))
    }

    /// Whether the signed-in user has a row in the public `users` table.
    pub async fn user_exists(&self, session: &AuthSession) -> Result<bool> {
        let req = self
            .table(Method::GET, "users", session)?
            .query(&[("select", "id".to_string()), ("id", format!("eq.{}", session.user.id))]);
        let rows: Vec<Value> = Self::send_json(req).await?;
        Ok(!rows.is_empty())
    }

    pub async fn insert_session(&self, session: &AuthSession, row: &SessionRow) -> Result<()> {
        let req = self.table(Method::POST, "sessions", session)?.json(row);
        Self::send(req).await?;
        debug!(kind = row.kind.as_str(), "session uploaded");
        Ok(())
    }

    /// Insert an existing task row, keeping its id and timestamps.
    pub async fn insert_task_row(&self, session: &AuthSession, task: &Task) -> Result<Task> {
        let body = json!({
            "id": task.id,
            "user_id": session.user.id,
            "title": task.title,
            "description": task.description,
            "status": task.status,
            "created_at": task.created_at,
            "updated_at": task.updated_at,
        });
        let req = self
            .table(Method::POST, "tasks", session)?
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&body);
        first_row(Self::send_json::<Vec<Task>>(req).await?, "tasks")
    }

    /// Last write wins: one preferences row per user.
    pub async fn upsert_preferences(
        &self,
        session: &AuthSession,
        settings: &PreferencesSettings,
    ) -> Result<()> {
        let req = self
            .table(Method::POST, "preferences", session)?
            .query(&[("on_conflict", "user_id")])
            .header("Prefer", "resolution=merge-duplicates")
            .json(&json!({ "user_id": session.user.id, "settings": settings }));
        Self::send(req).await?;
        Ok(())
    }

    pub async fn fetch_preferences(&self, session: &AuthSession) -> Result<Option<PreferencesSettings>> {
        let req = self
            .table(Method::GET, "preferences", session)?
            .query(&[
                ("select", "settings".to_string()),
                ("user_id", format!("eq.{}", session.user.id)),
            ]);
        let rows: Vec<PreferencesRow> = Self::send_json(req).await?;
        Ok(rows.into_iter().next().map(|row| row.settings))
    }
}

fn first_row(rows: Vec<Task>, table: &str) -> Result<Task> {
    rows.into_iter().next().ok_or_else(|| {
        CloudError::Api {
            status: 200,
            message: format!("{table}: empty representation"),
        }
        .into()
    })
}

/// Tasks in the hosted `tasks` table, scoped to the signed-in user.
pub struct CloudTaskStore<'a> {
    client: &'a CloudClient,
    session: &'a AuthSession,
}

impl<'a> CloudTaskStore<'a> {
    pub fn new(client: &'a CloudClient, session: &'a AuthSession) -> Self {
        Self { client, session }
    }

    fn tasks(&self, method: Method) -> Result<reqwest::RequestBuilder, CloudError> {
        self.client.table(method, "tasks", self.session)
    }
}

#[async_trait(?Send)]
impl TaskStore for CloudTaskStore<'_> {
    /// Fails with `USER_NOT_FOUND` when the auth user has no public profile row.
    async fn create(&self, new: NewTask) -> Result<Task> {
        if !self.client.user_exists(self.session).await? {
            warn!(user_id = %self.session.user.id, "user missing from public users table");
            return Err(CloudError::UserNotFound {
                user_id: self.session.user.id.clone(),
            }
            .into());
        }
        let now = Utc::now();
        let body = json!({
            "user_id": self.session.user.id,
            "title": new.title,
            "description": new.description,
            "status": TaskStatus::Todo,
            "created_at": now,
            "updated_at": now,
        });
        let req = self
            .tasks(Method::POST)?
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&body);
        first_row(CloudClient::send_json::<Vec<Task>>(req).await?, "tasks")
    }

    async fn list(&self) -> Result<Vec<Task>> {
        let req = self.tasks(Method::GET)?.query(&[
            ("select", "*".to_string()),
            ("user_id", format!("eq.{}", self.session.user.id)),
            ("order", "created_at.desc".to_string()),
        ]);
        Ok(CloudClient::send_json(req).await?)
    }

    async fn get(&self, id: &str) -> Result<Option<Task>> {
        let req = self
            .tasks(Method::GET)?
            .query(&[("select", "*".to_string()), ("id", format!("eq.{id}"))]);
        let rows: Vec<Task> = CloudClient::send_json(req).await?;
        Ok(rows.into_iter().next())
    }

    async fn update(&self, id: &str, patch: TaskPatch) -> Result<Task> {
        let patch = patch.normalized()?;
        let mut body = Map::new();
        body.insert("updated_at".into(), json!(Utc::now()));
        if let Some(title) = &patch.title {
            body.insert("title".into(), json!(title));
        }
        if let Some(description) = &patch.description {
            body.insert("description".into(), json!(description));
        }
        if let Some(status) = patch.status {
            body.insert("status".into(), json!(status));
        }
        let req = self
            .tasks(Method::PATCH)?
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&Value::Object(body));
        let rows: Vec<Task> = CloudClient::send_json(req).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| CoreError::TaskNotFound(id.to_string()))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let req = self
            .tasks(Method::DELETE)?
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", RETURN_REPRESENTATION);
        let rows: Vec<Value> = CloudClient::send_json(req).await?;
        if rows.is_empty() {
            return Err(CoreError::TaskNotFound(id.to_string()));
        }
        Ok(())
    }
}

//! One-shot upload of signed-out data after the first sign-in.
//!
//! Three independent parts run in order: sessions, tasks, preferences.
//! A failing part is logged and recorded in the summary; the others still
//! run. Items already uploaded before a failure stay uploaded, so a rerun
//! only sends what is left.

use serde::Serialize;
use tracing::{info, warn};

use super::{AuthSession, CloudClient, PreferencesSettings, SessionRow};
use crate::error::Result;
use crate::storage::{Config, Database, SessionRecord};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationSummary {
    pub sessions_uploaded: usize,
    pub tasks_uploaded: usize,
    pub preferences_uploaded: bool,
    /// `"<part>: <error>"` for each part that stopped early.
    pub failures: Vec<String>,
}

impl MigrationSummary {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

pub async fn migrate_local_data(
    client: &CloudClient,
    session: &AuthSession,
    db: &Database,
    config: &Config,
) -> MigrationSummary {
    let mut summary = MigrationSummary::default();

    if let Err(e) = migrate_sessions(client, session, db, &mut summary).await {
        warn!(error = %e, "failed to migrate sessions");
        summary.failures.push(format!("sessions: {e}"));
    }
    if let Err(e) = migrate_tasks(client, session, db, &mut summary).await {
        warn!(error = %e, "failed to migrate tasks");
        summary.failures.push(format!("tasks: {e}"));
    }
    match client
        .upsert_preferences(session, &PreferencesSettings::from_config(config))
        .await
    {
        Ok(()) => summary.preferences_uploaded = true,
        Err(e) => {
            warn!(error = %e, "failed to migrate preferences");
            summary.failures.push(format!("preferences: {e}"));
        }
    }

    info!(
        sessions = summary.sessions_uploaded,
        tasks = summary.tasks_uploaded,
        preferences = summary.preferences_uploaded,
        "local data migration finished"
    );
    summary
}

async fn migrate_sessions(
    client: &CloudClient,
    session: &AuthSession,
    db: &Database,
    summary: &mut MigrationSummary,
) -> Result<()> {
    for record in db.unsynced_sessions()? {
        save_session_to_cloud(client, session, db, &record).await?;
        summary.sessions_uploaded += 1;
    }
    Ok(())
}

/// Local tasks move to the cloud: each one is deleted locally once uploaded.
async fn migrate_tasks(
    client: &CloudClient,
    session: &AuthSession,
    db: &Database,
    summary: &mut MigrationSummary,
) -> Result<()> {
    for task in db.list_tasks()? {
        client.insert_task_row(session, &task).await?;
        db.delete_task(&task.id)?;
        summary.tasks_uploaded += 1;
    }
    Ok(())
}

/// Upload one completed session and mark it synced locally.
pub async fn save_session_to_cloud(
    client: &CloudClient,
    session: &AuthSession,
    db: &Database,
    record: &SessionRecord,
) -> Result<()> {
    client
        .insert_session(session, &SessionRow::from_record(&session.user.id, record))
        .await?;
    db.mark_session_synced(record.id)
}

//! Task management commands for CLI.
//!
//! Tasks live in the cloud while signed in, and in the local database
//! otherwise.

use clap::Subcommand;
use pomosync_core::cloud::CloudTaskStore;
use pomosync_core::{Config, Database, LocalTaskStore, NewTask, TaskPatch, TaskStore};

use super::{print_json, runtime, signed_in, CmdResult};

#[derive(Subcommand)]
pub enum TaskAction {
    /// Create a new task
    Add {
        /// Task title
        title: String,
        /// Task description
        #[arg(long)]
        description: Option<String>,
    },
    /// List tasks, newest first
    List,
    /// Get task details
    Get {
        /// Task ID
        id: String,
    },
    /// Edit a task's title or description
    Edit {
        /// Task ID
        id: String,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// New description (empty clears it)
        #[arg(long)]
        description: Option<String>,
    },
    /// Toggle a task between todo and done
    Done {
        /// Task ID
        id: String,
    },
    /// Delete a task
    Rm {
        /// Task ID
        id: String,
    },
}

async fn execute(store: &dyn TaskStore, action: TaskAction) -> CmdResult {
    match action {
        TaskAction::Add { title, description } => {
            let task = store
                .create(NewTask::new(&title, description.as_deref())?)
                .await?;
            println!("Task created: {}", task.id);
            print_json(&task)?;
        }
        TaskAction::List => {
            print_json(&store.list().await?)?;
        }
        TaskAction::Get { id } => match store.get(&id).await? {
            Some(task) => print_json(&task)?,
            None => return Err(format!("Task not found: {id}").into()),
        },
        TaskAction::Edit {
            id,
            title,
            description,
        } => {
            let patch = TaskPatch {
                title,
                description: description.map(Some),
                status: None,
            };
            if patch.is_empty() {
                return Err("nothing to change: pass --title and/or --description".into());
            }
            let task = store.update(&id, patch).await?;
            println!("Task updated:");
            print_json(&task)?;
        }
        TaskAction::Done { id } => {
            let task = store.toggle_status(&id).await?;
            println!("Task {}: {}", task.id, task.status);
        }
        TaskAction::Rm { id } => {
            store.delete(&id).await?;
            println!("Task deleted: {id}");
        }
    }
    Ok(())
}

pub fn run(action: TaskAction) -> CmdResult {
    let config = Config::load()?;
    let db = Database::open()?;
    runtime()?.block_on(async {
        match signed_in(&config).await? {
            Some((client, session)) => {
                execute(&CloudTaskStore::new(&client, &session), action).await
            }
            None => execute(&LocalTaskStore::new(&db), action).await,
        }
    })
}

use clap::Subcommand;
use pomosync_core::cloud::migrate_local_data;
use pomosync_core::{CloudError, Config, CoreError, Database};

use super::{cloud_client, credential_store, print_json, runtime, signed_in, CmdResult};

#[derive(Subcommand)]
pub enum CloudAction {
    /// Check that the backend is reachable with the configured key
    Ping,
    /// Check that a table exists and is readable
    Check {
        #[arg(default_value = "users")]
        table: String,
    },
    /// Upload local sessions, tasks and preferences
    Migrate,
}

pub fn run(action: CloudAction) -> CmdResult {
    let config = Config::load()?;
    let rt = runtime()?;
    match action {
        CloudAction::Ping => {
            let client = cloud_client(&config)?;
            rt.block_on(client.ping())?;
            println!("ok: {}", client.base_url());
        }
        CloudAction::Check { table } => {
            let client = cloud_client(&config)?;
            // Row-level security may hide rows from the anon key; use the
            // user's token when there is one.
            let store = credential_store()?;
            let token = store.load()?.map(|s| s.access_token);
            rt.block_on(client.check_table(&table, token.as_deref()))?;
            println!("ok: {table}");
        }
        CloudAction::Migrate => {
            let db = Database::open()?;
            let summary = rt.block_on(async {
                let (client, session) = signed_in(&config)
                    .await?
                    .ok_or(CoreError::Cloud(CloudError::NotAuthenticated))?;
                Ok::<_, CoreError>(migrate_local_data(&client, &session, &db, &config).await)
            })?;
            print_json(&summary)?;
        }
    }
    Ok(())
}

use std::io::{BufRead, Write};

use clap::Subcommand;
use pomosync_core::cloud::{migrate_local_data, MigrationSummary, SignUpOutcome};
use pomosync_core::{AuthSession, CloudClient, Config, CredentialStore, Database};
use serde_json::json;
use tracing::warn;

use super::{cloud_client, credential_store, print_json, runtime, CmdResult};

#[derive(Subcommand)]
pub enum AuthAction {
    /// Create an account
    Signup {
        #[arg(long)]
        email: String,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
        /// Must match --password; read from stdin when omitted
        #[arg(long)]
        confirm_password: Option<String>,
    },
    /// Sign in and upload local data
    Login {
        #[arg(long)]
        email: String,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Sign out and forget the stored session
    Logout,
    /// Show who is signed in
    Status,
}

fn read_secret(prompt: &str) -> Result<String, Box<dyn std::error::Error>> {
    eprint!("{prompt}: ");
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Store the session, adopt any preferences already in the cloud, then
/// upload what was kept locally.
async fn on_signed_in(
    client: &CloudClient,
    store: &dyn CredentialStore,
    session: &AuthSession,
) -> Result<MigrationSummary, Box<dyn std::error::Error>> {
    store.save(session)?;
    let mut config = Config::load()?;
    match client.fetch_preferences(session).await {
        Ok(Some(remote)) => {
            remote.apply_to(&mut config);
            config.save()?;
        }
        Ok(None) => {}
        Err(e) => warn!(error = %e, "could not fetch cloud preferences"),
    }
    let db = Database::open()?;
    Ok(migrate_local_data(client, session, &db, &config).await)
}

fn report(session: &AuthSession, summary: &MigrationSummary) -> CmdResult {
    println!(
        "Signed in as {}",
        session.user.email.as_deref().unwrap_or(&session.user.id)
    );
    print_json(summary)
}

pub fn run(action: AuthAction) -> CmdResult {
    let rt = runtime()?;
    match action {
        AuthAction::Signup {
            email,
            password,
            confirm_password,
        } => {
            let client = cloud_client(&Config::load()?)?;
            let password = match password {
                Some(p) => p,
                None => read_secret("Password")?,
            };
            let confirm = match confirm_password {
                Some(p) => p,
                None => read_secret("Confirm password")?,
            };
            if password != confirm {
                return Err("Passwords do not match".into());
            }
            let store = credential_store()?;
            rt.block_on(async {
                match client.sign_up(&email, &password).await? {
                    SignUpOutcome::SignedIn(session) => {
                        let summary = on_signed_in(&client, store.as_ref(), &session).await?;
                        report(&session, &summary)
                    }
                    SignUpOutcome::ConfirmationSent { email } => {
                        println!("Check {email} for a confirmation link, then run `pomosync auth login`.");
                        Ok(())
                    }
                }
            })
        }
        AuthAction::Login { email, password } => {
            let client = cloud_client(&Config::load()?)?;
            let password = match password {
                Some(p) => p,
                None => read_secret("Password")?,
            };
            let store = credential_store()?;
            rt.block_on(async {
                let session = client.sign_in(&email, &password).await?;
                let summary = on_signed_in(&client, store.as_ref(), &session).await?;
                report(&session, &summary)
            })
        }
        AuthAction::Logout => {
            let store = credential_store()?;
            if let Some(session) = store.load()? {
                match cloud_client(&Config::load()?) {
                    Ok(client) => {
                        if let Err(e) = rt.block_on(client.sign_out(&session)) {
                            warn!(error = %e, "server-side sign-out failed");
                        }
                    }
                    Err(e) => warn!(error = %e, "skipping server-side sign-out"),
                }
            }
            store.clear()?;
            println!("Signed out");
            Ok(())
        }
        AuthAction::Status => {
            let store = credential_store()?;
            let status = match store.load()? {
                Some(session) => json!({
                    "signed_in": true,
                    "user_id": session.user.id,
                    "email": session.user.email,
                    "expires_at": session.expires_at,
                }),
                None => json!({ "signed_in": false }),
            };
            print_json(&status)
        }
    }
}

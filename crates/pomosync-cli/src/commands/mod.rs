pub mod auth;
pub mod cloud;
pub mod config;
pub mod stats;
pub mod task;
pub mod timer;

use pomosync_core::cloud::{FileCredentialStore, KeyringCredentialStore};
use pomosync_core::storage::data_dir;
use pomosync_core::{AuthSession, CloudClient, CloudError, Config, CoreError, CredentialStore};
use serde::Serialize;

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

pub fn print_json<T: Serialize>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Single-threaded runtime for the async cloud calls.
pub fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
}

/// The OS keychain, or `<data_dir>/session.json` with `POMOSYNC_CREDENTIALS=file`.
pub fn credential_store() -> Result<Box<dyn CredentialStore>, CoreError> {
    match std::env::var("POMOSYNC_CREDENTIALS").as_deref() {
        Ok("file") => Ok(Box::new(FileCredentialStore::new(
            data_dir()?.join("session.json"),
        ))),
        _ => Ok(Box::new(KeyringCredentialStore::default())),
    }
}

pub fn cloud_client(config: &Config) -> Result<CloudClient, CoreError> {
    let endpoint = config.cloud.endpoint()?;
    Ok(CloudClient::new(&endpoint)?)
}

/// Client and live session when the backend is configured and someone is
/// signed in; `None` otherwise.
pub async fn signed_in(config: &Config) -> Result<Option<(CloudClient, AuthSession)>, CoreError> {
    let Ok(endpoint) = config.cloud.endpoint() else {
        return Ok(None);
    };
    let client = CloudClient::new(&endpoint)?;
    let store = credential_store()?;
    match client.current_session(store.as_ref()).await {
        Ok(session) => Ok(Some((client, session))),
        Err(CoreError::Cloud(CloudError::NotAuthenticated)) => Ok(None),
        Err(e) => Err(e),
    }
}

use std::path::PathBuf;
use std::sync::Mutex;

use super::AuthSession;
use crate::error::CloudError;

/// Where the signed-in session is kept between runs.
pub trait CredentialStore: Send + Sync {
    fn save(&self, session: &AuthSession) -> Result<(), CloudError>;
    fn load(&self) -> Result<Option<AuthSession>, CloudError>;
    /// Removing an absent session is not an error.
    fn clear(&self) -> Result<(), CloudError>;
}

/// OS keychain via `keyring`, one JSON payload per account.
#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    service_name: String,
    account_name: String,
}

impl KeyringCredentialStore {
    pub fn new(service_name: impl Into<String>, account_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            account_name: account_name.into(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, CloudError> {
        keyring::Entry::new(&self.service_name, &self.account_name)
            .map_err(|error| CloudError::Credential(error.to_string()))
    }
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new("pomosync", "session")
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn save(&self, session: &AuthSession) -> Result<(), CloudError> {
        let payload = serde_json::to_string(session)
            .map_err(|error| CloudError::Credential(error.to_string()))?;
        self.entry()?
            .set_password(&payload)
            .map_err(|error| CloudError::Credential(error.to_string()))
    }

    fn load(&self) -> Result<Option<AuthSession>, CloudError> {
        let payload = match self.entry()?.get_password() {
            Ok(value) => value,
            Err(keyring::Error::NoEntry) => return Ok(None),
            Err(error) => return Err(CloudError::Credential(error.to_string())),
        };
        let session = serde_json::from_str::<AuthSession>(&payload)
            .map_err(|error| CloudError::Credential(error.to_string()))?;
        Ok(Some(session))
    }

    fn clear(&self) -> Result<(), CloudError> {
        match self.entry()?.delete_credential() {
            Ok(_) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(CloudError::Credential(error.to_string())),
        }
    }
}

/// Plain JSON file, for machines without a keychain service.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CredentialStore for FileCredentialStore {
    fn save(&self, session: &AuthSession) -> Result<(), CloudError> {
        let payload = serde_json::to_string_pretty(session)
            .map_err(|error| CloudError::Credential(error.to_string()))?;
        std::fs::write(&self.path, payload)
            .map_err(|error| CloudError::Credential(format!("{}: {error}", self.path.display())))
    }

    fn load(&self) -> Result<Option<AuthSession>, CloudError> {
        let payload = match std::fs::read_to_string(&self.path) {
            Ok(value) => value,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(error) => {
                return Err(CloudError::Credential(format!(
                    "{}: {error}",
                    self.path.display()
                )))
            }
        };
        let session = serde_json::from_str::<AuthSession>(&payload)
            .map_err(|error| CloudError::Credential(error.to_string()))?;
        Ok(Some(session))
    }

    fn clear(&self) -> Result<(), CloudError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(CloudError::Credential(error.to_string())),
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    session: Mutex<Option<AuthSession>>,
}

impl InMemoryCredentialStore {
    pub fn with_session(session: AuthSession) -> Self {
        Self {
            session: Mutex::new(Some(session)),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<AuthSession>>, CloudError> {
        self.session
            .lock()
            .map_err(|error| CloudError::Credential(format!("in-memory lock poisoned: {error}")))
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn save(&self, session: &AuthSession) -> Result<(), CloudError> {
        *self.lock()? = Some(session.clone());
        Ok(())
    }

    fn load(&self) -> Result<Option<AuthSession>, CloudError> {
        Ok(self.lock()?.clone())
    }

    fn clear(&self) -> Result<(), CloudError> {
        *self.lock()? = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::AuthUser;
    use chrono::Utc;

    fn session() -> AuthSession {
        AuthSession {
            access_token: "access".into(),
            refresh_token: "refresh".into(),
            expires_at: Utc::now(),
            user: AuthUser {
                id: "user-1".into(),
                email: Some("a@b.c".into()),
            },
        }
    }

    #[test]
    fn in_memory_store_roundtrip() {
        let store = InMemoryCredentialStore::default();
        assert!(store.load().unwrap().is_none());
        store.save(&session()).unwrap();
        assert_eq!(store.load().unwrap(), Some(session()));
        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn file_store_roundtrip_and_idempotent_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("session.json"));
        assert!(store.load().unwrap().is_none());
        store.save(&session()).unwrap();
        assert_eq!(store.load().unwrap().unwrap().user.id, "user-1");
        store.clear().unwrap();
        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }
}

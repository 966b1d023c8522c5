//! Client for the hosted backend.
//!
//! The backend owns authentication and row storage; this module only calls
//! it. Auth lives under `/auth/v1`, tables under `/rest/v1/<table>` in the
//! PostgREST dialect (`column=eq.value` filters, `Prefer` headers).

mod auth;
mod credentials;
pub mod migration;
mod rest;

pub use auth::{AuthSession, AuthUser, SignUpOutcome, MIN_PASSWORD_LEN};
pub use credentials::{
    CredentialStore, FileCredentialStore, InMemoryCredentialStore, KeyringCredentialStore,
};
pub use migration::{migrate_local_data, save_session_to_cloud, MigrationSummary};
pub use rest::{CloudTaskStore, PreferencesSettings, RemoteTimerSettings, SessionRow};

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::{CloudError, Result};
use crate::storage::CloudEndpoint;

/// Thin wrapper over `reqwest` bound to one backend project.
#[derive(Debug, Clone)]
pub struct CloudClient {
    http: Client,
    base: Url,
    anon_key: String,
}

impl CloudClient {
    pub fn new(endpoint: &CloudEndpoint) -> Result<Self, CloudError> {
        let mut raw = endpoint.url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let base = Url::parse(&raw)?;
        let http = Client::builder()
            .user_agent(concat!("pomosync/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(20))
            .build()?;
        Ok(Self {
            http,
            base,
            anon_key: endpoint.anon_key.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str) -> Result<Url, CloudError> {
        Ok(self.base.join(path)?)
    }

    /// Start a request carrying the project key, and the user's token if given.
    /// Without a user token the anon key doubles as the bearer.
    fn request(
        &self,
        method: Method,
        path: &str,
        access_token: Option<&str>,
    ) -> Result<RequestBuilder, CloudError> {
        let bearer = access_token.unwrap_or(&self.anon_key);
        Ok(self
            .http
            .request(method, self.url(path)?)
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer))
    }

    /// Send and decode a JSON body, turning non-2xx into [`CloudError::Api`].
    async fn send_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, CloudError> {
        let resp = Self::send(req).await?;
        Ok(resp.json::<T>().await?)
    }

    /// Send and check the status, ignoring the body.
    async fn send(req: RequestBuilder) -> Result<Response, CloudError> {
        let resp = req.send().await?;
        let status = resp.status();
        debug!(status = status.as_u16(), url = %resp.url(), "cloud response");
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(CloudError::Api {
            status: status.as_u16(),
            message: extract_message(&body),
        })
    }

    /// Reach the REST root. Succeeds when the project URL and key are valid.
    pub async fn ping(&self) -> Result<()> {
        let req = self.request(Method::GET, "rest/v1/", None)?;
        Self::send(req).await?;
        Ok(())
    }

    /// Confirm `table` exists and is readable with the given token.
    pub async fn check_table(&self, table: &str, access_token: Option<&str>) -> Result<()> {
        let req = self
            .request(Method::GET, &format!("rest/v1/{table}"), access_token)?
            .query(&[("select", "*"), ("limit", "1")]);
        Self::send(req).await?;
        Ok(())
    }
}

/// Pull a human-readable message out of an auth or PostgREST error body.
fn extract_message(body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["message", "msg", "error_description", "error"] {
            if let Some(s) = json.get(key).and_then(|v| v.as_str()) {
                return s.to_string();
            }
        }
    }
    if body.is_empty() {
        "no response body".to_string()
    } else {
        body.to_string()
    }
}

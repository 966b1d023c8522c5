//! Password authentication against the provider's `/auth/v1` endpoints.

use chrono::{DateTime, Duration, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use super::{CloudClient, CredentialStore};
use crate::error::{CloudError, Result, ValidationError};

pub const MIN_PASSWORD_LEN: usize = 6;

/// Refresh this long before the provider's expiry to absorb clock skew.
const EXPIRY_SKEW_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// A signed-in session as stored in the credential store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: AuthUser,
}

impl AuthSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_SKEW_SECS) >= self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    /// Email confirmation disabled: signed in straight away.
    SignedIn(AuthSession),
    /// The provider sent a confirmation link.
    ConfirmationSent { email: String },
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: AuthUser,
}

impl TokenResponse {
    fn into_session(self, now: DateTime<Utc>) -> AuthSession {
        let expires_at = self
            .expires_at
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .unwrap_or_else(|| now + Duration::seconds(self.expires_in.unwrap_or(3600)));
        AuthSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

/// Signup answers with either a token response or a bare user.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(TokenResponse),
    User(AuthUser),
}

fn validate_credentials(email: &str, password: &str) -> Result<(), ValidationError> {
    if email.trim().is_empty() || !email.contains('@') {
        return Err(ValidationError::InvalidValue {
            field: "email".into(),
            message: "expected an email address".into(),
        });
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::InvalidValue {
            field: "password".into(),
            message: format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
        });
    }
    Ok(())
}

impl CloudClient {
    /// Register a new account.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome> {
        validate_credentials(email, password)?;
        let req = self
            .request(Method::POST, "auth/v1/signup", None)?
            .json(&json!({ "email": email.trim(), "password": password }));
        let outcome = match Self::send_json::<SignUpResponse>(req).await? {
            SignUpResponse::Session(tokens) => SignUpOutcome::SignedIn(tokens.into_session(Utc::now())),
            SignUpResponse::User(user) => SignUpOutcome::ConfirmationSent {
                email: user.email.unwrap_or_else(|| email.trim().to_string()),
            },
        };
        info!(email = email.trim(), "signed up");
        Ok(outcome)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession> {
        let req = self
            .request(Method::POST, "auth/v1/token", None)?
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email.trim(), "password": password }));
        let tokens = Self::send_json::<TokenResponse>(req).await?;
        let session = tokens.into_session(Utc::now());
        info!(user_id = %session.user.id, "signed in");
        Ok(session)
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthSession> {
        let req = self
            .request(Method::POST, "auth/v1/token", None)?
            .query(&[("grant_type", "refresh_token")])
            .json(&json!({ "refresh_token": refresh_token }));
        let tokens = Self::send_json::<TokenResponse>(req).await?;
        debug!("session refreshed");
        Ok(tokens.into_session(Utc::now()))
    }

    /// Revoke the session server-side.
    pub async fn sign_out(&self, session: &AuthSession) -> Result<()> {
        let req = self.request(Method::POST, "auth/v1/logout", Some(&session.access_token))?;
        Self::send(req).await?;
        Ok(())
    }

    /// The user the token belongs to.
    pub async fn user(&self, access_token: &str) -> Result<AuthUser> {
        let req = self.request(Method::GET, "auth/v1/user", Some(access_token))?;
        Ok(Self::send_json::<AuthUser>(req).await?)
    }

    /// The stored session, refreshed (and re-stored) when it has expired.
    ///
    /// # Errors
    /// [`CloudError::NotAuthenticated`] with nothing stored,
    /// [`CloudError::SessionExpired`] when the refresh is rejected.
    pub async fn current_session(&self, store: &dyn CredentialStore) -> Result<AuthSession> {
        let session = store.load()?.ok_or(CloudError::NotAuthenticated)?;
        if !session.is_expired(Utc::now()) {
            return Ok(session);
        }
        match self.refresh(&session.refresh_token).await {
            Ok(fresh) => {
                store.save(&fresh)?;
                Ok(fresh)
            }
            Err(e) => {
                warn!(error = %e, "session refresh failed");
                Err(CloudError::SessionExpired(e.to_string()).into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_length_is_enforced_locally() {
        assert!(validate_credentials("a@b.c", "12345").is_err());
        assert!(validate_credentials("a@b.c", "123456").is_ok());
        assert!(validate_credentials("not-an-email", "123456").is_err());
    }

    #[test]
    fn expiry_includes_skew() {
        let now = Utc::now();
        let session = AuthSession {
            access_token: "a".into(),
            refresh_token: "r".into(),
            expires_at: now + Duration::seconds(30),
            user: AuthUser {
                id: "u".into(),
                email: None,
            },
        };
        assert!(session.is_expired(now));
        let later = AuthSession {
            expires_at: now + Duration::seconds(600),
            ..session
        };
        assert!(!later.is_expired(now));
    }

    #[test]
    fn token_response_prefers_absolute_expiry() {
        let now = Utc::now();
        let tokens: TokenResponse = serde_json::from_str(
            r#"{"access_token":"a","refresh_token":"r","expires_in":3600,"expires_at":1700000000,"user":{"id":"u"}}"#,
        )
        .unwrap();
        let session = tokens.into_session(now);
        assert_eq!(session.expires_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn signup_response_without_tokens_is_a_user() {
        let parsed: SignUpResponse =
            serde_json::from_str(r#"{"id":"u-1","email":"a@b.c","confirmation_sent_at":"x"}"#).unwrap();
        assert!(matches!(parsed, SignUpResponse::User(_)));
    }
}

//! Authentication for Firebase Cloud Messaging
//!
//! Access tokens come from a service account key through Google's OAuth2
//! flow. A token is reused until shortly before it expires.

use std::path::Path;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;
use yup_oauth2::{read_service_account_key, ServiceAccountAuthenticator};

use crate::client::FirebaseError;

/// OAuth2 scope required by the FCM HTTP v1 API.
pub const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";

// Google issues one-hour tokens.
const TOKEN_REUSE: Duration = Duration::from_secs(50 * 60);

/// Where bearer tokens for FCM requests come from.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// Path to a service account JSON key file
    ServiceAccount { key_path: String },
    /// A fixed bearer token (emulators and tests)
    Static(String),
}

#[derive(Debug)]
struct CachedToken {
    token: String,
    fetched_at: Instant,
}

/// Hands out bearer tokens, fetching a new one when the cached one is stale.
#[derive(Debug)]
pub struct TokenProvider {
    credentials: Credentials,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            cached: Mutex::new(None),
        }
    }

    pub async fn token(&self) -> Result<String, FirebaseError> {
        let key_path = match &self.credentials {
            Credentials::Static(token) => return Ok(token.clone()),
            Credentials::ServiceAccount { key_path } => key_path,
        };

        let mut cached = self.cached.lock().await;
        if let Some(entry) = cached.as_ref() {
            if entry.fetched_at.elapsed() < TOKEN_REUSE {
                return Ok(entry.token.clone());
            }
        }

        debug!("Fetching a new FCM access token");
        let token = fetch_service_account_token(key_path).await?;
        *cached = Some(CachedToken {
            token: token.clone(),
            fetched_at: Instant::now(),
        });
        Ok(token)
    }
}

/// Obtains an OAuth2 access token for FCM from a service account key file.
///
/// # Errors
///
/// Fails when the key file cannot be read, Google rejects the key, or no
/// token is returned.
pub async fn fetch_service_account_token(key_path: &str) -> Result<String, FirebaseError> {
    let sa_key = read_service_account_key(Path::new(key_path))
        .await
        .map_err(|e| FirebaseError::AuthError(format!("reading {}: {}", key_path, e)))?;

    let auth = ServiceAccountAuthenticator::builder(sa_key)
        .build()
        .await
        .map_err(|e| FirebaseError::AuthError(e.to_string()))?;

    let access_token = auth
        .token(&[FCM_SCOPE])
        .await
        .map_err(|e| FirebaseError::AuthError(e.to_string()))?;

    access_token
        .token()
        .map(str::to_string)
        .ok_or_else(|| FirebaseError::AuthError("No token available".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_tokens_are_returned_as_is() {
        let provider = TokenProvider::new(Credentials::Static("test-token".into()));
        assert_eq!(provider.token().await.unwrap(), "test-token");
    }

    #[tokio::test]
    async fn unreadable_key_is_an_auth_error() {
        let provider = TokenProvider::new(Credentials::ServiceAccount {
            key_path: "/definitely/not/here.json".into(),
        });
        let err = provider.token().await.unwrap_err();
        assert!(matches!(err, FirebaseError::AuthError(_)));
        assert!(!err.is_transient());
    }
}

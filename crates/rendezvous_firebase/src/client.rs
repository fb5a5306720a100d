//! Firebase Cloud Messaging client
//!
//! Sends single-device messages through the FCM HTTP v1 API and exposes them
//! as a [`PushGateway`]. Failures are classified so the retry layer only
//! repeats sends that can still succeed: throttling, server errors and
//! connection failures are transient; rejected tokens and other 4xx responses
//! are not.

use rendezvous_common::{BoxFuture, GatewayError, PushGateway, PushMessage, PushPriority};
use rendezvous_config::FirebaseConfig;
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::auth::{Credentials, TokenProvider};

/// Default FCM API origin.
pub const FCM_API_BASE_URL: &str = "https://fcm.googleapis.com";

const SERVICE: &str = "fcm";

/// Errors that can occur when interacting with the Firebase Cloud Messaging API
#[derive(Error, Debug)]
pub enum FirebaseError {
    /// Error during authentication with Firebase
    #[error("Authentication error: {0}")]
    AuthError(String),

    /// Error during HTTP request to Firebase API
    #[error("HTTP request error: {0}")]
    RequestError(#[from] reqwest::Error),

    /// Missing required configuration
    #[error("Missing configuration: {0}")]
    ConfigError(String),

    /// Error returned by the Firebase API
    #[error("Firebase API error ({status}): {message}")]
    ApiError { status: u16, message: String },
}

impl FirebaseError {
    pub fn is_transient(&self) -> bool {
        match self {
            FirebaseError::RequestError(e) => e.is_timeout() || e.is_connect(),
            FirebaseError::ApiError { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500
            }
            _ => false,
        }
    }
}

impl From<FirebaseError> for GatewayError {
    fn from(err: FirebaseError) -> Self {
        let base = if err.is_transient() {
            GatewayError::transient(SERVICE, err.to_string())
        } else {
            GatewayError::permanent(SERVICE, err.to_string())
        };
        base.with_source(err)
    }
}

/// Top-level FCM v1 request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FcmMessage {
    pub message: Message,
}

/// The message payload for Firebase Cloud Messaging
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    /// Registration token of the target device
    pub token: String,

    /// The notification to be displayed on the user's device
    pub notification: Notification,

    /// Custom key-value data handed to the client app
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,

    pub android: AndroidConfig,
    pub apns: ApnsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AndroidConfig {
    /// `high` or `normal`
    pub priority: String,
    pub notification: AndroidNotification,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AndroidNotification {
    pub sound: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApnsConfig {
    pub headers: BTreeMap<String, String>,
    pub payload: ApnsPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApnsPayload {
    pub aps: Aps,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aps {
    pub sound: String,
}

impl From<PushMessage> for FcmMessage {
    fn from(push: PushMessage) -> Self {
        let (android_priority, apns_priority) = match push.priority {
            PushPriority::High => ("high", "10"),
            PushPriority::Normal => ("normal", "5"),
        };

        FcmMessage {
            message: Message {
                token: push.token,
                notification: Notification {
                    title: push.title,
                    body: push.body,
                },
                data: push.data,
                android: AndroidConfig {
                    priority: android_priority.to_string(),
                    notification: AndroidNotification {
                        sound: push.sound.clone(),
                    },
                },
                apns: ApnsConfig {
                    headers: BTreeMap::from([(
                        "apns-priority".to_string(),
                        apns_priority.to_string(),
                    )]),
                    payload: ApnsPayload {
                        aps: Aps { sound: push.sound },
                    },
                },
            },
        }
    }
}

/// Response from the Firebase Cloud Messaging API
#[derive(Debug, Deserialize)]
pub struct FcmResponse {
    /// `projects/{project_id}/messages/{message_id}`
    pub name: String,
}

/// Client for the Firebase Cloud Messaging HTTP v1 API
#[derive(Debug)]
pub struct FirebaseClient {
    http: Client,
    project_id: String,
    api_base_url: String,
    tokens: TokenProvider,
}

impl FirebaseClient {
    /// Creates a client authenticating with the configured service account.
    ///
    /// # Errors
    ///
    /// Fails when `project_id` or `key_path` is missing.
    pub fn new(config: &FirebaseConfig) -> Result<Self, FirebaseError> {
        let project_id = config.project_id.clone().ok_or_else(|| {
            FirebaseError::ConfigError("Missing project_id in FirebaseConfig".to_string())
        })?;
        let key_path = config.key_path.clone().ok_or_else(|| {
            FirebaseError::ConfigError("Missing key_path in FirebaseConfig".to_string())
        })?;

        Ok(Self {
            http: Client::new(),
            project_id,
            api_base_url: config
                .api_base_url
                .clone()
                .unwrap_or_else(|| FCM_API_BASE_URL.to_string()),
            tokens: TokenProvider::new(Credentials::ServiceAccount { key_path }),
        })
    }

    /// Creates a client that sends a fixed bearer token to `api_base_url`.
    pub fn with_static_token(
        project_id: impl Into<String>,
        api_base_url: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            http: Client::new(),
            project_id: project_id.into(),
            api_base_url: api_base_url.into(),
            tokens: TokenProvider::new(Credentials::Static(token.into())),
        }
    }

    fn send_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/messages:send",
            self.api_base_url.trim_end_matches('/'),
            self.project_id
        )
    }

    /// Sends one message and returns the FCM message name.
    ///
    /// # Errors
    ///
    /// Authentication, transport and non-2xx API responses all fail; see
    /// [`FirebaseError::is_transient`] for which of them are worth retrying.
    pub async fn send_message(&self, message: &FcmMessage) -> Result<String, FirebaseError> {
        let token = self.tokens.token().await?;

        let response = self
            .http
            .post(self.send_url())
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .json(message)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!("FCM rejected message with status {}: {}", status, error_text);
            return Err(FirebaseError::ApiError {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let fcm_response: FcmResponse = response.json().await?;
        debug!("FCM accepted message {}", fcm_response.name);
        Ok(fcm_response.name)
    }
}

impl PushGateway for FirebaseClient {
    fn send(&self, message: PushMessage) -> BoxFuture<'_, String, GatewayError> {
        Box::pin(async move {
            let fcm_message = FcmMessage::from(message);
            self.send_message(&fcm_message)
                .await
                .map_err(GatewayError::from)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn push(priority: PushPriority) -> PushMessage {
        PushMessage {
            token: "device-token".to_string(),
            title: "Hello".to_string(),
            body: "World".to_string(),
            sound: "default".to_string(),
            data: BTreeMap::from([("type".to_string(), "general".to_string())]),
            priority,
        }
    }

    #[test]
    fn high_priority_payload_shape() {
        let body = serde_json::to_value(FcmMessage::from(push(PushPriority::High))).unwrap();
        assert_eq!(
            body,
            json!({
                "message": {
                    "token": "device-token",
                    "notification": {"title": "Hello", "body": "World"},
                    "data": {"type": "general"},
                    "android": {"priority": "high", "notification": {"sound": "default"}},
                    "apns": {
                        "headers": {"apns-priority": "10"},
                        "payload": {"aps": {"sound": "default"}}
                    }
                }
            })
        );
    }

    #[test]
    fn normal_priority_maps_to_platform_values() {
        let message = FcmMessage::from(push(PushPriority::Normal)).message;
        assert_eq!(message.android.priority, "normal");
        assert_eq!(message.apns.headers["apns-priority"], "5");
    }

    #[test]
    fn status_classification() {
        let api = |status| FirebaseError::ApiError {
            status,
            message: String::new(),
        };
        assert!(api(429).is_transient());
        assert!(api(503).is_transient());
        assert!(!api(404).is_transient());
        assert!(!api(400).is_transient());
        assert!(!FirebaseError::ConfigError("x".into()).is_transient());
    }

    #[test]
    fn missing_project_id_is_a_config_error() {
        let err = FirebaseClient::new(&FirebaseConfig::default()).unwrap_err();
        assert!(matches!(err, FirebaseError::ConfigError(_)));
    }
}

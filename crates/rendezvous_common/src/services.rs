//! Service abstractions for external collaborators.
//!
//! The push gateway and the reverse geocoder are reached through these traits
//! so the orchestration code can be wired against real clients at startup and
//! against fakes in tests.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::info;

use crate::models::{Address, GeoPoint};

/// Type alias for a boxed future that returns a Result
pub type BoxFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// A wrapper error type that implements std::error::Error for Box<dyn std::error::Error + Send + Sync>
#[derive(Debug)]
pub struct BoxedError(pub Box<dyn StdError + Send + Sync>);

impl fmt::Display for BoxedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl StdError for BoxedError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.source()
    }
}

impl From<Box<dyn StdError + Send + Sync>> for BoxedError {
    fn from(err: Box<dyn StdError + Send + Sync>) -> Self {
        BoxedError(err)
    }
}

/// Failure reported by an external gateway.
///
/// `transient` tells the retry layer whether the same call may succeed later
/// (timeouts, 429, 5xx) or not (invalid token, 4xx).
#[derive(Error, Debug)]
#[error("{service}: {message}")]
pub struct GatewayError {
    pub service: String,
    pub message: String,
    pub transient: bool,
    #[source]
    pub source: Option<BoxedError>,
}

impl GatewayError {
    pub fn transient(service: &str, message: impl Into<String>) -> Self {
        Self {
            service: service.to_string(),
            message: message.into(),
            transient: true,
            source: None,
        }
    }

    pub fn permanent(service: &str, message: impl Into<String>) -> Self {
        Self {
            service: service.to_string(),
            message: message.into(),
            transient: false,
            source: None,
        }
    }

    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.source = Some(BoxedError(Box::new(source)));
        self
    }
}

/// Delivery priority requested from the push transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushPriority {
    Normal,
    High,
}

/// A push notification addressed to a single device.
#[derive(Debug, Clone, PartialEq)]
pub struct PushMessage {
    /// Push address (device registration token)
    pub token: String,
    pub title: String,
    pub body: String,
    /// Sound played on delivery, `default` for the platform sound
    pub sound: String,
    /// String key/value pairs handed to the app
    pub data: BTreeMap<String, String>,
    pub priority: PushPriority,
}

/// A push transport (FCM in production).
///
/// Delivery is at most once per call; retries are the caller's decision.
pub trait PushGateway: Send + Sync {
    /// Sends one message and returns the transport's delivery identifier.
    fn send(&self, message: PushMessage) -> BoxFuture<'_, String, GatewayError>;
}

/// Push gateway that records and logs messages instead of delivering them.
///
/// Wired in when FCM is disabled, and used as the gateway double in tests:
/// failures can be scripted per call or per device token.
#[derive(Debug, Default)]
pub struct RecordingPushGateway {
    state: Mutex<RecordingState>,
}

#[derive(Debug, Default)]
struct RecordingState {
    attempts: usize,
    sent: Vec<PushMessage>,
    scripted: VecDeque<(bool, String)>,
    rejected_tokens: BTreeSet<String>,
}

const RECORDING_SERVICE: &str = "recording-push";

impl RecordingPushGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `send` fail once, transiently or permanently.
    pub fn fail_next(&self, transient: bool, message: impl Into<String>) {
        self.state().scripted.push_back((transient, message.into()));
    }

    /// Every later send to `token` fails permanently, like an unregistered device.
    pub fn reject_token(&self, token: impl Into<String>) {
        self.state().rejected_tokens.insert(token.into());
    }

    /// Messages accepted so far, in send order.
    pub fn sent(&self) -> Vec<PushMessage> {
        self.state().sent.clone()
    }

    /// Number of `send` calls, including failed ones.
    pub fn attempts(&self) -> usize {
        self.state().attempts
    }

    fn state(&self) -> MutexGuard<'_, RecordingState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PushGateway for RecordingPushGateway {
    fn send(&self, message: PushMessage) -> BoxFuture<'_, String, GatewayError> {
        let result = {
            let mut state = self.state();
            state.attempts += 1;
            if let Some((transient, text)) = state.scripted.pop_front() {
                Err(if transient {
                    GatewayError::transient(RECORDING_SERVICE, text)
                } else {
                    GatewayError::permanent(RECORDING_SERVICE, text)
                })
            } else if state.rejected_tokens.contains(&message.token) {
                Err(GatewayError::permanent(
                    RECORDING_SERVICE,
                    "Requested entity was not found.",
                ))
            } else {
                info!("Recorded push \"{}\" for token {}", message.title, message.token);
                state.sent.push(message);
                Ok(format!("recorded/{}", state.sent.len()))
            }
        };
        Box::pin(async move { result })
    }
}

/// Resolves coordinates into a postal address.
pub trait ReverseGeocoder: Send + Sync {
    /// Returns `None` when the coordinates do not resolve to an address.
    fn reverse(&self, point: GeoPoint) -> BoxFuture<'_, Option<Address>, GatewayError>;
}

/// Geocoder used when no geocoding backend is configured.
#[derive(Debug, Clone, Default)]
pub struct NoopGeocoder;

impl ReverseGeocoder for NoopGeocoder {
    fn reverse(&self, _point: GeoPoint) -> BoxFuture<'_, Option<Address>, GatewayError> {
        Box::pin(async { Ok(None) })
    }
}

use serde::Serialize;
use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

use crate::services::{BoxedError, GatewayError};

/// The error kinds callers can observe.
///
/// Internally errors carry a full cause chain; at the boundary everything
/// collapses into one of these three kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "invalid-argument",
            ErrorKind::NotFound => "not-found",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The base error type for all Rendezvous operations.
///
/// Each crate converts its own error type into this one (`DbError`,
/// `GatewayError`, ...). The `Display` output is the original message text,
/// the wrapped cause stays reachable through `source()`.
#[derive(Error, Debug)]
pub enum RendezvousError {
    /// Missing or malformed caller input, detected before any I/O
    #[error("{0}")]
    InvalidArgument(String),

    /// A referenced record (user, push address) does not exist
    #[error("{0}")]
    NotFound(String),

    /// The document store failed
    #[error("{message}")]
    Database {
        message: String,
        transient: bool,
        #[source]
        source: BoxedError,
    },

    /// An external service (push gateway, geocoder) failed
    #[error("{message}")]
    ExternalService {
        service: String,
        message: String,
        transient: bool,
        #[source]
        source: BoxedError,
    },

    /// The caller's deadline passed before the operation finished
    #[error("Deadline exceeded while {0}")]
    Timeout(String),

    /// The caller cancelled the operation
    #[error("Cancelled while {0}")]
    Cancelled(String),

    /// Anything else
    #[error("{message}")]
    Internal {
        message: String,
        #[source]
        source: Option<BoxedError>,
    },
}

impl RendezvousError {
    /// Maps the error onto the external three-kind taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RendezvousError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            RendezvousError::NotFound(_) => ErrorKind::NotFound,
            _ => ErrorKind::Internal,
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            RendezvousError::Database { transient, .. } => *transient,
            RendezvousError::ExternalService { transient, .. } => *transient,
            _ => false,
        }
    }

    /// Renders the error followed by every cause, separated by `: `.
    pub fn chain(&self) -> String {
        display_chain(self)
    }
}

/// A trait for converting errors to HTTP status codes.
pub trait HttpStatusCode {
    /// Returns the HTTP status code for this error.
    fn status_code(&self) -> u16;
}

impl HttpStatusCode for RendezvousError {
    fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::InvalidArgument => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Internal => 500,
        }
    }
}

impl From<GatewayError> for RendezvousError {
    fn from(err: GatewayError) -> Self {
        RendezvousError::ExternalService {
            service: err.service.clone(),
            message: err.message.clone(),
            transient: err.transient,
            source: BoxedError(Box::new(err)),
        }
    }
}

impl From<serde_json::Error> for RendezvousError {
    fn from(err: serde_json::Error) -> Self {
        RendezvousError::Internal {
            message: err.to_string(),
            source: Some(BoxedError(Box::new(err))),
        }
    }
}

/// Renders an error and its whole `source()` chain on one line.
pub fn display_chain(err: &(dyn StdError + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut current = err.source();
    while let Some(cause) = current {
        let text = cause.to_string();
        // BoxedError displays its inner error, which would repeat the previous link
        if !rendered.ends_with(&text) {
            rendered.push_str(": ");
            rendered.push_str(&text);
        }
        current = cause.source();
    }
    rendered
}

// Utility functions for error handling
pub fn invalid_argument<T: fmt::Display>(message: T) -> RendezvousError {
    RendezvousError::InvalidArgument(message.to_string())
}

pub fn not_found<T: fmt::Display>(message: T) -> RendezvousError {
    RendezvousError::NotFound(message.to_string())
}

pub fn internal_error<T: fmt::Display>(message: T) -> RendezvousError {
    RendezvousError::Internal {
        message: message.to_string(),
        source: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("socket closed")]
    struct SocketClosed;

    #[derive(Debug, Error)]
    #[error("pool exhausted")]
    struct PoolExhausted {
        #[source]
        source: SocketClosed,
    }

    #[test]
    fn kinds_collapse_to_three() {
        assert_eq!(invalid_argument("x").kind(), ErrorKind::InvalidArgument);
        assert_eq!(not_found("x").kind(), ErrorKind::NotFound);
        assert_eq!(internal_error("x").kind(), ErrorKind::Internal);
        assert_eq!(
            RendezvousError::Timeout("loading user".into()).kind(),
            ErrorKind::Internal
        );
        assert_eq!(ErrorKind::NotFound.as_str(), "not-found");
        assert_eq!(
            serde_json::to_value(ErrorKind::InvalidArgument).unwrap(),
            serde_json::json!("invalid-argument")
        );
    }

    #[test]
    fn status_codes_follow_kind() {
        assert_eq!(invalid_argument("x").status_code(), 400);
        assert_eq!(not_found("x").status_code(), 404);
        assert_eq!(RendezvousError::Cancelled("x".into()).status_code(), 500);
    }

    #[test]
    fn chain_follows_the_sources() {
        let err = RendezvousError::Internal {
            message: "loading user u1: pool exhausted".to_string(),
            source: Some(BoxedError(Box::new(PoolExhausted {
                source: SocketClosed,
            }))),
        };

        assert_eq!(err.to_string(), "loading user u1: pool exhausted");
        assert!(err.source().is_some());
        assert_eq!(
            err.chain(),
            "loading user u1: pool exhausted: socket closed"
        );
    }

    #[test]
    fn gateway_errors_keep_transience() {
        let err: RendezvousError = GatewayError::transient("fcm", "503 Service Unavailable").into();
        assert!(err.is_transient());
        assert_eq!(err.to_string(), "503 Service Unavailable");
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}

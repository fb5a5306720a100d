//! Firebase Cloud Messaging push gateway for Rendezvous
//!
//! [`FirebaseClient`] implements [`rendezvous_common::PushGateway`] over the
//! FCM HTTP v1 API, authenticating with a service account key.

pub mod auth;
pub mod client;

pub use auth::{Credentials, TokenProvider};
pub use client::{FcmMessage, FirebaseClient, FirebaseError, FCM_API_BASE_URL};

// --- File: crates/rendezvous_common/src/lib.rs ---

pub mod context; // Deadlines and cancellation
pub mod error; // Error handling
pub mod http; // HTTP error mapping
pub mod logging; // Logging utilities
pub mod models; // Shared records
pub mod retry; // Backoff for transient failures
pub mod services; // Gateway abstractions

pub use context::CallContext;

pub use error::{
    display_chain, internal_error, invalid_argument, not_found, ErrorKind,
    HttpStatusCode, RendezvousError,
};

pub use http::IntoHttpResponse;

pub use logging::{init, init_with_level, parse_level};

pub use retry::{retry_async, RetryConfig};

pub use services::{
    BoxFuture, BoxedError, GatewayError, NoopGeocoder, PushGateway, PushMessage, PushPriority,
    RecordingPushGateway, ReverseGeocoder,
};

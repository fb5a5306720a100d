// HTTP mapping for RendezvousError.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};

use crate::error::{ErrorKind, HttpStatusCode, RendezvousError};

/// Extension trait for RendezvousError to convert it to an Axum HTTP response.
pub trait IntoHttpResponse {
    fn into_http_response(self) -> Response;
}

impl IntoHttpResponse for RendezvousError {
    fn into_http_response(self) -> Response {
        let status_code =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let kind = self.kind();
        match kind {
            ErrorKind::Internal => error!("Request failed: {}", self.chain()),
            _ => warn!("Request rejected ({}): {}", kind, self),
        }

        let body = Json(json!({
            "error": {
                "kind": kind,
                "message": self.to_string(),
            }
        }));

        (status_code, body).into_response()
    }
}

impl IntoResponse for RendezvousError {
    fn into_response(self) -> Response {
        self.into_http_response()
    }
}

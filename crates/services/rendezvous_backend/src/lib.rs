//! Rendezvous HTTP server assembly
//!
//! [`AppState`] wires the configured store and gateways into the matching
//! services; [`app`] mounts the callables under `/api`.

use axum::{routing::get, Router};
use rendezvous_config::AppConfig;
use rendezvous_matching::{routes as matching_routes, spawn_sweeper};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub mod app_state;

pub use app_state::{AppState, AppStateBuilder, StartupError};

pub fn app(state: &AppState) -> Router {
    let api_router = Router::new()
        .route("/", get(|| async { "Welcome to the Rendezvous API!" }))
        .merge(matching_routes(state.matching.clone()));

    #[allow(unused_mut)] // only mutated with the openapi feature
    let mut app = Router::new().nest("/api", api_router);

    #[cfg(feature = "openapi")]
    {
        use rendezvous_matching::openapi::RendezvousApiDoc;
        use utoipa::OpenApi;
        use utoipa_swagger_ui::SwaggerUi;

        #[derive(OpenApi)]
        #[openapi(
            info(
                title = "Rendezvous API",
                version = "0.1.0",
                description = "Notification, discovery and match callables"
            ),
            servers((url = "/api", description = "Main API Prefix")),
        )]
        struct ApiDoc;

        let mut openapi_doc = ApiDoc::openapi();
        openapi_doc.merge(RendezvousApiDoc::openapi());
        info!("Adding Swagger UI at /api/docs");

        app = app.merge(SwaggerUi::new("/api/docs").url("/api/docs/openapi.json", openapi_doc));
    }

    app.layer(TraceLayer::new_for_http())
}

/// Starts the periodic retention sweep when `retention.sweep_interval_secs` is set.
pub fn start_sweeper(
    config: &AppConfig,
    state: &AppState,
    shutdown: &CancellationToken,
) -> Option<JoinHandle<()>> {
    let Some(secs) = config.retention.sweep_interval_secs else {
        info!("Notification sweeper disabled; use DELETE /api/cleanupOldNotifications");
        return None;
    };
    if secs == 0 {
        warn!("retention.sweep_interval_secs is 0, not starting the sweeper");
        return None;
    }
    info!(
        "Sweeping notifications older than {} days every {}s",
        config.retention.max_age_days, secs
    );
    Some(spawn_sweeper(
        state.matching.retention.clone(),
        Duration::from_secs(secs),
        state.matching.request_timeout(),
        shutdown.child_token(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn state() -> AppState {
        AppState::builder(Arc::new(AppConfig::default()))
            .build()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn callables_are_nested_under_api() {
        let app = app(&state().await);

        let response = app
            .clone()
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn sweeper_is_optional() {
        let state = state().await;
        let shutdown = CancellationToken::new();
        let mut config = AppConfig::default();

        config.retention.sweep_interval_secs = None;
        assert!(start_sweeper(&config, &state, &shutdown).is_none());

        config.retention.sweep_interval_secs = Some(0);
        assert!(start_sweeper(&config, &state, &shutdown).is_none());

        config.retention.sweep_interval_secs = Some(3600);
        let handle = start_sweeper(&config, &state, &shutdown).unwrap();
        shutdown.cancel();
        handle.await.unwrap();
    }
}

use rendezvous_backend::{app, start_sweeper, AppState};
use rendezvous_common::logging;
use rendezvous_config::load_config;
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

async fn shutdown_signal(shutdown: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown requested"),
        Err(e) => error!("Could not listen for the shutdown signal: {}", e),
    }
    shutdown.cancel();
}

#[tokio::main]
async fn main() -> ExitCode {
    rendezvous_config::ensure_dotenv_loaded();
    let level = env::var("LOG_LEVEL").unwrap_or_default();
    logging::init_with_level(logging::parse_level(&level));

    let config = match load_config() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            error!("Failed to load config: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let shutdown = CancellationToken::new();
    let state = match AppState::builder(config)
        .with_shutdown(shutdown.clone())
        .build()
        .await
    {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize services: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let _sweeper = start_sweeper(&state.config, &state, &shutdown);

    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };
    info!("Starting server at http://{}", addr);
    info!("API endpoints available at http://{}/api", addr);

    let served = axum::serve(listener, app(&state).into_make_service())
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await;

    shutdown.cancel();
    match served {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Server error: {}", e);
            ExitCode::FAILURE
        }
    }
}

//! HTTP trigger
//!
//! Runs the pipeline on request so the job can be driven by a scheduler or a
//! serverless platform instead of the command line.

use crate::Result;
use crate::config::RuntimeSettings;
use axum::{Router, routing::get};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

pub mod error_response;
pub mod routes;
pub mod state;

pub use state::AppState;

/// Create the router
///
/// # Routes
///
/// - `GET /?env=<name>` - Run the pipeline for `env` (default `dev`)
/// - `POST /?env=<name>` - Same as `GET`
/// - `GET /health` - Liveness check
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/",
            get(routes::trigger_pipeline).post(routes::trigger_pipeline),
        )
        .route("/health", get(routes::health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serve the HTTP trigger on `bind_address` until Ctrl-C or SIGTERM
pub async fn start_api_server(bind_address: SocketAddr, settings: RuntimeSettings) -> Result<()> {
    tracing::info!(
        address = %bind_address,
        mode = ?settings.execution_mode,
        "Starting HTTP trigger"
    );

    let app = create_router(AppState::new(settings));

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(
        address = %bind_address,
        "HTTP trigger listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(crate::wait_for_signal())
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("HTTP trigger stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

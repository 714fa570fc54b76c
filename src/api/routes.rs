//! Route handlers

use super::AppState;
use crate::error::Error;
use crate::pipeline::run_pipeline;
use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;

/// Environment used when the request names none
pub const DEFAULT_ENV: &str = "dev";

/// Query string of the trigger endpoint
#[derive(Debug, Deserialize)]
pub struct TriggerQuery {
    /// Environment whose configuration is run
    #[serde(default = "default_env")]
    pub env: String,
}

fn default_env() -> String {
    DEFAULT_ENV.to_string()
}

/// GET|POST / - Run the pipeline once for `env`
pub async fn trigger_pipeline(
    State(state): State<AppState>,
    Query(query): Query<TriggerQuery>,
) -> Result<String, Error> {
    let env = query.env;
    tracing::info!(env = %env, "pipeline triggered over HTTP");

    run_pipeline(&env, &state.settings).await?;

    Ok(format!("Pipeline executed for environment: {env}"))
}

/// GET /health - Liveness check
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

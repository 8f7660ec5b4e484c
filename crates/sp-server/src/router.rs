//! Router configuration.
//!
//! This module creates the main Axum router that combines all endpoints.

use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::handlers;
use crate::state::AppState;

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/api/password",
            get(handlers::get_settings).post(handlers::change_password),
        )
        .route(
            "/api/password/generated",
            get(handlers::get_generated_password),
        );

    let health = Router::new()
        .route("/health", get(health_check))
        .route("/health/live", get(liveness_check))
        .route("/health/ready", get(readiness_check));

    let cors = cors_layer(&state.config.cors_origins);
    let static_dir = state.config.static_dir.clone();

    let mut app = Router::new().merge(api).merge(health).with_state(state);

    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir).append_index_html_on_directories(true));
    }

    app.layer(TraceLayer::new_for_http()).layer(cors)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(origins)
}

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
}

/// Basic health check.
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: Some(env!("CARGO_PKG_VERSION").to_string()),
    })
}

/// Kubernetes liveness probe.
async fn liveness_check() -> StatusCode {
    StatusCode::OK
}

/// Kubernetes readiness probe.
///
/// With a directory configured, the service account must be able to bind.
async fn readiness_check(State(state): State<AppState>) -> StatusCode {
    let Some(service) = state.directory.as_ref() else {
        return StatusCode::OK;
    };

    match service.directory().test_connection().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            warn!(error = %e, "Directory not reachable");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
